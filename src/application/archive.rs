//! TOML content archives used to seed or replace the post store.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::domain::entities::{AuthorRecord, CategoryRecord, PostRecord, TagRecord};
use crate::domain::error::DomainError;
use crate::domain::types::PostStatus;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read archive: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse archive: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContentArchive {
    pub authors: Vec<ArchiveAuthor>,
    pub categories: Vec<ArchiveTaxon>,
    pub tags: Vec<ArchiveTaxon>,
    pub posts: Vec<ArchivePost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveAuthor {
    pub key: String,
    pub name: String,
}

/// A category or tag entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveTaxon {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchivePost {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub status: PostStatus,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub views_count: i64,
    #[serde(default)]
    pub likes_count: i64,
    pub author: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Archive content with identifiers assigned and references resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolvedContent {
    pub authors: Vec<AuthorRecord>,
    pub categories: Vec<CategoryRecord>,
    pub tags: Vec<TagRecord>,
    pub posts: Vec<PostRecord>,
    /// `(post_id, tag_id)` associations.
    pub post_tags: Vec<(Uuid, Uuid)>,
}

impl ContentArchive {
    pub fn parse(source: &str) -> Result<Self, ArchiveError> {
        Ok(toml::from_str(source)?)
    }

    pub async fn load(path: &Path) -> Result<Self, ArchiveError> {
        let source = tokio::fs::read_to_string(path).await?;
        Self::parse(&source)
    }

    /// Validate the archive and assign fresh ids to every record.
    pub fn resolve(&self) -> Result<ResolvedContent, ArchiveError> {
        let now = OffsetDateTime::now_utc();

        let mut author_ids = HashMap::new();
        let mut authors = Vec::with_capacity(self.authors.len());
        for author in &self.authors {
            let key = author.key.trim();
            if key.is_empty() {
                return Err(invalid("author key must not be empty"));
            }
            let id = Uuid::new_v4();
            if author_ids.insert(key.to_string(), id).is_some() {
                return Err(invalid(format!("duplicate author key `{key}`")));
            }
            authors.push(AuthorRecord {
                id,
                name: author.name.clone(),
            });
        }

        let (categories, category_ids) = resolve_taxa("category", &self.categories)?;
        let category_records = categories
            .into_iter()
            .map(|(id, slug, name)| CategoryRecord { id, slug, name })
            .collect();
        let (tags, tag_ids) = resolve_taxa("tag", &self.tags)?;
        let tag_records = tags
            .into_iter()
            .map(|(id, slug, name)| TagRecord { id, slug, name })
            .collect();

        let mut post_slugs = HashSet::new();
        let mut posts = Vec::with_capacity(self.posts.len());
        let mut post_tags = Vec::new();
        for entry in &self.posts {
            let slug = entry.slug.trim();
            if slug.is_empty() {
                return Err(invalid("post slug must not be empty"));
            }
            if !post_slugs.insert(slug.to_string()) {
                return Err(invalid(format!("duplicate post slug `{slug}`")));
            }
            if entry.views_count < 0 || entry.likes_count < 0 {
                return Err(invalid(format!("post `{slug}` has a negative counter")));
            }

            let published_at = entry
                .published_at
                .as_deref()
                .map(|raw| {
                    OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(|err| {
                        invalid(format!("post `{slug}` has invalid published_at: {err}"))
                    })
                })
                .transpose()?;
            if entry.status == PostStatus::Published && published_at.is_none() {
                return Err(invalid(format!(
                    "published post `{slug}` is missing published_at"
                )));
            }

            let author_id = *author_ids.get(entry.author.trim()).ok_or_else(|| {
                invalid(format!(
                    "post `{slug}` references unknown author `{}`",
                    entry.author
                ))
            })?;
            let category_id = entry
                .category
                .as_deref()
                .map(|category| {
                    category_ids.get(category.trim()).copied().ok_or_else(|| {
                        invalid(format!(
                            "post `{slug}` references unknown category `{category}`"
                        ))
                    })
                })
                .transpose()?;

            let id = Uuid::new_v4();
            let mut seen_tags = HashSet::new();
            for tag in &entry.tags {
                let tag_id = *tag_ids.get(tag.trim()).ok_or_else(|| {
                    invalid(format!("post `{slug}` references unknown tag `{tag}`"))
                })?;
                if seen_tags.insert(tag_id) {
                    post_tags.push((id, tag_id));
                }
            }

            posts.push(PostRecord {
                id,
                slug: slug.to_string(),
                title: entry.title.clone(),
                content: entry.content.clone(),
                status: entry.status,
                published_at,
                views_count: entry.views_count,
                likes_count: entry.likes_count,
                author_id,
                category_id,
                created_at: now,
                updated_at: now,
            });
        }

        Ok(ResolvedContent {
            authors,
            categories: category_records,
            tags: tag_records,
            posts,
            post_tags,
        })
    }
}

type ResolvedTaxa = (Vec<(Uuid, String, String)>, HashMap<String, Uuid>);

fn resolve_taxa(kind: &str, entries: &[ArchiveTaxon]) -> Result<ResolvedTaxa, ArchiveError> {
    let mut ids = HashMap::new();
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let slug = entry.slug.trim();
        if slug.is_empty() {
            return Err(invalid(format!("{kind} slug must not be empty")));
        }
        let id = Uuid::new_v4();
        if ids.insert(slug.to_string(), id).is_some() {
            return Err(invalid(format!("duplicate {kind} slug `{slug}`")));
        }
        records.push((id, slug.to_string(), entry.name.clone()));
    }
    Ok((records, ids))
}

fn invalid(message: impl Into<String>) -> ArchiveError {
    ArchiveError::Invalid(DomainError::validation(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCHIVE: &str = r#"
[[authors]]
key = "ana"
name = "Ana Lima"

[[categories]]
slug = "tutorials"
name = "Tutorials"

[[tags]]
slug = "programming"
name = "Programming"

[[posts]]
slug = "laravel-tutorial"
title = "Laravel Tutorial"
content = "Routing basics"
status = "published"
published_at = "2024-03-01T09:00:00Z"
views_count = 12
author = "ana"
category = "tutorials"
tags = ["programming", "programming"]

[[posts]]
slug = "draft-notes"
title = "Draft notes"
status = "draft"
author = "ana"
"#;

    fn validation_message(err: ArchiveError) -> String {
        match err {
            ArchiveError::Invalid(DomainError::Validation { message }) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn resolves_references_and_deduplicates_tags() {
        let resolved = ContentArchive::parse(ARCHIVE)
            .expect("archive parses")
            .resolve()
            .expect("archive resolves");

        assert_eq!(resolved.posts.len(), 2);
        let tutorial = &resolved.posts[0];
        assert_eq!(tutorial.author_id, resolved.authors[0].id);
        assert_eq!(tutorial.category_id, Some(resolved.categories[0].id));
        assert_eq!(tutorial.views_count, 12);
        assert_eq!(resolved.post_tags, [(tutorial.id, resolved.tags[0].id)]);

        let draft = &resolved.posts[1];
        assert_eq!(draft.status, PostStatus::Draft);
        assert_eq!(draft.published_at, None);
        assert_eq!(draft.category_id, None);
    }

    #[test]
    fn rejects_unknown_references() {
        let source = ARCHIVE.replace("category = \"tutorials\"", "category = \"guides\"");
        let err = ContentArchive::parse(&source)
            .expect("archive parses")
            .resolve()
            .expect_err("unknown category");
        assert!(validation_message(err).contains("unknown category `guides`"));
    }

    #[test]
    fn rejects_duplicate_slugs() {
        let source = ARCHIVE.replace("draft-notes", "laravel-tutorial");
        let err = ContentArchive::parse(&source)
            .expect("archive parses")
            .resolve()
            .expect_err("duplicate slug");
        assert!(validation_message(err).contains("duplicate post slug"));
    }

    #[test]
    fn rejects_published_posts_without_date() {
        let source = ARCHIVE.replace("published_at = \"2024-03-01T09:00:00Z\"\n", "");
        let err = ContentArchive::parse(&source)
            .expect("archive parses")
            .resolve()
            .expect_err("missing date");
        assert!(validation_message(err).contains("missing published_at"));
    }

    #[test]
    fn rejects_negative_counters() {
        let source = ARCHIVE.replace("views_count = 12", "views_count = -1");
        let err = ContentArchive::parse(&source)
            .expect("archive parses")
            .resolve()
            .expect_err("negative views");
        assert!(validation_message(err).contains("negative counter"));
    }
}
