//! Public post listing and post detail use cases.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    AuthorsRepo, CategoriesRepo, CategoryWithCount, PostQueryFilter, PostViewsRepo, PostsRepo,
    RepoError, TagWithCount, TagsRepo,
};
use crate::domain::entities::{AuthorRecord, PostRecord};
use crate::domain::posts::{EXCERPT_CHARS, excerpt};
use crate::domain::types::PostSort;
use crate::presentation::views::{
    AppliedFilters, AuthorView, CategorySummary, CategoryView, ListingView, PaginatedPosts,
    PostDetailView, PostSummary, PostView, TagSummary, TagView,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_RELATED_LIMIT: u32 = 3;

pub(crate) const POST_VIEWS_METRIC: &str = "lectern_post_views_total";
pub(crate) const POST_VIEW_FAILURES_METRIC: &str = "lectern_post_view_failures_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingSettings {
    pub page_size: u32,
    pub related_limit: u32,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            related_limit: DEFAULT_RELATED_LIMIT,
        }
    }
}

/// Raw listing parameters as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("post `{slug}` references a missing author")]
    MissingAuthor { slug: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct ListingService {
    posts: Arc<dyn PostsRepo>,
    views: Arc<dyn PostViewsRepo>,
    authors: Arc<dyn AuthorsRepo>,
    categories: Arc<dyn CategoriesRepo>,
    tags: Arc<dyn TagsRepo>,
    settings: ListingSettings,
}

impl ListingService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        views: Arc<dyn PostViewsRepo>,
        authors: Arc<dyn AuthorsRepo>,
        categories: Arc<dyn CategoriesRepo>,
        tags: Arc<dyn TagsRepo>,
        settings: ListingSettings,
    ) -> Self {
        Self {
            posts,
            views,
            authors,
            categories,
            tags,
            settings,
        }
    }

    pub async fn list(&self, query: ListingQuery) -> Result<ListingView, ListingError> {
        let now = OffsetDateTime::now_utc();
        let filter = PostQueryFilter {
            category: normalize_param(query.category),
            tag: normalize_param(query.tag),
            search: normalize_param(query.search),
        };
        let sort = PostSort::from_query(query.sort.as_deref());
        let request = PageRequest::from_query(query.page.as_deref(), self.settings.page_size);

        let page = self
            .posts
            .list_published(&filter, sort, now, request)
            .await?;
        let category_counts = self.categories.list_with_counts(now).await?;
        let tag_counts = self.tags.list_with_counts(now).await?;

        debug!(
            target = "lectern::listing",
            category = filter.category.as_deref().unwrap_or(""),
            tag = filter.tag.as_deref().unwrap_or(""),
            search = filter.search.as_deref().unwrap_or(""),
            sort = sort.as_str(),
            page = page.page,
            total = page.total,
            "listed published posts"
        );

        let category_views = category_counts
            .iter()
            .map(|entry| {
                (
                    entry.id,
                    CategoryView {
                        slug: entry.slug.clone(),
                        name: entry.name.clone(),
                    },
                )
            })
            .collect();
        let records: Vec<&PostRecord> = page.items.iter().collect();
        let context = self.record_context(&records, category_views).await?;

        let data = page
            .items
            .iter()
            .map(|record| context.summary(record))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListingView {
            posts: PaginatedPosts {
                data,
                current_page: page.page,
                last_page: page.last_page(),
                per_page: page.per_page,
                total: page.total,
            },
            categories: build_category_summaries(&category_counts, filter.category.as_deref()),
            tags: build_tag_summaries(&tag_counts, filter.tag.as_deref()),
            filters: AppliedFilters {
                category: filter.category,
                tag: filter.tag,
                search: filter.search,
                sort: sort.as_str(),
            },
        })
    }

    /// Load a visible post by slug, count the view and gather related posts.
    /// Returns `Ok(None)` for unknown slugs and for posts that are not public.
    pub async fn post_detail(&self, slug: &str) -> Result<Option<PostDetailView>, ListingError> {
        let now = OffsetDateTime::now_utc();
        let Some(mut post) = self.posts.find_by_slug(slug).await? else {
            return Ok(None);
        };

        if !post.is_visible_at(now) {
            return Ok(None);
        }

        self.record_view(&mut post).await;

        let related = match post.category_id {
            Some(_) if self.settings.related_limit > 0 => {
                self.posts
                    .list_related(&post, now, self.settings.related_limit)
                    .await?
            }
            _ => Vec::new(),
        };

        let category = match post.category_id {
            Some(category_id) => self.categories.find_by_id(category_id).await?,
            None => None,
        };
        let category_views = category
            .into_iter()
            .map(|category| {
                (
                    category.id,
                    CategoryView {
                        slug: category.slug,
                        name: category.name,
                    },
                )
            })
            .collect();

        let mut records = Vec::with_capacity(related.len() + 1);
        records.push(&post);
        records.extend(related.iter());
        let context = self.record_context(&records, category_views).await?;

        let related_posts = related
            .iter()
            .map(|record| context.summary(record))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(PostDetailView {
            post: context.view(&post)?,
            related_posts,
        }))
    }

    async fn record_view(&self, post: &mut PostRecord) {
        match self.views.increment_views(post.id).await {
            Ok(views_count) => {
                post.views_count = views_count;
                counter!(POST_VIEWS_METRIC).increment(1);
            }
            Err(err) => {
                counter!(POST_VIEW_FAILURES_METRIC).increment(1);
                warn!(
                    target = "lectern::listing::views",
                    slug = %post.slug,
                    error = %err,
                    "failed to record post view"
                );
            }
        }
    }

    async fn record_context(
        &self,
        records: &[&PostRecord],
        categories: HashMap<Uuid, CategoryView>,
    ) -> Result<RecordContext, ListingError> {
        if records.is_empty() {
            return Ok(RecordContext {
                authors: HashMap::new(),
                categories,
                tags: HashMap::new(),
            });
        }

        let post_ids: Vec<Uuid> = records.iter().map(|record| record.id).collect();
        let mut author_ids: Vec<Uuid> = records.iter().map(|record| record.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let authors = self
            .authors
            .find_many(&author_ids)
            .await?
            .into_iter()
            .map(|author| (author.id, author))
            .collect();

        let mut tags: HashMap<Uuid, Vec<TagView>> = HashMap::new();
        for (post_id, tag) in self.tags.list_for_posts(&post_ids).await? {
            tags.entry(post_id).or_default().push(TagView {
                slug: tag.slug,
                name: tag.name,
            });
        }

        Ok(RecordContext {
            authors,
            categories,
            tags,
        })
    }
}

/// Related records resolved once for a batch of posts.
struct RecordContext {
    authors: HashMap<Uuid, AuthorRecord>,
    categories: HashMap<Uuid, CategoryView>,
    tags: HashMap<Uuid, Vec<TagView>>,
}

impl RecordContext {
    fn author(&self, record: &PostRecord) -> Result<AuthorView, ListingError> {
        self.authors
            .get(&record.author_id)
            .map(|author| AuthorView {
                name: author.name.clone(),
            })
            .ok_or_else(|| ListingError::MissingAuthor {
                slug: record.slug.clone(),
            })
    }

    fn category(&self, record: &PostRecord) -> Option<CategoryView> {
        record
            .category_id
            .and_then(|id| self.categories.get(&id).cloned())
    }

    fn tags(&self, record: &PostRecord) -> Vec<TagView> {
        self.tags.get(&record.id).cloned().unwrap_or_default()
    }

    fn summary(&self, record: &PostRecord) -> Result<PostSummary, ListingError> {
        Ok(PostSummary {
            slug: record.slug.clone(),
            title: record.title.clone(),
            excerpt: excerpt(&record.content, EXCERPT_CHARS),
            published_at: format_timestamp(record.published_at),
            views_count: record.views_count,
            likes_count: record.likes_count,
            author: self.author(record)?,
            category: self.category(record),
            tags: self.tags(record),
        })
    }

    fn view(&self, record: &PostRecord) -> Result<PostView, ListingError> {
        Ok(PostView {
            slug: record.slug.clone(),
            title: record.title.clone(),
            content: record.content.clone(),
            published_at: format_timestamp(record.published_at),
            views_count: record.views_count,
            likes_count: record.likes_count,
            author: self.author(record)?,
            category: self.category(record),
            tags: self.tags(record),
        })
    }
}

fn format_timestamp(value: Option<OffsetDateTime>) -> Option<String> {
    value.and_then(|timestamp| timestamp.format(&Rfc3339).ok())
}

/// Trim a query value; blank values count as absent.
pub(crate) fn normalize_param(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn build_category_summaries(
    counts: &[CategoryWithCount],
    active: Option<&str>,
) -> Vec<CategorySummary> {
    let mut ordered: Vec<&CategoryWithCount> = counts.iter().collect();
    ordered.sort_by(|left, right| {
        left.name
            .to_lowercase()
            .cmp(&right.name.to_lowercase())
            .then_with(|| left.slug.cmp(&right.slug))
    });

    ordered
        .into_iter()
        .map(|entry| CategorySummary {
            slug: entry.slug.clone(),
            name: entry.name.clone(),
            count: entry.count,
            is_active: active == Some(entry.slug.as_str()),
        })
        .collect()
}

fn build_tag_summaries(counts: &[TagWithCount], active: Option<&str>) -> Vec<TagSummary> {
    let mut ordered: Vec<&TagWithCount> = counts.iter().collect();
    ordered.sort_by(|left, right| {
        left.name
            .to_lowercase()
            .cmp(&right.name.to_lowercase())
            .then_with(|| left.slug.cmp(&right.slug))
    });

    ordered
        .into_iter()
        .map(|entry| TagSummary {
            slug: entry.slug.clone(),
            name: entry.name.clone(),
            count: entry.count,
            is_active: active == Some(entry.slug.as_str()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_params_are_dropped() {
        assert_eq!(normalize_param(None), None);
        assert_eq!(normalize_param(Some("   ".to_string())), None);
        assert_eq!(
            normalize_param(Some(" laravel ".to_string())),
            Some("laravel".to_string())
        );
    }

    #[test]
    fn tag_summaries_sort_by_name_and_flag_active_filter() {
        let counts = vec![
            TagWithCount {
                id: Uuid::new_v4(),
                slug: "rust".to_string(),
                name: "rust".to_string(),
                count: 1,
            },
            TagWithCount {
                id: Uuid::new_v4(),
                slug: "programming".to_string(),
                name: "Programming".to_string(),
                count: 2,
            },
        ];

        let summaries = build_tag_summaries(&counts, Some("rust"));
        let slugs: Vec<_> = summaries.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, ["programming", "rust"]);
        assert!(!summaries[0].is_active);
        assert!(summaries[1].is_active);
    }
}
