//! In-process store implementing every repository trait.
//!
//! Used by tests and local fixtures. All reads take a shared lock; the view
//! counter takes the write lock once, so concurrent increments never lose
//! updates.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::archive::ResolvedContent;
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{
    AuthorsRepo, CategoriesRepo, CategoryWithCount, PostQueryFilter, PostViewsRepo, PostsRepo,
    RepoError, StoreHealth, TagWithCount, TagsRepo,
};
use crate::domain::entities::{AuthorRecord, CategoryRecord, PostRecord, TagRecord};
use crate::domain::posts::compare_for_sort;
use crate::domain::types::PostSort;

#[derive(Default)]
pub struct InMemoryRepositories {
    state: RwLock<ResolvedContent>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_content(content: ResolvedContent) -> Self {
        Self {
            state: RwLock::new(content),
        }
    }

    pub async fn replace_content(&self, content: ResolvedContent) {
        *self.state.write().await = content;
    }

    /// Insert a post along with its tag associations.
    pub async fn insert_post(&self, post: PostRecord, tag_ids: &[Uuid]) {
        let mut state = self.state.write().await;
        state
            .post_tags
            .extend(tag_ids.iter().map(|tag_id| (post.id, *tag_id)));
        state.posts.push(post);
    }

    pub async fn views_count(&self, slug: &str) -> Option<i64> {
        self.state
            .read()
            .await
            .posts
            .iter()
            .find(|post| post.slug == slug)
            .map(|post| post.views_count)
    }
}

fn matches_filter(state: &ResolvedContent, post: &PostRecord, filter: &PostQueryFilter) -> bool {
    if let Some(slug) = filter.category.as_deref() {
        let in_category = post.category_id.is_some_and(|category_id| {
            state
                .categories
                .iter()
                .any(|category| category.id == category_id && category.slug == slug)
        });
        if !in_category {
            return false;
        }
    }

    if let Some(slug) = filter.tag.as_deref() {
        let tag_ids: HashSet<Uuid> = state
            .tags
            .iter()
            .filter(|tag| tag.slug == slug)
            .map(|tag| tag.id)
            .collect();
        let tagged = state
            .post_tags
            .iter()
            .any(|(post_id, tag_id)| *post_id == post.id && tag_ids.contains(tag_id));
        if !tagged {
            return false;
        }
    }

    filter
        .search
        .as_deref()
        .is_none_or(|needle| post.matches_search(needle))
}

fn count_visible<'a>(
    state: &ResolvedContent,
    post_ids: impl Iterator<Item = &'a Uuid>,
    as_of: OffsetDateTime,
) -> u64 {
    let visible: HashSet<Uuid> = state
        .posts
        .iter()
        .filter(|post| post.is_visible_at(as_of))
        .map(|post| post.id)
        .collect();
    post_ids.filter(|id| visible.contains(*id)).count() as u64
}

fn sort_by_name<T>(items: &mut [T], key: impl Fn(&T) -> (&str, &str)) {
    items.sort_by(|left, right| {
        let (left_name, left_slug) = key(left);
        let (right_name, right_slug) = key(right);
        left_name
            .to_lowercase()
            .cmp(&right_name.to_lowercase())
            .then_with(|| left_slug.cmp(right_slug))
    });
}

#[async_trait]
impl PostsRepo for InMemoryRepositories {
    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        sort: PostSort,
        as_of: OffsetDateTime,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        let state = self.state.read().await;
        let mut matching: Vec<&PostRecord> = state
            .posts
            .iter()
            .filter(|post| post.is_visible_at(as_of) && matches_filter(&state, post, filter))
            .collect();
        matching.sort_by(|left, right| compare_for_sort(sort, left, right));

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok(Page::new(items, total, page))
    }

    async fn list_related(
        &self,
        post: &PostRecord,
        as_of: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let Some(category_id) = post.category_id else {
            return Ok(Vec::new());
        };

        let state = self.state.read().await;
        let mut related: Vec<&PostRecord> = state
            .posts
            .iter()
            .filter(|candidate| {
                candidate.id != post.id
                    && candidate.category_id == Some(category_id)
                    && candidate.is_visible_at(as_of)
            })
            .collect();
        related.sort_by(|left, right| compare_for_sort(PostSort::Newest, left, right));

        Ok(related
            .into_iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.posts.iter().find(|post| post.slug == slug).cloned())
    }
}

#[async_trait]
impl PostViewsRepo for InMemoryRepositories {
    async fn increment_views(&self, post_id: Uuid) -> Result<i64, RepoError> {
        let mut state = self.state.write().await;
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == post_id)
            .ok_or(RepoError::NotFound)?;
        post.views_count = post
            .views_count
            .checked_add(1)
            .ok_or_else(|| RepoError::integrity("views_count overflow"))?;
        Ok(post.views_count)
    }
}

#[async_trait]
impl AuthorsRepo for InMemoryRepositories {
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<AuthorRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .authors
            .iter()
            .filter(|author| ids.contains(&author.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CategoriesRepo for InMemoryRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .categories
            .iter()
            .find(|category| category.id == id)
            .cloned())
    }

    async fn list_with_counts(
        &self,
        as_of: OffsetDateTime,
    ) -> Result<Vec<CategoryWithCount>, RepoError> {
        let state = self.state.read().await;
        let mut counts: Vec<CategoryWithCount> = state
            .categories
            .iter()
            .map(|category| CategoryWithCount {
                id: category.id,
                slug: category.slug.clone(),
                name: category.name.clone(),
                count: state
                    .posts
                    .iter()
                    .filter(|post| {
                        post.category_id == Some(category.id) && post.is_visible_at(as_of)
                    })
                    .count() as u64,
            })
            .collect();
        sort_by_name(&mut counts, |entry| (entry.name.as_str(), entry.slug.as_str()));
        Ok(counts)
    }
}

#[async_trait]
impl TagsRepo for InMemoryRepositories {
    async fn list_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<(Uuid, TagRecord)>, RepoError> {
        let state = self.state.read().await;
        let tags: HashMap<Uuid, &TagRecord> = state.tags.iter().map(|tag| (tag.id, tag)).collect();

        let mut pairs: Vec<(Uuid, TagRecord)> = state
            .post_tags
            .iter()
            .filter(|(post_id, _)| post_ids.contains(post_id))
            .filter_map(|(post_id, tag_id)| tags.get(tag_id).map(|tag| (*post_id, (*tag).clone())))
            .collect();
        sort_by_name(&mut pairs, |(_, tag)| (tag.name.as_str(), tag.slug.as_str()));
        Ok(pairs)
    }

    async fn list_with_counts(
        &self,
        as_of: OffsetDateTime,
    ) -> Result<Vec<TagWithCount>, RepoError> {
        let state = self.state.read().await;
        let mut counts: Vec<TagWithCount> = state
            .tags
            .iter()
            .map(|tag| {
                let tagged = state
                    .post_tags
                    .iter()
                    .filter(|(_, tag_id)| *tag_id == tag.id)
                    .map(|(post_id, _)| post_id);
                TagWithCount {
                    id: tag.id,
                    slug: tag.slug.clone(),
                    name: tag.name.clone(),
                    count: count_visible(&state, tagged, as_of),
                }
            })
            .collect();
        sort_by_name(&mut counts, |entry| (entry.name.as_str(), entry.slug.as_str()));
        Ok(counts)
    }
}

#[async_trait]
impl StoreHealth for InMemoryRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::types::PostStatus;

    fn post(slug: &str, author_id: Uuid) -> PostRecord {
        let now = OffsetDateTime::now_utc();
        PostRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            title: slug.to_string(),
            content: String::new(),
            status: PostStatus::Published,
            published_at: Some(now - time::Duration::minutes(5)),
            views_count: 0,
            likes_count: 0,
            author_id,
            category_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryRepositories::new());
        let record = post("busy", Uuid::new_v4());
        let post_id = record.id;
        store.insert_post(record, &[]).await;

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.increment_views(post_id).await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task joins").expect("increment succeeds");
        }

        assert_eq!(store.views_count("busy").await, Some(50));
    }

    #[tokio::test]
    async fn increment_of_unknown_post_is_not_found() {
        let store = InMemoryRepositories::new();
        let err = store
            .increment_views(Uuid::new_v4())
            .await
            .expect_err("unknown post");
        assert!(matches!(err, RepoError::NotFound));
    }
}
