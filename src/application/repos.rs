//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{AuthorRecord, CategoryRecord, PostRecord, TagRecord};
use crate::domain::types::PostSort;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

/// Filters applied on top of the published-post scope. `None` means the
/// filter is not applied; values are matched verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQueryFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Page through posts visible at `as_of` that satisfy `filter`.
    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        sort: PostSort,
        as_of: OffsetDateTime,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError>;

    /// Published posts sharing `post`'s category, newest first, never
    /// including `post` itself.
    async fn list_related(
        &self,
        post: &PostRecord,
        as_of: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostViewsRepo: Send + Sync {
    /// Atomically add one to the stored view count and return the new value.
    async fn increment_views(&self, post_id: Uuid) -> Result<i64, RepoError>;
}

#[async_trait]
pub trait AuthorsRepo: Send + Sync {
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<AuthorRecord>, RepoError>;
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError>;

    /// Every category with its number of posts visible at `as_of`.
    async fn list_with_counts(
        &self,
        as_of: OffsetDateTime,
    ) -> Result<Vec<CategoryWithCount>, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    /// Tags attached to each of `post_ids`, as `(post_id, tag)` pairs.
    async fn list_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<(Uuid, TagRecord)>, RepoError>;

    /// Every tag with its number of posts visible at `as_of`.
    async fn list_with_counts(&self, as_of: OffsetDateTime)
    -> Result<Vec<TagWithCount>, RepoError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CategoryWithCount {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct TagWithCount {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub count: u64,
}
