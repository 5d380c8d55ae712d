//! Response bodies for the public endpoints.
//!
//! These structures are the only shape the HTTP layer ever serializes, so
//! their field names are part of the public contract (camelCase JSON keys).

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    pub posts: PaginatedPosts,
    pub categories: Vec<CategorySummary>,
    pub tags: Vec<TagSummary>,
    pub filters: AppliedFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedPosts {
    pub data: Vec<PostSummary>,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub published_at: Option<String>,
    pub views_count: i64,
    pub likes_count: i64,
    pub author: AuthorView,
    pub category: Option<CategoryView>,
    pub tags: Vec<TagView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorView {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagView {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub slug: String,
    pub name: String,
    pub count: u64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSummary {
    pub slug: String,
    pub name: String,
    pub count: u64,
    pub is_active: bool,
}

/// Echo of the filters after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedFilters {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailView {
    pub post: PostView,
    pub related_posts: Vec<PostSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub published_at: Option<String>,
    pub views_count: i64,
    pub likes_count: i64,
    pub author: AuthorView,
    pub category: Option<CategoryView>,
    pub tags: Vec<TagView>,
}
