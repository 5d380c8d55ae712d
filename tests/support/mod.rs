#![allow(dead_code)]

use std::sync::Arc;

use lectern::application::archive::{ContentArchive, ResolvedContent};
use lectern::application::listing::{ListingService, ListingSettings};
use lectern::domain::entities::PostRecord;
use lectern::infra::memory::InMemoryRepositories;
use time::macros::datetime;
use uuid::Uuid;

pub const FIXTURE: &str = include_str!("../fixtures/content.toml");

pub fn fixture_content() -> ResolvedContent {
    ContentArchive::parse(FIXTURE)
        .expect("fixture parses")
        .resolve()
        .expect("fixture resolves")
}

/// Fixture content plus `eloquent-tips`, a published tutorial older than
/// every other tutorial.
pub fn fixture_content_with_older_tutorial() -> ResolvedContent {
    let mut content = fixture_content();
    let sibling = content
        .posts
        .iter()
        .find(|post| post.slug == "laravel-tutorial")
        .cloned()
        .expect("fixture has laravel-tutorial");
    content.posts.push(PostRecord {
        id: Uuid::new_v4(),
        slug: "eloquent-tips".to_string(),
        title: "Eloquent Tips".to_string(),
        content: "Scopes and eager loading.".to_string(),
        published_at: Some(datetime!(2024-02-01 10:00 UTC)),
        views_count: 0,
        likes_count: 0,
        ..sibling
    });
    content
}

pub fn fixture_store() -> Arc<InMemoryRepositories> {
    Arc::new(InMemoryRepositories::from_content(fixture_content()))
}

pub fn service_with(store: &Arc<InMemoryRepositories>, settings: ListingSettings) -> ListingService {
    ListingService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        settings,
    )
}

pub fn service(store: &Arc<InMemoryRepositories>) -> ListingService {
    service_with(store, ListingSettings::default())
}
