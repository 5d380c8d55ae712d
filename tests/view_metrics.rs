mod support;

use std::sync::Arc;

use async_trait::async_trait;
use lectern::application::listing::{ListingService, ListingSettings};
use lectern::application::repos::{PostViewsRepo, RepoError};
use lectern::infra::telemetry;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use uuid::Uuid;

use support::{fixture_store, service};

struct ReadOnlyViews;

#[async_trait]
impl PostViewsRepo for ReadOnlyViews {
    async fn increment_views(&self, _post_id: Uuid) -> Result<i64, RepoError> {
        Err(RepoError::from_persistence("database is read-only"))
    }
}

fn counter(snapshotter: &Snapshotter, name: &str) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(composite_key, _, _, value)| {
            match (composite_key.key().name() == name, value) {
                (true, DebugValue::Counter(count)) => Some(count),
                _ => None,
            }
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn post_views_are_recorded_as_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let store = fixture_store();
    let service = service(&store);
    for _ in 0..3 {
        service
            .post_detail("react-guide")
            .await
            .expect("detail")
            .expect("post visible");
    }
    assert_eq!(counter(&snapshotter, "lectern_post_views_total"), 3);
    assert_eq!(store.views_count("react-guide").await, Some(6));

    let failing = ListingService::new(
        store.clone(),
        Arc::new(ReadOnlyViews),
        store.clone(),
        store.clone(),
        store.clone(),
        ListingSettings::default(),
    );
    let detail = failing
        .post_detail("react-guide")
        .await
        .expect("view failures do not fail the request")
        .expect("post visible");

    assert_eq!(detail.post.views_count, 6);
    assert_eq!(counter(&snapshotter, "lectern_post_view_failures_total"), 1);
}
