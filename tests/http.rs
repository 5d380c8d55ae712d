mod support;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use lectern::application::repos::{RepoError, StoreHealth};
use lectern::infra::http::{HttpState, REQUEST_ID_HEADER, build_router};
use serde_json::Value;
use tower::ServiceExt;

use support::{fixture_store, service};

fn router() -> Router {
    let store = fixture_store();
    build_router(HttpState {
        listing: Arc::new(service(&store)),
        health: store,
    })
}

async fn get(router: Router, uri: &str) -> (StatusCode, Option<Value>) {
    let response = router
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    (status, serde_json::from_slice(&bytes).ok())
}

fn listed_slugs(body: &Value) -> Vec<String> {
    body["posts"]["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|post| post["slug"].as_str().expect("slug").to_string())
        .collect()
}

#[tokio::test]
async fn index_returns_camel_case_listing() {
    let (status, body) = get(router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    let body = body.expect("json body");

    assert_eq!(body["posts"]["total"], 3);
    assert_eq!(body["posts"]["currentPage"], 1);
    assert_eq!(body["posts"]["lastPage"], 1);
    assert_eq!(body["posts"]["perPage"], 10);
    assert_eq!(body["filters"]["sort"], "newest");

    let first = &body["posts"]["data"][0];
    assert_eq!(first["slug"], "release-notes");
    assert_eq!(first["viewsCount"], 7);
    assert_eq!(first["author"]["name"], "Ana Lima");
    assert!(first["publishedAt"].is_string());
    assert!(body["categories"][0]["isActive"].is_boolean());
}

#[tokio::test]
async fn index_applies_query_filters() {
    let (status, body) = get(router(), "/?tag=programming&sort=oldest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        listed_slugs(&body.expect("json body")),
        ["laravel-tutorial", "react-guide"]
    );

    let (_, body) = get(router(), "/?search=Laravel").await;
    assert_eq!(listed_slugs(&body.expect("json body")), ["laravel-tutorial"]);

    let (_, body) = get(router(), "/?category=guides").await;
    assert_eq!(listed_slugs(&body.expect("json body")), ["react-guide"]);
}

#[tokio::test]
async fn invalid_sort_and_page_fall_back_to_defaults() {
    let (status, body) = get(router(), "/?sort=sideways&page=-4").await;
    assert_eq!(status, StatusCode::OK);
    let body = body.expect("json body");
    assert_eq!(body["filters"]["sort"], "newest");
    assert_eq!(body["posts"]["currentPage"], 1);
    assert_eq!(body["posts"]["data"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn repeated_query_keys_use_the_first_value() {
    let (status, body) = get(router(), "/?sort=popular&sort=oldest").await;
    assert_eq!(status, StatusCode::OK);
    let body = body.expect("json body");
    assert_eq!(body["filters"]["sort"], "popular");
    assert_eq!(
        listed_slugs(&body),
        ["react-guide", "laravel-tutorial", "release-notes"]
    );

    let (status, body) = get(router(), "/?page=1&page=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.expect("json body")["posts"]["currentPage"], 1);

    let (status, body) = get(router(), "/?tag=php&tag=programming").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_slugs(&body.expect("json body")), ["laravel-tutorial"]);
}

#[tokio::test]
async fn post_detail_counts_the_view_and_lists_related_posts() {
    let router = router();

    let (status, body) = get(router.clone(), "/posts/laravel-tutorial").await;
    assert_eq!(status, StatusCode::OK);
    let body = body.expect("json body");
    assert_eq!(body["post"]["viewsCount"], 11);
    assert_eq!(body["post"]["category"]["slug"], "tutorials");
    assert_eq!(body["relatedPosts"][0]["slug"], "release-notes");
    assert_eq!(body["relatedPosts"].as_array().map(Vec::len), Some(1));

    let (_, body) = get(router, "/posts/laravel-tutorial").await;
    assert_eq!(body.expect("json body")["post"]["viewsCount"], 12);
}

#[tokio::test]
async fn hidden_or_unknown_posts_return_not_found() {
    for uri in [
        "/posts/draft-ideas",
        "/posts/scheduled-post",
        "/posts/nope",
        "/posts/%FF",
        "/not-a-route",
    ] {
        let (status, _) = get(router(), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let response = router()
        .oneshot(
            Request::builder()
                .uri("/")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .expect("request id header");
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
}

struct UnavailableStore;

#[async_trait]
impl StoreHealth for UnavailableStore {
    async fn health_check(&self) -> Result<(), RepoError> {
        Err(RepoError::Timeout)
    }
}

#[tokio::test]
async fn health_endpoint_reflects_store_state() {
    let (status, _) = get(router(), "/_health/db").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let store = fixture_store();
    let unhealthy = build_router(HttpState {
        listing: Arc::new(service(&store)),
        health: Arc::new(UnavailableStore),
    });
    let (status, _) = get(unhealthy, "/_health/db").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
