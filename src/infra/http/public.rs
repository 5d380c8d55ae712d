use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::PathRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use crate::application::{
    error::HttpError,
    listing::{ListingQuery, ListingService},
    repos::StoreHealth,
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub listing: Arc<ListingService>,
    pub health: Arc<dyn StoreHealth>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/posts/{slug}", get(post_detail))
        .route("/_health/db", get(db_health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Query string accepted by the listing endpoint. Values stay raw here and
/// are normalized by the listing service. Repeated keys keep their first
/// value and unknown keys are ignored.
#[derive(Debug, Default)]
struct ListingParams {
    category: Option<String>,
    tag: Option<String>,
    search: Option<String>,
    sort: Option<String>,
    page: Option<String>,
}

impl ListingParams {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "category" => &mut params.category,
                "tag" => &mut params.tag,
                "search" => &mut params.search,
                "sort" => &mut params.sort,
                "page" => &mut params.page,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        params
    }
}

impl From<ListingParams> for ListingQuery {
    fn from(params: ListingParams) -> Self {
        Self {
            category: params.category,
            tag: params.tag,
            search: params.search,
            sort: params.sort,
            page: params.page,
        }
    }
}

async fn index(
    State(state): State<HttpState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params = ListingParams::from_pairs(pairs);
    match state.listing.list(params.into()).await {
        Ok(view) => Json(view).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    slug: Result<Path<String>, PathRejection>,
) -> Response {
    // Segments that do not decode to UTF-8 cannot name a post.
    let slug = match slug {
        Ok(Path(slug)) => slug,
        Err(rejection) => {
            return HttpError::new(
                "infra::http::public::post_detail",
                StatusCode::NOT_FOUND,
                "Post not found",
                rejection.body_text(),
            )
            .into_response();
        }
    };

    match state.listing.post_detail(&slug).await {
        Ok(Some(view)) => Json(view).into_response(),
        Ok(None) => HttpError::new(
            "infra::http::public::post_detail",
            StatusCode::NOT_FOUND,
            "Post not found",
            format!("no published post with slug `{slug}`"),
        )
        .into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

async fn fallback() -> Response {
    HttpError::new(
        "infra::http::public::fallback",
        StatusCode::NOT_FOUND,
        "Not found",
        "no route matched the request",
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn repeated_keys_keep_the_first_value() {
        let params = ListingParams::from_pairs(pairs(&[
            ("sort", "popular"),
            ("sort", "oldest"),
            ("page", "2"),
            ("page", "5"),
            ("utm_source", "feed"),
        ]));
        assert_eq!(params.sort.as_deref(), Some("popular"));
        assert_eq!(params.page.as_deref(), Some("2"));
        assert!(params.category.is_none());
    }
}
