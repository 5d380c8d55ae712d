//! Postgres-backed repository implementations.

mod authors;
mod categories;
mod import;
mod posts;
mod tags;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use time::OffsetDateTime;

use crate::application::repos::{PostQueryFilter, RepoError, StoreHealth};
use crate::domain::posts::LIKE_WEIGHT;
use crate::domain::types::{PostSort, PostStatus};

const POST_COLUMNS: &str = "p.id, p.slug, p.title, p.content, p.status, p.published_at, \
     p.views_count, p.likes_count, p.author_id, p.category_id, p.created_at, p.updated_at";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    fn push_post_select(qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM posts p WHERE 1=1 ");
    }

    /// Restrict `p` to posts that are published as of `as_of`.
    fn apply_visibility(qb: &mut QueryBuilder<'_, Postgres>, as_of: OffsetDateTime) {
        qb.push(" AND p.status = ");
        qb.push_bind(PostStatus::Published);
        qb.push(" AND p.published_at IS NOT NULL AND p.published_at <= ");
        qb.push_bind(as_of);
    }

    fn apply_feed_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PostQueryFilter) {
        if let Some(category) = filter.category.as_ref() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM categories c WHERE c.id = p.category_id AND c.slug = ",
            );
            qb.push_bind(category.clone());
            qb.push(")");
        }

        if let Some(tag) = filter.tag.as_ref() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM post_tags pt INNER JOIN tags t ON t.id = pt.tag_id WHERE pt.post_id = p.id AND t.slug = ",
            );
            qb.push_bind(tag.clone());
            qb.push(")");
        }

        if let Some(search) = filter.search.as_ref() {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (p.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR p.content ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
    }

    fn push_order(qb: &mut QueryBuilder<'_, Postgres>, sort: PostSort) {
        match sort {
            PostSort::Newest => {
                qb.push(" ORDER BY p.published_at DESC, p.id DESC ");
            }
            PostSort::Oldest => {
                qb.push(" ORDER BY p.published_at ASC, p.id ASC ");
            }
            PostSort::Popular => {
                qb.push(format!(
                    " ORDER BY (p.views_count::numeric + {LIKE_WEIGHT} * p.likes_count::numeric) DESC, \
                     p.published_at DESC, p.id DESC "
                ));
            }
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

#[async_trait]
impl StoreHealth for PostgresRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

/// Escape `LIKE` metacharacters so user input matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("Laravel"), "Laravel");
    }

    #[test]
    fn popular_order_uses_weighted_score() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM posts p");
        PostgresRepositories::push_order(&mut qb, PostSort::Popular);
        assert!(
            qb.sql()
                .contains("ORDER BY (p.views_count::numeric + 2 * p.likes_count::numeric) DESC")
        );
    }

    #[test]
    fn filters_bind_every_value() {
        let filter = PostQueryFilter {
            category: Some("tutorials".to_string()),
            tag: Some("programming".to_string()),
            search: Some("laravel".to_string()),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM posts p WHERE 1=1 ");
        PostgresRepositories::apply_visibility(&mut qb, OffsetDateTime::now_utc());
        PostgresRepositories::apply_feed_filter(&mut qb, &filter);

        let sql = qb.sql();
        assert!(sql.contains("c.slug = $3"));
        assert!(sql.contains("t.slug = $4"));
        assert!(sql.contains("p.title ILIKE $5 OR p.content ILIKE $6"));
    }
}
