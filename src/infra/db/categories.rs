use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CategoriesRepo, CategoryWithCount, RepoError};
use crate::domain::entities::CategoryRecord;
use crate::domain::types::PostStatus;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    slug: String,
    name: String,
}

#[derive(sqlx::FromRow)]
struct CategoryCountRow {
    id: Uuid,
    slug: String,
    name: String,
    post_count: i64,
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, slug, name FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| CategoryRecord {
            id: row.id,
            slug: row.slug,
            name: row.name,
        }))
    }

    async fn list_with_counts(
        &self,
        as_of: OffsetDateTime,
    ) -> Result<Vec<CategoryWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryCountRow>(
            r#"
            SELECT
                c.id,
                c.slug,
                c.name,
                COUNT(p.id) AS post_count
            FROM categories c
            LEFT JOIN posts p
                ON p.category_id = c.id
                AND p.status = $1
                AND p.published_at IS NOT NULL
                AND p.published_at <= $2
            GROUP BY c.id, c.slug, c.name
            ORDER BY LOWER(c.name), c.slug
            "#,
        )
        .bind(PostStatus::Published)
        .bind(as_of)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(CategoryWithCount {
                    id: row.id,
                    slug: row.slug,
                    name: row.name,
                    count: Self::convert_count(row.post_count)?,
                })
            })
            .collect()
    }
}
