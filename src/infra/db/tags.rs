use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, TagWithCount, TagsRepo},
    domain::{entities::TagRecord, types::PostStatus},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: Uuid,
    id: Uuid,
    slug: String,
    name: String,
}

#[derive(sqlx::FromRow)]
struct TagCountRow {
    id: Uuid,
    slug: String,
    name: String,
    post_count: i64,
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn list_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<(Uuid, TagRecord)>, RepoError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PostTagRow>(
            r#"
            SELECT pt.post_id, t.id, t.slug, t.name
            FROM post_tags pt
            INNER JOIN tags t ON t.id = pt.tag_id
            WHERE pt.post_id = ANY($1)
            ORDER BY LOWER(t.name), t.slug
            "#,
        )
        .bind(post_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.post_id,
                    TagRecord {
                        id: row.id,
                        slug: row.slug,
                        name: row.name,
                    },
                )
            })
            .collect())
    }

    async fn list_with_counts(
        &self,
        as_of: OffsetDateTime,
    ) -> Result<Vec<TagWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, TagCountRow>(
            r#"
            SELECT
                t.id,
                t.slug,
                t.name,
                COUNT(p.id) AS post_count
            FROM tags t
            LEFT JOIN post_tags pt ON pt.tag_id = t.id
            LEFT JOIN posts p
                ON p.id = pt.post_id
                AND p.status = $1
                AND p.published_at IS NOT NULL
                AND p.published_at <= $2
            GROUP BY t.id, t.slug, t.name
            ORDER BY LOWER(t.name), t.slug
            "#,
        )
        .bind(PostStatus::Published)
        .bind(as_of)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(TagWithCount {
                    id: row.id,
                    slug: row.slug,
                    name: row.name,
                    count: Self::convert_count(row.post_count)?,
                })
            })
            .collect()
    }
}
