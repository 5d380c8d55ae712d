use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{AuthorsRepo, RepoError};
use crate::domain::entities::AuthorRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: Uuid,
    name: String,
}

#[async_trait]
impl AuthorsRepo for PostgresRepositories {
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<AuthorRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, AuthorRow>(
            r#"
            SELECT id, name
            FROM authors
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| AuthorRecord {
                id: row.id,
                name: row.name,
            })
            .collect())
    }
}
