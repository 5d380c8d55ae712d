use sqlx::query;
use tracing::info;

use crate::application::archive::ResolvedContent;
use crate::application::repos::RepoError;

use super::{PostgresRepositories, map_sqlx_error};

impl PostgresRepositories {
    /// Replace every author, category, tag and post with `content` in a
    /// single transaction.
    pub async fn replace_content(&self, content: &ResolvedContent) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        query("TRUNCATE post_tags, posts, tags, categories, authors")
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        for author in &content.authors {
            query("INSERT INTO authors (id, name) VALUES ($1, $2)")
                .bind(author.id)
                .bind(&author.name)
                .execute(tx.as_mut())
                .await
                .map_err(map_sqlx_error)?;
        }

        for category in &content.categories {
            query("INSERT INTO categories (id, slug, name) VALUES ($1, $2, $3)")
                .bind(category.id)
                .bind(&category.slug)
                .bind(&category.name)
                .execute(tx.as_mut())
                .await
                .map_err(map_sqlx_error)?;
        }

        for tag in &content.tags {
            query("INSERT INTO tags (id, slug, name) VALUES ($1, $2, $3)")
                .bind(tag.id)
                .bind(&tag.slug)
                .bind(&tag.name)
                .execute(tx.as_mut())
                .await
                .map_err(map_sqlx_error)?;
        }

        for post in &content.posts {
            query(
                r#"
                INSERT INTO posts (
                    id,
                    slug,
                    title,
                    content,
                    status,
                    published_at,
                    views_count,
                    likes_count,
                    author_id,
                    category_id,
                    created_at,
                    updated_at
                )
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
                "#,
            )
            .bind(post.id)
            .bind(&post.slug)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.status)
            .bind(post.published_at)
            .bind(post.views_count)
            .bind(post.likes_count)
            .bind(post.author_id)
            .bind(post.category_id)
            .bind(post.created_at)
            .bind(post.updated_at)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;
        }

        for (post_id, tag_id) in &content.post_tags {
            query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2)")
                .bind(post_id)
                .bind(tag_id)
                .execute(tx.as_mut())
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        info!(
            target = "lectern::import",
            authors = content.authors.len(),
            categories = content.categories.len(),
            tags = content.tags.len(),
            posts = content.posts.len(),
            "content archive imported"
        );
        Ok(())
    }
}
