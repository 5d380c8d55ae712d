use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{PostQueryFilter, PostViewsRepo, PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::types::{PostSort, PostStatus};

use super::{POST_COLUMNS, PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    slug: String,
    title: String,
    content: String,
    status: PostStatus,
    published_at: Option<OffsetDateTime>,
    views_count: i64,
    likes_count: i64,
    author_id: Uuid,
    category_id: Option<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            content: row.content,
            status: row.status,
            published_at: row.published_at,
            views_count: row.views_count,
            likes_count: row.likes_count,
            author_id: row.author_id,
            category_id: row.category_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        sort: PostSort,
        as_of: OffsetDateTime,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_visibility(&mut count_qb, as_of);
        Self::apply_feed_filter(&mut count_qb, filter);

        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        let total = Self::convert_count(total)?;

        if page.offset() >= total {
            return Ok(Page::new(Vec::new(), total, page));
        }
        let offset = i64::try_from(page.offset())
            .map_err(|_| RepoError::from_persistence("page offset exceeds supported range"))?;

        let mut qb = QueryBuilder::new("");
        Self::push_post_select(&mut qb);
        Self::apply_visibility(&mut qb, as_of);
        Self::apply_feed_filter(&mut qb, filter);
        Self::push_order(&mut qb, sort);
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page::new(
            rows.into_iter().map(PostRecord::from).collect(),
            total,
            page,
        ))
    }

    async fn list_related(
        &self,
        post: &PostRecord,
        as_of: OffsetDateTime,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let Some(category_id) = post.category_id else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new("");
        Self::push_post_select(&mut qb);
        Self::apply_visibility(&mut qb, as_of);
        qb.push(" AND p.category_id = ");
        qb.push_bind(category_id);
        qb.push(" AND p.id <> ");
        qb.push_bind(post.id);
        Self::push_order(&mut qb, PostSort::Newest);
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.slug = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostViewsRepo for PostgresRepositories {
    async fn increment_views(&self, post_id: Uuid) -> Result<i64, RepoError> {
        let views_count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE posts
            SET views_count = views_count + 1
            WHERE id = $1
            RETURNING views_count
            "#,
        )
        .bind(post_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        views_count.ok_or(RepoError::NotFound)
    }
}
