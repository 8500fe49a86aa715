use chrono::{DateTime, Local};
use serde::Deserialize;

use super::{Category, Db, Post};

/// 新建 / 更新文章的请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub cover_image: String,
    pub published: bool,
}

/// 新建 / 更新分类的请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// 文章与分类的写入接口
///
/// 唯一性与发布时间的业务判断由调用方完成，这里只做单条语句。
pub trait ContentStorage {
    /// 获取 [`Db`] 对象
    fn db(&self) -> &Db;

    /// 插入文章，`published_at` 由调用方按发布状态计算
    fn insert_post(
        &self,
        draft: &PostDraft,
        published_at: Option<DateTime<Local>>,
    ) -> impl Future<Output = Result<Post, sqlx::Error>> {
        sqlx::query_as::<_, Post>(
            "
            INSERT INTO posts
                (title, slug, content, excerpt, category, cover_image, published, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            ",
        )
        .bind(draft.title.clone())
        .bind(draft.slug.clone())
        .bind(draft.content.clone())
        .bind(draft.excerpt.clone())
        .bind(draft.category.clone())
        .bind(draft.cover_image.clone())
        .bind(draft.published)
        .bind(published_at)
        .fetch_one(self.db())
    }

    /// 更新文章，不存在时返回 `None`
    fn update_post(
        &self,
        id: i64,
        draft: &PostDraft,
        published_at: Option<DateTime<Local>>,
    ) -> impl Future<Output = Result<Option<Post>, sqlx::Error>> {
        sqlx::query_as::<_, Post>(
            "
            UPDATE posts SET
                title = $2, slug = $3, content = $4, excerpt = $5,
                category = $6, cover_image = $7, published = $8,
                published_at = $9, updated_at = now()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(draft.title.clone())
        .bind(draft.slug.clone())
        .bind(draft.content.clone())
        .bind(draft.excerpt.clone())
        .bind(draft.category.clone())
        .bind(draft.cover_image.clone())
        .bind(draft.published)
        .bind(published_at)
        .fetch_optional(self.db())
    }

    /// 删除文章，返回受影响行数
    fn remove_post(&self, id: i64) -> impl Future<Output = Result<u64, sqlx::Error>> {
        async move {
            let result = sqlx::query("DELETE FROM posts WHERE id = $1")
                .bind(id)
                .execute(self.db())
                .await?;
            Ok(result.rows_affected())
        }
    }

    /// 插入分类
    fn insert_category(
        &self,
        draft: &CategoryDraft,
    ) -> impl Future<Output = Result<Category, sqlx::Error>> {
        sqlx::query_as::<_, Category>(
            "
            INSERT INTO categories (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(draft.name.clone())
        .bind(draft.slug.clone())
        .bind(draft.description.clone())
        .fetch_one(self.db())
    }

    /// 更新分类，不存在时返回 `None`
    fn update_category(
        &self,
        id: i64,
        draft: &CategoryDraft,
    ) -> impl Future<Output = Result<Option<Category>, sqlx::Error>> {
        sqlx::query_as::<_, Category>(
            "
            UPDATE categories SET
                name = $2, slug = $3, description = $4, updated_at = now()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(draft.name.clone())
        .bind(draft.slug.clone())
        .bind(draft.description.clone())
        .fetch_optional(self.db())
    }

    /// 删除分类，返回受影响行数
    fn remove_category(&self, id: i64) -> impl Future<Output = Result<u64, sqlx::Error>> {
        async move {
            let result = sqlx::query("DELETE FROM categories WHERE id = $1")
                .bind(id)
                .execute(self.db())
                .await?;
            Ok(result.rows_affected())
        }
    }
}

impl ContentStorage for &Db {
    fn db(&self) -> &Db {
        self
    }
}
