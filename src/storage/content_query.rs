use super::{Category, Db, Post};

/// 文章与分类的只读查询接口
///
/// 公开端点只返回已发布文章，管理端点可见全部。
pub trait ContentQuery {
    /// 获取 [`Db`] 对象
    fn db(&self) -> &Db;

    /// 分页查询已发布文章
    ///
    /// 按发布时间倒序，其次创建时间倒序，可按分类 slug 过滤。
    fn posts_page(
        &self,
        limit: i64,
        page: i64,
        category: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Post>, sqlx::Error>> {
        async move {
            let offset = (page.max(1) - 1) * limit;
            let mut builder = sqlx::QueryBuilder::new(
                "SELECT * FROM posts WHERE published = TRUE",
            );
            if let Some(cat) = category {
                builder.push(" AND category = ").push_bind(cat.to_string());
            }
            builder.push(" ORDER BY published_at DESC, created_at DESC");
            builder.push(" LIMIT ").push_bind(limit);
            builder.push(" OFFSET ").push_bind(offset);

            builder.build_query_as::<Post>().fetch_all(self.db()).await
        }
    }

    /// 统计已发布文章总数，与 [`ContentQuery::posts_page`] 使用同一过滤条件
    fn posts_count(
        &self,
        category: Option<&str>,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> {
        async move {
            let mut builder =
                sqlx::QueryBuilder::new("SELECT COUNT(*) FROM posts WHERE published = TRUE");
            if let Some(cat) = category {
                builder.push(" AND category = ").push_bind(cat.to_string());
            }
            builder
                .build_query_scalar::<i64>()
                .fetch_one(self.db())
                .await
        }
    }

    /// 按 (分类, slug) 查询已发布文章
    fn published_post(
        &self,
        category: &str,
        slug: &str,
    ) -> impl Future<Output = Result<Option<Post>, sqlx::Error>> {
        sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE category = $1 AND slug = $2 AND published = TRUE",
        )
        .bind(category.to_string())
        .bind(slug.to_string())
        .fetch_optional(self.db())
    }

    /// 按 (分类, slug) 查询文章，不区分发布状态，用于唯一性检查
    fn post_by_category_slug(
        &self,
        category: &str,
        slug: &str,
    ) -> impl Future<Output = Result<Option<Post>, sqlx::Error>> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE category = $1 AND slug = $2")
            .bind(category.to_string())
            .bind(slug.to_string())
            .fetch_optional(self.db())
    }

    /// 按 id 查询文章
    fn post_by_id(&self, id: i64) -> impl Future<Output = Result<Option<Post>, sqlx::Error>> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db())
    }

    /// 查询全部文章（含草稿），创建时间倒序，管理端使用
    fn all_posts(&self) -> impl Future<Output = Result<Vec<Post>, sqlx::Error>> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts ORDER BY created_at DESC")
            .fetch_all(self.db())
    }

    /// 查询全部已发布文章，sitemap 使用
    fn published_posts(&self) -> impl Future<Output = Result<Vec<Post>, sqlx::Error>> {
        sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE published = TRUE ORDER BY published_at DESC",
        )
        .fetch_all(self.db())
    }

    /// 查询全部分类，按名称排序
    fn categories(&self) -> impl Future<Output = Result<Vec<Category>, sqlx::Error>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name").fetch_all(self.db())
    }

    /// 按 slug 查询分类
    fn category_by_slug(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<Option<Category>, sqlx::Error>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = $1")
            .bind(slug.to_string())
            .fetch_optional(self.db())
    }

    /// 按 id 查询分类，管理端使用
    fn category_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<Category>, sqlx::Error>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db())
    }
}

impl ContentQuery for &Db {
    fn db(&self) -> &Db {
        self
    }
}
