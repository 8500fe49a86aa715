use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::storage::{Category, ContentQuery, Db, Post};

/// 配置公开内容路由。
///
/// 路由包括：
/// - `GET /posts`：已发布文章分页列表
/// - `GET /posts/{category}/{slug}`：获取单篇已发布文章
/// - `GET /categories`：分类列表
/// - `GET /categories/{slug}`：获取单个分类
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/posts", get(posts_list))
        .route("/posts/{category}/{slug}", get(post_detail))
        .route("/categories", get(category_list))
        .route("/categories/{slug}", get(category_detail))
}

/// 查询参数，用于文章列表分页和分类筛选。
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    limit: i64,
    page: i64,
    category: Option<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            limit: 10,
            page: 1,
            category: None,
        }
    }
}

/// 分页信息，`total` 来自独立的 count 查询。
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

/// 文章列表响应
#[derive(Debug, Serialize)]
pub struct PostsPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

/// 获取已发布文章列表。
///
/// 按发布时间倒序分页，可按分类筛选。
async fn posts_list(
    Query(params): Query<QueryParams>,
    State(pool): State<Db>,
) -> Result<Json<PostsPage>> {
    let limit = params.limit.max(1);
    let page = params.page.max(1);
    let category = params.category.as_deref();

    let posts = (&pool).posts_page(limit, page, category).await?;
    let total = (&pool).posts_count(category).await?;

    Ok(Json(PostsPage {
        posts,
        pagination: Pagination {
            total,
            page,
            pages: page_count(total, limit),
        },
    }))
}

/// 总页数向上取整，`limit` 已被调用方钳位到 >= 1
fn page_count(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

/// 按 (分类, slug) 获取单篇已发布文章。
///
/// 文章不存在或未发布时返回 [`Error::NotFound`]。
async fn post_detail(
    Path((category, slug)): Path<(String, String)>,
    State(pool): State<Db>,
) -> Result<Json<Post>> {
    let post = (&pool)
        .published_post(&category, &slug)
        .await?
        .ok_or(Error::NotFound)?;
    Ok(Json(post))
}

/// 获取全部分类，按名称排序。
async fn category_list(State(pool): State<Db>) -> Result<Json<Vec<Category>>> {
    Ok(Json((&pool).categories().await?))
}

/// 按 slug 获取单个分类。
async fn category_detail(
    Path(slug): Path<String>,
    State(pool): State<Db>,
) -> Result<Json<Category>> {
    let category = (&pool)
        .category_by_slug(&slug)
        .await?
        .ok_or(Error::NotFound)?;
    Ok(Json(category))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(5, 2), 3);
        assert_eq!(page_count(1, 1), 1);
    }
}
