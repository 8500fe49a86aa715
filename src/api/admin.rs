use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use chrono::Local;
use serde::{Deserialize, Serialize};

use super::{ADMIN_COOKIE, ADMIN_SENTINEL, ApiMessage, analytics, persistent_cookie};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::mail::{self, BulkSummary, Mailer};
use crate::state::AppState;
use crate::storage::{
    Category, CategoryDraft, ContentQuery, ContentStorage, Db, NewsletterStore, Post, PostDraft,
    Subscriber,
};

/// 哨兵 cookie 有效期：24 小时
const ADMIN_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// 配置管理后台路由。
///
/// `login` 之外的全部路由经过哨兵 cookie 校验：
/// - 文章/分类 CRUD（草稿可见）
/// - 订阅者列表与简报群发
/// - 聚合报表（见 [`analytics`]）
pub fn setup_route() -> Router<AppState> {
    let protected = Router::new()
        .route("/posts", get(all_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(post_by_id).put(update_post).delete(delete_post),
        )
        .route("/categories", get(all_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(category_by_id)
                .put(update_category)
                .delete(delete_category),
        )
        .route("/subscribers", get(subscribers))
        .route("/newsletter/send", post(send_newsletter))
        .nest("/analytics", analytics::setup_route())
        .layer(middleware::from_fn(require_admin));

    Router::new().route("/login", post(login)).merge(protected)
}

/// 管理接口守门中间件。
///
/// 哨兵 cookie 缺失或值不符一律 [`Error::Unauthorized`]，
/// 前端据此跳转登录页。
async fn require_admin(jar: CookieJar, request: Request, next: Next) -> Result<Response> {
    match jar.get(ADMIN_COOKIE) {
        Some(cookie) if cookie.value() == ADMIN_SENTINEL => Ok(next.run(request).await),
        _ => Err(Error::Unauthorized),
    }
}

/// 管理登录请求体
#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    password: String,
}

/// 管理登录。
///
/// 密码与配置比对，匹配时下发 24 小时哨兵 cookie。
async fn login(
    jar: CookieJar,
    State(config): State<Arc<Config>>,
    Json(body): Json<AdminLoginRequest>,
) -> Result<(CookieJar, Json<ApiMessage>)> {
    if body.password != config.admin_password {
        return Err(Error::Unauthorized);
    }

    let jar = jar.add(persistent_cookie(
        ADMIN_COOKIE,
        ADMIN_SENTINEL,
        ADMIN_MAX_AGE_SECS,
    ));

    Ok((jar, Json(ApiMessage::ok("Logged in"))))
}

/// 获取全部文章（含草稿），创建时间倒序。
async fn all_posts(State(pool): State<Db>) -> Result<Json<Vec<Post>>> {
    Ok(Json((&pool).all_posts().await?))
}

/// 按 id 获取文章，草稿可见，不存在时返回 404（编辑页明确呈现 not found）。
async fn post_by_id(Path(id): Path<i64>, State(pool): State<Db>) -> Result<Json<Post>> {
    let post = (&pool).post_by_id(id).await?.ok_or(Error::NotFound)?;
    Ok(Json(post))
}

fn validate_post(draft: &PostDraft) -> Result<()> {
    if draft.title.trim().is_empty()
        || draft.slug.trim().is_empty()
        || draft.category.trim().is_empty()
    {
        return Err(Error::Validation("Title, slug and category are required"));
    }
    Ok(())
}

/// 创建文章。
///
/// 同分类下 slug 冲突拒绝且不触碰已有行；发布状态的新文章
/// 当场盖上发布时间。
async fn create_post(
    State(pool): State<Db>,
    Json(draft): Json<PostDraft>,
) -> Result<Json<Post>> {
    validate_post(&draft)?;

    if (&pool)
        .post_by_category_slug(&draft.category, &draft.slug)
        .await?
        .is_some()
    {
        return Err(Error::Conflict(
            "A post with this slug already exists in this category".to_string(),
        ));
    }

    let published_at = draft.published.then(Local::now);
    let post = (&pool).insert_post(&draft, published_at).await?;

    Ok(Json(post))
}

/// 更新文章。
///
/// 发布时间只在首次发布时盖章，取消发布时清空，
/// 重新保存已发布文章保持原时间戳。
async fn update_post(
    Path(id): Path<i64>,
    State(pool): State<Db>,
    Json(draft): Json<PostDraft>,
) -> Result<Json<Post>> {
    validate_post(&draft)?;

    let existing = (&pool).post_by_id(id).await?.ok_or(Error::NotFound)?;

    if let Some(other) = (&pool)
        .post_by_category_slug(&draft.category, &draft.slug)
        .await?
        && other.id != id
    {
        return Err(Error::Conflict(
            "A post with this slug already exists in this category".to_string(),
        ));
    }

    let published_at = if draft.published {
        existing.published_at.or_else(|| Some(Local::now()))
    } else {
        None
    };

    let post = (&pool)
        .update_post(id, &draft, published_at)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(Json(post))
}

/// 删除文章。
async fn delete_post(Path(id): Path<i64>, State(pool): State<Db>) -> Result<Json<ApiMessage>> {
    if (&pool).remove_post(id).await? == 0 {
        return Err(Error::NotFound);
    }
    Ok(Json(ApiMessage::ok("Post deleted")))
}

/// 获取全部分类，按名称排序。
async fn all_categories(State(pool): State<Db>) -> Result<Json<Vec<Category>>> {
    Ok(Json((&pool).categories().await?))
}

/// 按 id 获取分类，不存在时返回 404。
async fn category_by_id(Path(id): Path<i64>, State(pool): State<Db>) -> Result<Json<Category>> {
    let category = (&pool).category_by_id(id).await?.ok_or(Error::NotFound)?;
    Ok(Json(category))
}

/// 创建分类，slug 全局唯一。
async fn create_category(
    State(pool): State<Db>,
    Json(draft): Json<CategoryDraft>,
) -> Result<Json<Category>> {
    if draft.name.trim().is_empty() || draft.slug.trim().is_empty() {
        return Err(Error::Validation("Name and slug are required"));
    }

    if (&pool).category_by_slug(&draft.slug).await?.is_some() {
        return Err(Error::Conflict(
            "A category with this slug already exists".to_string(),
        ));
    }

    Ok(Json((&pool).insert_category(&draft).await?))
}

/// 更新分类，slug 冲突检查排除自身。
async fn update_category(
    Path(id): Path<i64>,
    State(pool): State<Db>,
    Json(draft): Json<CategoryDraft>,
) -> Result<Json<Category>> {
    if draft.name.trim().is_empty() || draft.slug.trim().is_empty() {
        return Err(Error::Validation("Name and slug are required"));
    }

    if let Some(other) = (&pool).category_by_slug(&draft.slug).await?
        && other.id != id
    {
        return Err(Error::Conflict(
            "A category with this slug already exists".to_string(),
        ));
    }

    let category = (&pool)
        .update_category(id, &draft)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(Json(category))
}

/// 删除分类。
async fn delete_category(
    Path(id): Path<i64>,
    State(pool): State<Db>,
) -> Result<Json<ApiMessage>> {
    if (&pool).remove_category(id).await? == 0 {
        return Err(Error::NotFound);
    }
    Ok(Json(ApiMessage::ok("Category deleted")))
}

/// 获取激活订阅者列表。
async fn subscribers(State(pool): State<Db>) -> Result<Json<Vec<Subscriber>>> {
    Ok(Json((&pool).active_subscribers().await?))
}

/// 群发请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNewsletterRequest {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    is_html: bool,
}

/// 群发响应
#[derive(Debug, Serialize)]
pub struct SendNewsletterResponse {
    success: bool,
    message: String,
    summary: BulkSummary,
}

/// 向全部激活订阅者群发简报。
///
/// 每个收件人单独发送以替换个性化退订令牌；
/// 单个失败只计数，不中断批次。
async fn send_newsletter(
    State(pool): State<Db>,
    State(mailer): State<Mailer>,
    State(config): State<Arc<Config>>,
    Json(body): Json<SendNewsletterRequest>,
) -> Result<Json<SendNewsletterResponse>> {
    if body.subject.trim().is_empty() || body.content.trim().is_empty() {
        return Err(Error::Validation("Subject and content are required"));
    }

    let subscribers = (&pool).active_subscribers().await?;
    if subscribers.is_empty() {
        return Err(Error::Validation("No active subscribers found."));
    }

    let mails = subscribers.into_iter().map(|subscriber| {
        let mail_body = mail::personalized_newsletter(
            &config,
            &body.content,
            body.is_html,
            &subscriber.unsubscribe_token,
        );
        (subscriber.email, mail_body)
    });

    let summary = mailer.send_each(mails, body.subject.trim()).await;

    let message = if summary.failed > 0 {
        format!(
            "Newsletter sent successfully to {} subscribers ({} failed).",
            summary.successful, summary.failed
        )
    } else {
        format!(
            "Newsletter sent successfully to {} subscribers.",
            summary.successful
        )
    };

    Ok(Json(SendNewsletterResponse {
        success: true,
        message,
        summary,
    }))
}
