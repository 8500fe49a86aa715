mod admin;
mod analytics;
mod auth;
mod engagement;
mod newsletter;
mod posts;
mod sitemap;
mod tracking;

use axum::Router;
use axum::routing::get;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::state::AppState;

/// 管理后台哨兵 cookie
pub const ADMIN_COOKIE: &str = "admin-auth";
/// 哨兵 cookie 的约定值
pub const ADMIN_SENTINEL: &str = "authenticated";
/// 评论/投票用户的会话 cookie
pub const SESSION_COOKIE: &str = "session-token";
/// 评论/投票用户的 id cookie
pub const USER_COOKIE: &str = "user-id";

/// `{success, message}` 响应信封
///
/// 所有写操作端点统一返回这一形状。
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 构造 HTTP-only 持久 cookie
///
/// 通过字符串解析绕开对 `time` crate 的直接依赖。
fn persistent_cookie(name: &str, value: &str, max_age_secs: i64) -> Cookie<'static> {
    Cookie::parse(format!(
        "{name}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax"
    ))
    .expect("Failed to build cookie")
    .into_owned()
}

/// 从 `user-id` cookie 解析当前用户
fn current_user_id(jar: &CookieJar) -> Option<i64> {
    jar.get(USER_COOKIE)?.value().parse().ok()
}

/// 设置应用的路由。
///
/// `/api` 下聚合公开查询、互动、订阅、埋点和管理接口，
/// `/sitemap.xml` 单独挂在根路径，并绑定应用状态。
pub fn setup_route(app: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            posts::setup_route()
                .merge(engagement::setup_route())
                .merge(auth::setup_route())
                .merge(newsletter::setup_route())
                .merge(tracking::setup_route())
                .nest("/admin", admin::setup_route()),
        )
        .route("/sitemap.xml", get(sitemap::sitemap_xml))
        .with_state(app)
}

/// 启动 HTTP 服务，并使用给定的路由处理请求。
///
/// 在 `0.0.0.0:3000` 上监听 TCP 连接，并打印启动日志。
#[instrument(name = "http server", skip_all)]
pub async fn run_server_with_router(router: Router) {
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("Failed to bind TCP listener on 0.0.0.0:3000");

    tracing::info!("listening on :3000");

    axum::serve(listener, router)
        .await
        .expect("Failed to start Axum server");
}

/// 启动 HTTP 服务，自动设置路由和中间件。
///
/// 1. 生成路由
/// 2. 添加日志和追踪中间件
/// 3. 启动服务器
pub async fn run_server(app: AppState) {
    let router = setup_route(app);
    let router = add_middlewares(router);
    run_server_with_router(router).await
}

/// 为路由添加中间件，包括请求追踪和失败日志记录。
///
/// 日志记录会在请求失败时输出错误信息。
fn add_middlewares(router: Router) -> Router {
    fn log_failure(
        err: tower_http::classify::ServerErrorsFailureClass,
        _latency: std::time::Duration,
        _span: &tracing::Span,
    ) {
        tracing::error!(error = %err, "request failed");
    }

    router.layer(
        TraceLayer::new_for_http()
            .on_failure(log_failure)
            .on_request(|_req: &_, _span: &tracing::Span| {
                // 空实现，关闭请求日志
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistent_cookie() {
        let cookie = persistent_cookie(SESSION_COOKIE, "abc123", 3600);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc123");
        assert!(cookie.http_only().unwrap_or(false));
        assert_eq!(cookie.path(), Some("/"));
    }
}
