use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use super::{SESSION_COOKIE, USER_COOKIE, current_user_id, persistent_cookie};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::storage::{Db, User, UserStore};
use crate::token;

/// 用户 cookie 有效期：30 天
const SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// 配置访客登录路由。
///
/// 路由包括：
/// - `POST /auth/login`：name+email 登录，不存在则隐式建号
/// - `POST /auth/logout`：清除会话 cookie
/// - `GET /auth/me`：当前用户
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

/// 登录请求体
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    name: String,
    email: String,
}

/// 登录响应
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    success: bool,
    user: User,
}

/// name+email 登录。
///
/// email 命中则刷新最近访问时间，未命中则创建用户；
/// 随后下发 30 天 HTTP-only 的 `session-token` 和 `user-id` cookie。
async fn login(
    jar: CookieJar,
    State(pool): State<Db>,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let name = body.name.trim();
    let email = body.email.trim();

    if name.is_empty() || email.is_empty() {
        return Err(Error::Validation("Name and email are required"));
    }

    let user = match (&pool).user_by_email(email).await? {
        Some(user) => {
            (&pool).touch_last_visited(user.id).await?;
            user
        }
        None => (&pool).insert_user(name, email).await?,
    };

    let jar = jar
        .add(persistent_cookie(
            SESSION_COOKIE,
            &token::generate(token::SESSION_TOKEN_LEN),
            SESSION_MAX_AGE_SECS,
        ))
        .add(persistent_cookie(
            USER_COOKIE,
            &user.id.to_string(),
            SESSION_MAX_AGE_SECS,
        ));

    Ok((jar, Json(LoginResponse {
        success: true,
        user,
    })))
}

/// 登出，清除两个会话 cookie。
async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar
        .remove(persistent_cookie(SESSION_COOKIE, "", 0))
        .remove(persistent_cookie(USER_COOKIE, "", 0));

    (jar, Json(serde_json::json!({ "success": true })))
}

/// 获取当前用户，cookie 缺失或用户不存在时返回 `null`。
async fn me(jar: CookieJar, State(pool): State<Db>) -> Result<Json<Option<User>>> {
    let user = match current_user_id(&jar) {
        Some(id) => (&pool).user_by_id(id).await?,
        None => None,
    };
    Ok(Json(user))
}
