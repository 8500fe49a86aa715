use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::extract::Query;
use axum_extra::extract::cookie::CookieJar;
use chrono::Local;
use serde::{Deserialize, Serialize};

use super::{ApiMessage, current_user_id};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::storage::{CookieConsent, Db, PageViewRecord, TrackingStore, UserStore};

/// 配置埋点与 Cookie 同意路由。
///
/// 路由包括：
/// - `POST /track`：追加一条浏览记录
/// - `POST /consent`：保存（upsert）同意记录
/// - `GET /consent`：查询同意记录
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/track", post(track))
        .route("/consent", post(save_consent).get(get_consent))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// 从代理头里取客户端 IP
fn client_ip(headers: &HeaderMap) -> &str {
    let forwarded = header_str(headers, "x-forwarded-for");
    if !forwarded.is_empty() {
        forwarded
    } else {
        header_str(headers, "x-real-ip")
    }
}

/// 埋点请求体
#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    path: String,
}

/// 追加一条浏览记录。
///
/// UA/IP/referrer 取自请求头，session id 由 `ip-时间戳` 拼成。
/// 已登录用户同步刷新最近访问时间，并从 `/{category}/{slug}`
/// 形状的路径中推断偏好分类。
async fn track(
    headers: HeaderMap,
    jar: CookieJar,
    State(pool): State<Db>,
    Json(body): Json<TrackRequest>,
) -> Result<Json<ApiMessage>> {
    if body.path.is_empty() {
        return Err(Error::Validation("Path is required"));
    }

    let user_id = current_user_id(&jar);
    let ip = client_ip(&headers);
    let session_id = format!("{}-{}", ip, Local::now().timestamp_millis());

    (&pool)
        .insert_page_view(PageViewRecord {
            path: &body.path,
            user_id,
            user_agent: header_str(&headers, "user-agent"),
            ip,
            referrer: header_str(&headers, "referer"),
            session_id: &session_id,
        })
        .await?;

    if let Some(user_id) = user_id {
        let parts: Vec<&str> = body.path.split('/').collect();
        match parts.as_slice() {
            ["", category, slug, ..] if !category.is_empty() && !slug.is_empty() => {
                (&pool).add_preferred_category(user_id, category).await?;
            }
            _ => (&pool).touch_last_visited(user_id).await?,
        }
    }

    Ok(Json(ApiMessage::ok("Page view recorded")))
}

/// 四项同意开关
#[derive(Debug, Deserialize)]
pub struct ConsentPreferences {
    necessary: bool,
    analytics: bool,
    marketing: bool,
    functional: bool,
}

/// 保存同意记录的请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConsentRequest {
    session_id: String,
    preferences: ConsentPreferences,
}

/// 同意记录响应
#[derive(Debug, Serialize)]
pub struct ConsentResponse {
    success: bool,
    consent: CookieConsent,
}

/// 保存（upsert）同意记录，按 session 维度覆盖。
async fn save_consent(
    headers: HeaderMap,
    jar: CookieJar,
    State(pool): State<Db>,
    Json(body): Json<SaveConsentRequest>,
) -> Result<Json<ConsentResponse>> {
    if body.session_id.is_empty() {
        return Err(Error::Validation("Session id is required"));
    }

    let p = &body.preferences;
    let consent = (&pool)
        .upsert_consent(
            &body.session_id,
            current_user_id(&jar),
            [p.necessary, p.analytics, p.marketing, p.functional],
            client_ip(&headers),
            header_str(&headers, "user-agent"),
        )
        .await?;

    Ok(Json(ConsentResponse {
        success: true,
        consent,
    }))
}

/// 查询同意记录的参数
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentQuery {
    #[serde(default)]
    session_id: String,
}

/// 查询同意记录。
///
/// 有用户 cookie 时优先按用户查最近一条，否则按 session 查。
async fn get_consent(
    Query(params): Query<ConsentQuery>,
    jar: CookieJar,
    State(pool): State<Db>,
) -> Result<Json<serde_json::Value>> {
    let mut consent = None;

    if let Some(user_id) = current_user_id(&jar) {
        consent = (&pool).consent_by_user(user_id).await?;
    }
    if consent.is_none() && !params.session_id.is_empty() {
        consent = (&pool).consent_by_session(&params.session_id).await?;
    }

    match consent {
        Some(consent) => Ok(Json(
            serde_json::json!({ "success": true, "consent": consent }),
        )),
        None => Ok(Json(
            serde_json::json!({ "success": false, "message": "No consent record found" }),
        )),
    }
}
