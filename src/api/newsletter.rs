use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::Query;
use serde::Deserialize;

use super::ApiMessage;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::mail::{self, MailBody, Mailer, WELCOME_SUBJECT};
use crate::state::AppState;
use crate::storage::{Db, NewsletterStore};
use crate::token;

/// 配置订阅与邮件路由。
///
/// 路由包括：
/// - `POST /newsletter/subscribe`：订阅（重复订阅/复活/新订阅）
/// - `GET /newsletter/unsubscribe`：按令牌退订
/// - `POST /newsletter/confirm`：订阅确认回执
/// - `POST /email/send`：事务性邮件
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/newsletter/subscribe", post(subscribe))
        .route("/newsletter/unsubscribe", get(unsubscribe))
        .route("/newsletter/confirm", post(confirm))
        .route("/email/send", post(send_email))
}

/// 订阅请求体
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    email: String,
}

/// 订阅。
///
/// - 已激活的重复订阅返回失败信封
/// - 未激活的订阅复活（保留原令牌）并重发欢迎邮件
/// - 新 email 生成新令牌入库并发送欢迎邮件
///
/// 欢迎邮件发送失败时订阅记录已落库，对外报告失败。
async fn subscribe(
    State(pool): State<Db>,
    State(mailer): State<Mailer>,
    State(config): State<Arc<Config>>,
    Json(body): Json<SubscribeRequest>,
) -> Result<Json<ApiMessage>> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(Error::Validation("Email is required"));
    }

    let (token, message) = match (&pool).subscriber_by_email(&email).await? {
        Some(subscriber) if subscriber.is_active => {
            return Ok(Json(ApiMessage::fail(
                "Email is already subscribed to the newsletter.",
            )));
        }
        Some(subscriber) => {
            (&pool).reactivate_subscriber(subscriber.id).await?;
            (
                subscriber.unsubscribe_token,
                "Successfully resubscribed to the newsletter!",
            )
        }
        None => {
            let token = token::generate(token::UNSUBSCRIBE_TOKEN_LEN);
            (&pool).insert_subscriber(&email, &token).await?;
            (
                token,
                "Successfully subscribed to the newsletter! Check your email for confirmation.",
            )
        }
    };

    if let Err(e) = mailer
        .send(&email, WELCOME_SUBJECT, &mail::welcome_body(&config, &token))
        .await
    {
        tracing::error!(%email, %e, "failed to send welcome email");
        return Ok(Json(ApiMessage::fail("Failed to subscribe. Please try again.")));
    }

    Ok(Json(ApiMessage::ok(message)))
}

/// 退订查询参数
#[derive(Debug, Deserialize)]
pub struct UnsubscribeParams {
    #[serde(default)]
    token: String,
}

/// 按令牌退订。
///
/// 未知令牌报告失败且无副作用；重复退订幂等，返回相同的成功消息。
async fn unsubscribe(
    Query(params): Query<UnsubscribeParams>,
    State(pool): State<Db>,
) -> Result<Json<ApiMessage>> {
    let Some(subscriber) = (&pool).subscriber_by_token(&params.token).await? else {
        return Ok(Json(ApiMessage::fail("Invalid unsubscribe link.")));
    };

    (&pool).deactivate_subscriber(subscriber.id).await?;

    Ok(Json(ApiMessage::ok(
        "Successfully unsubscribed from the newsletter.",
    )))
}

/// 订阅确认回执，无状态。
async fn confirm() -> Json<ApiMessage> {
    Json(ApiMessage::ok("Subscription confirmed successfully!"))
}

/// 事务性邮件请求体
#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// 发送一封事务性邮件。
///
/// `to`、`subject` 以及 `html`/`text` 之一为必填。
async fn send_email(
    State(mailer): State<Mailer>,
    Json(body): Json<SendEmailRequest>,
) -> Result<Json<ApiMessage>> {
    if body.to.trim().is_empty() || body.subject.trim().is_empty() {
        return Err(Error::Validation("Missing required fields"));
    }

    let mail_body = match (body.html, body.text) {
        (Some(html), _) => MailBody::Html(html),
        (None, Some(text)) => MailBody::Text(text),
        (None, None) => return Err(Error::Validation("Missing required fields")),
    };

    mailer.send(body.to.trim(), body.subject.trim(), &mail_body).await?;

    Ok(Json(ApiMessage::ok("Email sent successfully")))
}
