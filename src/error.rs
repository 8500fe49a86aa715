use std::io;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error(transparent)]
    Mail(#[from] lettre::error::Error),

    #[error(transparent)]
    Address(#[from] lettre::address::AddressError),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// 请求字段缺失或非法
    #[error("{0}")]
    Validation(&'static str),

    /// slug / email 等唯一键冲突
    #[error("{0}")]
    Conflict(String),

    #[error("Not Found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            Error::Sqlx(e) => {
                tracing::error!(%e, "sqlx error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Error::Smtp(e) => {
                tracing::error!(%e, "smtp transport error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to send email".to_string(),
                )
            }
            Error::Mail(e) => {
                tracing::error!(%e, "mail build error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to send email".to_string(),
                )
            }
            Error::Address(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Error::Io(e) => {
                tracing::error!(%e, "file io error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Error::Validation(s) => (StatusCode::BAD_REQUEST, s.to_string()),
            Error::Conflict(s) => (StatusCode::CONFLICT, s),
            Error::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}
