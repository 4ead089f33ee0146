use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;
use tracing::error;

use super::IsRetryable;
use super::oauth::OauthError;

#[derive(Debug, ThisError)]
pub enum ToolkitError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal failure whose message is safe to show to the caller.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{service} responded with status: {status}")]
    UpstreamStatus {
        service: &'static str,
        status: StatusCode,
    },

    #[error(transparent)]
    Oauth(#[from] OauthError),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl ToolkitError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ToolkitError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ToolkitError::BadRequest(message.into())
    }

    /// RPC error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ToolkitError::BadRequest(_) => "BAD_REQUEST",
            ToolkitError::Unauthorized(_) => "UNAUTHORIZED",
            ToolkitError::Forbidden(_) => "FORBIDDEN",
            ToolkitError::NotFound(_) => "NOT_FOUND",
            ToolkitError::Conflict(_) => "CONFLICT",
            ToolkitError::Oauth(OauthError::Flow { .. }) => "FORBIDDEN",
            ToolkitError::UpstreamStatus { .. }
            | ToolkitError::ReqwestError(_)
            | ToolkitError::JsonError(_)
            | ToolkitError::Oauth(_) => "BAD_GATEWAY",
            ToolkitError::Internal(_)
            | ToolkitError::UrlError(_)
            | ToolkitError::DatabaseError(_)
            | ToolkitError::RactorError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ToolkitError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ToolkitError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ToolkitError::Forbidden(_) | ToolkitError::Oauth(OauthError::Flow { .. }) => {
                StatusCode::FORBIDDEN
            }
            ToolkitError::NotFound(_) => StatusCode::NOT_FOUND,
            ToolkitError::Conflict(_) => StatusCode::CONFLICT,
            ToolkitError::UpstreamStatus { .. }
            | ToolkitError::ReqwestError(_)
            | ToolkitError::JsonError(_)
            | ToolkitError::Oauth(_) => StatusCode::BAD_GATEWAY,
            ToolkitError::Internal(_)
            | ToolkitError::UrlError(_)
            | ToolkitError::DatabaseError(_)
            | ToolkitError::RactorError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the underlying database error is a unique/primary-key violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            ToolkitError::DatabaseError(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl IntoResponse for ToolkitError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let code = self.code().to_string();

        let body = match self {
            ToolkitError::BadRequest(message)
            | ToolkitError::Unauthorized(message)
            | ToolkitError::Forbidden(message)
            | ToolkitError::NotFound(message)
            | ToolkitError::Conflict(message)
            | ToolkitError::Internal(message) => ApiErrorObject {
                code,
                message,
                details: None,
            },

            ToolkitError::Oauth(OauthError::Flow {
                code,
                message,
                details,
            }) => ApiErrorObject {
                code,
                message,
                details,
            },

            ToolkitError::UpstreamStatus { service, status } => {
                let message = match status {
                    StatusCode::TOO_MANY_REQUESTS => format!("{service} rate limit exceeded."),
                    StatusCode::UNAUTHORIZED => format!("{service} authentication failed."),
                    StatusCode::FORBIDDEN => format!("{service} permission denied."),
                    StatusCode::NOT_FOUND => format!("{service} resource not found."),
                    _ => format!("{service} returned an error."),
                };
                ApiErrorObject {
                    code,
                    message,
                    details: Some(serde_json::json!({ "upstreamStatus": status.as_u16() })),
                }
            }

            other @ (ToolkitError::ReqwestError(_)
            | ToolkitError::JsonError(_)
            | ToolkitError::Oauth(_)) => {
                error!(error = %other, "upstream failure");
                ApiErrorObject {
                    code,
                    message: "Upstream service error.".to_string(),
                    details: None,
                }
            }

            other @ (ToolkitError::UrlError(_)
            | ToolkitError::DatabaseError(_)
            | ToolkitError::RactorError(_)) => {
                error!(error = %other, "internal failure");
                ApiErrorObject {
                    code,
                    message: "An internal server error occurred.".to_string(),
                    details: None,
                }
            }
        };
        (status, Json(ApiErrorBody { inner: body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Debug, Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

impl IsRetryable for ToolkitError {
    fn is_retryable(&self) -> bool {
        match self {
            ToolkitError::ReqwestError(e) => e.is_connect() || e.is_timeout(),
            ToolkitError::UpstreamStatus { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}
