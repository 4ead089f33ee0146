use crate::db::{DbUser, NewUser};
use crate::error::ToolkitError;
use crate::server::router::AppState;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::Utc;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{error, info};

/// Cookie the identity service's frontend SDK stores the session token in.
const SESSION_COOKIE: &str = "__session";
const X_WEBHOOK_SECRET: &str = "x-webhook-secret";

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
    })
}

/// Authenticated requester with a provisioned local user row.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: String,
    pub user: DbUser,
}

impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = ToolkitError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ToolkitError::Unauthorized("Missing session token.".to_string()))?;

        let user_id = match state.identity.verify_session(&token).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(ToolkitError::Unauthorized(
                    "Invalid or expired session.".to_string(),
                ));
            }
            Err(e) => {
                error!(error = %e, "session verification failed");
                return Err(ToolkitError::Unauthorized(
                    "Session could not be verified.".to_string(),
                ));
            }
        };

        let user = provision_user(state, &user_id).await?;
        Ok(AuthedUser { id: user_id, user })
    }
}

/// Returns the local user row, creating it from the identity profile on first sight.
pub async fn provision_user(state: &AppState, user_id: &str) -> Result<DbUser, ToolkitError> {
    if let Some(user) = state.db.get_user(user_id).await? {
        return Ok(user);
    }

    let profile = state.identity.get_user(user_id).await.map_err(|e| {
        error!(user_id, error = %e, "failed to load identity profile for provisioning");
        ToolkitError::Internal("Failed to load user profile.".to_string())
    })?;

    let primary = profile.primary_email();
    let new_user = NewUser {
        id: user_id.to_string(),
        name: profile.full_name(),
        email: primary.map(|e| e.email_address.clone()),
        image: profile.image_url.clone(),
        email_verified: primary.filter(|e| e.is_verified()).map(|_| Utc::now()),
    };

    match state.db.insert_user(new_user).await {
        Ok(user) => {
            info!(user_id, "provisioned local user");
            Ok(user)
        }
        Err(e) if e.is_unique_violation() => {
            state.db.get_user(user_id).await?.ok_or_else(|| {
                error!(user_id, "user creation conflicted but no row exists");
                ToolkitError::Internal("Failed to provision user.".to_string())
            })
        }
        Err(e) => Err(e),
    }
}

/// Guard for identity-service webhook deliveries.
#[derive(Debug, Clone, Copy)]
pub struct RequireWebhookSecret;

impl FromRequestParts<AppState> for RequireWebhookSecret {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(X_WEBHOOK_SECRET)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| bearer_token(&parts.headers));

        let expected = state.config.identity.webhook_secret.as_str();
        match presented {
            _ if expected.is_empty() => Err(AuthError::InvalidSecret),
            Some(secret) if bool::from(secret.as_bytes().ct_eq(expected.as_bytes())) => {
                Ok(RequireWebhookSecret)
            }
            Some(_) => Err(AuthError::InvalidSecret),
            None => Err(AuthError::MissingSecret),
        }
    }
}

pub enum AuthError {
    MissingSecret,
    InvalidSecret,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let reason = match self {
            AuthError::MissingSecret => "Missing webhook secret",
            AuthError::InvalidSecret => "Invalid webhook secret",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized", "reason": reason })),
        )
            .into_response()
    }
}
