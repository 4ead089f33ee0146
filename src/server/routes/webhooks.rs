use crate::db::NewUser;
use crate::error::ToolkitError;
use crate::identity::IdentityUser;
use crate::server::guards::auth::RequireWebhookSecret;
use crate::server::router::AppState;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use toolkit_schema::connections::ErrorBody;
use toolkit_schema::webhook::{WebhookAck, WebhookEvent};
use tracing::{error, info, warn};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/webhooks/identity", post(identity_webhook))
}

/// POST /api/webhooks/identity
async fn identity_webhook(
    State(state): State<AppState>,
    _guard: RequireWebhookSecret,
    payload: Result<Json<WebhookEvent>, JsonRejection>,
) -> Response {
    let Json(event) = match payload {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "malformed webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "Invalid webhook payload".to_string(),
                }),
            )
                .into_response();
        }
    };

    match handle_event(&state, event).await {
        Ok(()) => Json(WebhookAck { received: true }).into_response(),
        Err(e) => {
            error!(error = %e, "failed to process webhook event");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Failed to process webhook event".to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn handle_event(state: &AppState, event: WebhookEvent) -> Result<(), ToolkitError> {
    match event.event_type.as_str() {
        "user.created" | "user.updated" => {
            let profile: IdentityUser = serde_json::from_value(event.data)?;
            let user = state.db.upsert_user(user_from_profile(&profile)).await?;
            info!(user_id = %user.id, event = %event.event_type, "user synced from webhook");
        }
        "user.deleted" => match event.data.get("id").and_then(|v| v.as_str()) {
            Some(id) => {
                let deleted = state.db.delete_user(id).await?;
                info!(user_id = id, deleted, "user deletion processed");
            }
            None => warn!("user.deleted event without an id"),
        },
        other => info!(event = other, "ignoring webhook event"),
    }
    Ok(())
}

/// Local row for a webhook profile. `email_verified` is a fresh timestamp
/// when verified; the upsert keeps an earlier stored one.
fn user_from_profile(profile: &IdentityUser) -> NewUser {
    let primary = profile.primary_email();
    NewUser {
        id: profile.id.clone(),
        name: profile.display_name(),
        email: primary.map(|e| e.email_address.clone()),
        image: profile.image_url.clone(),
        email_verified: primary.filter(|e| e.is_verified()).map(|_| Utc::now()),
    }
}
