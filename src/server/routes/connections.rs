//! Broker-backed account connections. Errors use the flat `{"error": "..."}` body.

use crate::error::ToolkitError;
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use toolkit_schema::connections::{
    ConnectionSummary, DisconnectRequest, ErrorBody, InitiateConnectionRequest,
    InitiateConnectionResponse, MessageBody,
};
use tracing::{error, info, warn};

const CONNECTED_ACCOUNT_PREFIX: &str = "ca_";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/connections", get(list_connections))
        .route("/api/connections/initiate", post(initiate_connection))
        .route("/api/connections/disconnect", post(disconnect_connection))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn auth_failure(err: ToolkitError) -> Response {
    let message = match err.status() {
        StatusCode::UNAUTHORIZED => "Unauthorized".to_string(),
        _ => "Failed to authenticate request".to_string(),
    };
    error_response(err.status(), message)
}

fn broker_failure(action: &str, err: ToolkitError) -> Response {
    error!(action, error = %err, "broker request failed");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {action}."),
    )
}

fn broker_configured(state: &AppState) -> bool {
    !state.config.broker.api_key.trim().is_empty()
}

/// POST /api/connections/initiate
async fn initiate_connection(
    State(state): State<AppState>,
    user: Result<AuthedUser, ToolkitError>,
    payload: Result<Json<InitiateConnectionRequest>, JsonRejection>,
) -> Response {
    let user = match user {
        Ok(user) => user,
        Err(e) => return auth_failure(e),
    };
    let Ok(Json(req)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request body.");
    };

    let service = req.service.trim().to_ascii_lowercase();
    let cfg = &state.config.broker;
    if !cfg.supported_services.iter().any(|s| s == &service) {
        return error_response(StatusCode::BAD_REQUEST, "Unsupported service provided.");
    }
    let Some(auth_config_id) = cfg.auth_configs.get(&service).filter(|id| !id.is_empty()) else {
        error!(service, "no broker auth config id configured");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Server configuration error: missing auth config for {service}."),
        );
    };
    if !broker_configured(&state) {
        error!("broker api key is not configured");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server configuration error: connection broker is not configured.",
        );
    }

    let initiated = match state.broker.initiate(&user.id, auth_config_id).await {
        Ok(initiated) => initiated,
        Err(e) => return broker_failure("initiate connection", e),
    };
    let Some(redirect_url) = initiated.redirect_url.filter(|u| !u.is_empty()) else {
        error!(connected_account_id = %initiated.id, "broker returned no redirect url");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to get redirect URL from the connection broker.",
        );
    };

    info!(user_id = %user.id, service, connected_account_id = %initiated.id, "connection initiated");
    Json(InitiateConnectionResponse {
        redirect_url,
        pending_connected_account_id: initiated.id,
    })
    .into_response()
}

/// GET /api/connections
async fn list_connections(
    State(state): State<AppState>,
    user: Result<AuthedUser, ToolkitError>,
) -> Response {
    let user = match user {
        Ok(user) => user,
        Err(e) => return auth_failure(e),
    };
    if !broker_configured(&state) {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server configuration error: connection broker is not configured.",
        );
    }

    match state.broker.list(&user.id).await {
        Ok(accounts) => {
            let summaries: Vec<ConnectionSummary> = accounts
                .into_iter()
                .map(|acc| ConnectionSummary {
                    app_name: acc.app_name().map(str::to_string),
                    connected_account_id: acc.id,
                    status: acc.status,
                    auth_config_id: acc.auth_config_id,
                })
                .collect();
            Json(summaries).into_response()
        }
        Err(e) => broker_failure("fetch connections", e),
    }
}

/// POST /api/connections/disconnect
async fn disconnect_connection(
    State(state): State<AppState>,
    user: Result<AuthedUser, ToolkitError>,
    payload: Result<Json<DisconnectRequest>, JsonRejection>,
) -> Response {
    let user = match user {
        Ok(user) => user,
        Err(e) => return auth_failure(e),
    };
    let Ok(Json(req)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request body.");
    };
    let id = req.connected_account_id.trim();
    if !id.starts_with(CONNECTED_ACCOUNT_PREFIX) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid connectedAccountId provided.",
        );
    }
    if !broker_configured(&state) {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server configuration error: connection broker is not configured.",
        );
    }

    let account = match state.broker.get(id).await {
        Ok(Some(account)) => account,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Connection not found."),
        Err(e) => return broker_failure("look up connection", e),
    };
    if account.user_id.as_deref() != Some(user.id.as_str()) {
        warn!(user_id = %user.id, connected_account_id = id, "disconnect of a foreign connection refused");
        return error_response(
            StatusCode::FORBIDDEN,
            "You do not have permission to disconnect this account.",
        );
    }

    if let Err(e) = state.broker.delete(id).await {
        return broker_failure("disconnect account", e);
    }
    info!(user_id = %user.id, connected_account_id = id, "connection removed");
    Json(MessageBody {
        message: "Account disconnected successfully.".to_string(),
    })
    .into_response()
}
