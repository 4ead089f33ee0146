//! RPC procedures under `POST /api/trpc/<group>.<procedure>`.
//!
//! The request body is the procedure input; the answer is
//! `{"result":{"data": ...}}` or the standard error envelope.

mod accounts;
mod chats;
mod features;
mod messages;
mod toolkits;
mod users;
mod workbenches;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::post,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Instant;
use toolkit_schema::{PageInput, RpcResponse};
use tracing::{info, warn};

use crate::error::ToolkitError;
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/trpc/{procedure}", post(rpc_handler))
}

async fn rpc_handler(
    State(state): State<AppState>,
    Path(procedure): Path<String>,
    user: AuthedUser,
    body: Bytes,
) -> Result<Json<RpcResponse<Value>>, ToolkitError> {
    let input = parse_body(&body)?;

    let start = Instant::now();
    let result = dispatch(&state, &user, &procedure, input).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match &result {
        Ok(_) => info!(procedure, user_id = %user.id, elapsed_ms, "[RPC] {procedure} took {elapsed_ms}ms"),
        Err(e) => warn!(
            procedure,
            user_id = %user.id,
            elapsed_ms,
            code = e.code(),
            error = %e,
            "[RPC] {procedure} failed after {elapsed_ms}ms"
        ),
    }

    Ok(Json(RpcResponse::new(result?)))
}

fn parse_body(body: &Bytes) -> Result<Value, ToolkitError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| ToolkitError::bad_request(format!("Malformed JSON input: {e}")))
}

async fn dispatch(
    state: &AppState,
    user: &AuthedUser,
    procedure: &str,
    input: Value,
) -> Result<Value, ToolkitError> {
    let (group, name) = procedure
        .split_once('.')
        .ok_or_else(|| unknown_procedure(procedure))?;

    match group {
        "chats" => chats::call(state, user, name, input).await,
        "messages" => messages::call(state, user, name, input).await,
        "users" => users::call(state, user, name, input).await,
        "accounts" => accounts::call(state, user, name, input).await,
        "workbenches" => workbenches::call(state, user, name, input).await,
        "features" => features::call(state, user, name, input).await,
        "toolkits" => toolkits::call(state, user, name, input).await,
        _ => Err(unknown_procedure(procedure)),
    }
}

fn unknown_procedure(procedure: &str) -> ToolkitError {
    ToolkitError::not_found(format!("No procedure named {procedure}"))
}

/// Decodes a procedure input; a missing body decodes as `null`.
fn input<T: DeserializeOwned>(input: Value) -> Result<T, ToolkitError> {
    serde_json::from_value(input).map_err(|e| ToolkitError::bad_request(format!("Invalid input: {e}")))
}

/// Like [`input`], but a missing body yields `T::default()`.
fn input_or_default<T: DeserializeOwned + Default>(value: Value) -> Result<T, ToolkitError> {
    match value {
        Value::Null => Ok(T::default()),
        other => input(other),
    }
}

fn output<T: Serialize>(value: T) -> Result<Value, ToolkitError> {
    Ok(serde_json::to_value(value)?)
}

fn check_page(page: &PageInput) -> Result<(), ToolkitError> {
    if page.limit_in_range() {
        Ok(())
    } else {
        Err(ToolkitError::bad_request("limit must be between 1 and 100"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_null_input() {
        assert_eq!(parse_body(&Bytes::from_static(b"  \n")).unwrap(), Value::Null);
        assert_eq!(
            parse_body(&Bytes::from_static(b"\"chat-1\"")).unwrap(),
            Value::String("chat-1".into())
        );
        assert!(matches!(
            parse_body(&Bytes::from_static(b"{oops")),
            Err(ToolkitError::BadRequest(_))
        ));
    }

    #[test]
    fn page_limit_bounds() {
        let mut page = PageInput::default();
        assert!(check_page(&page).is_ok());
        page.limit = 0;
        assert!(check_page(&page).is_err());
        page.limit = 101;
        assert!(check_page(&page).is_err());
        page.limit = 100;
        assert!(check_page(&page).is_ok());
    }
}
