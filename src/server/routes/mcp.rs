//! Model Context Protocol endpoint serving one toolkit's tools over JSON-RPC.

use crate::error::ToolkitError;
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;
use crate::toolkits::{ToolExecutor, ToolkitId};
use crate::utils::logging::with_pretty_json_debug;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use toolkit_schema::mcp::{
    CallToolParams, CallToolResult, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, ListToolsResult, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION, ToolDescriptor,
};
use tracing::{debug, error, info};

pub fn router() -> Router<AppState> {
    Router::new().route("/mcp/{toolkit}", post(mcp_handler))
}

/// POST /mcp/{toolkit}
async fn mcp_handler(
    State(state): State<AppState>,
    Path(toolkit): Path<String>,
    user: AuthedUser,
    body: Bytes,
) -> Response {
    let Ok(id) = toolkit.parse::<ToolkitId>() else {
        return ToolkitError::not_found(format!("Unknown toolkit: {toolkit}")).into_response();
    };

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "unparseable MCP request");
            let resp = JsonRpcResponse::failure(Value::Null, PARSE_ERROR, "Parse error");
            return (StatusCode::BAD_REQUEST, Json(resp)).into_response();
        }
    };

    if request.is_notification() {
        debug!(toolkit = %id, method = %request.method, "MCP notification");
        return StatusCode::ACCEPTED.into_response();
    }

    let rpc_id = request.id.clone().unwrap_or(Value::Null);
    if request.jsonrpc != JSONRPC_VERSION {
        let resp = JsonRpcResponse::failure(rpc_id, INVALID_REQUEST, "jsonrpc must be \"2.0\"");
        return Json(resp).into_response();
    }

    let resp = handle_request(&state, &user, id, request, rpc_id).await;
    with_pretty_json_debug(&resp, |pretty| {
        debug!(toolkit = %id, body = %pretty, "[MCP] response");
    });
    Json(resp).into_response()
}

async fn handle_request(
    state: &AppState,
    user: &AuthedUser,
    id: ToolkitId,
    request: JsonRpcRequest,
    rpc_id: Value,
) -> JsonRpcResponse {
    let params = request.params.unwrap_or(Value::Null);
    match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            rpc_id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": format!("toolkit-{id}"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "instructions": id.system_prompt(),
            }),
        ),
        "ping" => JsonRpcResponse::success(rpc_id, json!({})),
        "tools/list" => match load_tools(state, user, id, &params).await {
            Ok(executor) => {
                let tools = executor
                    .map(|ex| {
                        ex.specs()
                            .into_iter()
                            .map(|spec| ToolDescriptor {
                                name: spec.name.to_string(),
                                description: spec.description.to_string(),
                                input_schema: spec.input_schema,
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                respond(rpc_id, ListToolsResult { tools })
            }
            Err(e) => toolkit_failure(rpc_id, id, e),
        },
        "tools/call" => {
            let call: CallToolParams = match serde_json::from_value(params) {
                Ok(call) => call,
                Err(e) => {
                    return JsonRpcResponse::failure(
                        rpc_id,
                        INVALID_PARAMS,
                        format!("Invalid tools/call params: {e}"),
                    );
                }
            };
            let executor = match load_tools(state, user, id, &Value::Null).await {
                Ok(Some(executor)) => executor,
                Ok(None) => {
                    return respond(
                        rpc_id,
                        CallToolResult::error(format!("Toolkit {id} is not enabled")),
                    );
                }
                Err(e) => return toolkit_failure(rpc_id, id, e),
            };

            let args = call.arguments.unwrap_or_else(|| json!({}));
            let result = match executor.call(&call.name, args).await {
                Ok(value) => {
                    info!(toolkit = %id, tool = %call.name, user_id = %user.id, "tool call succeeded");
                    CallToolResult::from_value(value)
                }
                Err(e) => {
                    error!(toolkit = %id, tool = %call.name, error = %e, "tool call failed");
                    CallToolResult::error(tool_error_message(&e))
                }
            };
            respond(rpc_id, result)
        }
        other => {
            JsonRpcResponse::failure(rpc_id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
        }
    }
}

async fn load_tools(
    state: &AppState,
    user: &AuthedUser,
    id: ToolkitId,
    params: &Value,
) -> Result<Option<Box<dyn ToolExecutor>>, ToolkitError> {
    state.toolkits.initialize(id, &user.id, params).await
}

fn respond<T: serde::Serialize>(rpc_id: Value, result: T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(rpc_id, value),
        Err(e) => JsonRpcResponse::failure(rpc_id, INTERNAL_ERROR, e.to_string()),
    }
}

fn toolkit_failure(rpc_id: Value, id: ToolkitId, err: ToolkitError) -> JsonRpcResponse {
    error!(toolkit = %id, error = %err, "toolkit initialization failed");
    JsonRpcResponse::failure(rpc_id, INTERNAL_ERROR, tool_error_message(&err))
}

/// Message safe to show to the model: the caller-facing text of the error.
fn tool_error_message(err: &ToolkitError) -> String {
    match err {
        ToolkitError::BadRequest(m)
        | ToolkitError::Unauthorized(m)
        | ToolkitError::Forbidden(m)
        | ToolkitError::NotFound(m)
        | ToolkitError::Conflict(m)
        | ToolkitError::Internal(m) => m.clone(),
        ToolkitError::UpstreamStatus { service, status } => {
            format!("{service} responded with status {}", status.as_u16())
        }
        _ => "Tool execution failed".to_string(),
    }
}
