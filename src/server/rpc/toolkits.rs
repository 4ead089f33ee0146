use futures::future::join_all;
use serde_json::Value;

use super::{output, unknown_procedure};
use crate::error::ToolkitError;
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;
use crate::toolkits::ToolkitId;

pub(super) async fn call(
    state: &AppState,
    user: &AuthedUser,
    name: &str,
    _raw: Value,
) -> Result<Value, ToolkitError> {
    match name {
        "listToolkits" => {
            let checks = ToolkitId::ALL.into_iter().map(|id| async move {
                let available = state.toolkits.is_available(id, &user.id).await;
                id.client_config(available)
            });
            output(join_all(checks).await)
        }
        other => Err(unknown_procedure(&format!("toolkits.{other}"))),
    }
}
