use serde_json::Value;
use toolkit_schema::rpc::features::FeatureFlags;

use super::{output, unknown_procedure};
use crate::error::ToolkitError;
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;

pub(super) async fn call(
    state: &AppState,
    user: &AuthedUser,
    name: &str,
    _raw: Value,
) -> Result<Value, ToolkitError> {
    let features = &state.config.features;
    match name {
        "isAdmin" => {
            let is_admin = user.user.email.as_deref().is_some_and(|email| {
                features
                    .admin_emails
                    .iter()
                    .any(|admin| admin.eq_ignore_ascii_case(email))
            });
            output(is_admin)
        }
        "getFlags" => output(FeatureFlags {
            external_accounts_enabled: features.external_accounts_enabled,
        }),
        other => Err(unknown_procedure(&format!("features.{other}"))),
    }
}
