use serde::Deserialize;
use serde_json::Value;
use toolkit_schema::PageInput;

use super::{check_page, input, input_or_default, output, unknown_procedure};
use crate::error::ToolkitError;
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;

/// Provider lookups accept `"github"` or `{ "provider": "github" }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProviderRef {
    Name(String),
    Object { provider: String },
}

impl ProviderRef {
    fn into_name(self) -> String {
        match self {
            ProviderRef::Name(p) | ProviderRef::Object { provider: p } => p,
        }
    }
}

pub(super) async fn call(
    state: &AppState,
    user: &AuthedUser,
    name: &str,
    raw: Value,
) -> Result<Value, ToolkitError> {
    let accounts = &state.accounts;
    match name {
        "getAccounts" => {
            let page: PageInput = input_or_default(raw)?;
            check_page(&page)?;
            output(accounts.list(&user.id, page).await?)
        }
        "getAccountByProvider" => {
            let provider = input::<ProviderRef>(raw)?.into_name();
            output(accounts.by_provider(&user.id, &provider).await?)
        }
        "hasProviderAccount" => {
            let provider = input::<ProviderRef>(raw)?.into_name();
            output(accounts.has_provider(&user.id, &provider).await?)
        }
        "deleteAccount" => {
            let id: String = input(raw)?;
            output(accounts.delete(&user.id, &id).await?)
        }
        other => Err(unknown_procedure(&format!("accounts.{other}"))),
    }
}
