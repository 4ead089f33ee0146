use chrono::Utc;
use std::sync::Arc;
use tracing::error;

use super::legacy::LegacyOauth;
use super::identity_provider_id;
use crate::db::{DbAccount, DbActorHandle};
use crate::error::ToolkitError;
use crate::identity::IdentityProvider;

/// Resolves a user's OAuth access token for one provider on whichever
/// account path is active.
#[derive(Clone)]
pub struct TokenSource {
    db: DbActorHandle,
    identity: Arc<dyn IdentityProvider>,
    legacy: LegacyOauth,
    external_accounts_enabled: bool,
}

impl TokenSource {
    pub fn new(
        db: DbActorHandle,
        identity: Arc<dyn IdentityProvider>,
        legacy: LegacyOauth,
        external_accounts_enabled: bool,
    ) -> Self {
        Self {
            db,
            identity,
            legacy,
            external_accounts_enabled,
        }
    }

    /// Access token for `provider` (`github`, `google`, `notion`). When
    /// `required_scope` is set only a token granted that scope qualifies.
    pub async fn access_token(
        &self,
        user_id: &str,
        provider: &str,
        required_scope: Option<&str>,
    ) -> Result<String, ToolkitError> {
        let label = provider_label(provider);
        let missing =
            || ToolkitError::NotFound(format!("{label} OAuth token not found or access denied"));

        if self.external_accounts_enabled {
            let tokens = self
                .identity
                .oauth_access_tokens(user_id, &identity_provider_id(provider))
                .await
                .map_err(|e| {
                    error!(user_id, provider, error = %e, "failed to fetch OAuth token");
                    ToolkitError::Internal(format!("Failed to retrieve {label} OAuth token."))
                })?;

            return tokens
                .into_iter()
                .find(|t| required_scope.is_none_or(|scope| t.has_scope(scope)))
                .map(|t| t.token)
                .filter(|t| !t.is_empty())
                .ok_or_else(missing);
        }

        let account = self
            .db
            .get_account_by_provider(user_id, provider)
            .await?
            .ok_or_else(missing)?;

        if !scope_granted(&account, required_scope) {
            return Err(missing());
        }

        if account.is_expired(Utc::now()) {
            return self.legacy.refresh(&self.db, &account).await;
        }

        account.access_token.filter(|t| !t.is_empty()).ok_or_else(missing)
    }

    /// Whether a token is obtainable right now; failures count as "no".
    pub async fn has_token(&self, user_id: &str, provider: &str, required_scope: Option<&str>) -> bool {
        if self.external_accounts_enabled {
            return match self
                .identity
                .oauth_access_tokens(user_id, &identity_provider_id(provider))
                .await
            {
                Ok(tokens) => tokens
                    .iter()
                    .any(|t| required_scope.is_none_or(|scope| t.has_scope(scope))),
                Err(_) => false,
            };
        }
        match self.db.get_account_by_provider(user_id, provider).await {
            Ok(Some(account)) => {
                let has_access = account.access_token.as_deref().is_some_and(|t| !t.is_empty());
                let refreshable =
                    !account.is_expired(Utc::now()) || account.refresh_token.is_some();
                has_access && refreshable && scope_granted(&account, required_scope)
            }
            _ => false,
        }
    }
}

/// Legacy rows store scopes space- or comma-separated.
fn scope_granted(account: &DbAccount, required_scope: Option<&str>) -> bool {
    required_scope.is_none_or(|scope| {
        account
            .scope
            .as_deref()
            .is_some_and(|s| s.split([' ', ',']).any(|g| g == scope))
    })
}

fn provider_label(provider: &str) -> &str {
    match provider {
        "github" => "GitHub",
        "google" => "Google",
        "notion" => "Notion",
        other => other,
    }
}
