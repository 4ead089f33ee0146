//! Connected OAuth accounts. Two storage paths exist, selected by
//! `features.external_accounts_enabled`: accounts linked on the identity
//! service, or legacy rows in the local `accounts` table.

pub mod legacy;
mod token;

pub use legacy::{LegacyOauth, LegacyProvider};
pub use token::TokenSource;

use std::sync::Arc;
use toolkit_schema::rpc::accounts::{AccountDetail, AccountSummary, DeleteAccountOutput};
use toolkit_schema::{Page, PageInput};
use tracing::error;

use crate::db::{DbAccount, DbActorHandle};
use crate::error::ToolkitError;
use crate::identity::{ExternalAccount, IdentityProvider};

const IDENTITY_PROVIDER_PREFIX: &str = "oauth_";

/// Identity-service provider id for a short provider name.
pub fn identity_provider_id(provider: &str) -> String {
    match provider.to_ascii_lowercase().as_str() {
        "github" => "oauth_github".to_string(),
        "google" => "oauth_google".to_string(),
        "notion" => "oauth_notion".to_string(),
        other => format!("{IDENTITY_PROVIDER_PREFIX}{other}"),
    }
}

/// Inverse of [`identity_provider_id`] for display.
pub fn short_provider_name(provider_id: &str) -> &str {
    provider_id
        .strip_prefix(IDENTITY_PROVIDER_PREFIX)
        .unwrap_or(provider_id)
}

#[derive(Clone)]
pub struct AccountsService {
    db: DbActorHandle,
    identity: Arc<dyn IdentityProvider>,
    external_accounts_enabled: bool,
    tokens: TokenSource,
}

impl AccountsService {
    pub fn new(
        db: DbActorHandle,
        identity: Arc<dyn IdentityProvider>,
        legacy: LegacyOauth,
        external_accounts_enabled: bool,
    ) -> Self {
        let tokens = TokenSource::new(
            db.clone(),
            identity.clone(),
            legacy,
            external_accounts_enabled,
        );
        Self {
            db,
            identity,
            external_accounts_enabled,
            tokens,
        }
    }

    pub fn external_accounts_enabled(&self) -> bool {
        self.external_accounts_enabled
    }

    pub fn tokens(&self) -> &TokenSource {
        &self.tokens
    }

    async fn external_accounts(&self, user_id: &str) -> Result<Vec<ExternalAccount>, ToolkitError> {
        Ok(self.identity.get_user(user_id).await?.external_accounts)
    }

    pub async fn list(
        &self,
        user_id: &str,
        page: PageInput,
    ) -> Result<Page<AccountSummary>, ToolkitError> {
        if !self.external_accounts_enabled {
            let rows = self.db.list_accounts(user_id, page).await?;
            return Ok(Page {
                items: rows.items.into_iter().map(legacy_summary).collect(),
                has_more: rows.has_more,
                next_cursor: rows.next_cursor,
            });
        }

        match self.external_accounts(user_id).await {
            Ok(accounts) => Ok(Page {
                items: accounts
                    .into_iter()
                    .map(|acc| AccountSummary {
                        provider: short_provider_name(&acc.provider).to_string(),
                        id: acc.id,
                    })
                    .collect(),
                has_more: false,
                next_cursor: None,
            }),
            Err(e) => {
                error!(user_id, error = %e, "failed to fetch external accounts");
                Ok(Page::empty())
            }
        }
    }

    pub async fn by_provider(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<AccountDetail>, ToolkitError> {
        if !self.external_accounts_enabled {
            let row = self
                .db
                .get_account_by_provider(user_id, &provider.to_ascii_lowercase())
                .await?;
            return Ok(row.map(legacy_detail));
        }

        let wanted = identity_provider_id(provider);
        match self.external_accounts(user_id).await {
            Ok(accounts) => Ok(accounts
                .into_iter()
                .find(|acc| acc.provider == wanted)
                .map(|acc| AccountDetail {
                    provider: short_provider_name(&acc.provider).to_string(),
                    id: acc.id,
                    scope: acc.approved_scopes,
                    email_address: acc.email_address,
                    username: acc.username,
                })),
            Err(e) => {
                error!(user_id, provider, error = %e, "failed to fetch external account");
                Ok(None)
            }
        }
    }

    pub async fn has_provider(&self, user_id: &str, provider: &str) -> Result<bool, ToolkitError> {
        if !self.external_accounts_enabled {
            return Ok(self.by_provider(user_id, provider).await?.is_some());
        }
        let wanted = identity_provider_id(provider);
        match self.external_accounts(user_id).await {
            Ok(accounts) => Ok(accounts.iter().any(|acc| acc.provider == wanted)),
            Err(e) => {
                error!(user_id, provider, error = %e, "failed to check provider account");
                Ok(false)
            }
        }
    }

    pub async fn delete(
        &self,
        user_id: &str,
        account_id: &str,
    ) -> Result<DeleteAccountOutput, ToolkitError> {
        if !self.external_accounts_enabled {
            if !self.db.delete_account(account_id, user_id).await? {
                return Err(ToolkitError::not_found("Account not found."));
            }
            return Ok(DeleteAccountOutput {
                success: true,
                message: "Account disconnected successfully.".to_string(),
            });
        }

        self.identity
            .delete_external_account(user_id, account_id)
            .await
            .map_err(|e| {
                error!(user_id, account_id, error = %e, "failed to delete external account");
                ToolkitError::Internal(
                    "Failed to disconnect the account. Please try again later.".to_string(),
                )
            })?;
        Ok(DeleteAccountOutput {
            success: true,
            message: "Account disconnected successfully.".to_string(),
        })
    }
}

fn legacy_summary(row: DbAccount) -> AccountSummary {
    AccountSummary {
        id: row.id,
        provider: row.provider,
    }
}

fn legacy_detail(row: DbAccount) -> AccountDetail {
    AccountDetail {
        id: row.id,
        provider: row.provider,
        scope: row.scope,
        email_address: None,
        username: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_ids_round_trip_for_display() {
        assert_eq!(identity_provider_id("GitHub"), "oauth_github");
        assert_eq!(identity_provider_id("google"), "oauth_google");
        assert_eq!(identity_provider_id("Dropbox"), "oauth_dropbox");
        assert_eq!(short_provider_name("oauth_notion"), "notion");
        assert_eq!(short_provider_name("saml_okta"), "saml_okta");
    }
}
