//! Hosted identity service: session verification, user profiles and the
//! OAuth accounts users link there.

mod client;

pub use client::HostedIdentityClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolkitError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmailVerification {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
    #[serde(default)]
    pub verification: Option<EmailVerification>,
}

impl EmailAddress {
    pub fn is_verified(&self) -> bool {
        self.verification
            .as_ref()
            .and_then(|v| v.status.as_deref())
            .is_some_and(|s| s == "verified")
    }
}

/// OAuth account linked to a user on the identity service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExternalAccount {
    pub id: String,
    /// Provider id such as `oauth_github`.
    pub provider: String,
    #[serde(default)]
    pub approved_scopes: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// User profile as served by the identity API and carried by lifecycle webhooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub external_accounts: Vec<ExternalAccount>,
}

impl IdentityUser {
    pub fn primary_email(&self) -> Option<&EmailAddress> {
        let primary = self.primary_email_address_id.as_deref()?;
        self.email_addresses.iter().find(|e| e.id == primary)
    }

    /// First and last name joined; `None` when both are blank.
    pub fn full_name(&self) -> Option<String> {
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    }

    /// `"first last"` when a first name exists, otherwise the username.
    pub fn display_name(&self) -> Option<String> {
        match self.first_name.as_deref().map(str::trim) {
            Some(first) if !first.is_empty() => {
                let last = self.last_name.as_deref().unwrap_or("");
                Some(format!("{first} {last}").trim().to_string())
            }
            _ => self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OauthAccessToken {
    pub token: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OauthAccessToken {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// User id behind a session token, `None` when the token is not a live session.
    async fn verify_session(&self, token: &str) -> Result<Option<String>, ToolkitError>;

    async fn get_user(&self, user_id: &str) -> Result<IdentityUser, ToolkitError>;

    async fn oauth_access_tokens(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<Vec<OauthAccessToken>, ToolkitError>;

    async fn delete_external_account(
        &self,
        user_id: &str,
        external_account_id: &str,
    ) -> Result<(), ToolkitError>;
}
