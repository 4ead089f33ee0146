//! Legacy account path: this server runs the OAuth authorization-code + PKCE
//! flow itself and stores tokens in the local `accounts` table.

use chrono::{Duration, Utc};
use oauth2::{
    AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    TokenResponse,
};
use reqwest::header::{ACCEPT, HeaderName, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::info;
use url::Url;

use crate::config::{OauthProviderConfig, OauthProvidersConfig};
use crate::db::{AccountPatch, DbAccount, DbActorHandle, EntityPatch, NewAccount};
use crate::error::{OauthError, ToolkitError};
use crate::oauth_utils::{
    OauthTokenResponse, StandardOauth2Client, build_authorize_url, build_oauth2_client,
    exchange_authorization_code, refresh_access_token,
};
use crate::upstream::{read_json, send_with_retry};

const NOTION_VERSION: HeaderName = HeaderName::from_static("notion-version");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyProvider {
    Github,
    Google,
    Notion,
}

impl LegacyProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyProvider::Github => "github",
            LegacyProvider::Google => "google",
            LegacyProvider::Notion => "notion",
        }
    }

    fn service(&self) -> &'static str {
        match self {
            LegacyProvider::Github => "GitHub",
            LegacyProvider::Google => "Google",
            LegacyProvider::Notion => "Notion",
        }
    }
}

impl fmt::Display for LegacyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LegacyProvider {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(LegacyProvider::Github),
            "google" => Ok(LegacyProvider::Google),
            "notion" => Ok(LegacyProvider::Notion),
            other => Err(ToolkitError::NotFound(format!(
                "Unknown OAuth provider: {other}"
            ))),
        }
    }
}

/// Redirect target and the secrets the browser must carry back to the callback.
pub struct AuthorizationStart {
    pub url: Url,
    pub csrf_token: CsrfToken,
    pub pkce_verifier: PkceCodeVerifier,
}

#[derive(Clone)]
pub struct LegacyOauth {
    http: reqwest::Client,
    providers: OauthProvidersConfig,
    app_url: Url,
    notion_version: String,
}

impl LegacyOauth {
    pub fn new(
        http: reqwest::Client,
        providers: OauthProvidersConfig,
        app_url: Url,
        notion_version: String,
    ) -> Self {
        Self {
            http,
            providers,
            app_url,
            notion_version,
        }
    }

    fn provider_cfg(&self, provider: LegacyProvider) -> Result<&OauthProviderConfig, ToolkitError> {
        let cfg = match provider {
            LegacyProvider::Github => &self.providers.github,
            LegacyProvider::Google => &self.providers.google,
            LegacyProvider::Notion => &self.providers.notion,
        };
        if !cfg.is_enabled() {
            return Err(ToolkitError::NotFound(format!(
                "OAuth provider {provider} is not configured"
            )));
        }
        Ok(cfg)
    }

    /// `<app_url>/api/oauth/<provider>/callback`
    pub fn redirect_url(&self, provider: LegacyProvider) -> Result<RedirectUrl, ToolkitError> {
        let url = crate::upstream::endpoint(
            &self.app_url,
            &["api", "oauth", provider.as_str(), "callback"],
        )?;
        Ok(RedirectUrl::from_url(url))
    }

    fn client(&self, provider: LegacyProvider) -> Result<StandardOauth2Client, ToolkitError> {
        build_oauth2_client(self.provider_cfg(provider)?, self.redirect_url(provider)?)
    }

    pub fn authorize(&self, provider: LegacyProvider) -> Result<AuthorizationStart, ToolkitError> {
        let cfg = self.provider_cfg(provider)?;
        let client = self.client(provider)?;
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf_token) = build_authorize_url(&client, cfg, challenge);
        Ok(AuthorizationStart {
            url,
            csrf_token,
            pkce_verifier: verifier,
        })
    }

    /// Exchanges the code, resolves the provider-side account id and stores the account.
    pub async fn complete(
        &self,
        db: &DbActorHandle,
        provider: LegacyProvider,
        user_id: &str,
        code: &str,
        verifier: PkceCodeVerifier,
    ) -> Result<DbAccount, ToolkitError> {
        let client = self.client(provider)?;
        let token = exchange_authorization_code(
            &client,
            AuthorizationCode::new(code.to_string()),
            verifier,
            &self.http,
        )
        .await
        .map_err(|e| OauthError::Flow {
            code: "TOKEN_EXCHANGE_FAILED".to_string(),
            message: format!("Token exchange failed: {e}"),
            details: None,
        })?;

        let access_token = token.access_token().secret().to_string();
        let provider_account_id = self.fetch_account_id(provider, &access_token).await?;
        let scope = scope_string(&token).or_else(|| {
            let cfg_scopes = &self.provider_cfg(provider).ok()?.scopes;
            (!cfg_scopes.is_empty()).then(|| cfg_scopes.join(" "))
        });

        let account = db
            .upsert_account(NewAccount {
                user_id: user_id.to_string(),
                provider: provider.as_str().to_string(),
                provider_account_id,
                access_token: Some(access_token),
                refresh_token: token.refresh_token().map(|t| t.secret().to_string()),
                expires_at: expiry_of(&token),
                scope,
            })
            .await?;
        info!(user_id, provider = %provider, account_id = %account.id, "legacy OAuth account linked");
        Ok(account)
    }

    /// Refreshes an expired account's access token and persists the result.
    pub async fn refresh(
        &self,
        db: &DbActorHandle,
        account: &DbAccount,
    ) -> Result<String, ToolkitError> {
        let provider: LegacyProvider = account.provider.parse()?;
        let refresh_token = account.refresh_token.as_deref().ok_or_else(|| {
            ToolkitError::NotFound(format!(
                "{} OAuth token expired and cannot be refreshed",
                provider.service()
            ))
        })?;

        let client = self.client(provider)?;
        let token = refresh_access_token(&client, refresh_token, &self.http).await?;
        let access_token = token.access_token().secret().to_string();

        db.patch(EntityPatch::Account {
            id: account.id.clone(),
            patch: AccountPatch {
                access_token: Some(access_token.clone()),
                refresh_token: token.refresh_token().map(|t| t.secret().to_string()),
                expires_at: expiry_of(&token),
                scope: scope_string(&token),
            },
        })
        .await?;
        info!(account_id = %account.id, provider = %provider, "legacy OAuth token refreshed");
        Ok(access_token)
    }

    async fn fetch_account_id(
        &self,
        provider: LegacyProvider,
        access_token: &str,
    ) -> Result<String, ToolkitError> {
        let cfg = self.provider_cfg(provider)?;
        let service = provider.service();
        let resp = send_with_retry(service, || {
            let mut req = self
                .http
                .get(cfg.userinfo_url.clone())
                .bearer_auth(access_token)
                .header(ACCEPT, "application/json");
            if provider == LegacyProvider::Notion {
                if let Ok(v) = HeaderValue::from_str(&self.notion_version) {
                    req = req.header(NOTION_VERSION, v);
                }
            }
            req
        })
        .await?;
        let profile: Value = read_json(service, resp).await?;
        account_id_from_profile(&profile).ok_or_else(|| {
            OauthError::Flow {
                code: "MISSING_ACCOUNT_ID".to_string(),
                message: format!("{service} profile did not include an account id"),
                details: None,
            }
            .into()
        })
    }
}

/// `sub` (OpenID) or `id` (string or number) of a provider profile.
fn account_id_from_profile(profile: &Value) -> Option<String> {
    ["sub", "id"].iter().find_map(|key| match profile.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn scope_string(token: &OauthTokenResponse) -> Option<String> {
    let scopes = token.scopes()?;
    let joined = scopes
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn expiry_of(token: &OauthTokenResponse) -> Option<chrono::DateTime<Utc>> {
    let secs = token.expires_in()?.as_secs();
    Some(Utc::now() + Duration::seconds(i64::try_from(secs).ok()?))
}
