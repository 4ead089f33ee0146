use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::{IdentityProvider, IdentityUser, OauthAccessToken};
use crate::config::IdentityConfig;
use crate::error::ToolkitError;
use crate::upstream::{endpoint, ensure_success, read_json, send_with_retry};
use crate::utils::jwt::jwt_string_claim;

const SERVICE: &str = "Identity";

/// Backend API client of the hosted identity service.
#[derive(Clone)]
pub struct HostedIdentityClient {
    http: reqwest::Client,
    api_url: Url,
    headers: HeaderMap,
}

#[derive(Debug, Deserialize)]
struct VerifiedSession {
    user_id: String,
    #[serde(default)]
    status: Option<String>,
}

/// Token listings come either bare or wrapped in `{"data": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenListing {
    Bare(Vec<OauthAccessToken>),
    Wrapped { data: Vec<OauthAccessToken> },
}

impl HostedIdentityClient {
    pub fn new(http: reqwest::Client, cfg: &IdentityConfig) -> Result<Self, ToolkitError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", cfg.secret_key))
            .map_err(|_| ToolkitError::Internal("identity secret key is not a valid header".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(Self {
            http,
            api_url: cfg.api_url.clone(),
            headers,
        })
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentityClient {
    async fn verify_session(&self, token: &str) -> Result<Option<String>, ToolkitError> {
        let Some(session_id) = jwt_string_claim(token, "sid") else {
            debug!("session token carries no sid claim");
            return Ok(None);
        };

        let url = endpoint(&self.api_url, &["sessions", &session_id, "verify"])?;
        let resp = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .json(&json!({ "token": token }))
            .send()
            .await?;

        if resp.status().is_client_error() {
            debug!(status = %resp.status(), "identity service rejected session");
            return Ok(None);
        }

        let session: VerifiedSession = read_json(SERVICE, resp).await?;
        match session.status.as_deref() {
            None | Some("active") => Ok(Some(session.user_id)),
            Some(other) => {
                debug!(status = other, "session is not active");
                Ok(None)
            }
        }
    }

    async fn get_user(&self, user_id: &str) -> Result<IdentityUser, ToolkitError> {
        let url = endpoint(&self.api_url, &["users", user_id])?;
        let resp = send_with_retry(SERVICE, || {
            self.http.get(url.clone()).headers(self.headers.clone())
        })
        .await?;
        read_json(SERVICE, resp).await
    }

    async fn oauth_access_tokens(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<Vec<OauthAccessToken>, ToolkitError> {
        let url = endpoint(
            &self.api_url,
            &["users", user_id, "oauth_access_tokens", provider_id],
        )?;
        let resp = send_with_retry(SERVICE, || {
            self.http.get(url.clone()).headers(self.headers.clone())
        })
        .await?;
        let listing: TokenListing = read_json(SERVICE, resp).await?;
        Ok(match listing {
            TokenListing::Bare(tokens) | TokenListing::Wrapped { data: tokens } => tokens,
        })
    }

    async fn delete_external_account(
        &self,
        user_id: &str,
        external_account_id: &str,
    ) -> Result<(), ToolkitError> {
        let url = endpoint(
            &self.api_url,
            &["users", user_id, "external_accounts", external_account_id],
        )?;
        let resp = send_with_retry(SERVICE, || {
            self.http.delete(url.clone()).headers(self.headers.clone())
        })
        .await?;
        if let Err(e) = ensure_success(SERVICE, resp).await {
            warn!(user_id, external_account_id, error = %e, "external account deletion failed");
            return Err(e);
        }
        Ok(())
    }
}
