use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{ConnectedAccount, ConnectionBroker, InitiatedConnection};
use crate::config::BrokerConfig;
use crate::error::ToolkitError;
use crate::upstream::{endpoint, ensure_success, read_json, send_with_retry};
use crate::utils::logging::with_pretty_json_debug;

const SERVICE: &str = "Broker";
const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

#[derive(Clone)]
pub struct HostedBrokerClient {
    http: reqwest::Client,
    api_url: Url,
    headers: HeaderMap,
}

#[derive(Debug, Deserialize)]
struct SlugRef {
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConnectedAccount {
    id: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    toolkit: Option<SlugRef>,
    #[serde(default, alias = "authConfig")]
    auth_config: Option<IdRef>,
}

impl From<RawConnectedAccount> for ConnectedAccount {
    fn from(raw: RawConnectedAccount) -> Self {
        ConnectedAccount {
            id: raw.id,
            user_id: raw.user_id,
            status: raw.status,
            toolkit_slug: raw.toolkit.and_then(|t| t.slug),
            auth_config_id: raw.auth_config.and_then(|a| a.id),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Bare(Vec<RawConnectedAccount>),
    Items { items: Vec<RawConnectedAccount> },
}

#[derive(Debug, Deserialize)]
struct RawInitiated {
    id: String,
    #[serde(default, alias = "redirectUrl")]
    redirect_url: Option<String>,
}

impl HostedBrokerClient {
    pub fn new(http: reqwest::Client, cfg: &BrokerConfig) -> Result<Self, ToolkitError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&cfg.api_key)
            .map_err(|_| ToolkitError::Internal("broker api key is not a valid header".into()))?;
        headers.insert(X_API_KEY, key);
        Ok(Self {
            http,
            api_url: cfg.api_url.clone(),
            headers,
        })
    }
}

#[async_trait]
impl ConnectionBroker for HostedBrokerClient {
    async fn initiate(
        &self,
        user_id: &str,
        auth_config_id: &str,
    ) -> Result<InitiatedConnection, ToolkitError> {
        let url = endpoint(&self.api_url, &["connected_accounts"])?;
        let body = json!({
            "auth_config": { "id": auth_config_id },
            "connection": { "user_id": user_id },
        });
        with_pretty_json_debug(&body, |pretty| {
            tracing::debug!(body = %pretty, "broker initiate request");
        });

        let resp = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await?;
        let raw: RawInitiated = read_json(SERVICE, resp).await?;
        Ok(InitiatedConnection {
            id: raw.id,
            redirect_url: raw.redirect_url.filter(|u| !u.is_empty()),
        })
    }

    async fn list(&self, user_id: &str) -> Result<Vec<ConnectedAccount>, ToolkitError> {
        let mut url = endpoint(&self.api_url, &["connected_accounts"])?;
        url.query_pairs_mut().append_pair("user_ids", user_id);

        let resp = send_with_retry(SERVICE, || {
            self.http.get(url.clone()).headers(self.headers.clone())
        })
        .await?;
        let listing: Listing = read_json(SERVICE, resp).await?;
        let items = match listing {
            Listing::Bare(items) | Listing::Items { items } => items,
        };
        Ok(items.into_iter().map(ConnectedAccount::from).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<ConnectedAccount>, ToolkitError> {
        let url = endpoint(&self.api_url, &["connected_accounts", id])?;
        let resp = send_with_retry(SERVICE, || {
            self.http.get(url.clone()).headers(self.headers.clone())
        })
        .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawConnectedAccount = read_json(SERVICE, resp).await?;
        Ok(Some(raw.into()))
    }

    async fn delete(&self, id: &str) -> Result<(), ToolkitError> {
        let url = endpoint(&self.api_url, &["connected_accounts", id])?;
        let resp = send_with_retry(SERVICE, || {
            self.http.delete(url.clone()).headers(self.headers.clone())
        })
        .await?;
        ensure_success(SERVICE, resp).await?;
        Ok(())
    }
}
