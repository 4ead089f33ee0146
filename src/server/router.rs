use crate::accounts::{AccountsService, LegacyOauth};
use crate::broker::{ConnectionBroker, HostedBrokerClient};
use crate::config::Config;
use crate::db::DbActorHandle;
use crate::error::ToolkitError;
use crate::identity::{HostedIdentityClient, IdentityProvider};
use crate::server::{routes, rpc};
use crate::toolkits::ToolkitContext;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, StatusCode, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
};
use axum_extra::extract::cookie::Key;
use base64::Engine as _;
use rand::RngCore;
use std::time::Instant;
use std::{sync::Arc, sync::LazyLock, time::Duration};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

/// Global cookie signing/encryption key for PrivateCookieJar.
static COOKIE_KEY: LazyLock<Key> = LazyLock::new(Key::generate);

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const USER_AGENT_VALUE: &str = concat!("toolkit-dev/", env!("CARGO_PKG_VERSION"));

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

/// Outbound client shared by every vendor integration.
pub fn build_http_client(proxy: Option<&url::Url>) -> Result<reqwest::Client, ToolkitError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT_VALUE)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60));

    if let Some(proxy_url) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }

    Ok(builder.build()?)
}

#[derive(Clone)]
pub struct AppState {
    pub db: DbActorHandle,
    pub identity: Arc<dyn IdentityProvider>,
    pub broker: Arc<dyn ConnectionBroker>,
    pub accounts: AccountsService,
    pub toolkits: ToolkitContext,
    pub legacy: LegacyOauth,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the hosted identity service and broker from configuration.
    pub fn new(config: Config, db: DbActorHandle) -> Result<Self, ToolkitError> {
        let http = build_http_client(config.basic.proxy.as_ref())?;
        let identity = Arc::new(HostedIdentityClient::new(http.clone(), &config.identity)?);
        let broker = Arc::new(HostedBrokerClient::new(http.clone(), &config.broker)?);
        Ok(Self::with_integrations(
            Arc::new(config),
            db,
            http,
            identity,
            broker,
        ))
    }

    /// Same as [`AppState::new`] with caller-supplied vendor seams.
    pub fn with_integrations(
        config: Arc<Config>,
        db: DbActorHandle,
        http: reqwest::Client,
        identity: Arc<dyn IdentityProvider>,
        broker: Arc<dyn ConnectionBroker>,
    ) -> Self {
        let legacy = LegacyOauth::new(
            http.clone(),
            config.oauth.clone(),
            config.basic.app_url.clone(),
            config.toolkits.notion_version.clone(),
        );
        let accounts = AccountsService::new(
            db.clone(),
            identity.clone(),
            legacy.clone(),
            config.features.external_accounts_enabled,
        );
        let toolkits = ToolkitContext {
            http,
            cfg: Arc::new(config.toolkits.clone()),
            tokens: accounts.tokens().clone(),
        };

        Self {
            db,
            identity,
            broker,
            accounts,
            toolkits,
            legacy,
            config,
        }
    }

    pub fn insecure_cookie(&self) -> bool {
        self.config.basic.insecure_cookie
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(_state: &AppState) -> Self {
        COOKIE_KEY.clone()
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    let protocol = format_http_version(version);

    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

pub fn toolkit_router(state: AppState) -> Router {
    let body_limit = state.config.basic.body_limit_bytes;

    Router::new()
        .merge(rpc::router())
        .merge(routes::connections::router())
        .merge(routes::oauth::router())
        .merge(routes::webhooks::router())
        .merge(routes::mcp::router())
        .fallback(not_found_handler)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::from_fn(access_log))
}
