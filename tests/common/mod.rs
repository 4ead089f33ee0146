#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

use toolkit_dev::broker::{ConnectedAccount, ConnectionBroker, InitiatedConnection};
use toolkit_dev::config::Config;
use toolkit_dev::error::ToolkitError;
use toolkit_dev::identity::{
    EmailAddress, EmailVerification, IdentityProvider, IdentityUser, OauthAccessToken,
};
use toolkit_dev::server::router::{AppState, toolkit_router};

pub fn unique_sqlite_path(prefix: &str) -> std::path::PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "toolkit-{prefix}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    temp_path
}

/// Session tokens are `token-<user id>`.
pub fn bearer(user_id: &str) -> String {
    format!("Bearer token-{user_id}")
}

pub fn profile(id: &str, first: &str, email: &str) -> IdentityUser {
    IdentityUser {
        id: id.to_string(),
        first_name: Some(first.to_string()),
        last_name: Some("Tester".to_string()),
        username: Some(first.to_ascii_lowercase()),
        image_url: None,
        primary_email_address_id: Some(format!("idn_{id}")),
        email_addresses: vec![EmailAddress {
            id: format!("idn_{id}"),
            email_address: email.to_string(),
            verification: Some(EmailVerification {
                status: Some("verified".to_string()),
            }),
        }],
        external_accounts: Vec::new(),
    }
}

#[derive(Default)]
pub struct FakeIdentity {
    pub users: Mutex<HashMap<String, IdentityUser>>,
    pub tokens: Mutex<HashMap<(String, String), Vec<OauthAccessToken>>>,
    pub deleted_accounts: Mutex<Vec<(String, String)>>,
    pub get_user_calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn with_users(users: impl IntoIterator<Item = IdentityUser>) -> Self {
        let fake = Self::default();
        {
            let mut map = fake.users.lock().unwrap();
            for u in users {
                map.insert(u.id.clone(), u);
            }
        }
        fake
    }

    pub fn get_user_calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_session(&self, token: &str) -> Result<Option<String>, ToolkitError> {
        let user_id = token.strip_prefix("token-").map(str::to_string);
        Ok(user_id.filter(|id| self.users.lock().unwrap().contains_key(id)))
    }

    async fn get_user(&self, user_id: &str) -> Result<IdentityUser, ToolkitError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| ToolkitError::not_found("no such identity user"))
    }

    async fn oauth_access_tokens(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<Vec<OauthAccessToken>, ToolkitError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), provider_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_external_account(
        &self,
        user_id: &str,
        external_account_id: &str,
    ) -> Result<(), ToolkitError> {
        self.deleted_accounts
            .lock()
            .unwrap()
            .push((user_id.to_string(), external_account_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBroker {
    pub accounts: Mutex<Vec<ConnectedAccount>>,
    pub deleted: Mutex<Vec<String>>,
    pub redirect_url: Option<String>,
}

#[async_trait]
impl ConnectionBroker for FakeBroker {
    async fn initiate(
        &self,
        user_id: &str,
        auth_config_id: &str,
    ) -> Result<InitiatedConnection, ToolkitError> {
        let id = format!("ca_pending_{user_id}");
        self.accounts.lock().unwrap().push(ConnectedAccount {
            id: id.clone(),
            user_id: Some(user_id.to_string()),
            status: "INITIATED".to_string(),
            toolkit_slug: None,
            auth_config_id: Some(auth_config_id.to_string()),
        });
        Ok(InitiatedConnection {
            id,
            redirect_url: self.redirect_url.clone(),
        })
    }

    async fn list(&self, user_id: &str) -> Result<Vec<ConnectedAccount>, ToolkitError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<ConnectedAccount>, ToolkitError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn delete(&self, id: &str) -> Result<(), ToolkitError> {
        self.accounts.lock().unwrap().retain(|a| a.id != id);
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub identity: Arc<FakeIdentity>,
    pub broker: Arc<FakeBroker>,
    pub db: toolkit_dev::db::DbActorHandle,
    pub db_path: std::path::PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.identity.secret_key = "sk_test".to_string();
    cfg.identity.webhook_secret = "whsec_test".to_string();
    cfg.basic.insecure_cookie = true;
    cfg
}

pub async fn build_app(
    prefix: &str,
    cfg: Config,
    identity: FakeIdentity,
    broker: FakeBroker,
) -> TestApp {
    let db_path = unique_sqlite_path(prefix);
    let database_url = format!("sqlite:{}", db_path.display());
    let db = toolkit_dev::db::spawn(&database_url)
        .await
        .expect("db actor spawn");

    let identity = Arc::new(identity);
    let broker = Arc::new(broker);
    let state = AppState::with_integrations(
        Arc::new(cfg),
        db.clone(),
        reqwest::Client::new(),
        identity.clone(),
        broker.clone(),
    );

    TestApp {
        app: toolkit_router(state),
        identity,
        broker,
        db,
        db_path,
    }
}

impl TestApp {
    /// Calls `POST /api/trpc/<procedure>` as `user_id`.
    pub async fn rpc(&self, user_id: &str, procedure: &str, input: Value) -> (StatusCode, Value) {
        self.post_json(&format!("/api/trpc/{procedure}"), Some(user_id), input)
            .await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        user_id: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user_id) = user_id {
            req = req.header(header::AUTHORIZATION, bearer(user_id));
        }
        let req = req
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, user_id: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(user_id) = user_id {
            req = req.header(header::AUTHORIZATION, bearer(user_id));
        }
        self.send(req.body(Body::empty()).expect("failed to build request"))
            .await
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self
            .app
            .clone()
            .oneshot(req)
            .await
            .expect("request failed");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                json!({ "raw": String::from_utf8_lossy(&bytes).to_string() })
            })
        };
        (status, body)
    }
}

/// `result.data` of a successful RPC answer.
pub fn data(body: &Value) -> &Value {
    &body["result"]["data"]
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}

pub async fn spawn_test_server(app: Router) -> url::Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = url::Url::parse(&format!("http://{}", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

pub fn cookie_header_from_set_cookie_headers(headers: &axum::http::HeaderMap) -> String {
    let mut pairs: Vec<String> = Vec::new();
    for v in headers.get_all(header::SET_COOKIE).iter() {
        let s = v.to_str().expect("set-cookie header was not valid utf-8");
        let first = s.split(';').next().unwrap_or("");
        let mut parts = first.splitn(2, '=');
        let name = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("");
        if !name.trim().is_empty() && !value.is_empty() {
            pairs.push(format!("{}={}", name.trim(), value));
        }
    }
    pairs.join("; ")
}
