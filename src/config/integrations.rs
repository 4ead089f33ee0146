use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

/// Hosted identity service (session verification, user profiles, external accounts).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Backend API base URL.
    /// TOML: `identity.api_url`. Default: `https://api.clerk.com/v1`.
    #[serde(default = "default_identity_api_url")]
    pub api_url: Url,

    /// Backend secret key (required, non-empty).
    /// TOML: `identity.secret_key`.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub secret_key: String,

    /// Shared secret the identity service presents when delivering lifecycle webhooks.
    /// Empty disables the webhook receiver (every delivery is rejected).
    /// TOML: `identity.webhook_secret`.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub webhook_secret: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_url: default_identity_api_url(),
            secret_key: String::new(),
            webhook_secret: String::new(),
        }
    }
}

/// Hosted connected-accounts broker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// TOML: `broker.api_url`. Default: `https://backend.composio.dev/api/v3`.
    #[serde(default = "default_broker_api_url")]
    pub api_url: Url,

    /// TOML: `broker.api_key`. Empty means the broker routes answer with a configuration error.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub api_key: String,

    /// Services a user may connect through the broker (lowercase).
    /// TOML: `broker.supported_services`. Default: `["google_calendar"]`.
    #[serde(default = "default_supported_services")]
    pub supported_services: Vec<String>,

    /// Service name to broker auth-config id.
    /// TOML: `[broker.auth_configs]`.
    #[serde(default)]
    pub auth_configs: HashMap<String, String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_url: default_broker_api_url(),
            api_key: String::new(),
            supported_services: default_supported_services(),
            auth_configs: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    /// `true`: connected accounts live on the identity service.
    /// `false`: legacy local `account` table filled by this server's OAuth flow.
    /// TOML: `features.external_accounts_enabled`. Default: `true`.
    #[serde(default = "default_true")]
    pub external_accounts_enabled: bool,

    /// Emails granted admin access.
    /// TOML: `features.admin_emails`.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            external_accounts_enabled: true,
            admin_emails: Vec::new(),
        }
    }
}

fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("expected a string or a number")),
    }
}

fn default_identity_api_url() -> Url {
    Url::parse("https://api.clerk.com/v1").expect("valid identity api url")
}

fn default_broker_api_url() -> Url {
    Url::parse("https://backend.composio.dev/api/v3").expect("valid broker api url")
}

fn default_supported_services() -> Vec<String> {
    vec!["google_calendar".to_string()]
}

fn default_true() -> bool {
    true
}
