use serde::{Deserialize, Serialize};
use url::Url;

/// One OAuth application used by the legacy connect flow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OauthProviderConfig {
    /// Empty disables the provider's connect flow.
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    pub auth_url: Url,

    pub token_url: Url,

    /// Endpoint returning the connected account's profile, used for `provider_account_id`.
    pub userinfo_url: Url,

    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OauthProviderConfig {
    pub fn is_enabled(&self) -> bool {
        !self.client_id.trim().is_empty()
    }
}

/// OAuth apps keyed by provider name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OauthProvidersConfig {
    /// TOML: `[oauth.github]`.
    #[serde(default = "default_github")]
    pub github: OauthProviderConfig,

    /// TOML: `[oauth.google]`.
    #[serde(default = "default_google")]
    pub google: OauthProviderConfig,

    /// TOML: `[oauth.notion]`.
    #[serde(default = "default_notion")]
    pub notion: OauthProviderConfig,
}

impl Default for OauthProvidersConfig {
    fn default() -> Self {
        Self {
            github: default_github(),
            google: default_google(),
            notion: default_notion(),
        }
    }
}

fn url(s: &str) -> Url {
    Url::parse(s).expect("valid fixed OAuth url")
}

fn default_github() -> OauthProviderConfig {
    OauthProviderConfig {
        client_id: String::new(),
        client_secret: String::new(),
        auth_url: url("https://github.com/login/oauth/authorize"),
        token_url: url("https://github.com/login/oauth/access_token"),
        userinfo_url: url("https://api.github.com/user"),
        scopes: vec!["read:user".to_string(), "repo".to_string()],
    }
}

fn default_google() -> OauthProviderConfig {
    OauthProviderConfig {
        client_id: String::new(),
        client_secret: String::new(),
        auth_url: url("https://accounts.google.com/o/oauth2/v2/auth"),
        token_url: url("https://oauth2.googleapis.com/token"),
        userinfo_url: url("https://openidconnect.googleapis.com/v1/userinfo"),
        scopes: vec![
            "openid".to_string(),
            "email".to_string(),
            "https://www.googleapis.com/auth/calendar.readonly".to_string(),
            "https://www.googleapis.com/auth/drive.readonly".to_string(),
        ],
    }
}

fn default_notion() -> OauthProviderConfig {
    OauthProviderConfig {
        client_id: String::new(),
        client_secret: String::new(),
        auth_url: url("https://api.notion.com/v1/oauth/authorize"),
        token_url: url("https://api.notion.com/v1/oauth/token"),
        userinfo_url: url("https://api.notion.com/v1/users/me"),
        scopes: Vec::new(),
    }
}
