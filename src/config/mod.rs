mod basic;
mod integrations;
mod oauth;
mod toolkits;

pub use basic::BasicConfig;
pub use integrations::{BrokerConfig, FeaturesConfig, IdentityConfig};
pub use oauth::{OauthProviderConfig, OauthProvidersConfig};
pub use toolkits::ToolkitsConfig;

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::LazyLock};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Hosted identity service (see `identity` table).
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Hosted connected-accounts broker (see `broker` table).
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Feature flags (see `features` table).
    #[serde(default)]
    pub features: FeaturesConfig,

    /// OAuth apps for the legacy account-connection path (see `oauth` table).
    #[serde(default)]
    pub oauth: OauthProvidersConfig,

    /// Toolkit upstreams and API keys (see `toolkits` table).
    #[serde(default)]
    pub toolkits: ToolkitsConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";

impl Config {
    /// Builds a Figment that merges defaults and a config TOML file.
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        }
    }

    /// Loads configuration by merging defaults and `config.toml` if present.
    ///
    /// Does not validate required fields such as `identity.secret_key`.
    pub fn from_optional_toml() -> Self {
        Self::figment().extract().unwrap_or_else(|err| {
            panic!("failed to extract configuration (defaults + optional config.toml): {err}")
        })
    }

    /// Loads configuration from the TOML file (with defaults) and validates required fields.
    pub fn from_toml() -> Self {
        if !PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            panic!("config file not found: {}", DEFAULT_CONFIG_FILE);
        }
        let cfg: Self = Self::figment().extract().unwrap_or_else(|err| {
            panic!(
                "failed to extract configuration from {}: {err}",
                DEFAULT_CONFIG_FILE
            )
        });
        if let Err(msg) = cfg.validate() {
            panic!("{msg}");
        }
        cfg
    }

    /// Checks the fields the server cannot run without.
    pub fn validate(&self) -> Result<(), String> {
        if self.identity.secret_key.trim().is_empty() {
            return Err("identity.secret_key must be set and non-empty".to_string());
        }
        if self.basic.database_url.trim().is_empty() {
            return Err("basic.database_url must be set and non-empty".to_string());
        }
        Ok(())
    }
}

/// Global, lazily-initialized configuration instance.
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::from_optional_toml);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_except_for_secret_key() {
        let cfg = Config::default();
        assert_eq!(cfg.basic.listen_port, 3000);
        assert!(cfg.features.external_accounts_enabled);
        assert_eq!(cfg.broker.supported_services, vec!["google_calendar"]);
        assert!(cfg.validate().is_err());

        let mut cfg = cfg;
        cfg.identity.secret_key = "sk_test".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(
                r#"
                [basic]
                listen_port = 9000

                [features]
                external_accounts_enabled = false
                admin_emails = ["root@example.com"]

                [broker.auth_configs]
                google_calendar = "ac_123"
                "#,
            ));
        let cfg: Config = figment.extract().expect("valid config");
        assert_eq!(cfg.basic.listen_port, 9000);
        assert!(!cfg.features.external_accounts_enabled);
        assert_eq!(cfg.features.admin_emails, vec!["root@example.com"]);
        assert_eq!(
            cfg.broker.auth_configs.get("google_calendar").map(String::as_str),
            Some("ac_123")
        );
        assert_eq!(cfg.basic.database_url, "sqlite://toolkit.db");
    }
}
