use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use url::Url;

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// HTTP server listen address (e.g., "0.0.0.0", "127.0.0.1").
    /// TOML: `basic.listen_addr`. Default: `0.0.0.0`.
    #[serde(default = "default_listen_ip")]
    pub listen_addr: IpAddr,

    /// HTTP server listen port.
    /// TOML: `basic.listen_port`. Default: `3000`.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Database URL for SQLite.
    /// TOML: `basic.database_url`. Default: `sqlite://toolkit.db`.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Public base URL of this deployment, used to build OAuth callback URLs.
    /// TOML: `basic.app_url`. Default: `http://localhost:3000`.
    #[serde(default = "default_app_url")]
    pub app_url: Url,

    /// Drop the `Secure` attribute from OAuth cookies (plain-HTTP local development).
    /// TOML: `basic.insecure_cookie`. Default: `false`.
    #[serde(default)]
    pub insecure_cookie: bool,

    /// Optional outbound HTTP proxy used by every reqwest client.
    /// TOML: `basic.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Maximum accepted request body size in bytes.
    /// TOML: `basic.body_limit_bytes`. Default: `1048576`.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_ip(),
            listen_port: default_listen_port(),
            database_url: default_database_url(),
            loglevel: default_loglevel(),
            app_url: default_app_url(),
            insecure_cookie: false,
            proxy: None,
            body_limit_bytes: default_body_limit(),
        }
    }
}

fn default_listen_ip() -> IpAddr {
    Ipv4Addr::new(0, 0, 0, 0).into()
}

fn default_listen_port() -> u16 {
    3000
}

fn default_database_url() -> String {
    "sqlite://toolkit.db".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_app_url() -> Url {
    Url::parse("http://localhost:3000").expect("valid default app url")
}

fn default_body_limit() -> usize {
    1024 * 1024
}
