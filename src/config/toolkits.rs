use serde::{Deserialize, Serialize};
use url::Url;

/// Upstream endpoints and API keys used by toolkit tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolkitsConfig {
    /// TOML: `toolkits.github_api_url`. Default: `https://api.github.com`.
    #[serde(default = "default_github_api_url")]
    pub github_api_url: Url,

    /// TOML: `toolkits.google_calendar_api_url`.
    #[serde(default = "default_google_calendar_api_url")]
    pub google_calendar_api_url: Url,

    /// TOML: `toolkits.google_drive_api_url`.
    #[serde(default = "default_google_drive_api_url")]
    pub google_drive_api_url: Url,

    /// TOML: `toolkits.notion_api_url`.
    #[serde(default = "default_notion_api_url")]
    pub notion_api_url: Url,

    /// Value of the `Notion-Version` header.
    /// TOML: `toolkits.notion_version`. Default: `2022-06-28`.
    #[serde(default = "default_notion_version")]
    pub notion_version: String,

    /// TOML: `toolkits.exa_api_url`.
    #[serde(default = "default_exa_api_url")]
    pub exa_api_url: Url,

    /// Web search is disabled when unset.
    /// TOML: `toolkits.exa_api_key`.
    #[serde(default)]
    pub exa_api_key: Option<String>,

    /// TOML: `toolkits.mem0_api_url`.
    #[serde(default = "default_mem0_api_url")]
    pub mem0_api_url: Url,

    /// Memory is disabled when unset.
    /// TOML: `toolkits.mem0_api_key`.
    #[serde(default)]
    pub mem0_api_key: Option<String>,

    /// Upper bound on characters returned by the Drive `read_file` tool.
    /// TOML: `toolkits.read_file_max_chars`. Default: `20000`.
    #[serde(default = "default_read_file_max_chars")]
    pub read_file_max_chars: usize,
}

impl Default for ToolkitsConfig {
    fn default() -> Self {
        Self {
            github_api_url: default_github_api_url(),
            google_calendar_api_url: default_google_calendar_api_url(),
            google_drive_api_url: default_google_drive_api_url(),
            notion_api_url: default_notion_api_url(),
            notion_version: default_notion_version(),
            exa_api_url: default_exa_api_url(),
            exa_api_key: None,
            mem0_api_url: default_mem0_api_url(),
            mem0_api_key: None,
            read_file_max_chars: default_read_file_max_chars(),
        }
    }
}

impl ToolkitsConfig {
    pub fn exa_key(&self) -> Option<&str> {
        non_empty(self.exa_api_key.as_deref())
    }

    pub fn mem0_key(&self) -> Option<&str> {
        non_empty(self.mem0_api_key.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn default_github_api_url() -> Url {
    Url::parse("https://api.github.com").expect("valid github api url")
}

fn default_google_calendar_api_url() -> Url {
    Url::parse("https://www.googleapis.com/calendar/v3").expect("valid calendar api url")
}

fn default_google_drive_api_url() -> Url {
    Url::parse("https://www.googleapis.com/drive/v3").expect("valid drive api url")
}

fn default_notion_api_url() -> Url {
    Url::parse("https://api.notion.com/v1").expect("valid notion api url")
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}

fn default_exa_api_url() -> Url {
    Url::parse("https://api.exa.ai").expect("valid exa api url")
}

fn default_mem0_api_url() -> Url {
    Url::parse("https://api.mem0.ai").expect("valid mem0 api url")
}

fn default_read_file_max_chars() -> usize {
    20_000
}
