//! Toolkit registry. Each [`ToolkitId`] yields a client-facing description
//! and a server initializer producing the tools the model may call.

mod github;
mod google_calendar;
mod google_drive;
mod http;
mod memory;
mod notion;
mod web_search;

pub use http::{ApiAuth, ApiClient};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use toolkit_schema::rpc::toolkits::{ToolInfo, ToolkitGroup, ToolkitInfo};
use tracing::debug;

use crate::accounts::TokenSource;
use crate::config::ToolkitsConfig;
use crate::error::ToolkitError;

const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolkitId {
    Github,
    GoogleCalendar,
    GoogleDrive,
    Notion,
    WebSearch,
    Memory,
}

impl ToolkitId {
    pub const ALL: [ToolkitId; 6] = [
        ToolkitId::Github,
        ToolkitId::GoogleCalendar,
        ToolkitId::GoogleDrive,
        ToolkitId::Notion,
        ToolkitId::WebSearch,
        ToolkitId::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolkitId::Github => "github",
            ToolkitId::GoogleCalendar => "google-calendar",
            ToolkitId::GoogleDrive => "google-drive",
            ToolkitId::Notion => "notion",
            ToolkitId::WebSearch => "web-search",
            ToolkitId::Memory => "memory",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolkitId::Github => "GitHub",
            ToolkitId::GoogleCalendar => "Google Calendar",
            ToolkitId::GoogleDrive => "Google Drive",
            ToolkitId::Notion => "Notion",
            ToolkitId::WebSearch => "Web Search",
            ToolkitId::Memory => "Memory",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolkitId::Github => "Find and analyze repositories, users, and organizations",
            ToolkitId::GoogleCalendar => "Read calendars and look up events",
            ToolkitId::GoogleDrive => "Search and read files in Google Drive",
            ToolkitId::Notion => "Query and edit Notion pages and databases",
            ToolkitId::WebSearch => "Search the web for up-to-date information",
            ToolkitId::Memory => "Store and recall facts about the user across chats",
        }
    }

    pub fn group(&self) -> ToolkitGroup {
        match self {
            ToolkitId::Memory => ToolkitGroup::KnowledgeBase,
            _ => ToolkitGroup::DataSource,
        }
    }

    /// OAuth provider whose token the toolkit runs on.
    pub fn required_connection(&self) -> Option<&'static str> {
        match self {
            ToolkitId::Github => Some("github"),
            ToolkitId::GoogleCalendar | ToolkitId::GoogleDrive => Some("google"),
            ToolkitId::Notion => Some("notion"),
            ToolkitId::WebSearch | ToolkitId::Memory => None,
        }
    }

    fn required_scope(&self) -> Option<&'static str> {
        match self {
            ToolkitId::GoogleDrive => Some(DRIVE_READONLY_SCOPE),
            _ => None,
        }
    }

    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        match self {
            ToolkitId::Github => github::tools(),
            ToolkitId::GoogleCalendar => google_calendar::tools(),
            ToolkitId::GoogleDrive => google_drive::tools(),
            ToolkitId::Notion => notion::tools(),
            ToolkitId::WebSearch => web_search::tools(),
            ToolkitId::Memory => memory::tools(),
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            ToolkitId::Github => github::SYSTEM_PROMPT,
            ToolkitId::GoogleCalendar => google_calendar::SYSTEM_PROMPT,
            ToolkitId::GoogleDrive => google_drive::SYSTEM_PROMPT,
            ToolkitId::Notion => notion::SYSTEM_PROMPT,
            ToolkitId::WebSearch => web_search::SYSTEM_PROMPT,
            ToolkitId::Memory => memory::SYSTEM_PROMPT,
        }
    }

    /// Client config; `available` is filled in by the caller.
    pub fn client_config(&self, available: bool) -> ToolkitInfo {
        ToolkitInfo {
            id: self.as_str().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            group: self.group(),
            required_connection: self.required_connection().map(str::to_string),
            tools: self
                .tool_specs()
                .into_iter()
                .map(|t| ToolInfo {
                    name: t.name.to_string(),
                    description: t.description.to_string(),
                })
                .collect(),
            available,
        }
    }
}

impl fmt::Display for ToolkitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolkitId {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolkitId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ToolkitError::BadRequest(format!("Unknown toolkit: {s}")))
    }
}

/// Tool name, description and JSON Schema of its arguments.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Initialized tools of one toolkit, bound to one user's credentials.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn specs(&self) -> Vec<ToolSpec>;

    async fn call(&self, name: &str, args: Value) -> Result<Value, ToolkitError>;
}

/// Shared dependencies of toolkit initialization.
#[derive(Clone)]
pub struct ToolkitContext {
    pub http: reqwest::Client,
    pub cfg: Arc<ToolkitsConfig>,
    pub tokens: TokenSource,
}

impl ToolkitContext {
    /// Whether [`ToolkitContext::initialize`] would currently succeed for `user_id`.
    pub async fn is_available(&self, id: ToolkitId, user_id: &str) -> bool {
        match id {
            ToolkitId::WebSearch => self.cfg.exa_key().is_some(),
            ToolkitId::Memory => self.cfg.mem0_key().is_some(),
            other => match other.required_connection() {
                Some(provider) => {
                    self.tokens
                        .has_token(user_id, provider, other.required_scope())
                        .await
                }
                None => true,
            },
        }
    }

    /// Builds the toolkit's tools for `user_id`. `None` means the toolkit is
    /// disabled on this deployment (missing API key).
    pub async fn initialize(
        &self,
        id: ToolkitId,
        user_id: &str,
        params: &Value,
    ) -> Result<Option<Box<dyn ToolExecutor>>, ToolkitError> {
        debug!(toolkit = %id, user_id, params = %params, "initializing toolkit");
        let cfg = &self.cfg;
        let executor: Box<dyn ToolExecutor> = match id {
            ToolkitId::WebSearch => {
                let Some(key) = cfg.exa_key() else {
                    return Ok(None);
                };
                Box::new(web_search::WebSearchTools::new(ApiClient::new(
                    "Exa",
                    self.http.clone(),
                    cfg.exa_api_url.clone(),
                    ApiAuth::Header("x-api-key", key.to_string()),
                )))
            }
            ToolkitId::Memory => {
                let Some(key) = cfg.mem0_key() else {
                    return Ok(None);
                };
                Box::new(memory::MemoryTools::new(
                    ApiClient::new(
                        "Mem0",
                        self.http.clone(),
                        cfg.mem0_api_url.clone(),
                        ApiAuth::Token(key.to_string()),
                    ),
                    user_id.to_string(),
                ))
            }
            ToolkitId::Github => {
                let token = self.oauth_token(id, user_id).await?;
                Box::new(github::GithubTools::new(ApiClient::new(
                    "GitHub",
                    self.http.clone(),
                    cfg.github_api_url.clone(),
                    ApiAuth::Bearer(token),
                )))
            }
            ToolkitId::GoogleCalendar => {
                let token = self.oauth_token(id, user_id).await?;
                Box::new(google_calendar::CalendarTools::new(ApiClient::new(
                    "Google Calendar",
                    self.http.clone(),
                    cfg.google_calendar_api_url.clone(),
                    ApiAuth::Bearer(token),
                )))
            }
            ToolkitId::GoogleDrive => {
                let token = self.oauth_token(id, user_id).await?;
                Box::new(google_drive::DriveTools::new(
                    ApiClient::new(
                        "Google Drive",
                        self.http.clone(),
                        cfg.google_drive_api_url.clone(),
                        ApiAuth::Bearer(token),
                    ),
                    cfg.read_file_max_chars,
                ))
            }
            ToolkitId::Notion => {
                let token = self.oauth_token(id, user_id).await?;
                let api = ApiClient::new(
                    "Notion",
                    self.http.clone(),
                    cfg.notion_api_url.clone(),
                    ApiAuth::Bearer(token),
                )
                .with_header("notion-version", &cfg.notion_version)?;
                Box::new(notion::NotionTools::new(api))
            }
        };
        Ok(Some(executor))
    }

    async fn oauth_token(&self, id: ToolkitId, user_id: &str) -> Result<String, ToolkitError> {
        let provider = id
            .required_connection()
            .ok_or_else(|| ToolkitError::Internal(format!("{id} needs no OAuth connection")))?;
        self.tokens
            .access_token(user_id, provider, id.required_scope())
            .await
    }
}

/// Decodes tool arguments, rejecting malformed input as `BAD_REQUEST`.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolkitError> {
    serde_json::from_value(args)
        .map_err(|e| ToolkitError::BadRequest(format!("Invalid arguments for {tool}: {e}")))
}

pub(crate) fn unknown_tool(toolkit: ToolkitId, name: &str) -> ToolkitError {
    ToolkitError::NotFound(format!("Unknown tool {name} in toolkit {toolkit}"))
}
