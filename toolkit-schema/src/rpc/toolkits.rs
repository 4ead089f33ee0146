use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolkitGroup {
    DataSource,
    KnowledgeBase,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Client-facing toolkit description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolkitInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub group: ToolkitGroup,
    pub required_connection: Option<String>,
    pub tools: Vec<ToolInfo>,
    pub available: bool,
}
