use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiClient, ToolExecutor, ToolSpec, ToolkitId, parse_args, unknown_tool};
use crate::error::ToolkitError;

pub(crate) const SYSTEM_PROMPT: &str = "You have a long-term memory about the user. \
Search it when earlier context could help, and add a memory when the user shares a durable \
preference or fact about themselves. Do not store secrets.";

pub(crate) fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "add_memory",
            description: "Remember a fact or preference about the user",
            input_schema: json!({
                "type": "object",
                "properties": { "content": { "type": "string" } },
                "required": ["content"]
            }),
        },
        ToolSpec {
            name: "search_memories",
            description: "Search what is remembered about the user",
            input_schema: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        },
    ]
}

#[derive(Debug, Deserialize)]
struct AddArgs {
    content: String,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

/// Memory tools scoped to one user; the model never chooses the user id.
pub(crate) struct MemoryTools {
    api: ApiClient,
    user_id: String,
}

impl MemoryTools {
    pub(crate) fn new(api: ApiClient, user_id: String) -> Self {
        Self { api, user_id }
    }
}

#[async_trait]
impl ToolExecutor for MemoryTools {
    fn specs(&self) -> Vec<ToolSpec> {
        tools()
    }

    async fn call(&self, name: &str, args: Value) -> Result<Value, ToolkitError> {
        match name {
            "add_memory" => {
                let args: AddArgs = parse_args(name, args)?;
                if args.content.trim().is_empty() {
                    return Err(ToolkitError::bad_request("add_memory requires content"));
                }
                let body = json!({
                    "messages": [{ "role": "user", "content": args.content }],
                    "user_id": self.user_id,
                });
                self.api.post(&["v1", "memories", ""], &body).await
            }
            "search_memories" => {
                let args: SearchArgs = parse_args(name, args)?;
                let body = json!({ "query": args.query, "user_id": self.user_id });
                self.api.post(&["v1", "memories", "search", ""], &body).await
            }
            other => Err(unknown_tool(ToolkitId::Memory, other)),
        }
    }
}
