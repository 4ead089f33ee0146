use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ApiClient, ToolExecutor, ToolSpec, ToolkitId, parse_args, unknown_tool};
use crate::error::ToolkitError;

pub(crate) const SYSTEM_PROMPT: &str = "You can search the web for current information. \
Prefer precise queries and cite the URLs of the results you use.";

const MAX_TEXT_CHARS: usize = 2_000;

pub(crate) fn tools() -> Vec<ToolSpec> {
    vec![ToolSpec {
        name: "search",
        description: "Search the web and return the top results with page text",
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "numResults": { "type": "integer", "minimum": 1, "maximum": 20 }
            },
            "required": ["query"]
        }),
    }]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    #[serde(default)]
    num_results: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    num_results: u32,
    contents: Contents,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Contents {
    text: TextOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextOptions {
    max_characters: usize,
}

pub(crate) struct WebSearchTools {
    api: ApiClient,
}

impl WebSearchTools {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn search(&self, args: SearchArgs) -> Result<Value, ToolkitError> {
        let request = SearchRequest {
            query: &args.query,
            num_results: args.num_results.unwrap_or(5).clamp(1, 20),
            contents: Contents {
                text: TextOptions {
                    max_characters: MAX_TEXT_CHARS,
                },
            },
        };
        let found = self.api.post(&["search"], &request).await?;
        let results: Vec<Value> = found["results"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|r| {
                        json!({
                            "title": r["title"],
                            "url": r["url"],
                            "publishedDate": r["publishedDate"],
                            "text": r["text"],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(json!({ "query": args.query, "results": results }))
    }
}

#[async_trait]
impl ToolExecutor for WebSearchTools {
    fn specs(&self) -> Vec<ToolSpec> {
        tools()
    }

    async fn call(&self, name: &str, args: Value) -> Result<Value, ToolkitError> {
        match name {
            "search" => self.search(parse_args(name, args)?).await,
            other => Err(unknown_tool(ToolkitId::WebSearch, other)),
        }
    }
}
