use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiClient, ToolExecutor, ToolSpec, ToolkitId, parse_args, unknown_tool};
use crate::error::ToolkitError;

pub(crate) const SYSTEM_PROMPT: &str = "You can use the Google Drive toolkit to find and read the user's files. \
Search files by name or full text, then read the files you need. \
Google Docs, Sheets and Slides are exported as text; long files are truncated.";

const FILE_FIELDS: &str = "files(id,name,mimeType,modifiedTime,owners(displayName),webViewLink,size),nextPageToken";

pub(crate) fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "search_files",
            description: "Search files in Google Drive by name or content",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Words to look for" },
                    "mimeType": { "type": "string" },
                    "pageSize": { "type": "integer", "minimum": 1, "maximum": 100 },
                    "pageToken": { "type": "string" }
                },
                "required": ["query"]
            }),
        },
        ToolSpec {
            name: "read_file",
            description: "Read the text content of a file",
            input_schema: json!({
                "type": "object",
                "properties": { "fileId": { "type": "string" } },
                "required": ["fileId"]
            }),
        },
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    page_size: Option<u32>,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadArgs {
    file_id: String,
}

/// Drive query string: name or full-text match, optional MIME filter, no trash.
fn drive_query(args: &SearchArgs) -> String {
    let escaped = args.query.replace('\\', "\\\\").replace('\'', "\\'");
    let mut q = format!("(name contains '{escaped}' or fullText contains '{escaped}') and trashed = false");
    if let Some(mime) = args.mime_type.as_deref() {
        let mime = mime.replace('\'', "\\'");
        q.push_str(&format!(" and mimeType = '{mime}'"));
    }
    q
}

/// Export format for Google-native documents; `None` means download the blob.
fn export_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "application/vnd.google-apps.document" => Some("text/plain"),
        "application/vnd.google-apps.presentation" => Some("text/plain"),
        "application/vnd.google-apps.spreadsheet" => Some("text/csv"),
        _ => None,
    }
}

fn truncate_chars(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text, false),
    }
}

pub(crate) struct DriveTools {
    api: ApiClient,
    max_chars: usize,
}

impl DriveTools {
    pub(crate) fn new(api: ApiClient, max_chars: usize) -> Self {
        Self { api, max_chars }
    }

    async fn search_files(&self, args: SearchArgs) -> Result<Value, ToolkitError> {
        let mut query = vec![
            ("q", drive_query(&args)),
            ("fields", FILE_FIELDS.to_string()),
            ("pageSize", args.page_size.unwrap_or(20).clamp(1, 100).to_string()),
        ];
        if let Some(token) = args.page_token {
            query.push(("pageToken", token));
        }
        self.api.get(&["files"], &query).await
    }

    async fn read_file(&self, args: ReadArgs) -> Result<Value, ToolkitError> {
        let meta = self
            .api
            .get(
                &["files", &args.file_id],
                &[("fields", "id,name,mimeType".to_string())],
            )
            .await?;
        let mime_type = meta["mimeType"].as_str().unwrap_or_default();
        // one char past the limit so truncation is still detected
        let max_bytes = self.max_chars.saturating_add(1).saturating_mul(4);

        let content = match export_mime(mime_type) {
            Some(export) => {
                self.api
                    .get_text(
                        &["files", &args.file_id, "export"],
                        &[("mimeType", export.to_string())],
                        max_bytes,
                    )
                    .await?
            }
            None if mime_type.starts_with("application/vnd.google-apps.") => {
                return Err(ToolkitError::bad_request(format!(
                    "Files of type {mime_type} cannot be read as text"
                )));
            }
            None => {
                self.api
                    .get_text(
                        &["files", &args.file_id],
                        &[("alt", "media".to_string())],
                        max_bytes,
                    )
                    .await?
            }
        };

        let (content, truncated) = truncate_chars(content, self.max_chars);
        Ok(json!({
            "id": meta["id"],
            "name": meta["name"],
            "mimeType": mime_type,
            "content": content,
            "truncated": truncated,
        }))
    }
}

#[async_trait]
impl ToolExecutor for DriveTools {
    fn specs(&self) -> Vec<ToolSpec> {
        tools()
    }

    async fn call(&self, name: &str, args: Value) -> Result<Value, ToolkitError> {
        match name {
            "search_files" => self.search_files(parse_args(name, args)?).await,
            "read_file" => self.read_file(parse_args(name, args)?).await,
            other => Err(unknown_tool(ToolkitId::GoogleDrive, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_escapes_quotes() {
        let args = SearchArgs {
            query: "bob's plan".to_string(),
            mime_type: Some("application/pdf".to_string()),
            page_size: None,
            page_token: None,
        };
        assert_eq!(
            drive_query(&args),
            "(name contains 'bob\\'s plan' or fullText contains 'bob\\'s plan') and trashed = false and mimeType = 'application/pdf'"
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let (text, cut) = truncate_chars("héllo wörld".to_string(), 5);
        assert_eq!(text, "héllo");
        assert!(cut);
        let (text, cut) = truncate_chars("short".to_string(), 50);
        assert_eq!(text, "short");
        assert!(!cut);
    }

    #[test]
    fn native_docs_are_exported() {
        assert_eq!(export_mime("application/vnd.google-apps.document"), Some("text/plain"));
        assert_eq!(export_mime("application/pdf"), None);
    }
}
