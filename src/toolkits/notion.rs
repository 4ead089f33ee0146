use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{ApiClient, ToolExecutor, ToolSpec, ToolkitId, parse_args, unknown_tool};
use crate::error::ToolkitError;

pub(crate) const SYSTEM_PROMPT: &str = "You can use the Notion toolkit to work with the user's Notion workspace. \
Use list_databases and search_pages to discover content before reading or editing it. \
Page content lives in blocks: read it with get_blocks and add to it with append_blocks. \
Properties and blocks follow the Notion API object format.";

fn object(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "object", "properties": properties, "required": required })
}

pub(crate) fn tools() -> Vec<ToolSpec> {
    let cursor = json!({
        "startCursor": { "type": "string" },
        "pageSize": { "type": "integer", "minimum": 1, "maximum": 100 }
    });
    let with_cursor = |mut props: Value| {
        if let (Some(dst), Some(src)) = (props.as_object_mut(), cursor.as_object()) {
            dst.extend(src.clone());
        }
        props
    };

    vec![
        ToolSpec {
            name: "list_databases",
            description: "List databases shared with the integration",
            input_schema: object(with_cursor(json!({})), &[]),
        },
        ToolSpec {
            name: "query_database",
            description: "Query rows of a database with optional filter and sorts",
            input_schema: object(
                with_cursor(json!({
                    "databaseId": { "type": "string" },
                    "filter": { "type": "object" },
                    "sorts": { "type": "array", "items": { "type": "object" } }
                })),
                &["databaseId"],
            ),
        },
        ToolSpec {
            name: "create_database",
            description: "Create a database under a parent page",
            input_schema: object(
                json!({
                    "parentPageId": { "type": "string" },
                    "title": { "type": "string" },
                    "properties": { "type": "object", "description": "Notion property schema" }
                }),
                &["parentPageId", "title", "properties"],
            ),
        },
        ToolSpec {
            name: "get_page",
            description: "Get a page and its properties",
            input_schema: object(json!({ "pageId": { "type": "string" } }), &["pageId"]),
        },
        ToolSpec {
            name: "search_pages",
            description: "Search pages by title",
            input_schema: object(
                with_cursor(json!({ "query": { "type": "string" } })),
                &["query"],
            ),
        },
        ToolSpec {
            name: "create_page",
            description: "Create a page under a page or a database",
            input_schema: object(
                json!({
                    "parentPageId": { "type": "string" },
                    "parentDatabaseId": { "type": "string" },
                    "title": { "type": "string" },
                    "properties": { "type": "object" },
                    "children": { "type": "array", "items": { "type": "object" } }
                }),
                &[],
            ),
        },
        ToolSpec {
            name: "get_blocks",
            description: "List the child blocks of a page or block",
            input_schema: object(
                with_cursor(json!({ "blockId": { "type": "string" } })),
                &["blockId"],
            ),
        },
        ToolSpec {
            name: "append_blocks",
            description: "Append child blocks to a page or block",
            input_schema: object(
                json!({
                    "blockId": { "type": "string" },
                    "children": { "type": "array", "items": { "type": "object" } }
                }),
                &["blockId", "children"],
            ),
        },
        ToolSpec {
            name: "list_users",
            description: "List users of the workspace",
            input_schema: object(with_cursor(json!({})), &[]),
        },
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cursor {
    #[serde(default)]
    start_cursor: Option<String>,
    #[serde(default)]
    page_size: Option<u32>,
}

impl Cursor {
    fn into_body(self, mut body: Map<String, Value>) -> Value {
        if let Some(cursor) = self.start_cursor {
            body.insert("start_cursor".into(), Value::String(cursor));
        }
        body.insert(
            "page_size".into(),
            json!(self.page_size.unwrap_or(25).clamp(1, 100)),
        );
        Value::Object(body)
    }

    fn into_query(self) -> Vec<(&'static str, String)> {
        let mut query = vec![(
            "page_size",
            self.page_size.unwrap_or(25).clamp(1, 100).to_string(),
        )];
        if let Some(cursor) = self.start_cursor {
            query.push(("start_cursor", cursor));
        }
        query
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(flatten)]
    cursor: Cursor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryDatabaseArgs {
    database_id: String,
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    sorts: Option<Vec<Value>>,
    #[serde(flatten)]
    cursor: Cursor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDatabaseArgs {
    parent_page_id: String,
    title: String,
    properties: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageArgs {
    page_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePageArgs {
    #[serde(default)]
    parent_page_id: Option<String>,
    #[serde(default)]
    parent_database_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    children: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlocksArgs {
    block_id: String,
    #[serde(flatten)]
    cursor: Cursor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendBlocksArgs {
    block_id: String,
    children: Vec<Value>,
}

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

fn search_body(args: SearchArgs, object: &str) -> Value {
    let mut body = Map::new();
    if let Some(query) = args.query.filter(|q| !q.trim().is_empty()) {
        body.insert("query".into(), Value::String(query));
    }
    body.insert(
        "filter".into(),
        json!({ "property": "object", "value": object }),
    );
    args.cursor.into_body(body)
}

/// Page body for `POST /pages`. A plain title becomes the `title` property
/// for page parents and the `Name` property for database parents.
fn create_page_body(args: CreatePageArgs) -> Result<Value, ToolkitError> {
    let (parent, title_key) = match (args.parent_page_id, args.parent_database_id) {
        (Some(page), None) => (json!({ "page_id": page }), "title"),
        (None, Some(db)) => (json!({ "database_id": db }), "Name"),
        _ => {
            return Err(ToolkitError::bad_request(
                "create_page needs exactly one of parentPageId or parentDatabaseId",
            ));
        }
    };

    let mut properties = args.properties.unwrap_or_default();
    if let Some(title) = args.title {
        properties
            .entry(title_key)
            .or_insert_with(|| json!({ "title": rich_text(&title) }));
    }

    let mut body = json!({ "parent": parent, "properties": properties });
    if let Some(children) = args.children {
        body["children"] = Value::Array(children);
    }
    Ok(body)
}

pub(crate) struct NotionTools {
    api: ApiClient,
}

impl NotionTools {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolExecutor for NotionTools {
    fn specs(&self) -> Vec<ToolSpec> {
        tools()
    }

    async fn call(&self, name: &str, args: Value) -> Result<Value, ToolkitError> {
        match name {
            "list_databases" => {
                let args: SearchArgs = parse_args(name, args)?;
                self.api.post(&["search"], &search_body(args, "database")).await
            }
            "search_pages" => {
                let args: SearchArgs = parse_args(name, args)?;
                self.api.post(&["search"], &search_body(args, "page")).await
            }
            "query_database" => {
                let args: QueryDatabaseArgs = parse_args(name, args)?;
                let mut body = Map::new();
                if let Some(filter) = args.filter {
                    body.insert("filter".into(), filter);
                }
                if let Some(sorts) = args.sorts {
                    body.insert("sorts".into(), Value::Array(sorts));
                }
                self.api
                    .post(
                        &["databases", &args.database_id, "query"],
                        &args.cursor.into_body(body),
                    )
                    .await
            }
            "create_database" => {
                let args: CreateDatabaseArgs = parse_args(name, args)?;
                let body = json!({
                    "parent": { "type": "page_id", "page_id": args.parent_page_id },
                    "title": rich_text(&args.title),
                    "properties": args.properties,
                });
                self.api.post(&["databases"], &body).await
            }
            "get_page" => {
                let args: PageArgs = parse_args(name, args)?;
                self.api.get(&["pages", &args.page_id], &[]).await
            }
            "create_page" => {
                let body = create_page_body(parse_args(name, args)?)?;
                self.api.post(&["pages"], &body).await
            }
            "get_blocks" => {
                let args: BlocksArgs = parse_args(name, args)?;
                self.api
                    .get(&["blocks", &args.block_id, "children"], &args.cursor.into_query())
                    .await
            }
            "append_blocks" => {
                let args: AppendBlocksArgs = parse_args(name, args)?;
                self.api
                    .patch(
                        &["blocks", &args.block_id, "children"],
                        &json!({ "children": args.children }),
                    )
                    .await
            }
            "list_users" => {
                let cursor: Cursor = parse_args(name, args)?;
                self.api.get(&["users"], &cursor.into_query()).await
            }
            other => Err(unknown_tool(ToolkitId::Notion, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_filters_by_object_kind() {
        let args: SearchArgs =
            serde_json::from_value(json!({ "query": "roadmap", "pageSize": 500 })).unwrap();
        let body = search_body(args, "page");
        assert_eq!(body["query"], "roadmap");
        assert_eq!(body["filter"]["value"], "page");
        assert_eq!(body["page_size"], 100);
        assert!(body.get("start_cursor").is_none());
    }

    #[test]
    fn database_page_title_goes_to_name() {
        let args: CreatePageArgs = serde_json::from_value(json!({
            "parentDatabaseId": "db-1",
            "title": "Ship it"
        }))
        .unwrap();
        let body = create_page_body(args).unwrap();
        assert_eq!(body["parent"]["database_id"], "db-1");
        assert_eq!(
            body["properties"]["Name"]["title"][0]["text"]["content"],
            "Ship it"
        );
    }

    #[test]
    fn create_page_requires_single_parent() {
        let args: CreatePageArgs = serde_json::from_value(json!({ "title": "x" })).unwrap();
        assert!(matches!(
            create_page_body(args),
            Err(ToolkitError::BadRequest(_))
        ));
    }
}
