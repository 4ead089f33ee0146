mod common;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::Query,
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use common::{
    FakeBroker, FakeIdentity, TestApp, bearer, build_app, profile, spawn_test_server, test_config,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use toolkit_dev::config::Config;

fn alice() -> FakeIdentity {
    FakeIdentity::with_users([profile("alice", "Alice", "alice@example.com")])
}

async fn mcp(app: &TestApp, toolkit: &str, body: Value) -> (StatusCode, Value) {
    app.post_json(&format!("/mcp/{toolkit}"), Some("alice"), body)
        .await
}

fn request(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

/// Exa stand-in that records the search bodies it receives.
async fn spawn_search_upstream() -> (url::Url, Arc<Mutex<Vec<Value>>>) {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
    let recorder = seen.clone();
    let app = Router::new().route(
        "/search",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let recorder = recorder.clone();
            async move {
                if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("exa-key") {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
                }
                recorder.lock().unwrap().push(body);
                (
                    StatusCode::OK,
                    Json(json!({
                        "requestId": "req_1",
                        "results": [{
                            "id": "r1",
                            "title": "Rust 2024 edition",
                            "url": "https://blog.rust-lang.org/2025/02/20/Rust-1.85.0.html",
                            "publishedDate": "2025-02-20",
                            "score": 0.9,
                            "text": "Rust 1.85 stabilizes the 2024 edition."
                        }]
                    })),
                )
            }
        }),
    );
    (spawn_test_server(app).await, seen)
}

fn search_config(upstream: url::Url) -> Config {
    let mut cfg = test_config();
    cfg.toolkits.exa_api_key = Some("exa-key".to_string());
    cfg.toolkits.exa_api_url = upstream;
    cfg
}

#[tokio::test]
async fn handshake_and_protocol_errors() {
    let app = build_app("mcp-handshake", test_config(), alice(), FakeBroker::default()).await;

    let (status, body) = mcp(&app, "github", request(1, "initialize", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["serverInfo"]["name"], "toolkit-github");
    assert!(body["result"]["capabilities"]["tools"].is_object());
    assert!(body["result"]["instructions"].as_str().unwrap().len() > 10);

    let (status, body) = mcp(&app, "github", request(2, "ping", json!(null))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!({}));

    let (status, body) = mcp(&app, "github", request(3, "resources/list", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], -32601);

    let (status, _) = mcp(
        &app,
        "github",
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, body) = mcp(&app, "github", json!({ "jsonrpc": "1.0", "id": 4, "method": "ping" })).await;
    assert_eq!(body["error"]["code"], -32600);

    let req = Request::builder()
        .method("POST")
        .uri("/mcp/github")
        .header(header::AUTHORIZATION, bearer("alice"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{oops"))
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32700);

    let (status, _) = mcp(&app, "dropbox", request(5, "ping", json!(null))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post_json("/mcp/github", None, request(6, "ping", json!(null)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn disabled_toolkits_list_no_tools() {
    let app = build_app("mcp-disabled", test_config(), alice(), FakeBroker::default()).await;

    let (status, body) = mcp(&app, "memory", request(1, "tools/list", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!({ "tools": [] }));

    let (_, body) = mcp(
        &app,
        "memory",
        request(2, "tools/call", json!({ "name": "add_memory", "arguments": { "content": "x" } })),
    )
    .await;
    assert_eq!(body["result"]["isError"], true);
}

#[tokio::test]
async fn toolkits_without_a_connection_fail_to_initialize() {
    let app = build_app("mcp-no-token", test_config(), alice(), FakeBroker::default()).await;

    let (status, body) = mcp(&app, "github", request(1, "tools/list", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], -32603);
    assert_eq!(
        body["error"]["message"],
        "GitHub OAuth token not found or access denied"
    );
}

#[tokio::test]
async fn web_search_lists_and_calls_tools() {
    let (upstream, seen) = spawn_search_upstream().await;
    let app = build_app(
        "mcp-search",
        search_config(upstream),
        alice(),
        FakeBroker::default(),
    )
    .await;

    let (_, body) = mcp(&app, "web-search", request(1, "tools/list", json!({}))).await;
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "search");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["query"]));

    let (status, body) = mcp(
        &app,
        "web-search",
        request(
            2,
            "tools/call",
            json!({ "name": "search", "arguments": { "query": "rust 2024 edition", "numResults": 50 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let result = &body["result"];
    assert!(result.get("isError").is_none(), "{body}");
    assert_eq!(result["structuredContent"]["query"], "rust 2024 edition");
    assert_eq!(
        result["structuredContent"]["results"][0]["title"],
        "Rust 2024 edition"
    );
    assert_eq!(result["content"][0]["type"], "text");

    let sent = seen.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["numResults"], 20);
    assert_eq!(sent[0]["contents"]["text"]["maxCharacters"], 2000);

    let (_, body) = mcp(
        &app,
        "web-search",
        request(3, "tools/call", json!({ "name": "crawl", "arguments": {} })),
    )
    .await;
    assert_eq!(body["result"]["isError"], true);
    assert_eq!(
        body["result"]["content"][0]["text"],
        "Unknown tool crawl in toolkit web-search"
    );

    let (_, body) = mcp(&app, "web-search", request(4, "tools/call", json!({ "arguments": {} }))).await;
    assert_eq!(body["error"]["code"], -32602);
}

/// Drive stand-in whose media download never ends.
async fn spawn_endless_drive() -> url::Url {
    let app = Router::new().route(
        "/drive/v3/files/{id}",
        get(|Query(query): Query<HashMap<String, String>>| async move {
            if query.get("alt").map(String::as_str) == Some("media") {
                let chunks = futures::stream::repeat_with(|| {
                    Ok::<_, std::io::Error>(Bytes::from_static(&[b'a'; 8192]))
                });
                Response::new(Body::from_stream(chunks))
            } else {
                Json(json!({ "id": "f1", "name": "dump.log", "mimeType": "text/plain" }))
                    .into_response()
            }
        }),
    );
    spawn_test_server(app).await
}

#[tokio::test]
async fn drive_downloads_stop_at_the_read_limit() {
    let upstream = spawn_endless_drive().await;
    let mut cfg = test_config();
    cfg.toolkits.google_drive_api_url = upstream.join("/drive/v3").unwrap();
    cfg.toolkits.read_file_max_chars = 1000;
    let identity = alice();
    identity.tokens.lock().unwrap().insert(
        ("alice".to_string(), "oauth_google".to_string()),
        vec![toolkit_dev::identity::OauthAccessToken {
            token: "ya29.drive".to_string(),
            provider: "oauth_google".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/drive.readonly".to_string()],
        }],
    );
    let app = build_app("mcp-drive-limit", cfg, identity, FakeBroker::default()).await;

    let call = mcp(
        &app,
        "google-drive",
        request(
            1,
            "tools/call",
            json!({ "name": "read_file", "arguments": { "fileId": "f1" } }),
        ),
    );
    let (status, body) = tokio::time::timeout(Duration::from_secs(10), call)
        .await
        .expect("read_file must not drain the whole download");
    assert_eq!(status, StatusCode::OK);
    let result = &body["result"]["structuredContent"];
    assert_eq!(result["name"], "dump.log", "{body}");
    assert_eq!(result["truncated"], true);
    assert_eq!(result["content"].as_str().unwrap().len(), 1000);
}
