mod common;

use axum::http::StatusCode;
use common::{FakeBroker, FakeIdentity, build_app, data, error_code, profile, test_config};
use serde_json::{Value, json};

async fn app(prefix: &str) -> common::TestApp {
    let identity = FakeIdentity::with_users([
        profile("alice", "Alice", "alice@example.com"),
        profile("bob", "Bob", "bob@example.com"),
    ]);
    build_app(prefix, test_config(), identity, FakeBroker::default()).await
}

async fn create_chat(app: &common::TestApp, user: &str, id: &str, workbench: Option<&str>) {
    let (status, body) = app
        .rpc(
            user,
            "chats.createChat",
            json!({ "id": id, "title": format!("chat {id}"), "visibility": "private", "workbenchId": workbench }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn chats_respect_visibility_and_ownership() {
    let app = app("chats-owner").await;

    let (status, body) = app
        .rpc(
            "alice",
            "chats.createChat",
            json!({ "id": "chat-a", "title": "Hello", "visibility": "private" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["id"], "chat-a");
    assert_eq!(data(&body)["userId"], "alice");

    let (status, body) = app
        .rpc(
            "alice",
            "chats.createChat",
            json!({ "id": "chat-a", "title": "Again", "visibility": "private" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");

    // private: invisible to others
    let (status, body) = app.rpc("bob", "chats.getChat", json!("chat-a")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(data(&body).is_null());
    let (status, _) = app.rpc("bob", "messages.getMessages", json!("chat-a")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .rpc(
            "alice",
            "chats.updateChatVisibility",
            json!({ "id": "chat-a", "visibility": "public" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["visibility"], "public");

    let (_, body) = app.rpc("bob", "chats.getChat", json!("chat-a")).await;
    assert_eq!(data(&body)["id"], "chat-a");
    assert!(data(&body)["workbench"].is_null());

    let (status, _) = app
        .rpc(
            "bob",
            "chats.updateChatTitle",
            json!({ "id": "chat-a", "title": "mine now" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.rpc("bob", "chats.deleteChat", json!("chat-a")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    let (status, _) = app.rpc("alice", "chats.deleteChat", json!("missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .rpc(
            "alice",
            "chats.updateChatTitle",
            json!({ "id": "chat-a", "title": "Renamed" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["title"], "Renamed");

    let (status, body) = app.rpc("alice", "chats.deleteChat", json!("chat-a")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["id"], "chat-a");
    let (_, body) = app.rpc("alice", "chats.getChat", json!("chat-a")).await;
    assert!(data(&body).is_null());
}

#[tokio::test]
async fn branching_copies_the_prefix_and_keeps_the_source() {
    let app = app("chats-branch").await;
    create_chat(&app, "alice", "src", None).await;

    for (role, text) in [("user", "hi"), ("assistant", "hello"), ("user", "bye")] {
        let (status, body) = app
            .rpc(
                "alice",
                "messages.createMessage",
                json!({
                    "chatId": "src",
                    "role": role,
                    "parts": [{ "type": "text", "text": text }],
                    "modelId": "test-model"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (_, body) = app.rpc("alice", "messages.getMessages", json!("src")).await;
    let source: Vec<Value> = data(&body).as_array().cloned().unwrap();
    assert_eq!(source.len(), 3);
    let cut = source[1]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .rpc(
            "alice",
            "chats.branchChat",
            json!({ "originalChatId": "src", "messageId": cut }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let branch = data(&body).clone();
    assert_ne!(branch["id"], "src");
    assert_eq!(branch["parentChatId"], "src");
    assert_eq!(branch["title"], "chat src");
    assert_eq!(branch["visibility"], "private");

    let (_, body) = app
        .rpc("alice", "messages.getMessages", branch["id"].clone())
        .await;
    let copied = data(&body).as_array().cloned().unwrap();
    assert_eq!(copied.len(), 2);
    for (copy, orig) in copied.iter().zip(&source) {
        assert_ne!(copy["id"], orig["id"]);
        assert_eq!(copy["role"], orig["role"]);
        assert_eq!(copy["parts"], orig["parts"]);
        assert_eq!(copy["modelId"], orig["modelId"]);
        assert_eq!(copy["createdAt"], orig["createdAt"]);
    }

    let (_, body) = app.rpc("alice", "messages.getMessages", json!("src")).await;
    assert_eq!(data(&body).as_array().map(Vec::len), Some(3));

    let (status, body) = app
        .rpc(
            "bob",
            "chats.branchChat",
            json!({ "originalChatId": "src", "messageId": source[0]["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Chat not found or access denied");

    let (status, _) = app
        .rpc(
            "alice",
            "chats.branchChat",
            json!({ "originalChatId": "src", "messageId": "not-a-message" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_pages_and_workbench_filter_are_consistent() {
    let app = app("chats-pages").await;

    let (status, body) = app
        .rpc(
            "alice",
            "workbenches.createWorkbench",
            json!({ "name": "Research", "systemPrompt": "Be brief", "toolkitIds": ["github"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let wb = data(&body)["id"].as_str().unwrap().to_string();

    for (i, in_wb) in [false, true, false, true, false].into_iter().enumerate() {
        create_chat(&app, "alice", &format!("c{i}"), in_wb.then_some(wb.as_str())).await;
    }
    create_chat(&app, "bob", "bob-chat", None).await;

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let (status, body) = app
            .rpc("alice", "chats.getChats", json!({ "limit": 2, "cursor": cursor }))
            .await;
        assert_eq!(status, StatusCode::OK);
        let page = data(&body);
        let items = page["items"].as_array().unwrap();
        assert!(items.len() <= 2);
        if let Some(expected_first) = cursor.as_deref() {
            assert_eq!(items[0]["id"], expected_first);
        }
        seen.extend(items.iter().map(|c| c["id"].as_str().unwrap().to_string()));
        if page["hasMore"] == true {
            cursor = page["nextCursor"].as_str().map(str::to_string);
            assert!(cursor.is_some());
        } else {
            assert!(page["nextCursor"].is_null());
            break;
        }
    }
    assert_eq!(seen, ["c4", "c3", "c2", "c1", "c0"]);

    let (_, body) = app
        .rpc("alice", "chats.getChats", json!({ "workbenchId": wb }))
        .await;
    assert_eq!(data(&body)["items"].as_array().map(Vec::len), Some(2));

    let (_, body) = app
        .rpc("alice", "chats.getChats", json!({ "workbenchId": null }))
        .await;
    assert_eq!(data(&body)["items"].as_array().map(Vec::len), Some(3));

    let (status, body) = app.rpc("alice", "chats.getChats", json!({ "limit": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    // a workbench of someone else cannot be attached
    let (status, _) = app
        .rpc(
            "bob",
            "chats.createChat",
            json!({ "id": "bob-2", "title": "x", "visibility": "private", "workbenchId": wb }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // deleting the workbench detaches its chats
    let (status, _) = app.rpc("alice", "workbenches.deleteWorkbench", json!(wb)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.rpc("alice", "chats.getChat", json!("c1")).await;
    assert!(data(&body)["workbenchId"].is_null());
    let (_, body) = app
        .rpc("alice", "chats.getChats", json!({ "workbenchId": null }))
        .await;
    assert_eq!(data(&body)["items"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn workbenches_validate_toolkits_and_ownership() {
    let app = app("workbenches").await;

    let (status, body) = app
        .rpc(
            "alice",
            "workbenches.createWorkbench",
            json!({ "name": "Bad", "toolkitIds": ["github", "gmail"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("gmail"));

    let (_, body) = app
        .rpc(
            "alice",
            "workbenches.createWorkbench",
            json!({ "name": "Good", "toolkitIds": ["notion", "web-search"] }),
        )
        .await;
    let wb = data(&body).clone();
    assert_eq!(wb["toolkitIds"], json!(["notion", "web-search"]));

    let (status, body) = app
        .rpc(
            "alice",
            "workbenches.updateWorkbench",
            json!({ "id": wb["id"], "name": "Renamed", "systemPrompt": "p", "toolkitIds": ["memory"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["name"], "Renamed");
    assert_eq!(data(&body)["toolkitIds"], json!(["memory"]));

    let (status, _) = app
        .rpc(
            "alice",
            "workbenches.updateWorkbench",
            json!({ "id": wb["id"], "name": "x", "toolkitIds": ["nope"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.rpc("bob", "workbenches.getWorkbench", wb["id"].clone()).await;
    assert!(data(&body).is_null());
    let (status, _) = app
        .rpc(
            "bob",
            "workbenches.updateWorkbench",
            json!({ "id": wb["id"], "name": "stolen" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .rpc("bob", "workbenches.deleteWorkbench", wb["id"].clone())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.rpc("alice", "workbenches.getWorkbenches", json!({})).await;
    assert_eq!(data(&body)["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(data(&body)["hasMore"], false);
}
