mod common;

use chrono::{Duration, Utc};
use common::unique_sqlite_path;
use serde_json::json;
use toolkit_dev::db::{
    AccountPatch, DbActorHandle, EntityPatch, NewAccount, NewChat, NewMessage, NewUser, NewWorkbench,
};
use toolkit_schema::PageInput;
use toolkit_schema::rpc::chats::Visibility;
use toolkit_schema::rpc::messages::MessageRole;

async fn fresh_db(prefix: &str) -> (DbActorHandle, std::path::PathBuf) {
    let path = unique_sqlite_path(prefix);
    let db = toolkit_dev::db::spawn(&format!("sqlite:{}", path.display()))
        .await
        .expect("db actor spawn");
    (db, path)
}

fn new_user(id: &str) -> NewUser {
    NewUser {
        id: id.to_string(),
        name: Some(id.to_string()),
        email: Some(format!("{id}@example.com")),
        image: None,
        email_verified: None,
    }
}

fn github_account(user: &str, access: &str, refresh: Option<&str>) -> NewAccount {
    NewAccount {
        user_id: user.to_string(),
        provider: "github".to_string(),
        provider_account_id: "583231".to_string(),
        access_token: Some(access.to_string()),
        refresh_token: refresh.map(str::to_string),
        expires_at: Some(Utc::now() + Duration::hours(8)),
        scope: None,
    }
}

#[tokio::test]
async fn account_upsert_refreshes_tokens_in_place() {
    let (db, path) = fresh_db("db-accounts").await;
    db.insert_user(new_user("alice")).await.unwrap();
    db.insert_user(new_user("bob")).await.unwrap();

    // 1. First link stores the row
    let mut first = github_account("alice", "gho_1", Some("ghr_1"));
    first.scope = Some("repo".to_string());
    let first = db.upsert_account(first).await.unwrap();
    assert_eq!(first.access_token.as_deref(), Some("gho_1"));

    // 2. Relinking the same provider account keeps the id, refresh token and scope
    let second = db
        .upsert_account(github_account("alice", "gho_2", None))
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.access_token.as_deref(), Some("gho_2"));
    assert_eq!(second.refresh_token.as_deref(), Some("ghr_1"));
    assert_eq!(second.scope.as_deref(), Some("repo"));

    // 3. Deletion is scoped to the owner
    assert!(!db.delete_account(&first.id, "bob").await.unwrap());
    assert!(db.delete_account(&first.id, "alice").await.unwrap());
    assert!(
        db.get_account_by_provider("alice", "github")
            .await
            .unwrap()
            .is_none()
    );

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn token_refresh_patch_replaces_the_expiry() {
    let (db, path) = fresh_db("db-account-patch").await;
    db.insert_user(new_user("alice")).await.unwrap();

    let mut stale = github_account("alice", "gho_1", Some("ghr_1"));
    stale.expires_at = Some(Utc::now() - Duration::hours(1));
    let stale = db.upsert_account(stale).await.unwrap();
    assert!(stale.is_expired(Utc::now()));

    // a refresh response without expires_in leaves no lifetime behind
    db.patch(EntityPatch::Account {
        id: stale.id.clone(),
        patch: AccountPatch {
            access_token: Some("gho_2".to_string()),
            ..Default::default()
        },
    })
    .await
    .unwrap();

    let row = db
        .get_account_by_provider("alice", "github")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.access_token.as_deref(), Some("gho_2"));
    assert_eq!(row.refresh_token.as_deref(), Some("ghr_1"));
    assert!(row.expires_at.is_none());
    assert!(!row.is_expired(Utc::now()));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn messages_keep_insertion_order_and_follow_their_chat() {
    let (db, path) = fresh_db("db-messages").await;
    db.insert_user(new_user("alice")).await.unwrap();
    db.create_chat(NewChat {
        id: "chat-1".to_string(),
        user_id: "alice".to_string(),
        title: "Plans".to_string(),
        visibility: Visibility::Private,
        workbench_id: None,
    })
    .await
    .unwrap();

    for (i, role) in [MessageRole::User, MessageRole::Assistant, MessageRole::User]
        .into_iter()
        .enumerate()
    {
        db.create_message(NewMessage {
            chat_id: "chat-1".to_string(),
            role,
            parts: json!([{ "type": "text", "text": format!("m{i}") }]),
            attachments: Vec::new(),
            model_id: (role == MessageRole::Assistant).then(|| "model-a".to_string()),
        })
        .await
        .unwrap();
    }

    let messages = db.list_messages("chat-1").await.unwrap();
    let texts: Vec<_> = messages
        .iter()
        .map(|m| m.parts.0[0]["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, ["m0", "m1", "m2"]);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].model_id.as_deref(), Some("model-a"));

    assert!(db.delete_chat("chat-1", "alice").await.unwrap().is_some());
    assert!(db.list_messages("chat-1").await.unwrap().is_empty());

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn deleting_a_user_removes_owned_rows() {
    let (db, path) = fresh_db("db-user-cascade").await;
    db.insert_user(new_user("alice")).await.unwrap();

    let wb = db
        .create_workbench(NewWorkbench {
            user_id: "alice".to_string(),
            name: "Research".to_string(),
            system_prompt: "Be concise.".to_string(),
            toolkit_ids: vec!["web-search".to_string()],
        })
        .await
        .unwrap();
    db.upsert_account(github_account("alice", "gho_1", None))
        .await
        .unwrap();

    // duplicate emails are rejected
    let mut clash = new_user("alice2");
    clash.email = Some("alice@example.com".to_string());
    assert!(db.insert_user(clash).await.unwrap_err().is_unique_violation());

    assert!(db.delete_user("alice").await.unwrap());
    assert!(db.get_workbench(&wb.id, "alice").await.unwrap().is_none());
    let page = db
        .list_accounts("alice", PageInput::default())
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert!(!db.delete_user("alice").await.unwrap());

    let _ = std::fs::remove_file(path);
}
