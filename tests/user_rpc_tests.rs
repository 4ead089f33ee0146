mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{FakeBroker, FakeIdentity, build_app, data, error_code, profile, test_config};
use serde_json::json;
use toolkit_dev::identity::ExternalAccount;

#[tokio::test]
async fn first_request_provisions_the_user_once() {
    let identity = FakeIdentity::with_users([profile("alice", "Alice", "alice@example.com")]);
    let app = build_app("provision", test_config(), identity, FakeBroker::default()).await;

    assert!(app.db.get_user("alice").await.unwrap().is_none());

    let (status, body) = app.rpc("alice", "users.getCurrentUser", json!(null)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let user = data(&body);
    assert_eq!(user["id"], "alice");
    assert_eq!(user["name"], "Alice Tester");
    assert_eq!(user["email"], "alice@example.com");
    assert!(user["emailVerified"].is_string());

    let (status, _) = app.rpc("alice", "users.getCurrentUser", json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.identity.get_user_calls(), 1);
    assert!(app.db.get_user("alice").await.unwrap().is_some());
}

#[tokio::test]
async fn requests_without_a_live_session_are_rejected() {
    let identity = FakeIdentity::with_users([profile("alice", "Alice", "alice@example.com")]);
    let app = build_app("unauth", test_config(), identity, FakeBroker::default()).await;

    let (status, body) = app
        .post_json("/api/trpc/users.getCurrentUser", None, json!(null))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let (status, _) = app.rpc("mallory", "users.getCurrentUser", json!(null)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // the session cookie is accepted as well
    let req = Request::builder()
        .method("POST")
        .uri("/api/trpc/users.getCurrentUser")
        .header(header::COOKIE, "__session=token-alice")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["id"], "alice");

    let (status, body) = app.rpc("alice", "users.nope", json!(null)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test]
async fn update_user_validates_email_and_reports_conflicts() {
    let identity = FakeIdentity::with_users([
        profile("alice", "Alice", "alice@example.com"),
        profile("bob", "Bob", "bob@example.com"),
    ]);
    let app = build_app("update-user", test_config(), identity, FakeBroker::default()).await;
    let (status, _) = app.rpc("bob", "users.getCurrentUser", json!(null)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .rpc("alice", "users.updateUser", json!({ "email": "not-an-email" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .rpc("alice", "users.updateUser", json!({ "name": "Ada" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["name"], "Ada");
    assert_eq!(data(&body)["email"], "alice@example.com");

    let (status, body) = app
        .rpc("alice", "users.updateUser", json!({ "email": "bob@example.com" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");

    let (status, body) = app.rpc("alice", "users.deleteUser", json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["id"], "alice");
    assert!(app.db.get_user("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn features_report_admin_and_flags() {
    let identity = FakeIdentity::with_users([
        profile("alice", "Alice", "alice@example.com"),
        profile("bob", "Bob", "bob@example.com"),
    ]);
    let mut cfg = test_config();
    cfg.features.admin_emails = vec!["Alice@Example.com".to_string()];
    cfg.features.external_accounts_enabled = false;
    let app = build_app("features", cfg, identity, FakeBroker::default()).await;

    let (_, body) = app.rpc("alice", "features.isAdmin", json!(null)).await;
    assert_eq!(data(&body), &json!(true));
    let (_, body) = app.rpc("bob", "features.isAdmin", json!(null)).await;
    assert_eq!(data(&body), &json!(false));

    let (_, body) = app.rpc("bob", "features.getFlags", json!(null)).await;
    assert_eq!(data(&body), &json!({ "externalAccountsEnabled": false }));
}

#[tokio::test]
async fn identity_accounts_are_listed_and_disconnected_upstream() {
    let mut alice = profile("alice", "Alice", "alice@example.com");
    alice.external_accounts = vec![
        ExternalAccount {
            id: "eac_gh".to_string(),
            provider: "oauth_github".to_string(),
            approved_scopes: Some("repo read:user".to_string()),
            email_address: Some("alice@example.com".to_string()),
            username: Some("alice-gh".to_string()),
        },
        ExternalAccount {
            id: "eac_google".to_string(),
            provider: "oauth_google".to_string(),
            ..Default::default()
        },
    ];
    let app = build_app(
        "identity-accounts",
        test_config(),
        FakeIdentity::with_users([alice]),
        FakeBroker::default(),
    )
    .await;

    let (status, body) = app.rpc("alice", "accounts.getAccounts", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        data(&body),
        &json!({
            "items": [
                { "id": "eac_gh", "provider": "github" },
                { "id": "eac_google", "provider": "google" }
            ],
            "hasMore": false,
            "nextCursor": null
        })
    );

    let (_, body) = app
        .rpc("alice", "accounts.getAccountByProvider", json!("GitHub"))
        .await;
    assert_eq!(data(&body)["id"], "eac_gh");
    assert_eq!(data(&body)["scope"], "repo read:user");
    assert_eq!(data(&body)["username"], "alice-gh");

    let (_, body) = app
        .rpc("alice", "accounts.hasProviderAccount", json!("notion"))
        .await;
    assert_eq!(data(&body), &json!(false));

    let (status, body) = app
        .rpc("alice", "accounts.deleteAccount", json!("eac_gh"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["success"], true);
    assert_eq!(
        app.identity.deleted_accounts.lock().unwrap().as_slice(),
        [("alice".to_string(), "eac_gh".to_string())]
    );
}

#[tokio::test]
async fn legacy_accounts_live_in_the_local_table() {
    let mut cfg = test_config();
    cfg.features.external_accounts_enabled = false;
    let app = build_app(
        "legacy-accounts",
        cfg,
        FakeIdentity::with_users([
            profile("alice", "Alice", "alice@example.com"),
            profile("bob", "Bob", "bob@example.com"),
        ]),
        FakeBroker::default(),
    )
    .await;
    app.rpc("alice", "users.getCurrentUser", json!(null)).await;

    let account = app
        .db
        .upsert_account(toolkit_dev::db::NewAccount {
            user_id: "alice".to_string(),
            provider: "github".to_string(),
            provider_account_id: "583231".to_string(),
            access_token: Some("gho_x".to_string()),
            refresh_token: None,
            expires_at: None,
            scope: Some("repo".to_string()),
        })
        .await
        .unwrap();

    let (_, body) = app.rpc("alice", "accounts.getAccounts", json!({ "limit": 5 })).await;
    assert_eq!(data(&body)["items"][0]["provider"], "github");

    let (_, body) = app
        .rpc("alice", "accounts.hasProviderAccount", json!({ "provider": "github" }))
        .await;
    assert_eq!(data(&body), &json!(true));

    let (status, _) = app
        .rpc("bob", "accounts.deleteAccount", json!(account.id))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .rpc("alice", "accounts.deleteAccount", json!(account.id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["message"], "Account disconnected successfully.");

    let (_, body) = app
        .rpc("alice", "accounts.getAccountByProvider", json!("github"))
        .await;
    assert!(data(&body).is_null());
}

#[tokio::test]
async fn toolkit_listing_reports_availability() {
    let mut cfg = test_config();
    cfg.toolkits.exa_api_key = Some("exa-key".to_string());
    let identity = FakeIdentity::with_users([profile("alice", "Alice", "alice@example.com")]);
    identity.tokens.lock().unwrap().insert(
        ("alice".to_string(), "oauth_github".to_string()),
        vec![toolkit_dev::identity::OauthAccessToken {
            token: "gho_live".to_string(),
            provider: "oauth_github".to_string(),
            scopes: vec!["repo".to_string()],
        }],
    );
    let app = build_app("toolkits", cfg, identity, FakeBroker::default()).await;

    let (status, body) = app.rpc("alice", "toolkits.listToolkits", json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    let list = data(&body).as_array().unwrap();
    assert_eq!(list.len(), 6);
    let available = |id: &str| {
        list.iter()
            .find(|t| t["id"] == id)
            .map(|t| t["available"].clone())
            .unwrap()
    };
    assert_eq!(available("github"), json!(true));
    assert_eq!(available("web-search"), json!(true));
    assert_eq!(available("memory"), json!(false));
    assert_eq!(available("notion"), json!(false));
    let memory = list.iter().find(|t| t["id"] == "memory").unwrap();
    assert_eq!(memory["group"], "knowledge-base");
    assert!(memory["requiredConnection"].is_null());
}

#[tokio::test]
async fn legacy_availability_requires_scope_and_a_refreshable_token() {
    let mut cfg = test_config();
    cfg.features.external_accounts_enabled = false;
    let app = build_app(
        "legacy-availability",
        cfg,
        FakeIdentity::with_users([profile("alice", "Alice", "alice@example.com")]),
        FakeBroker::default(),
    )
    .await;
    app.rpc("alice", "users.getCurrentUser", json!(null)).await;

    app.db
        .upsert_account(toolkit_dev::db::NewAccount {
            user_id: "alice".to_string(),
            provider: "google".to_string(),
            provider_account_id: "g-1".to_string(),
            access_token: Some("ya29.calendar".to_string()),
            refresh_token: None,
            expires_at: None,
            scope: Some("https://www.googleapis.com/auth/calendar.readonly".to_string()),
        })
        .await
        .unwrap();
    app.db
        .upsert_account(toolkit_dev::db::NewAccount {
            user_id: "alice".to_string(),
            provider: "github".to_string(),
            provider_account_id: "583231".to_string(),
            access_token: Some("gho_stale".to_string()),
            refresh_token: None,
            expires_at: Some(chrono::Utc::now() - chrono::Duration::hours(1)),
            scope: Some("repo".to_string()),
        })
        .await
        .unwrap();

    let (status, body) = app.rpc("alice", "toolkits.listToolkits", json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    let list = data(&body).as_array().unwrap();
    let available = |id: &str| {
        list.iter()
            .find(|t| t["id"] == id)
            .map(|t| t["available"].clone())
            .unwrap()
    };
    assert_eq!(available("google-calendar"), json!(true));
    // drive needs drive.readonly, which this grant lacks
    assert_eq!(available("google-drive"), json!(false));
    // expired with nothing to refresh it
    assert_eq!(available("github"), json!(false));

    let (status, body) = app
        .post_json(
            "/mcp/google-drive",
            Some("alice"),
            json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], -32603);
}
