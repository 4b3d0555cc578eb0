/// Integration tests for the system index actor
///
/// These tests verify that:
/// - Registration writes searchable rows
/// - Listing is case-insensitive, newest first and bounded
/// - Single reads go through to the owning actor
/// - Updates write through before patching the index

mod common;

use axum::http::{Method, StatusCode};
use common::{request, TestContext};
use serde_json::json;
use userbase_api::error::ActorError;
use userbase_shared::ids::ActorId;
use userbase_shared::models::index::{RegisterAccount, RegisterUser, LIST_LIMIT};
use userbase_shared::models::JsonMap;

fn register_user(id: &ActorId, name: &str, email: &str) -> RegisterUser {
    RegisterUser {
        id: id.to_string(),
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        provider: Some("google".to_string()),
    }
}

fn register_account(id: &ActorId, name: &str) -> RegisterAccount {
    RegisterAccount {
        id: id.to_string(),
        name: Some(name.to_string()),
        ..RegisterAccount::default()
    }
}

#[tokio::test]
async fn test_register_and_search_users() {
    let ctx = TestContext::new();
    let system = ctx.system();

    let ada = ActorId::new_unique();
    let grace = ActorId::new_unique();
    system
        .register_user(&register_user(&ada, "Ada Lovelace", "ada@example.com"))
        .await
        .unwrap();
    system
        .register_user(&register_user(&grace, "Grace Hopper", "grace@navy.mil"))
        .await
        .unwrap();

    let all = system.list_users(None).await.unwrap();
    assert_eq!(all.len(), 2);
    // Newest first
    assert_eq!(all[0].id, grace.to_string());
    assert_eq!(all[1].id, ada.to_string());

    let by_name = system.list_users(Some("LOVELACE")).await.unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, ada.to_string());
    assert_eq!(by_name[0].provider.as_deref(), Some("google"));

    let by_email = system.list_users(Some("navy.mil")).await.unwrap();
    assert_eq!(by_email.len(), 1);
    assert_eq!(by_email[0].id, grace.to_string());

    assert!(system.list_users(Some("nobody")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_is_capped() {
    let ctx = TestContext::new();
    let system = ctx.system();

    for i in 0..(LIST_LIMIT + 5) {
        let id = ActorId::new_unique();
        system
            .register_account(&register_account(&id, &format!("Team {}", i)))
            .await
            .unwrap();
    }

    let accounts = system.list_accounts(None).await.unwrap();
    assert_eq!(accounts.len() as i64, LIST_LIMIT);
    assert_eq!(accounts[0].name.as_deref(), Some(format!("Team {}", LIST_LIMIT + 4).as_str()));
}

#[tokio::test]
async fn test_register_account_defaults() {
    let ctx = TestContext::new();
    let system = ctx.system();
    let id = ActorId::new_unique();

    system.register_account(&register_account(&id, "Acme")).await.unwrap();

    let rows = system.list_accounts(Some("acme")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "active");
    assert_eq!(rows[0].plan, "free");
}

#[tokio::test]
async fn test_register_requires_id() {
    let ctx = TestContext::new();
    let system = ctx.system();

    for path in ["/users", "/accounts"] {
        let response = system
            .raw()
            .send(request(Method::POST, path, Some(json!({ "name": "No Id" })), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", path);
    }

    assert!(system.list_users(None).await.unwrap().is_empty());
    assert!(system.list_accounts(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_user_reads_through() {
    let ctx = TestContext::new();
    let system = ctx.system();
    let id = ActorId::new_unique();

    system
        .register_user(&register_user(&id, "Indexed Name", "indexed@example.com"))
        .await
        .unwrap();

    let changes: JsonMap = serde_json::from_value(json!({ "name": "Live Name" })).unwrap();
    ctx.user(&id).update_profile(&changes).await.unwrap();

    let profile = system.get_user(id.as_str()).await.unwrap();
    assert_eq!(profile["name"], "Live Name");
}

#[tokio::test]
async fn test_get_account_fuses_info_and_billing() {
    let ctx = TestContext::new();
    let system = ctx.system();
    let id = ActorId::new_unique();
    let account = ctx.account(&id);

    let info: JsonMap = serde_json::from_value(json!({ "name": "Acme" })).unwrap();
    account.update_info(&info).await.unwrap();
    account.subscribe("pro", 0).await.unwrap();

    let fused = system.get_account(id.as_str()).await.unwrap();
    assert_eq!(fused["name"], "Acme");
    assert_eq!(fused["billing"]["state"]["plan_slug"], "pro");
    assert_eq!(fused["billing"]["plan_details"]["slug"], "pro");
}

#[tokio::test]
async fn test_update_user_writes_through_and_patches() {
    let ctx = TestContext::new();
    let system = ctx.system();
    let id = ActorId::new_unique();

    system
        .register_user(&register_user(&id, "Before", "before@example.com"))
        .await
        .unwrap();

    let changes: JsonMap =
        serde_json::from_value(json!({ "name": "After", "theme": "dark" })).unwrap();
    system.update_user(id.as_str(), &changes).await.unwrap();

    let profile = ctx.user(&id).get_profile().await.unwrap();
    assert_eq!(profile["name"], "After");
    assert_eq!(profile["theme"], "dark");

    let rows = system.list_users(Some("after")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].email.as_deref(), Some("before@example.com"));
}

#[tokio::test]
async fn test_update_account_patches_index() {
    let ctx = TestContext::new();
    let system = ctx.system();
    let id = ActorId::new_unique();

    system.register_account(&register_account(&id, "Old Co")).await.unwrap();

    let changes: JsonMap =
        serde_json::from_value(json!({ "name": "New Co", "plan": "pro", "seats": 3 })).unwrap();
    system.update_account(id.as_str(), &changes).await.unwrap();

    let info = ctx.account(&id).get_info().await.unwrap();
    assert_eq!(info["name"], "New Co");
    assert_eq!(info["seats"], 3);

    let rows = system.list_accounts(Some("new co")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].plan, "pro");
    assert_eq!(rows[0].status, "active");
}

#[tokio::test]
async fn test_invalid_id_is_not_found() {
    let ctx = TestContext::new();
    let system = ctx.system();

    let err = system.get_user("bad.id").await.unwrap_err();
    assert!(matches!(err, ActorError::NotFound(_)), "{:?}", err);

    let err = system.get_account("bad.id").await.unwrap_err();
    assert!(matches!(err, ActorError::NotFound(_)), "{:?}", err);
}

#[tokio::test]
async fn test_update_user_patches_index_when_write_through_fails() {
    let ctx = TestContext::new();
    let system = ctx.system();

    system
        .register_user(&RegisterUser {
            id: "bad.id".to_string(),
            name: Some("Before".to_string()),
            email: None,
            provider: None,
        })
        .await
        .unwrap();

    let changes: JsonMap = serde_json::from_value(json!({ "name": "Patched" })).unwrap();
    system.update_user("bad.id", &changes).await.unwrap();

    let rows = system.list_users(Some("patched")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "bad.id");
    assert_eq!(ctx.directory.instance_count().await, 1);
}

#[tokio::test]
async fn test_update_account_patches_index_when_write_through_fails() {
    let ctx = TestContext::new();
    let system = ctx.system();

    system
        .register_account(&RegisterAccount {
            id: "bad.id".to_string(),
            name: Some("Old Co".to_string()),
            ..RegisterAccount::default()
        })
        .await
        .unwrap();

    let changes: JsonMap = serde_json::from_value(json!({ "plan": "pro" })).unwrap();
    system.update_account("bad.id", &changes).await.unwrap();

    let rows = system.list_accounts(Some("old co")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].plan, "pro");
}

#[tokio::test]
async fn test_unknown_actor_is_not_found() {
    let ctx = TestContext::new();
    let system = ctx.system();
    let id = ActorId::new_unique();

    let err = system.get_user(id.as_str()).await.unwrap_err();
    assert!(matches!(err, ActorError::NotFound(_)), "{:?}", err);

    let err = system.get_account(id.as_str()).await.unwrap_err();
    assert!(matches!(err, ActorError::NotFound(_)), "{:?}", err);

    // Only the index itself was created
    assert_eq!(ctx.directory.instance_count().await, 1);
}
