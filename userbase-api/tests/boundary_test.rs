/// Integration tests for the public session boundary
///
/// These tests drive the full router, from the session cookie through the
/// actors and back:
/// - Session authentication and logout
/// - Current user, account listing and switching
/// - Admin views gated by email
/// - Security headers on every response

mod common;

use axum::http::{header, Method, StatusCode};
use common::{request, TestContext, ADMIN_EMAIL};
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use userbase_api::actors::Clock;
use userbase_shared::auth::generate_session_id;
use userbase_shared::db::pool::StorageConfig;
use userbase_shared::ids::ActorId;
use userbase_shared::models::session::SESSION_TTL_MS;
use userbase_shared::models::{JsonMap, ROLE_USER};

/// A well-formed cookie naming a user that was never created
fn forged_cookie() -> String {
    format!("session_id={}:{}", generate_session_id(), ActorId::new_unique())
}

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();

    let response = ctx.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "connected");
    assert!(body["instances"].as_u64().unwrap() >= 1);
    assert_eq!(response.header(header::X_CONTENT_TYPE_OPTIONS), Some("nosniff"));
}

#[tokio::test]
async fn test_me_requires_session() {
    let ctx = TestContext::new();

    let response = ctx.get("/users/me", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["error"], "unauthorized");

    let response = ctx.get("/users/me", Some("session_id=garbage")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let forged = format!("session_id=not-a-session:{}", ActorId::new_unique());
    let response = ctx.get("/users/me", Some(&forged)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_profile_and_current_account() {
    let ctx = TestContext::new();
    let login = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let cookie = login.cookie.pair();

    let response = ctx.get("/users/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header(header::CACHE_CONTROL), Some("no-store"));

    let body = response.json();
    assert_eq!(body["valid"], true);
    assert_eq!(body["is_admin"], false);
    assert_eq!(body["profile"]["name"], "Ada");
    assert_eq!(body["profile"]["provider"], "google");

    let account_id = login.personal_account.unwrap();
    assert_eq!(body["account"]["id"], account_id.to_string());
    assert_eq!(body["account"]["name"], "Ada's account");
    assert_eq!(body["account"]["role"], 1);
}

#[tokio::test]
async fn test_cookie_among_others() {
    let ctx = TestContext::new();
    let login = ctx.login("subject-1", "Ada", "ada@example.com").await;

    let cookie = format!("theme=dark; {}; lang=en", login.cookie.pair());
    let response = ctx.get("/users/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);

    let cookie = format!("theme=dark;junk;{};lang=en", login.cookie.pair());
    let response = ctx.get("/users/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_and_switch_accounts() {
    let ctx = TestContext::new();
    let login = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let cookie = login.cookie.pair();
    let personal = login.personal_account.unwrap();

    let team = ActorId::new_unique();
    let info: JsonMap = serde_json::from_value(json!({ "name": "Team" })).unwrap();
    ctx.account(&team).update_info(&info).await.unwrap();
    ctx.account(&team).add_member(&login.user_id, ROLE_USER).await.unwrap();

    let response = ctx.get("/users/me/accounts", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);

    let items = response.json();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    let find = |id: &ActorId| {
        items
            .iter()
            .find(|item| item["account_id"] == id.to_string())
            .unwrap()
            .clone()
    };
    assert_eq!(find(&personal)["is_current"], true);
    assert_eq!(find(&team)["is_current"], false);
    assert_eq!(find(&team)["name"], "Team");

    let response = ctx
        .post(
            "/users/me/accounts/switch",
            json!({ "account_id": team }),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["success"], true);

    let body = ctx.get("/users/me", Some(&cookie)).await.json();
    assert_eq!(body["account"]["id"], team.to_string());
    assert_eq!(body["account"]["role"], ROLE_USER);
}

#[tokio::test]
async fn test_switch_rejections() {
    let ctx = TestContext::new();
    let login = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let cookie = login.cookie.pair();

    let response = ctx
        .post(
            "/users/me/accounts/switch",
            json!({ "account_id": ActorId::new_unique() }),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = ctx
        .post("/users/me/accounts/switch", json!({ "account_id": "" }), Some(&cookie))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["error"], "validation_error");

    let response = ctx
        .post("/users/me/accounts/switch", json!({ "account_id": "a" }), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_images() {
    let ctx = TestContext::new();
    let login = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let cookie = login.cookie.pair();

    let response = ctx.get("/users/me/avatar", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    ctx.user(&login.user_id)
        .store_image("provider-icon", "<svg/>".into(), "image/svg+xml")
        .await
        .unwrap();

    let response = ctx.get("/users/me/provider-icon", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header(header::CONTENT_TYPE), Some("image/svg+xml"));
    assert_eq!(
        response.header(header::CACHE_CONTROL),
        Some("private, max-age=3600")
    );
    assert_eq!(response.body, b"<svg/>".to_vec());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let ctx = TestContext::new();
    let login = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let cookie = login.cookie.pair();

    let response = ctx
        .send(request(Method::POST, "/users/logout", None, Some(&cookie)))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["success"], true);

    let set_cookie = response.header(header::SET_COOKIE).unwrap();
    assert!(set_cookie.starts_with("session_id=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("HttpOnly"));

    let response = ctx.get("/users/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    // Without a cookie logout still clears it
    let response = ctx
        .send(request(Method::POST, "/users/logout", None, None))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.header(header::SET_COOKIE).is_some());
}

#[tokio::test]
async fn test_admin_requires_admin_email() {
    let ctx = TestContext::new();

    let response = ctx.get("/users/admin/users", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let member = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let response = ctx
        .get("/users/admin/users", Some(&member.cookie.pair()))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let admin = ctx.login("subject-2", "Admin", ADMIN_EMAIL).await;
    let cookie = admin.cookie.pair();

    let body = ctx.get("/users/me", Some(&cookie)).await.json();
    assert_eq!(body["is_admin"], true);

    let response = ctx.get("/users/admin/users?q=ada", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    let users = response.json();
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["id"], member.user_id.to_string());

    let uri = format!("/users/admin/users/{}", member.user_id);
    let profile = ctx.get(&uri, Some(&cookie)).await.json();
    assert_eq!(profile["name"], "Ada");

    let accounts = ctx.get("/users/admin/accounts", Some(&cookie)).await.json();
    assert_eq!(accounts.as_array().unwrap().len(), 2);

    let account_id = member.personal_account.unwrap();
    let uri = format!("/users/admin/accounts/{}", account_id);
    let account = ctx.get(&uri, Some(&cookie)).await.json();
    assert_eq!(account["name"], "Ada's account");
    assert_eq!(account["billing"]["state"]["plan_slug"], "free");
}

#[tokio::test]
async fn test_security_headers() {
    let ctx = TestContext::new();

    let response = ctx.get("/users/me", None).await;
    assert_eq!(response.header(header::X_FRAME_OPTIONS), Some("DENY"));
    assert_eq!(response.header(header::X_CONTENT_TYPE_OPTIONS), Some("nosniff"));
    assert_eq!(response.header(header::CACHE_CONTROL), Some("no-store"));
    // Not in production
    assert!(response.header(header::STRICT_TRANSPORT_SECURITY).is_none());

    let response = ctx.get("/health", None).await;
    assert!(response.header(header::CACHE_CONTROL).is_none());
}

#[tokio::test]
async fn test_unknown_route() {
    let ctx = TestContext::new();

    let response = ctx.get("/nope", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_switching_between_two_memberships() {
    let ctx = TestContext::new();
    let user_id = ActorId::new_unique();
    let user = ctx.user(&user_id);

    let session = user.create_session(None).await.unwrap();
    assert!(user.validate_session(&session.session_id).await.unwrap().valid);

    let first = ActorId::new_unique();
    let second = ActorId::new_unique();
    user.add_membership(&first, ROLE_USER, Some(true)).await.unwrap();
    user.add_membership(&second, ROLE_USER, None).await.unwrap();

    user.switch_account(&second).await.unwrap();

    let current: Vec<String> = user
        .memberships()
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.is_current)
        .map(|m| m.account_id)
        .collect();
    assert_eq!(current, vec![second.to_string()]);
}

#[tokio::test]
async fn test_forged_cookies_create_no_actors() {
    let ctx = TestContext::new();
    let before = ctx.directory.instance_count().await;

    for i in 0..20 {
        let cookie = if i % 2 == 0 {
            forged_cookie()
        } else {
            format!("session_id=x:{}", ActorId::new_unique())
        };
        for uri in ["/users/me", "/users/me/accounts", "/users/me/avatar"] {
            let response = ctx.get(uri, Some(&cookie)).await;
            assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{}", uri);
        }

        let response = ctx
            .send(request(Method::POST, "/users/logout", None, Some(&cookie)))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    assert_eq!(ctx.directory.instance_count().await, before);
}

#[tokio::test]
async fn test_forged_cookies_leave_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = TestContext::with_storage(StorageConfig::directory(dir.path()));

    for _ in 0..5 {
        let response = ctx.get("/users/me", Some(&forged_cookie())).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    assert!(!dir.path().join("user").exists());
    assert_eq!(ctx.directory.instance_count().await, 0);

    // A real login still lands on disk
    let login = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let response = ctx.get("/users/me", Some(&login.cookie.pair())).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(dir
        .path()
        .join("user")
        .join(format!("{}.sqlite", login.user_id))
        .exists());
}

#[tokio::test]
async fn test_admin_lookup_of_unknown_actor() {
    let ctx = TestContext::new();
    let admin = ctx.login("subject-2", "Admin", ADMIN_EMAIL).await;
    let cookie = admin.cookie.pair();
    let before = ctx.directory.instance_count().await;

    let unknown = ActorId::new_unique();
    for uri in [
        format!("/users/admin/users/{}", unknown),
        format!("/users/admin/accounts/{}", unknown),
    ] {
        let response = ctx.get(&uri, Some(&cookie)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{}", uri);
    }

    assert_eq!(ctx.directory.instance_count().await, before);
}

#[tokio::test]
async fn test_expired_session_cookie_is_rejected() {
    let now = Arc::new(AtomicI64::new(1_700_000_000_000));
    let clock_now = now.clone();
    let ctx = TestContext::with_clock(Clock::from_fn(move || clock_now.load(Ordering::SeqCst)));

    let login = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let cookie = login.cookie.pair();

    now.fetch_add(SESSION_TTL_MS, Ordering::SeqCst);
    let response = ctx.get("/users/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);

    now.fetch_add(1, Ordering::SeqCst);
    let response = ctx.get("/users/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["error"], "unauthorized");
}
