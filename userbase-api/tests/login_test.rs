/// Integration tests for login completion
///
/// These tests verify that:
/// - A provider identity always maps to the same user
/// - The first login provisions exactly one personal account
/// - Avatar and provider icon handling is best-effort
/// - The profile is seeded from the provider without overwriting edits
/// - Users are registered in the system index

mod common;

use axum::{http::header, routing::get, Router};
use common::{TestContext, AVATAR_FETCH_TIMEOUT_SECS};
use serde_json::json;
use std::time::{Duration, Instant};
use userbase_api::error::ActorError;
use userbase_api::login::{complete_login, LoginOptions, ProviderLogin};
use userbase_shared::ids::ActorId;
use userbase_shared::models::image::{AVATAR_KEY, PROVIDER_ICON_KEY};
use userbase_shared::models::{JsonMap, ROLE_ADMIN};

/// Serves a fixed PNG at `/avatar.png` and returns its URL
async fn spawn_avatar_server() -> String {
    let app = Router::new().route(
        "/avatar.png",
        get(|| async { ([(header::CONTENT_TYPE, "image/png")], b"\x89PNG-avatar".to_vec()) }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/avatar.png", addr)
}

/// Accepts connections but answers only after `delay`
async fn spawn_slow_server(delay: Duration) -> String {
    let app = Router::new().route(
        "/avatar.png",
        get(move || async move {
            tokio::time::sleep(delay).await;
            ([(header::CONTENT_TYPE, "image/png")], b"late".to_vec())
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/avatar.png", addr)
}

#[tokio::test]
async fn test_login_is_deterministic_per_identity() {
    let ctx = TestContext::new();

    let first = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let second = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let other = ctx.login("subject-2", "Grace", "grace@example.com").await;

    assert_eq!(first.user_id, ActorId::from_name("google:subject-1"));
    assert_eq!(first.user_id, second.user_id);
    assert_ne!(first.user_id, other.user_id);

    // Each login is its own session
    assert_ne!(first.session.session_id, second.session.session_id);
    let user = ctx.user(&first.user_id);
    assert!(user.validate_session(&first.session.session_id).await.unwrap().valid);
    assert!(user.validate_session(&second.session.session_id).await.unwrap().valid);

    assert_eq!(second.cookie.user_id, first.user_id);
    assert_eq!(second.cookie.session_id, second.session.session_id);
}

#[tokio::test]
async fn test_first_login_provisions_personal_account() {
    let ctx = TestContext::new();

    let first = ctx.login("subject-1", "Ada", "ada@example.com").await;
    let account_id = first.personal_account.clone().unwrap();

    let memberships = ctx.user(&first.user_id).memberships().await.unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].account_id, account_id.to_string());
    assert_eq!(memberships[0].role, ROLE_ADMIN);
    assert!(memberships[0].is_current);

    let account = ctx.account(&account_id);
    let info = account.get_info().await.unwrap();
    assert_eq!(info["name"], "Ada's account");
    assert_eq!(info["personal"], true);

    let members = account.members().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, first.user_id.to_string());

    let indexed = ctx.system().list_accounts(Some("ada's")).await.unwrap();
    assert_eq!(indexed.len(), 1);
    assert_eq!(indexed[0].id, account_id.to_string());

    // Later logins reuse the existing membership
    let second = ctx.login("subject-1", "Ada", "ada@example.com").await;
    assert!(second.personal_account.is_none());
    assert_eq!(ctx.user(&first.user_id).memberships().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_login_registers_user_in_index() {
    let ctx = TestContext::new();

    let outcome = ctx.login("subject-1", "Ada Lovelace", "ada@example.com").await;

    let rows = ctx.system().list_users(Some("lovelace")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, outcome.user_id.to_string());
    assert_eq!(rows[0].email.as_deref(), Some("ada@example.com"));
    assert_eq!(rows[0].provider.as_deref(), Some("google"));
}

#[tokio::test]
async fn test_avatar_is_stored_and_picture_rewritten() {
    let ctx = TestContext::new();
    let url = spawn_avatar_server().await;

    let mut login = ProviderLogin::new("google", "subject-1");
    login.profile.insert("name".to_string(), "Ada".into());
    login.profile.insert("picture".to_string(), url.into());

    let outcome = complete_login(&ctx.directory, login, &ctx.login_options())
        .await
        .unwrap();

    let user = ctx.user(&outcome.user_id);
    let avatar = user.get_image(AVATAR_KEY).await.unwrap();
    assert_eq!(avatar.bytes, b"\x89PNG-avatar".to_vec());
    assert_eq!(avatar.mime_type, "image/png");

    let check = user.validate_session(&outcome.session.session_id).await.unwrap();
    assert_eq!(check.profile.unwrap()["picture"], "/users/me/avatar");
}

#[tokio::test]
async fn test_avatar_failure_keeps_original_picture() {
    let ctx = TestContext::new();
    let unreachable = "http://127.0.0.1:1/avatar.png";

    let mut login = ProviderLogin::new("google", "subject-1");
    login.profile.insert("picture".to_string(), unreachable.into());

    let outcome = complete_login(&ctx.directory, login, &ctx.login_options())
        .await
        .unwrap();

    let user = ctx.user(&outcome.user_id);
    let err = user.get_image(AVATAR_KEY).await.unwrap_err();
    assert!(matches!(err, ActorError::NotFound(_)), "{:?}", err);

    let check = user.validate_session(&outcome.session.session_id).await.unwrap();
    assert_eq!(check.profile.unwrap()["picture"], unreachable);
}

#[tokio::test]
async fn test_provider_icon_is_stored() {
    let ctx = TestContext::new();

    let mut login = ProviderLogin::new("github", "octo");
    login.profile.insert("name".to_string(), "Octo".into());
    login.provider_icon_svg = Some("<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_string());
    login.access_token = Some("gho_token".to_string());

    let outcome = complete_login(&ctx.directory, login, &ctx.login_options())
        .await
        .unwrap();

    let user = ctx.user(&outcome.user_id);
    let icon = user.get_image(PROVIDER_ICON_KEY).await.unwrap();
    assert_eq!(icon.mime_type, "image/svg+xml");
    assert!(icon.bytes.starts_with(b"<svg"));

    let profile = user
        .validate_session(&outcome.session.session_id)
        .await
        .unwrap()
        .profile
        .unwrap();
    assert_eq!(profile["provider_icon"], "/users/me/provider-icon");
    assert_eq!(profile["provider"], "github");
}

#[tokio::test]
async fn test_login_requires_provider_and_subject() {
    let ctx = TestContext::new();

    for login in [
        ProviderLogin::new("", "subject-1"),
        ProviderLogin::new("google", ""),
    ] {
        let err = complete_login(&ctx.directory, login, &ctx.login_options())
            .await
            .unwrap_err();
        assert!(matches!(err, ActorError::InvalidInput(_)), "{:?}", err);
    }

    assert!(ctx.system().list_users(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_login_seeds_profile() {
    let ctx = TestContext::new();

    let outcome = ctx.login("subject-1", "Ada", "ada@example.com").await;

    let profile = ctx.user(&outcome.user_id).get_profile().await.unwrap();
    assert_eq!(profile["name"], "Ada");
    assert_eq!(profile["email"], "ada@example.com");
    assert_eq!(profile["provider"], "google");
    // Only the seeded keys, not the whole provider profile
    assert!(profile.get("id").is_none());

    let live = ctx.system().get_user(outcome.user_id.as_str()).await.unwrap();
    assert_eq!(live["name"], "Ada");
}

#[tokio::test]
async fn test_login_keeps_edited_profile_fields() {
    let ctx = TestContext::new();
    let outcome = ctx.login("subject-1", "Ada", "ada@example.com").await;

    let changes: JsonMap = serde_json::from_value(json!({ "name": "Countess" })).unwrap();
    ctx.system()
        .update_user(outcome.user_id.as_str(), &changes)
        .await
        .unwrap();

    ctx.login("subject-1", "Ada", "ada@example.com").await;

    let profile = ctx.user(&outcome.user_id).get_profile().await.unwrap();
    assert_eq!(profile["name"], "Countess");
    assert_eq!(profile["email"], "ada@example.com");
}

#[tokio::test]
async fn test_login_options_follow_app_state() {
    let ctx = TestContext::new();

    let options = LoginOptions::from_state(&ctx.state);
    assert_eq!(options.users_path, ctx.config.users.path);
}

#[tokio::test]
async fn test_slow_avatar_is_abandoned_after_timeout() {
    let ctx = TestContext::new();
    let url = spawn_slow_server(Duration::from_secs(30)).await;

    let mut login = ProviderLogin::new("google", "subject-1");
    login.profile.insert("picture".to_string(), url.clone().into());

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(AVATAR_FETCH_TIMEOUT_SECS + 10),
        complete_login(&ctx.directory, login, &ctx.login_options()),
    )
    .await
    .expect("login waited on the avatar past its timeout")
    .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(AVATAR_FETCH_TIMEOUT_SECS));

    let user = ctx.user(&outcome.user_id);
    let err = user.get_image(AVATAR_KEY).await.unwrap_err();
    assert!(matches!(err, ActorError::NotFound(_)), "{:?}", err);

    let profile = user.get_profile().await.unwrap();
    assert_eq!(profile["picture"], url);
}
