/// User actor
///
/// One instance per human identity. Owns the profile, OAuth credentials,
/// login sessions, images and the user's view of its account memberships.
///
/// # Interface
///
/// | Method | Path                   | Body                                   | Response                       |
/// |--------|------------------------|----------------------------------------|--------------------------------|
/// | GET    | `/profile`             | -                                      | profile mapping                |
/// | POST   | `/profile`             | mapping                                | `{success}`                    |
/// | POST   | `/credentials`         | `{provider, subject_id, ...}`          | `{success}`, 400 if incomplete |
/// | POST   | `/sessions`            | `{meta?}` (optional)                   | `{sessionId, expiresAt}`       |
/// | DELETE | `/sessions`            | `{sessionId}`                          | `{success}`                    |
/// | POST   | `/validate-session`    | `{sessionId}`                          | `{valid, profile?}`, 401       |
/// | GET    | `/memberships`         | -                                      | rows                           |
/// | POST   | `/memberships`         | `{account_id, role, is_current?}`      | `{success}`                    |
/// | DELETE | `/memberships`         | `{account_id}`                         | `{success}`                    |
/// | GET    | `/memberships/current` | -                                      | row or `null`                  |
/// | POST   | `/switch-account`      | `{account_id}`                         | `{success}`, 404               |
/// | GET    | `/images/:key`         | -                                      | bytes + `Content-Type`, 404    |
/// | PUT    | `/images/:key`         | bytes + `Content-Type`                 | `{success}`                    |
///
/// # Current Account
///
/// At most one membership is current. Writes that can set the flag clear it
/// everywhere first, in the same transaction.

use super::{success, ActorContext};
use crate::error::{ActorError, ActorResult};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use userbase_shared::auth::generate_session_id;
use userbase_shared::models::credential::{Credential, UpsertCredential};
use userbase_shared::models::image::{Image, DEFAULT_MIME_TYPE};
use userbase_shared::models::kv::{self, KvTable};
use userbase_shared::models::membership::Membership;
use userbase_shared::models::session::Session;
use userbase_shared::models::{JsonMap, ROLE_USER};

/// Routes of a user instance
pub fn router() -> Router<ActorContext> {
    Router::new()
        .route("/profile", get(get_profile).post(update_profile))
        .route("/credentials", post(add_credential))
        .route("/sessions", post(create_session).delete(delete_session))
        .route("/validate-session", post(validate_session))
        .route(
            "/memberships",
            get(get_memberships)
                .post(add_membership)
                .delete(delete_membership),
        )
        .route("/memberships/current", get(get_current_membership))
        .route("/switch-account", post(switch_account))
        .route("/images/:key", put(store_image).get(get_image))
}

async fn get_profile(State(ctx): State<ActorContext>) -> ActorResult<Json<JsonMap>> {
    Ok(Json(kv::get_all(&ctx.pool, KvTable::Profile).await?))
}

async fn update_profile(
    State(ctx): State<ActorContext>,
    Json(changes): Json<JsonMap>,
) -> ActorResult<Json<JsonValue>> {
    kv::upsert_all(&ctx.pool, KvTable::Profile, &changes).await?;

    tracing::debug!(user_id = %ctx.id, keys = changes.len(), "Profile updated");
    Ok(success())
}

/// `POST /credentials` body; provider and subject are checked by hand so a
/// missing one is a 400 rather than a decode failure
#[derive(Debug, Deserialize)]
struct AddCredentialRequest {
    provider: Option<String>,
    subject_id: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    scope: Option<String>,

    #[serde(default)]
    profile_data: JsonValue,
}

async fn add_credential(
    State(ctx): State<ActorContext>,
    Json(req): Json<AddCredentialRequest>,
) -> ActorResult<Json<JsonValue>> {
    let (provider, subject_id) = match (req.provider, req.subject_id) {
        (Some(p), Some(s)) if !p.is_empty() && !s.is_empty() => (p, s),
        _ => {
            return Err(ActorError::InvalidInput(
                "Missing provider or subject_id".to_string(),
            ))
        }
    };

    let credential = Credential::upsert(
        &ctx.pool,
        &UpsertCredential {
            provider,
            subject_id,
            access_token: req.access_token,
            refresh_token: req.refresh_token,
            expires_at: req.expires_at,
            scope: req.scope,
            profile_data: req.profile_data,
        },
        ctx.clock.now(),
    )
    .await?;

    tracing::info!(user_id = %ctx.id, provider = %credential.provider, "Credential stored");
    Ok(success())
}

#[derive(Debug, Default, Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    meta: Option<JsonValue>,
}

async fn create_session(
    State(ctx): State<ActorContext>,
    body: Bytes,
) -> ActorResult<Json<JsonValue>> {
    // The body is optional
    let req: CreateSessionRequest = if body.is_empty() {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ActorError::InvalidInput(format!("Invalid session request: {}", e)))?
    };

    let session = Session::create(
        &ctx.pool,
        &generate_session_id(),
        ctx.clock.now(),
        req.meta.as_ref().filter(|m| !m.is_null()),
    )
    .await?;

    tracing::info!(user_id = %ctx.id, expires_at = session.expires_at, "Session created");
    Ok(Json(json!({
        "sessionId": session.id,
        "expiresAt": session.expires_at,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest {
    #[serde(default)]
    session_id: Option<String>,
}

async fn delete_session(
    State(ctx): State<ActorContext>,
    Json(req): Json<SessionRequest>,
) -> ActorResult<Json<JsonValue>> {
    if let Some(session_id) = req.session_id {
        let deleted = Session::delete(&ctx.pool, &session_id).await?;
        tracing::debug!(user_id = %ctx.id, deleted, "Session deleted");
    }

    Ok(success())
}

async fn validate_session(
    State(ctx): State<ActorContext>,
    Json(req): Json<SessionRequest>,
) -> ActorResult<Response> {
    let now = ctx.clock.now();

    let session = match req.session_id.as_deref().filter(|s| !s.is_empty()) {
        Some(id) => Session::find(&ctx.pool, id).await?,
        None => None,
    };

    match session {
        Some(session) if !session.is_expired(now) => {}
        _ => return Ok((StatusCode::UNAUTHORIZED, Json(json!({ "valid": false }))).into_response()),
    }

    let profile = match Credential::latest(&ctx.pool).await? {
        Some(credential) => {
            let mut profile = match credential.profile_data {
                JsonValue::Object(map) => map,
                _ => JsonMap::new(),
            };
            profile.insert("provider".to_string(), json!(credential.provider));
            JsonValue::Object(profile)
        }
        None => json!({}),
    };

    Ok(Json(json!({ "valid": true, "profile": profile })).into_response())
}

async fn get_memberships(State(ctx): State<ActorContext>) -> ActorResult<Json<Vec<Membership>>> {
    Ok(Json(Membership::list(&ctx.pool).await?))
}

async fn get_current_membership(
    State(ctx): State<ActorContext>,
) -> ActorResult<Json<Option<Membership>>> {
    Ok(Json(Membership::current(&ctx.pool).await?))
}

#[derive(Debug, Deserialize)]
struct AddMembershipRequest {
    #[serde(default)]
    account_id: String,

    #[serde(default = "default_role")]
    role: i64,

    /// Absent keeps the stored flag
    #[serde(default)]
    is_current: Option<bool>,
}

fn default_role() -> i64 {
    ROLE_USER
}

async fn add_membership(
    State(ctx): State<ActorContext>,
    Json(req): Json<AddMembershipRequest>,
) -> ActorResult<Json<JsonValue>> {
    if req.account_id.is_empty() {
        return Err(ActorError::InvalidInput("Missing account_id".to_string()));
    }

    let membership =
        Membership::upsert(&ctx.pool, &req.account_id, req.role, req.is_current).await?;

    tracing::info!(
        user_id = %ctx.id,
        account_id = %membership.account_id,
        role = membership.role,
        is_current = membership.is_current,
        "Membership stored"
    );
    Ok(success())
}

#[derive(Debug, Deserialize)]
struct AccountRequest {
    #[serde(default)]
    account_id: String,
}

async fn delete_membership(
    State(ctx): State<ActorContext>,
    Json(req): Json<AccountRequest>,
) -> ActorResult<Json<JsonValue>> {
    let deleted = Membership::delete(&ctx.pool, &req.account_id).await?;

    tracing::info!(user_id = %ctx.id, account_id = %req.account_id, deleted, "Membership deleted");
    Ok(success())
}

async fn switch_account(
    State(ctx): State<ActorContext>,
    Json(req): Json<AccountRequest>,
) -> ActorResult<Json<JsonValue>> {
    if !Membership::switch_current(&ctx.pool, &req.account_id).await? {
        return Err(ActorError::NotFound(format!(
            "No membership for account {}",
            req.account_id
        )));
    }

    tracing::info!(user_id = %ctx.id, account_id = %req.account_id, "Switched current account");
    Ok(success())
}

async fn store_image(
    State(ctx): State<ActorContext>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ActorResult<Json<JsonValue>> {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_MIME_TYPE);

    Image::put(&ctx.pool, &key, &body, mime_type).await?;

    tracing::debug!(user_id = %ctx.id, key = %key, bytes = body.len(), "Image stored");
    Ok(success())
}

async fn get_image(
    State(ctx): State<ActorContext>,
    Path(key): Path<String>,
) -> ActorResult<Response> {
    let image = Image::get(&ctx.pool, &key)
        .await?
        .ok_or_else(|| ActorError::NotFound(format!("Image not found: {}", key)))?;

    Ok(([(header::CONTENT_TYPE, image.mime_type)], image.bytes).into_response())
}
