/// System index actor
///
/// A single global instance holding searchable, denormalized rows for every
/// registered user and account. The rows are never authoritative: single
/// reads go through to the owning actor, and updates write through to the
/// owner before patching the local row.
///
/// # Interface
///
/// | Method | Path            | Body                             | Response              |
/// |--------|-----------------|----------------------------------|-----------------------|
/// | GET    | `/users?q=`     | -                                | rows (newest, ≤50)    |
/// | POST   | `/users`        | `{id, name?, email?, provider?}` | `{success}`           |
/// | GET    | `/users/:id`    | -                                | live profile, 404     |
/// | PUT    | `/users/:id`    | profile changes                  | `{success}`           |
/// | GET    | `/accounts?q=`  | -                                | rows (newest, ≤50)    |
/// | POST   | `/accounts`     | `{id, name?, status?, plan?}`    | `{success}`           |
/// | GET    | `/accounts/:id` | -                                | info + `billing`, 404 |
/// | PUT    | `/accounts/:id` | info changes                     | `{success}`           |

use super::stub::{AccountStub, UserStub};
use super::{success, ActorContext, Directory};
use crate::error::{ActorError, ActorResult};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use userbase_shared::ids::{ActorId, ActorKind};
use userbase_shared::models::index::{
    AccountPatch, IndexedAccount, IndexedUser, RegisterAccount, RegisterUser, UserPatch,
};
use userbase_shared::models::JsonMap;

/// Routes of the system instance
pub fn router() -> Router<ActorContext> {
    Router::new()
        .route("/users", get(list_users).post(register_user))
        .route("/users/:id", get(get_user).put(update_user))
        .route("/accounts", get(list_accounts).post(register_account))
        .route("/accounts/:id", get(get_account).put(update_account))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    q: Option<String>,
}

async fn list_users(
    State(ctx): State<ActorContext>,
    Query(query): Query<ListQuery>,
) -> ActorResult<Json<Vec<IndexedUser>>> {
    Ok(Json(IndexedUser::list(&ctx.pool, query.q.as_deref()).await?))
}

async fn register_user(
    State(ctx): State<ActorContext>,
    Json(req): Json<RegisterUser>,
) -> ActorResult<Json<JsonValue>> {
    if req.id.is_empty() {
        return Err(ActorError::InvalidInput("Missing id".to_string()));
    }

    let user = IndexedUser::register(&ctx.pool, &req, ctx.clock.now()).await?;

    tracing::info!(user_id = %user.id, "User registered in index");
    Ok(success())
}

async fn get_user(
    Extension(directory): Extension<Directory>,
    Path(id): Path<String>,
) -> ActorResult<Json<JsonMap>> {
    let user_id = existing(&directory, ActorKind::User, &id).await?;
    let user = UserStub::new(directory, user_id);
    Ok(Json(user.get_profile().await?))
}

async fn update_user(
    State(ctx): State<ActorContext>,
    Extension(directory): Extension<Directory>,
    Path(id): Path<String>,
    Json(changes): Json<JsonMap>,
) -> ActorResult<Json<JsonValue>> {
    let write_through = match ActorId::parse(&id) {
        Ok(user_id) => UserStub::new(directory, user_id)
            .update_profile(&changes)
            .await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = write_through {
        tracing::warn!(user_id = %id, error = %e, "Failed to update user profile");
    }

    let patch = UserPatch {
        name: string_field(&changes, "name"),
        email: string_field(&changes, "email"),
    };
    let patched = IndexedUser::patch(&ctx.pool, &id, &patch).await?;

    tracing::debug!(user_id = %id, patched, "User index patched");
    Ok(success())
}

async fn list_accounts(
    State(ctx): State<ActorContext>,
    Query(query): Query<ListQuery>,
) -> ActorResult<Json<Vec<IndexedAccount>>> {
    Ok(Json(IndexedAccount::list(&ctx.pool, query.q.as_deref()).await?))
}

async fn register_account(
    State(ctx): State<ActorContext>,
    Json(req): Json<RegisterAccount>,
) -> ActorResult<Json<JsonValue>> {
    if req.id.is_empty() {
        return Err(ActorError::InvalidInput("Missing id".to_string()));
    }

    let account = IndexedAccount::register(&ctx.pool, &req, ctx.clock.now()).await?;

    tracing::info!(account_id = %account.id, plan = %account.plan, "Account registered in index");
    Ok(success())
}

/// Live account info with the billing response fused in as `billing`
///
/// Each half falls back to `{}` if the account actor refuses it.
async fn get_account(
    Extension(directory): Extension<Directory>,
    Path(id): Path<String>,
) -> ActorResult<Json<JsonMap>> {
    let account_id = existing(&directory, ActorKind::Account, &id).await?;
    let account = AccountStub::new(directory, account_id);

    let mut fused = match account.get_info().await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(account_id = %id, error = %e, "Failed to read account info");
            JsonMap::new()
        }
    };

    let billing = match account.billing_json().await {
        Ok(billing) => billing,
        Err(e) => {
            tracing::warn!(account_id = %id, error = %e, "Failed to read account billing");
            json!({})
        }
    };
    fused.insert("billing".to_string(), billing);

    Ok(Json(fused))
}

async fn update_account(
    State(ctx): State<ActorContext>,
    Extension(directory): Extension<Directory>,
    Path(id): Path<String>,
    Json(changes): Json<JsonMap>,
) -> ActorResult<Json<JsonValue>> {
    let write_through = match ActorId::parse(&id) {
        Ok(account_id) => AccountStub::new(directory, account_id)
            .update_info(&changes)
            .await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = write_through {
        tracing::warn!(account_id = %id, error = %e, "Failed to update account info");
    }

    let patch = AccountPatch {
        name: string_field(&changes, "name"),
        status: string_field(&changes, "status"),
        plan: string_field(&changes, "plan"),
    };
    let patched = IndexedAccount::patch(&ctx.pool, &id, &patch).await?;

    tracing::debug!(account_id = %id, patched, "Account index patched");
    Ok(success())
}

/// Parses `id` and checks the actor exists, without creating it
async fn existing(directory: &Directory, kind: ActorKind, id: &str) -> ActorResult<ActorId> {
    let actor_id = ActorId::parse(id)?;
    if !directory.exists(kind, &actor_id).await {
        return Err(ActorError::NotFound(format!("Unknown {}: {}", kind, id)));
    }
    Ok(actor_id)
}

/// A string-valued field of an update body; other types are not indexed
fn string_field(changes: &JsonMap, key: &str) -> Option<String> {
    changes.get(key).and_then(JsonValue::as_str).map(str::to_string)
}
