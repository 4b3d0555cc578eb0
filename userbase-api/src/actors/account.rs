/// Account actor
///
/// One instance per account. Owns free-form info fields, the member roster and
/// the billing record (stored under the reserved info key `billing`).
///
/// # Interface
///
/// | Method | Path                 | Body                        | Response                  |
/// |--------|----------------------|-----------------------------|---------------------------|
/// | GET    | `/info`              | -                           | info mapping              |
/// | POST   | `/info`              | mapping                     | `{success}`               |
/// | GET    | `/members`           | -                           | rows                      |
/// | POST   | `/members`           | `{user_id, role}`           | `{success}`               |
/// | DELETE | `/members/:user_id`  | -                           | `{success}`               |
/// | GET    | `/billing`           | -                           | `{state, plan_details}`   |
/// | POST   | `/billing/subscribe` | `{plan_slug, schedule_idx?}`| `{success, state}`        |
/// | POST   | `/billing/cancel`    | -                           | `{success, state}`        |
///
/// # Membership Sync
///
/// The roster is the source of truth. After a roster write commits, the
/// matching user actor's membership is updated with a best-effort call; a
/// failure there is logged and the roster write still succeeds.
///
/// # Billing
///
/// The billing record changes only after every hook and the payment engine
/// have succeeded, so a failed subscribe leaves the stored state untouched.

use super::stub::UserStub;
use super::{success, ActorContext, Directory};
use crate::error::{ActorError, ActorResult};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use userbase_shared::billing::state::{self as billing, BILLING_INFO_KEY};
use userbase_shared::billing::{BillingState, Plan};
use userbase_shared::ids::ActorId;
use userbase_shared::models::kv::{self, KvTable};
use userbase_shared::models::member::Member;
use userbase_shared::models::{JsonMap, ROLE_USER};

/// Routes of an account instance
pub fn router() -> Router<ActorContext> {
    Router::new()
        .route("/info", get(get_info).post(update_info))
        .route("/members", get(get_members).post(add_member))
        .route("/members/:user_id", delete(remove_member))
        .route("/billing", get(get_billing))
        .route("/billing/subscribe", post(subscribe))
        .route("/billing/cancel", post(cancel_subscription))
}

async fn get_info(State(ctx): State<ActorContext>) -> ActorResult<Json<JsonMap>> {
    Ok(Json(kv::get_all(&ctx.pool, KvTable::AccountInfo).await?))
}

async fn update_info(
    State(ctx): State<ActorContext>,
    Json(changes): Json<JsonMap>,
) -> ActorResult<Json<JsonValue>> {
    kv::upsert_all(&ctx.pool, KvTable::AccountInfo, &changes).await?;

    tracing::debug!(account_id = %ctx.id, keys = changes.len(), "Account info updated");
    Ok(success())
}

async fn get_members(State(ctx): State<ActorContext>) -> ActorResult<Json<Vec<Member>>> {
    Ok(Json(Member::list(&ctx.pool).await?))
}

#[derive(Debug, Deserialize)]
struct AddMemberRequest {
    #[serde(default)]
    user_id: String,

    #[serde(default = "default_role")]
    role: i64,
}

fn default_role() -> i64 {
    ROLE_USER
}

async fn add_member(
    State(ctx): State<ActorContext>,
    Extension(directory): Extension<Directory>,
    Json(req): Json<AddMemberRequest>,
) -> ActorResult<Json<JsonValue>> {
    let user_id = ActorId::parse(&req.user_id)
        .map_err(|e| ActorError::InvalidInput(format!("Invalid user_id: {}", e)))?;

    Member::upsert(&ctx.pool, user_id.as_str(), req.role, ctx.clock.now()).await?;

    tracing::info!(account_id = %ctx.id, user_id = %user_id, role = req.role, "Member added");

    // Roster write is committed; the user side is best-effort
    let user = UserStub::new(directory, user_id);
    if let Err(e) = user.add_membership(&ctx.id, req.role, None).await {
        tracing::warn!(
            account_id = %ctx.id,
            user_id = %user.id(),
            error = %e,
            "Failed to sync membership to user"
        );
    }

    Ok(success())
}

async fn remove_member(
    State(ctx): State<ActorContext>,
    Extension(directory): Extension<Directory>,
    Path(user_id): Path<String>,
) -> ActorResult<Json<JsonValue>> {
    let removed = Member::delete(&ctx.pool, &user_id).await?;

    tracing::info!(account_id = %ctx.id, user_id = %user_id, removed, "Member removed");

    match ActorId::parse(&user_id) {
        Ok(user_id) => {
            let user = UserStub::new(directory, user_id);
            if let Err(e) = user.delete_membership(&ctx.id).await {
                tracing::warn!(
                    account_id = %ctx.id,
                    user_id = %user.id(),
                    error = %e,
                    "Failed to remove membership from user"
                );
            }
        }
        Err(e) => {
            tracing::warn!(account_id = %ctx.id, user_id = %user_id, error = %e, "Skipping membership sync");
        }
    }

    Ok(success())
}

/// Reads the stored billing record, defaulting to free/active
async fn load_billing(ctx: &ActorContext) -> ActorResult<BillingState> {
    let stored = kv::get(&ctx.pool, KvTable::AccountInfo, BILLING_INFO_KEY).await?;

    let state = match stored {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(account_id = %ctx.id, error = %e, "Unreadable billing record, using default");
            BillingState::default()
        }),
        None => BillingState::default(),
    };

    Ok(state)
}

async fn store_billing(ctx: &ActorContext, state: &BillingState) -> ActorResult<()> {
    kv::put(&ctx.pool, KvTable::AccountInfo, BILLING_INFO_KEY, &json!(state)).await?;
    Ok(())
}

async fn get_billing(State(ctx): State<ActorContext>) -> ActorResult<Json<JsonValue>> {
    let state = load_billing(&ctx).await?;
    let plan_details = ctx.plans.get(&state.plan_slug).map(|plan| json!(plan));

    Ok(Json(json!({
        "state": state,
        "plan_details": plan_details,
    })))
}

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    #[serde(default)]
    plan_slug: String,

    /// Defaults to the plan's default schedule
    #[serde(default)]
    schedule_idx: Option<usize>,
}

async fn subscribe(
    State(ctx): State<ActorContext>,
    Json(req): Json<SubscribeRequest>,
) -> ActorResult<Json<JsonValue>> {
    if req.plan_slug.is_empty() {
        return Err(ActorError::InvalidInput("Missing plan_slug".to_string()));
    }

    // An unknown slug is rejected by the state machine
    let schedule_idx = req.schedule_idx.unwrap_or_else(|| {
        ctx.plans
            .get(&req.plan_slug)
            .map(Plan::default_schedule_idx)
            .unwrap_or(0)
    });

    let current = load_billing(&ctx).await?;
    let next = billing::subscribe(
        &ctx.plans,
        ctx.payments.as_ref(),
        ctx.id.as_str(),
        &current,
        &req.plan_slug,
        schedule_idx,
        ctx.clock.now(),
    )
    .await?;

    store_billing(&ctx, &next).await?;

    Ok(Json(json!({ "success": true, "state": next })))
}

async fn cancel_subscription(State(ctx): State<ActorContext>) -> ActorResult<Json<JsonValue>> {
    let current = load_billing(&ctx).await?;
    let next = billing::cancel(&ctx.plans, ctx.payments.as_ref(), ctx.id.as_str(), &current).await?;

    store_billing(&ctx, &next).await?;

    Ok(Json(json!({ "success": true, "state": next })))
}
