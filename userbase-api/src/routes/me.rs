/// Current-user endpoints
///
/// Everything here acts on the caller identified by the session cookie.
///
/// # Endpoints
///
/// - `GET /users/me` - Session profile and current account
/// - `GET /users/me/accounts` - Memberships with account names
/// - `POST /users/me/accounts/switch` - Select the current account
/// - `GET /users/me/avatar` - Stored avatar image
/// - `GET /users/me/provider-icon` - Stored provider icon
/// - `POST /users/logout` - End the session and clear the cookie

use super::session::{session_cookie, SessionContext};
use crate::actors::stub::AccountStub;
use crate::actors::stub::UserStub;
use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use userbase_shared::auth::clear_cookie_header;
use userbase_shared::ids::ActorId;
use userbase_shared::models::image::{AVATAR_KEY, PROVIDER_ICON_KEY};
use userbase_shared::models::membership::Membership;
use validator::Validate;

/// `GET /users/me` response
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub valid: bool,
    pub profile: JsonValue,
    pub is_admin: bool,

    /// Current account: its info plus `id` and `role`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<JsonValue>,
}

/// One entry of `GET /users/me/accounts`
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountListItem {
    pub account_id: String,
    pub role: i64,
    pub is_current: bool,

    /// Account name, null if the account could not be read
    pub name: Option<String>,
}

/// Switch account request
#[derive(Debug, Deserialize, Validate)]
pub struct SwitchAccountRequest {
    #[validate(length(min = 1, max = 128, message = "account_id must be 1-128 characters"))]
    pub account_id: String,
}

/// Returns the caller's profile and current account
///
/// # Errors
///
/// - `401 Unauthorized`: Missing or invalid session
pub async fn get_me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<MeResponse>> {
    let is_admin = session
        .email()
        .map(|email| state.config.is_admin_email(email))
        .unwrap_or(false);

    let account = match session.user.current_membership().await? {
        Some(membership) => Some(current_account(&state, &membership).await),
        None => None,
    };

    Ok(Json(MeResponse {
        valid: true,
        profile: session.profile,
        is_admin,
        account,
    }))
}

async fn current_account(state: &AppState, membership: &Membership) -> JsonValue {
    let mut account = match ActorId::parse(&membership.account_id) {
        Ok(id) => match AccountStub::new(state.directory.clone(), id).get_info().await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(account_id = %membership.account_id, error = %e, "Failed to read current account");
                Default::default()
            }
        },
        Err(e) => {
            tracing::warn!(account_id = %membership.account_id, error = %e, "Invalid current account id");
            Default::default()
        }
    };

    account.insert("id".to_string(), json!(membership.account_id));
    account.insert("role".to_string(), json!(membership.role));
    JsonValue::Object(account)
}

/// Lists the caller's memberships, each with its account's name
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<Vec<AccountListItem>>> {
    let memberships = session.user.memberships().await?;

    let mut items = Vec::with_capacity(memberships.len());
    for membership in memberships {
        let name = account_name(&state, &membership.account_id).await;
        items.push(AccountListItem {
            account_id: membership.account_id,
            role: membership.role,
            is_current: membership.is_current,
            name,
        });
    }

    Ok(Json(items))
}

async fn account_name(state: &AppState, account_id: &str) -> Option<String> {
    let id = ActorId::parse(account_id).ok()?;

    match AccountStub::new(state.directory.clone(), id).get_info().await {
        Ok(info) => info.get("name").and_then(JsonValue::as_str).map(str::to_string),
        Err(e) => {
            tracing::warn!(account_id = %account_id, error = %e, "Failed to read account name");
            None
        }
    }
}

/// Makes one of the caller's accounts current
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Missing account_id
/// - `404 Not Found`: The caller is not a member of the account
pub async fn switch_account(
    Extension(session): Extension<SessionContext>,
    Json(req): Json<SwitchAccountRequest>,
) -> ApiResult<Json<JsonValue>> {
    req.validate()?;

    let account_id = ActorId::parse(&req.account_id)
        .map_err(|_| ApiError::NotFound(format!("No membership for account {}", req.account_id)))?;

    session.user.switch_account(&account_id).await?;

    tracing::info!(user_id = %session.user.id(), account_id = %account_id, "Current account switched");
    Ok(Json(json!({ "success": true })))
}

pub async fn get_avatar(Extension(session): Extension<SessionContext>) -> ApiResult<Response> {
    image_response(&session.user, AVATAR_KEY).await
}

pub async fn get_provider_icon(
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Response> {
    image_response(&session.user, PROVIDER_ICON_KEY).await
}

async fn image_response(user: &UserStub, key: &str) -> ApiResult<Response> {
    let image = user.get_image(key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, image.mime_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        image.bytes,
    )
        .into_response())
}

/// Ends the caller's session
///
/// Always clears the cookie, even without a valid session.
pub async fn logout(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Response {
    if let Ok(cookie) = session_cookie(&headers) {
        let user = UserStub::new(state.directory.clone(), cookie.user_id);
        match user.delete_session(&cookie.session_id).await {
            Ok(()) => tracing::info!(user_id = %user.id(), "Logged out"),
            Err(e) => tracing::warn!(user_id = %user.id(), error = %e, "Failed to delete session"),
        }
    }

    (
        [(header::SET_COOKIE, clear_cookie_header(state.secure_cookies()))],
        Json(json!({ "success": true })),
    )
        .into_response()
}
