/// Administrator endpoints
///
/// Read-only views of the system index, open to sessions whose profile email
/// is listed in `ADMIN_EMAILS`.
///
/// # Endpoints
///
/// - `GET /users/admin/users?q=` - Search users
/// - `GET /users/admin/users/:id` - Live user profile
/// - `GET /users/admin/accounts?q=` - Search accounts
/// - `GET /users/admin/accounts/:id` - Live account info with billing

use super::session::SessionContext;
use crate::actors::stub::SystemStub;
use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, Request, State},
    middleware::Next,
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use userbase_shared::models::index::{IndexedAccount, IndexedUser};

/// Search query
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive substring of name or email
    pub q: Option<String>,
}

/// Admin authorization middleware layer
///
/// Runs after session authentication.
///
/// # Errors
///
/// - `401 Unauthorized`: No authenticated session
/// - `403 Forbidden`: Session email is not an admin email
pub async fn admin_only_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = req
        .extensions()
        .get::<SessionContext>()
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let is_admin = session
        .email()
        .map(|email| state.config.is_admin_email(email))
        .unwrap_or(false);

    if !is_admin {
        tracing::warn!(user_id = %session.user.id(), "Admin access denied");
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(req).await)
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<IndexedUser>>> {
    let system = SystemStub::new(state.directory.clone());
    Ok(Json(system.list_users(query.q.as_deref()).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    let system = SystemStub::new(state.directory.clone());
    Ok(Json(system.get_user(&id).await?))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<IndexedAccount>>> {
    let system = SystemStub::new(state.directory.clone());
    Ok(Json(system.list_accounts(query.q.as_deref()).await?))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    let system = SystemStub::new(state.directory.clone());
    Ok(Json(system.get_account(&id).await?))
}
