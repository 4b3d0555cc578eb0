/// Session cookie authentication
///
/// The boundary identifies a caller by the `session_id` cookie, whose value
/// is `<sessionId>:<userActorId>`. The cookie is parsed here and only here;
/// the user actor is asked to validate the bare session id. A session id that
/// is not shaped like an issued one is refused before any actor is addressed,
/// and an unknown user actor is never created by a lookup.
///
/// On success a [`SessionContext`] is inserted into the request extensions,
/// so handlers take `Extension<SessionContext>`.

use crate::actors::stub::UserStub;
use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::Value as JsonValue;
use userbase_shared::auth::session_token::validate_session_id_format;
use userbase_shared::auth::{CookieError, SessionCookie};

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// The caller's user actor
    pub user: UserStub,

    /// Bare session id
    pub session_id: String,

    /// Profile returned by session validation
    pub profile: JsonValue,
}

impl SessionContext {
    /// Email from the validated profile, if any
    pub fn email(&self) -> Option<&str> {
        self.profile.get("email").and_then(JsonValue::as_str)
    }
}

/// Reads the session cookie from every `Cookie` header
pub fn session_cookie(headers: &HeaderMap) -> Result<SessionCookie, CookieError> {
    let joined = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");

    SessionCookie::from_cookie_header(&joined)
}

/// Session authentication middleware layer
///
/// # Errors
///
/// - `401 Unauthorized`: no cookie, a malformed cookie, or an invalid or
///   expired session
pub async fn session_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let cookie = session_cookie(req.headers()).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session cookie");
        ApiError::Unauthorized("Not authenticated".to_string())
    })?;

    if !validate_session_id_format(&cookie.session_id) {
        tracing::debug!(user_id = %cookie.user_id, "Rejected malformed session id");
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    }

    let user = UserStub::new(state.directory.clone(), cookie.user_id);
    let validation = user.validate_session(&cookie.session_id).await?;

    if !validation.valid {
        return Err(ApiError::Unauthorized("Session expired or invalid".to_string()));
    }

    req.extensions_mut().insert(SessionContext {
        user,
        session_id: cookie.session_id,
        profile: validation.profile.unwrap_or_else(|| JsonValue::Object(Default::default())),
    });

    Ok(next.run(req).await)
}
