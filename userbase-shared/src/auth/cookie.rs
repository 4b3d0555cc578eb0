/// Session cookie
///
/// The browser holds one cookie naming both the session and the user actor
/// that owns it, so the boundary can route a request without any lookup:
///
/// ```text
/// session_id=<session-id>:<user-actor-id>
/// ```
///
/// Only the boundary layer parses this value. User actors validate bare
/// session ids. Header parsing and `Set-Cookie` rendering go through the
/// `cookie` crate; the issued cookie is `HttpOnly`, `SameSite=Lax`, scoped to
/// `/` and lives as long as the session.
///
/// # Example
///
/// ```
/// use userbase_shared::auth::cookie::SessionCookie;
/// use userbase_shared::ids::ActorId;
///
/// let cookie = SessionCookie::new("abc123".to_string(), ActorId::from_name("google:42"));
/// let header = cookie.set_cookie_header(false);
/// assert!(header.starts_with("session_id=abc123:"));
///
/// let parsed = SessionCookie::from_cookie_header(&format!("theme=dark; {}", cookie.pair())).unwrap();
/// assert_eq!(parsed, cookie);
/// ```

use crate::ids::{ActorId, IdError};
use crate::models::session::SESSION_TTL_MS;
use cookie::time::Duration;
use cookie::{Cookie, CookieBuilder, SameSite};

/// Cookie name
pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Cookie errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CookieError {
    /// No session cookie in the header
    #[error("Session cookie missing")]
    Missing,

    /// Value is not `<session-id>:<actor-id>`
    #[error("Malformed session cookie")]
    Malformed,

    /// Actor part is not a valid id
    #[error("Invalid user id in session cookie: {0}")]
    InvalidActorId(#[from] IdError),
}

/// Parsed session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub session_id: String,
    pub user_id: ActorId,
}

impl SessionCookie {
    pub fn new(session_id: String, user_id: ActorId) -> Self {
        SessionCookie {
            session_id,
            user_id,
        }
    }

    /// Parses the cookie value (`<session-id>:<actor-id>`)
    ///
    /// # Errors
    ///
    /// [`CookieError::Malformed`] on a missing separator or empty session id,
    /// [`CookieError::InvalidActorId`] on a bad actor id
    pub fn parse_value(value: &str) -> Result<Self, CookieError> {
        let (session_id, user_id) = value.split_once(':').ok_or(CookieError::Malformed)?;
        if session_id.is_empty() {
            return Err(CookieError::Malformed);
        }

        Ok(SessionCookie {
            session_id: session_id.to_string(),
            user_id: ActorId::parse(user_id)?,
        })
    }

    /// Finds and parses the session cookie in a `Cookie` request header
    ///
    /// Unparseable pairs are skipped; the first `session_id` pair wins.
    ///
    /// # Errors
    ///
    /// [`CookieError::Missing`] if no `session_id` pair is present, otherwise
    /// as [`SessionCookie::parse_value`]
    pub fn from_cookie_header(header: &str) -> Result<Self, CookieError> {
        let cookie = Cookie::split_parse(header)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
            .ok_or(CookieError::Missing)?;

        Self::parse_value(cookie.value())
    }

    /// Cookie value
    pub fn value(&self) -> String {
        format!("{}:{}", self.session_id, self.user_id)
    }

    /// The bare `session_id=<value>` pair, as a browser sends it back
    pub fn pair(&self) -> String {
        Cookie::new(SESSION_COOKIE_NAME, self.value()).to_string()
    }

    /// The cookie as issued, with its attributes
    pub fn to_cookie(&self, secure: bool) -> Cookie<'static> {
        session_cookie_builder(self.value(), secure)
            .max_age(Duration::seconds(SESSION_TTL_MS / 1000))
            .build()
    }

    /// `Set-Cookie` header value issuing this cookie
    pub fn set_cookie_header(&self, secure: bool) -> String {
        self.to_cookie(secure).to_string()
    }
}

fn session_cookie_builder(value: String, secure: bool) -> CookieBuilder<'static> {
    Cookie::build((SESSION_COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
}

/// `Set-Cookie` header value deleting the session cookie
pub fn clear_cookie_header(secure: bool) -> String {
    let mut cookie = session_cookie_builder(String::new(), secure).build();
    cookie.make_removal();
    cookie.to_string()
}
