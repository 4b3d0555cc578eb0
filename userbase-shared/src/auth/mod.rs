/// Session primitives for the request boundary
///
/// # Modules
///
/// - [`session_token`]: random session id generation
/// - [`cookie`]: the `session_id=<session>:<user>` cookie
///
/// OAuth token exchange happens outside this crate; what arrives here is an
/// already-verified provider identity.

pub mod cookie;
pub mod session_token;

pub use cookie::{clear_cookie_header, CookieError, SessionCookie, SESSION_COOKIE_NAME};
pub use session_token::generate_session_id;
