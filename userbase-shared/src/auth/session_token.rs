/// Session token generation
///
/// Session ids are opaque, unguessable strings handed to the browser inside
/// the session cookie. Only the owning user actor stores them.
///
/// # Format
///
/// 43 alphanumeric characters (base62: `[A-Za-z0-9]`), about 256 bits of
/// randomness.
///
/// # Example
///
/// ```
/// use userbase_shared::auth::session_token::{generate_session_id, validate_session_id_format};
///
/// let id = generate_session_id();
/// assert_eq!(id.len(), 43);
/// assert!(validate_session_id_format(&id));
/// assert!(!validate_session_id_format("not a token"));
/// ```

use rand::Rng;

/// Length of a session id (characters)
pub const SESSION_ID_LENGTH: usize = 43;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a new session id
///
/// Uses `rand::thread_rng()`, a CSPRNG.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();

    (0..SESSION_ID_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Checks length and alphabet of a session id
///
/// Lets the boundary reject garbage cookies without a storage lookup.
pub fn validate_session_id_format(id: &str) -> bool {
    id.len() == SESSION_ID_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric())
}
