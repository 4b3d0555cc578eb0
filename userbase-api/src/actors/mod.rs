/// Actor runtime
///
/// Users, accounts and the system index are actors: independently addressed
/// units that own a private store and handle one request at a time. Each
/// actor exposes a small JSON-over-HTTP interface, and every call to an actor
/// (from the public boundary or from another actor) goes through the same
/// interface, dispatched in-process by the [`Directory`].
///
/// # Modules
///
/// - `directory`: instance registry, lazy creation and per-instance turns
/// - `stub`: typed clients for calling actors
/// - `user`, `account`, `system`: the three actor interfaces
///
/// # Calling Another Actor
///
/// ```no_run
/// use userbase_api::actors::{stub::UserStub, Directory};
/// use userbase_shared::ids::ActorId;
///
/// # async fn example(directory: Directory) -> userbase_api::error::ActorResult<()> {
/// let user = UserStub::new(directory.clone(), ActorId::from_name("google:42"));
/// let session = user.create_session(None).await?;
/// let check = user.validate_session(&session.session_id).await?;
/// assert!(check.valid);
/// # Ok(())
/// # }
/// ```

pub mod account;
pub mod directory;
pub mod stub;
pub mod system;
pub mod user;

pub use directory::{ActorContext, Clock, Directory};

use axum::Json;
use serde_json::{json, Value as JsonValue};

/// `{"success": true}`
pub(crate) fn success() -> Json<JsonValue> {
    Json(json!({ "success": true }))
}
