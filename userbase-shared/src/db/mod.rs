/// Storage substrate for actors
///
/// Each actor instance owns one SQLite database. Consistency is guaranteed
/// within one store only; nothing here spans two actors.
///
/// # Modules
///
/// - `pool`: opening per-actor stores (file or memory) with health checks
/// - `migrations`: per-kind table schemas
///
/// # Example
///
/// ```no_run
/// use userbase_shared::db::{migrations::apply_schema, pool::{open_actor_store, StorageConfig}};
/// use userbase_shared::ids::{ActorId, ActorKind};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = StorageConfig::directory("./data");
///     let id = ActorId::from_name("google:1234");
///
///     let pool = open_actor_store(&config, ActorKind::User, &id).await?;
///     apply_schema(&pool, ActorKind::User).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
