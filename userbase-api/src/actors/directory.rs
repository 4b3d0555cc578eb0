/// Actor directory
///
/// The directory maps `(kind, id)` to a live actor instance. Instances are
/// created on first address: the store is opened, the schema applied and the
/// kind's router built. They live until [`Directory::shutdown`].
///
/// Reads that must not bring an actor into existence go through
/// [`Directory::fetch_existing`], which only dispatches to an instance that is
/// live or has a store on disk.
///
/// # Turns
///
/// Each instance has a turn lock. [`Directory::fetch`] holds it for the whole
/// request, so an instance never runs two requests at once. Calls *between*
/// instances are ordinary awaits on other turn locks; the call graph is
/// acyclic (system → user/account, account → user), so turns cannot deadlock.
///
/// # Example
///
/// ```no_run
/// use axum::body::Body;
/// use axum::http::Request;
/// use std::sync::Arc;
/// use userbase_api::actors::Directory;
/// use userbase_shared::billing::{MockPaymentEngine, PlanRegistry};
/// use userbase_shared::db::pool::StorageConfig;
/// use userbase_shared::ids::{ActorId, ActorKind};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let directory = Directory::new(
///     StorageConfig::in_memory(),
///     PlanRegistry::builtin(),
///     Arc::new(MockPaymentEngine::new()),
/// );
///
/// let request = Request::get("/profile").body(Body::empty())?;
/// let response = directory
///     .fetch(ActorKind::User, &ActorId::new_unique(), request)
///     .await?;
/// assert!(response.status().is_success());
/// # Ok(())
/// # }
/// ```

use super::{account, system, user};
use crate::error::ActorResult;
use axum::{body::Body, http::Request, response::Response, Router};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;
use userbase_shared::billing::{PaymentEngine, PlanRegistry};
use userbase_shared::db::migrations::apply_schema;
use userbase_shared::db::pool::{close_store, health_check, open_actor_store, StorageConfig};
use userbase_shared::ids::{ActorId, ActorKind};
use userbase_shared::models::now_millis;

/// Source of the current time for actors, epoch milliseconds
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> i64 + Send + Sync>);

impl Clock {
    /// Wall-clock time
    pub fn system() -> Self {
        Clock(Arc::new(now_millis))
    }

    /// Time read from `f`
    pub fn from_fn(f: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Clock(Arc::new(f))
    }

    pub fn now(&self) -> i64 {
        (self.0)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::system()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Clock")
    }
}

/// State handed to every handler of one instance
#[derive(Clone)]
pub struct ActorContext {
    /// This instance's id
    pub id: ActorId,

    /// This instance's store
    pub pool: SqlitePool,

    pub plans: Arc<PlanRegistry>,
    pub payments: Arc<dyn PaymentEngine>,
    pub clock: Clock,
}

/// A live actor instance
struct Instance {
    router: Router,
    pool: SqlitePool,
    turn: Mutex<()>,
}

struct DirectoryInner {
    storage: StorageConfig,
    plans: Arc<PlanRegistry>,
    payments: Arc<dyn PaymentEngine>,
    clock: Clock,
    instances: Mutex<HashMap<(ActorKind, ActorId), Arc<Instance>>>,
}

/// Registry of actor instances
///
/// Cheap to clone; clones share the same instances.
#[derive(Clone)]
pub struct Directory {
    inner: Arc<DirectoryInner>,
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("storage", &self.inner.storage)
            .finish_non_exhaustive()
    }
}

impl Directory {
    /// Creates an empty directory
    ///
    /// The plan registry and payment engine are shared by every account
    /// instance.
    pub fn new(
        storage: StorageConfig,
        plans: PlanRegistry,
        payments: Arc<dyn PaymentEngine>,
    ) -> Self {
        Self::with_clock(storage, plans, payments, Clock::system())
    }

    /// Creates an empty directory whose actors read time from `clock`
    pub fn with_clock(
        storage: StorageConfig,
        plans: PlanRegistry,
        payments: Arc<dyn PaymentEngine>,
        clock: Clock,
    ) -> Self {
        Directory {
            inner: Arc::new(DirectoryInner {
                storage,
                plans: Arc::new(plans),
                payments,
                clock,
                instances: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Dispatches a request to one instance, creating it if needed
    ///
    /// The request runs on the instance's turn; the directory itself is
    /// available to handlers as an `Extension<Directory>`.
    ///
    /// # Errors
    ///
    /// Only instance creation fails here (storage). Handler failures come
    /// back as non-2xx responses.
    pub async fn fetch(
        &self,
        kind: ActorKind,
        id: &ActorId,
        mut request: Request<Body>,
    ) -> ActorResult<Response> {
        let instance = self.instance(kind, id).await?;
        request.extensions_mut().insert(self.clone());

        let _turn = instance.turn.lock().await;
        tracing::trace!(
            kind = %kind,
            actor_id = %id,
            method = %request.method(),
            path = %request.uri().path(),
            "Actor request"
        );

        let response = instance
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});

        Ok(response)
    }

    /// Like [`Directory::fetch`], but never creates the instance
    ///
    /// # Returns
    ///
    /// `None` if the instance is neither live nor stored
    pub async fn fetch_existing(
        &self,
        kind: ActorKind,
        id: &ActorId,
        request: Request<Body>,
    ) -> ActorResult<Option<Response>> {
        if !self.exists(kind, id).await {
            tracing::trace!(kind = %kind, actor_id = %id, "Skipping request to absent actor");
            return Ok(None);
        }

        self.fetch(kind, id, request).await.map(Some)
    }

    /// Whether an instance is live or has a store on disk
    ///
    /// In-memory stores vanish with their instance, so only live instances
    /// count there.
    pub async fn exists(&self, kind: ActorKind, id: &ActorId) -> bool {
        if self.inner.instances.lock().await.contains_key(&(kind, id.clone())) {
            return true;
        }

        match self.inner.storage.database_path(kind, id) {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }

    /// Checks the store of one instance (creating it if needed)
    pub async fn health_check(&self, kind: ActorKind, id: &ActorId) -> ActorResult<()> {
        let instance = self.instance(kind, id).await?;
        health_check(&instance.pool).await?;
        Ok(())
    }

    /// Number of live instances
    pub async fn instance_count(&self) -> usize {
        self.inner.instances.lock().await.len()
    }

    /// Closes every live instance
    ///
    /// Each instance finishes its current turn before its store is closed.
    /// A later address creates the instance again.
    pub async fn shutdown(&self) {
        let instances: Vec<_> = self.inner.instances.lock().await.drain().collect();
        let count = instances.len();

        for ((kind, id), instance) in instances {
            let _turn = instance.turn.lock().await;
            close_store(instance.pool.clone()).await;
            tracing::trace!(kind = %kind, actor_id = %id, "Actor instance closed");
        }

        tracing::info!(instances = count, "Actor directory shut down");
    }

    async fn instance(&self, kind: ActorKind, id: &ActorId) -> ActorResult<Arc<Instance>> {
        let mut instances = self.inner.instances.lock().await;

        if let Some(instance) = instances.get(&(kind, id.clone())) {
            return Ok(instance.clone());
        }

        let pool = open_actor_store(&self.inner.storage, kind, id).await?;
        apply_schema(&pool, kind).await?;

        let context = ActorContext {
            id: id.clone(),
            pool: pool.clone(),
            plans: self.inner.plans.clone(),
            payments: self.inner.payments.clone(),
            clock: self.inner.clock.clone(),
        };

        let router = match kind {
            ActorKind::User => user::router(),
            ActorKind::Account => account::router(),
            ActorKind::System => system::router(),
        }
        .with_state(context);

        let instance = Arc::new(Instance {
            router,
            pool,
            turn: Mutex::new(()),
        });
        instances.insert((kind, id.clone()), instance.clone());

        tracing::debug!(kind = %kind, actor_id = %id, "Actor instance created");
        Ok(instance)
    }
}
