/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use userbase_api::{actors::Directory, app::AppState, config::Config};
/// use userbase_shared::billing::MockPaymentEngine;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let directory = Directory::new(
///     config.storage_config(),
///     config.plan_registry()?,
///     Arc::new(MockPaymentEngine::new()),
/// );
/// let state = AppState::new(directory, config)?;
/// let app = userbase_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::actors::Directory;
use crate::config::Config;
use crate::middleware::security::SecurityHeadersLayer;
use crate::routes;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Actor instances
    pub directory: Directory,

    /// Application configuration
    pub config: Arc<Config>,

    /// Client for avatar downloads
    pub http: reqwest::Client,
}

impl AppState {
    /// Creates new application state
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(directory: Directory, config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.avatar_fetch_timeout())
            .build()?;

        Ok(Self {
            directory,
            config: Arc::new(config),
            http,
        })
    }

    /// Whether cookies must carry `Secure`
    pub fn secure_cookies(&self) -> bool {
        self.config.api.production
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /users/                          # USERS_PATH, session cookie
///     ├── POST /logout
///     ├── GET  /me                     # session required
///     ├── GET  /me/accounts
///     ├── POST /me/accounts/switch
///     ├── GET  /me/avatar
///     ├── GET  /me/provider-icon
///     └── /admin/                      # session + admin email
///         ├── GET /users?q=
///         ├── GET /users/:id
///         ├── GET /accounts?q=
///         └── GET /accounts/:id
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. Security headers, plus `no-store` under the users path
/// 3. Session and admin checks (per-route basis)
pub fn build_router(state: AppState) -> Router {
    let production = state.config.api.production;
    let users_path = state.config.users.path.clone();

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/users/:id", get(routes::admin::get_user))
        .route("/accounts", get(routes::admin::list_accounts))
        .route("/accounts/:id", get(routes::admin::get_account))
        .route_layer(from_fn_with_state(
            state.clone(),
            routes::admin::admin_only_layer,
        ));

    let session_routes = Router::new()
        .route("/me", get(routes::me::get_me))
        .route("/me/accounts", get(routes::me::list_accounts))
        .route("/me/accounts/switch", post(routes::me::switch_account))
        .route("/me/avatar", get(routes::me::get_avatar))
        .route("/me/provider-icon", get(routes::me::get_provider_icon))
        .nest("/admin", admin_routes)
        .route_layer(from_fn_with_state(
            state.clone(),
            routes::session::session_auth_layer,
        ));

    let users_routes = Router::new()
        .route("/logout", post(routes::me::logout))
        .merge(session_routes)
        .layer(SecurityHeadersLayer::new(production).no_store());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest(&users_path, users_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
