/// Health check endpoint
///
/// Reports whether actor storage answers, checked through the system index
/// instance (created on first check), and how many actor instances are live.
///
/// ```text
/// GET /health
///
/// {"status": "healthy", "version": "0.1.0", "storage": "connected", "instances": 3}
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use userbase_shared::ids::{ActorId, ActorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    Connected,
    Disconnected,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    pub version: String,
    pub storage: StorageStatus,

    /// Live actor instances
    pub instances: usize,
}

/// Health check handler
///
/// Always answers 200; a storage failure only degrades the status.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let check = state
        .directory
        .health_check(ActorKind::System, &ActorId::system())
        .await;

    let storage = match check {
        Ok(()) => StorageStatus::Connected,
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            StorageStatus::Disconnected
        }
    };

    let status = match storage {
        StorageStatus::Connected => "healthy",
        StorageStatus::Disconnected => "degraded",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage,
        instances: state.directory.instance_count().await,
    })
}
