/// Error handling for the API server
///
/// Two layers of errors live here:
///
/// - [`ActorError`]: what actor operations and actor-to-actor calls fail
///   with. It knows nothing about HTTP.
/// - [`ApiError`]: the HTTP-facing error. Every handler (actor routes and the
///   public boundary alike) ends in an `ApiError`, which renders as
///   `{error, message}` with the matching status code.
///
/// # Status Mapping
///
/// | ActorError                                   | Status | Message        |
/// |----------------------------------------------|--------|----------------|
/// | `InvalidInput`, `PlanNotFound`, `NoActivePlan` | 400  | passed through |
/// | `Unauthorized`                               | 401    | passed through |
/// | `Forbidden`                                  | 403    | passed through |
/// | `NotFound`                                   | 404    | passed through |
/// | `UpstreamFailure`, `PaymentSetupFailed`      | 500    | passed through |
/// | `StorageFailure`                             | 500    | generic        |
///
/// # Example
///
/// ```
/// use userbase_api::error::{ActorError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(name: Option<String>) -> ApiResult<Json<serde_json::Value>> {
///     let name = name.ok_or_else(|| ActorError::InvalidInput("Missing name".to_string()))?;
///     Ok(Json(json!({ "name": name })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use userbase_shared::billing::BillingError;
use userbase_shared::ids::IdError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Actor result type alias
pub type ActorResult<T> = Result<T, ActorError>;

/// Failure of an actor operation or of a call to another actor
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// Missing or malformed required field
    #[error("{0}")]
    InvalidInput(String),

    /// Absent or expired session
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Unknown entity, membership or image
    #[error("{0}")]
    NotFound(String),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("No active plan")]
    NoActivePlan,

    #[error("Payment setup failed: {0}")]
    PaymentSetupFailed(String),

    /// A hook, the payment engine or another actor failed
    #[error("{0}")]
    UpstreamFailure(String),

    /// The actor's own store failed
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] sqlx::Error),
}

impl From<BillingError> for ActorError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::PlanNotFound(slug) => ActorError::PlanNotFound(slug),
            BillingError::InvalidSchedule { .. } => ActorError::InvalidInput(err.to_string()),
            BillingError::InvalidPlan { .. } => ActorError::UpstreamFailure(err.to_string()),
            BillingError::NoActivePlan => ActorError::NoActivePlan,
            BillingError::HookFailed { .. } => ActorError::UpstreamFailure(err.to_string()),
            BillingError::PaymentSetupFailed(source) => {
                ActorError::PaymentSetupFailed(source.to_string())
            }
        }
    }
}

impl From<IdError> for ActorError {
    fn from(err: IdError) -> Self {
        ActorError::NotFound(format!("Unknown actor: {}", err))
    }
}

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Downstream failure (500), message shown to the caller
    UpstreamFailure(String),

    /// Internal server error (500), message only logged
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::UpstreamFailure(msg) => write!(f, "Upstream failure: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::UpstreamFailure(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "upstream_failure",
                    msg,
                    None,
                )
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<ActorError> for ApiError {
    fn from(err: ActorError) -> Self {
        match err {
            ActorError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ActorError::PlanNotFound(_) | ActorError::NoActivePlan => {
                ApiError::BadRequest(err.to_string())
            }
            ActorError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            ActorError::Forbidden(msg) => ApiError::Forbidden(msg),
            ActorError::NotFound(msg) => ApiError::NotFound(msg),
            ActorError::PaymentSetupFailed(_) => ApiError::UpstreamFailure(err.to_string()),
            ActorError::UpstreamFailure(msg) => ApiError::UpstreamFailure(msg),
            ActorError::StorageFailure(e) => ApiError::InternalError(format!("Storage error: {}", e)),
        }
    }
}

impl IntoResponse for ActorError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}
