/// Billing for accounts
///
/// # Modules
///
/// - `plan`: plan definitions, the plan registry and plan hooks
/// - `payment`: the payment engine capability and a mock engine
/// - `state`: the per-account billing record and its transitions
///
/// The registry and the payment engine are injected into whoever runs the
/// state machine; nothing here is global.

pub mod payment;
pub mod plan;
pub mod state;

pub use payment::{MockPaymentEngine, PaymentEngine, PaymentError};
pub use plan::{PaymentSchedule, Plan, PlanConfig, PlanHook, PlanRegistry};
pub use state::{BillingState, BillingStatus};

/// Billing errors
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// No plan is registered under the slug
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// The plan has no schedule at the index
    #[error("Plan {slug} has no payment schedule at index {schedule_idx}")]
    InvalidSchedule { slug: String, schedule_idx: usize },

    /// A plan definition (or a date derived from it) is unusable
    #[error("Plan {slug} is invalid: {reason}")]
    InvalidPlan { slug: String, reason: String },

    /// The account's current plan cannot be resolved
    #[error("No active plan")]
    NoActivePlan,

    /// An activate or deactivate hook failed
    #[error("Plan hook for {slug} failed: {message}")]
    HookFailed { slug: String, message: String },

    /// The payment engine refused recurring setup
    #[error("Payment setup failed: {0}")]
    PaymentSetupFailed(#[source] PaymentError),
}
