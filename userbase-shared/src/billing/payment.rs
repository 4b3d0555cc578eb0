/// Payment engine capability
///
/// Charging is an external concern; account actors depend only on this trait.
/// Implementations talk to a real processor, the [`MockPaymentEngine`] logs
/// and succeeds (or fails, when asked to).
///
/// # Example
///
/// ```
/// use userbase_shared::billing::payment::{MockPaymentEngine, PaymentEngine};
///
/// # async fn example() {
/// let engine = MockPaymentEngine::new();
/// engine.setup_recurring("acc-1", "pro", 0).await.unwrap();
/// assert_eq!(engine.calls().setup_recurring, 1);
///
/// let broken = MockPaymentEngine::failing();
/// assert!(broken.setup_recurring("acc-1", "pro", 0).await.is_err());
/// # }
/// ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Payment engine errors
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The processor refused the operation
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The processor could not be reached or failed internally
    #[error("Payment backend unavailable: {0}")]
    Unavailable(String),
}

/// External payment processor
#[async_trait]
pub trait PaymentEngine: Send + Sync {
    /// One-off charge in minor currency units
    ///
    /// # Returns
    ///
    /// Whether the charge went through
    async fn charge(&self, account_id: &str, amount: i64, currency: &str)
        -> Result<bool, PaymentError>;

    /// Starts recurring billing of a plan schedule
    async fn setup_recurring(
        &self,
        account_id: &str,
        plan_slug: &str,
        schedule_idx: usize,
    ) -> Result<(), PaymentError>;

    /// Stops recurring billing
    async fn cancel_recurring(&self, account_id: &str) -> Result<(), PaymentError>;
}

/// Number of calls a [`MockPaymentEngine`] has received, per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentCalls {
    pub charge: usize,
    pub setup_recurring: usize,
    pub cancel_recurring: usize,
}

/// Payment engine that logs every call
#[derive(Debug, Default)]
pub struct MockPaymentEngine {
    should_fail: AtomicBool,
    charge_calls: AtomicUsize,
    setup_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

impl MockPaymentEngine {
    /// An engine that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that rejects every call
    pub fn failing() -> Self {
        MockPaymentEngine {
            should_fail: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Switches between accepting and rejecting calls
    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    /// Calls received so far
    pub fn calls(&self) -> PaymentCalls {
        PaymentCalls {
            charge: self.charge_calls.load(Ordering::SeqCst),
            setup_recurring: self.setup_calls.load(Ordering::SeqCst),
            cancel_recurring: self.cancel_calls.load(Ordering::SeqCst),
        }
    }

    fn outcome(&self) -> Result<(), PaymentError> {
        if self.should_fail.load(Ordering::SeqCst) {
            Err(PaymentError::Unavailable("mock engine configured to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentEngine for MockPaymentEngine {
    async fn charge(
        &self,
        account_id: &str,
        amount: i64,
        currency: &str,
    ) -> Result<bool, PaymentError> {
        self.charge_calls.fetch_add(1, Ordering::SeqCst);
        tracing::info!(account_id = %account_id, amount, currency = %currency, "Mock charge");
        self.outcome().map(|_| true)
    }

    async fn setup_recurring(
        &self,
        account_id: &str,
        plan_slug: &str,
        schedule_idx: usize,
    ) -> Result<(), PaymentError> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            account_id = %account_id,
            plan_slug = %plan_slug,
            schedule_idx,
            "Mock recurring payment setup"
        );
        self.outcome()
    }

    async fn cancel_recurring(&self, account_id: &str) -> Result<(), PaymentError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        tracing::info!(account_id = %account_id, "Mock recurring payment cancel");
        self.outcome()
    }
}
