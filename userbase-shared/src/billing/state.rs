/// Billing state machine
///
/// Every account carries one billing record. Its status is either `active`
/// or `canceled`; the plan slug is data, not a state.
///
/// ```text
/// active(A) --subscribe(B)--> active(B)
/// active(A) | canceled(A) --cancel--> canceled(A, next_plan_slug = A.downgrade_to_slug)
/// canceled(A) --subscribe(B)--> active(B)
/// ```
///
/// There is no automatic way back to `active`; subscribing is the only exit
/// from `canceled`.
///
/// # Ordering
///
/// [`subscribe`] runs every external step (hooks, payment setup) before it
/// returns a new state. Callers persist that state only on `Ok`, so a failed
/// step never leaves a half-applied subscription behind.

use super::payment::PaymentEngine;
use super::plan::{Plan, PlanRegistry};
use super::BillingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds per billing day
pub const MS_PER_DAY: i64 = 86_400_000;

/// Slug of the plan every account starts on
pub const DEFAULT_PLAN_SLUG: &str = "free";

/// Reserved account info key holding the billing record
pub const BILLING_INFO_KEY: &str = "billing";

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingStatus {
    Active,
    Canceled,
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingStatus::Active => write!(f, "active"),
            BillingStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Stored billing record of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingState {
    pub plan_slug: String,
    pub status: BillingStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_idx: Option<usize>,

    /// Epoch ms of the next charge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_billing_date: Option<i64>,

    /// Plan to fall back to once a cancellation takes effect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_plan_slug: Option<String>,
}

impl Default for BillingState {
    fn default() -> Self {
        BillingState {
            plan_slug: DEFAULT_PLAN_SLUG.to_string(),
            status: BillingStatus::Active,
            schedule_idx: None,
            next_billing_date: None,
            next_plan_slug: None,
        }
    }
}

impl BillingState {
    /// Active state on `plan` with schedule `schedule_idx`, starting at `now`
    ///
    /// # Errors
    ///
    /// [`BillingError::InvalidSchedule`] if the plan has schedules but none at
    /// `schedule_idx`
    pub fn subscribed(plan: &Plan, schedule_idx: usize, now: i64) -> Result<Self, BillingError> {
        Ok(BillingState {
            plan_slug: plan.slug.clone(),
            status: BillingStatus::Active,
            schedule_idx: Some(schedule_idx),
            next_billing_date: next_billing_date(plan, schedule_idx, now)?,
            next_plan_slug: None,
        })
    }

    /// This state canceled, recording the plan's downgrade target
    pub fn canceled(&self, plan: &Plan) -> Self {
        BillingState {
            status: BillingStatus::Canceled,
            next_plan_slug: plan.downgrade_to_slug.clone(),
            ..self.clone()
        }
    }
}

/// Epoch ms of the first charge after `now`
///
/// A plan without schedules is never charged and has no billing date.
///
/// # Errors
///
/// [`BillingError::InvalidSchedule`] if the index is out of range for a plan
/// that does have schedules, [`BillingError::InvalidPlan`] if the period is
/// not positive or overflows
pub fn next_billing_date(
    plan: &Plan,
    schedule_idx: usize,
    now: i64,
) -> Result<Option<i64>, BillingError> {
    if plan.schedules.is_empty() && schedule_idx == 0 {
        return Ok(None);
    }

    let days = plan.charge_period_days(schedule_idx)?;
    let date = days
        .checked_mul(MS_PER_DAY)
        .and_then(|period| now.checked_add(period))
        .filter(|date| *date > now)
        .ok_or_else(|| BillingError::InvalidPlan {
            slug: plan.slug.clone(),
            reason: format!("charge_period {} gives no billing date", days),
        })?;

    Ok(Some(date))
}

/// Moves an account onto `plan_slug`
///
/// Runs, in order: schedule validation, the old plan's deactivate hook and
/// the new plan's activate hook (only when the plan changes), then the
/// payment engine's recurring setup.
///
/// # Returns
///
/// The state to persist
///
/// # Errors
///
/// - [`BillingError::PlanNotFound`] for an unknown slug
/// - [`BillingError::InvalidSchedule`] for a bad schedule index
/// - [`BillingError::HookFailed`] if a hook fails (later steps are skipped)
/// - [`BillingError::PaymentSetupFailed`] if recurring setup fails
pub async fn subscribe(
    plans: &PlanRegistry,
    payments: &dyn PaymentEngine,
    account_id: &str,
    current: &BillingState,
    plan_slug: &str,
    schedule_idx: usize,
    now: i64,
) -> Result<BillingState, BillingError> {
    let plan = plans
        .get(plan_slug)
        .ok_or_else(|| BillingError::PlanNotFound(plan_slug.to_string()))?;

    let next = BillingState::subscribed(plan, schedule_idx, now)?;

    if current.plan_slug != plan.slug {
        if let Some(old_plan) = plans.get(&current.plan_slug) {
            if let Some(hook) = &old_plan.hooks.deactivate {
                hook.run(account_id).await.map_err(|e| BillingError::HookFailed {
                    slug: old_plan.slug.clone(),
                    message: e.to_string(),
                })?;
            }
        }

        if let Some(hook) = &plan.hooks.activate {
            hook.run(account_id).await.map_err(|e| BillingError::HookFailed {
                slug: plan.slug.clone(),
                message: e.to_string(),
            })?;
        }
    }

    payments
        .setup_recurring(account_id, &plan.slug, schedule_idx)
        .await
        .map_err(BillingError::PaymentSetupFailed)?;

    tracing::info!(
        account_id = %account_id,
        from_plan = %current.plan_slug,
        plan_slug = %plan.slug,
        schedule_idx,
        "Subscription updated"
    );

    Ok(next)
}

/// Cancels the account's current subscription
///
/// The recurring cancel is best-effort: its failure is logged and the state
/// is canceled anyway.
///
/// # Errors
///
/// [`BillingError::NoActivePlan`] if the current slug is not a registered plan
pub async fn cancel(
    plans: &PlanRegistry,
    payments: &dyn PaymentEngine,
    account_id: &str,
    current: &BillingState,
) -> Result<BillingState, BillingError> {
    let plan = plans
        .get(&current.plan_slug)
        .ok_or(BillingError::NoActivePlan)?;

    if let Err(e) = payments.cancel_recurring(account_id).await {
        tracing::warn!(
            account_id = %account_id,
            plan_slug = %plan.slug,
            error = %e,
            "Failed to cancel recurring payment"
        );
    }

    tracing::info!(
        account_id = %account_id,
        plan_slug = %plan.slug,
        next_plan_slug = ?plan.downgrade_to_slug,
        "Subscription canceled"
    );

    Ok(current.canceled(plan))
}
