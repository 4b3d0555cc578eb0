/// Plan registry
///
/// Plans are named billing tiers with capabilities, an optional downgrade
/// target and one or more payment schedules. The registry is read-only
/// configuration built once at startup and handed to the account actors.
///
/// # Built-in Plans
///
/// | Slug   | Capabilities          | Downgrade | Schedules                         |
/// |--------|-----------------------|-----------|-----------------------------------|
/// | `free` | basic                 | -         | 0 / 30 days                       |
/// | `pro`  | basic, pro            | `free`    | 2900 / 30 days, 29000 / 365 days  |
///
/// # Hooks
///
/// A plan may carry activate/deactivate hooks: arbitrary async side effects
/// (e.g. provisioning) run when an account moves onto or off the plan. Hooks
/// are attached in code, never loaded from files.
///
/// # Example
///
/// ```
/// use userbase_shared::billing::plan::PlanRegistry;
///
/// let plans = PlanRegistry::builtin();
/// let pro = plans.get("pro").unwrap();
/// assert_eq!(pro.downgrade_to_slug.as_deref(), Some("free"));
/// assert_eq!(pro.charge_period_days(1).unwrap(), 365);
/// ```

use super::BillingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Side effect run when an account enters or leaves a plan
#[async_trait]
pub trait PlanHook: Send + Sync {
    /// Runs the hook for one account
    async fn run(&self, account_id: &str) -> anyhow::Result<()>;
}

/// Charge amount and recurrence within a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    /// Amount in minor currency units
    pub charge_amount: i64,

    /// Recurrence in days
    pub charge_period: i64,

    #[serde(default)]
    pub is_default: bool,
}

/// Serializable plan definition (as loaded from configuration)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    pub slug: String,
    pub name: String,

    #[serde(default)]
    pub capabilities: BTreeMap<String, bool>,

    #[serde(default)]
    pub downgrade_to_slug: Option<String>,

    /// Days of grace after a failed charge
    #[serde(default)]
    pub grace_period: i64,

    #[serde(default)]
    pub schedules: Vec<PaymentSchedule>,
}

impl PlanConfig {
    /// Rejects definitions the state machine cannot bill
    pub fn validate(&self) -> Result<(), BillingError> {
        let invalid = |reason: String| BillingError::InvalidPlan {
            slug: self.slug.clone(),
            reason,
        };

        if self.slug.is_empty() {
            return Err(invalid("empty slug".to_string()));
        }

        for (idx, schedule) in self.schedules.iter().enumerate() {
            if schedule.charge_period <= 0 {
                return Err(invalid(format!(
                    "schedule {} has charge_period {}",
                    idx, schedule.charge_period
                )));
            }
            if schedule.charge_amount < 0 {
                return Err(invalid(format!(
                    "schedule {} has charge_amount {}",
                    idx, schedule.charge_amount
                )));
            }
        }

        Ok(())
    }
}

/// Activate/deactivate hooks of a plan
#[derive(Clone, Default)]
pub struct PlanHooks {
    pub activate: Option<Arc<dyn PlanHook>>,
    pub deactivate: Option<Arc<dyn PlanHook>>,
}

impl fmt::Debug for PlanHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanHooks")
            .field("activate", &self.activate.is_some())
            .field("deactivate", &self.deactivate.is_some())
            .finish()
    }
}

/// A registered plan
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub slug: String,
    pub name: String,
    pub capabilities: BTreeMap<String, bool>,
    pub downgrade_to_slug: Option<String>,
    pub grace_period: i64,
    pub schedules: Vec<PaymentSchedule>,

    #[serde(skip)]
    pub hooks: PlanHooks,
}

impl From<PlanConfig> for Plan {
    fn from(config: PlanConfig) -> Self {
        Plan {
            slug: config.slug,
            name: config.name,
            capabilities: config.capabilities,
            downgrade_to_slug: config.downgrade_to_slug,
            grace_period: config.grace_period,
            schedules: config.schedules,
            hooks: PlanHooks::default(),
        }
    }
}

impl Plan {
    /// Index of the schedule flagged default, else 0
    ///
    /// Used when a subscription names no schedule.
    pub fn default_schedule_idx(&self) -> usize {
        self.schedules
            .iter()
            .position(|s| s.is_default)
            .unwrap_or(0)
    }

    /// Charge period (days) of schedule `schedule_idx`
    ///
    /// # Errors
    ///
    /// [`BillingError::InvalidSchedule`] if the plan has no such schedule
    pub fn charge_period_days(&self, schedule_idx: usize) -> Result<i64, BillingError> {
        self.schedules
            .get(schedule_idx)
            .map(|s| s.charge_period)
            .ok_or_else(|| BillingError::InvalidSchedule {
                slug: self.slug.clone(),
                schedule_idx,
            })
    }
}

/// Read-only mapping from slug to plan
#[derive(Debug, Clone, Default)]
pub struct PlanRegistry {
    plans: BTreeMap<String, Plan>,
}

impl PlanRegistry {
    /// Builds a registry; later entries replace earlier ones with the same slug
    ///
    /// # Errors
    ///
    /// [`BillingError::InvalidPlan`] if a plan has an empty slug, a
    /// non-positive charge period or a negative charge amount
    pub fn from_configs(
        configs: impl IntoIterator<Item = PlanConfig>,
    ) -> Result<Self, BillingError> {
        let configs = configs.into_iter().collect::<Vec<_>>();
        for config in &configs {
            config.validate()?;
        }

        Ok(Self::collect(configs))
    }

    fn collect(configs: impl IntoIterator<Item = PlanConfig>) -> Self {
        let plans = configs
            .into_iter()
            .map(|c| (c.slug.clone(), Plan::from(c)))
            .collect();

        PlanRegistry { plans }
    }

    /// Loads plan definitions from a JSON/TOML/YAML file
    ///
    /// The file holds a top-level `plans` list of [`PlanConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed or holds an invalid
    /// plan
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        #[derive(Deserialize)]
        struct PlansFile {
            plans: Vec<PlanConfig>,
        }

        let file: PlansFile = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;

        Self::from_configs(file.plans).map_err(|e| config::ConfigError::Message(e.to_string()))
    }

    /// The default `free` and `pro` plans
    pub fn builtin() -> Self {
        Self::collect(builtin_plans())
    }

    pub fn get(&self, slug: &str) -> Option<&Plan> {
        self.plans.get(slug)
    }

    /// All plans, ordered by slug
    pub fn all(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }

    /// Attaches an activate hook
    ///
    /// # Errors
    ///
    /// [`BillingError::PlanNotFound`] if the slug is not registered
    pub fn set_activate_hook(
        &mut self,
        slug: &str,
        hook: Arc<dyn PlanHook>,
    ) -> Result<(), BillingError> {
        self.plan_mut(slug)?.hooks.activate = Some(hook);
        Ok(())
    }

    /// Attaches a deactivate hook
    ///
    /// # Errors
    ///
    /// [`BillingError::PlanNotFound`] if the slug is not registered
    pub fn set_deactivate_hook(
        &mut self,
        slug: &str,
        hook: Arc<dyn PlanHook>,
    ) -> Result<(), BillingError> {
        self.plan_mut(slug)?.hooks.deactivate = Some(hook);
        Ok(())
    }

    fn plan_mut(&mut self, slug: &str) -> Result<&mut Plan, BillingError> {
        self.plans
            .get_mut(slug)
            .ok_or_else(|| BillingError::PlanNotFound(slug.to_string()))
    }
}

fn builtin_plans() -> Vec<PlanConfig> {
    vec![
        PlanConfig {
            slug: "free".to_string(),
            name: "Free".to_string(),
            capabilities: BTreeMap::from([
                ("can_access_basic".to_string(), true),
                ("can_access_pro".to_string(), false),
            ]),
            downgrade_to_slug: None,
            grace_period: 0,
            schedules: vec![PaymentSchedule {
                charge_amount: 0,
                charge_period: 30,
                is_default: true,
            }],
        },
        PlanConfig {
            slug: "pro".to_string(),
            name: "Pro".to_string(),
            capabilities: BTreeMap::from([
                ("can_access_basic".to_string(), true),
                ("can_access_pro".to_string(), true),
            ]),
            downgrade_to_slug: Some("free".to_string()),
            grace_period: 7,
            schedules: vec![
                // 29.00 / month
                PaymentSchedule {
                    charge_amount: 2900,
                    charge_period: 30,
                    is_default: true,
                },
                // 290.00 / year
                PaymentSchedule {
                    charge_amount: 29000,
                    charge_period: 365,
                    is_default: false,
                },
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct NoopHook;

    #[async_trait]
    impl PlanHook for NoopHook {
        async fn run(&self, _account_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_builtin_plans() {
        let plans = PlanRegistry::builtin();
        assert_eq!(plans.all().count(), 2);

        let free = plans.get("free").unwrap();
        assert_eq!(free.capabilities.get("can_access_basic"), Some(&true));
        assert_eq!(free.capabilities.get("can_access_pro"), Some(&false));
        assert!(free.downgrade_to_slug.is_none());

        let pro = plans.get("pro").unwrap();
        assert_eq!(pro.grace_period, 7);
        assert_eq!(pro.schedules[pro.default_schedule_idx()].charge_amount, 2900);

        for config in builtin_plans() {
            assert!(config.validate().is_ok(), "{}", config.slug);
        }
    }

    #[test]
    fn test_charge_period_days() {
        let plans = PlanRegistry::builtin();
        let pro = plans.get("pro").unwrap();
        assert_eq!(pro.charge_period_days(0).unwrap(), 30);
        assert_eq!(pro.charge_period_days(1).unwrap(), 365);
        assert!(matches!(
            pro.charge_period_days(2),
            Err(BillingError::InvalidSchedule { schedule_idx: 2, .. })
        ));
    }

    fn team_plan(schedules: Vec<PaymentSchedule>) -> PlanConfig {
        PlanConfig {
            slug: "team".to_string(),
            name: "Team".to_string(),
            capabilities: BTreeMap::new(),
            downgrade_to_slug: None,
            grace_period: 0,
            schedules,
        }
    }

    fn schedule(charge_amount: i64, charge_period: i64, is_default: bool) -> PaymentSchedule {
        PaymentSchedule {
            charge_amount,
            charge_period,
            is_default,
        }
    }

    #[test]
    fn test_default_schedule_idx() {
        let plan = Plan::from(team_plan(vec![schedule(10, 7, false), schedule(30, 30, false)]));
        assert_eq!(plan.default_schedule_idx(), 0);

        let plan = Plan::from(team_plan(vec![schedule(10, 7, false), schedule(30, 30, true)]));
        assert_eq!(plan.default_schedule_idx(), 1);

        let plan = Plan::from(team_plan(vec![]));
        assert_eq!(plan.default_schedule_idx(), 0);
    }

    #[test]
    fn test_from_configs_rejects_unbillable_schedules() {
        for bad in [schedule(10, 0, true), schedule(10, -30, true), schedule(-1, 30, true)] {
            let err = PlanRegistry::from_configs(vec![team_plan(vec![bad])]).unwrap_err();
            assert!(
                matches!(err, BillingError::InvalidPlan { ref slug, .. } if slug == "team"),
                "{:?}",
                err
            );
        }

        let mut unnamed = team_plan(vec![]);
        unnamed.slug = String::new();
        assert!(PlanRegistry::from_configs(vec![unnamed]).is_err());

        let plans = PlanRegistry::from_configs(vec![team_plan(vec![schedule(10, 7, true)])]).unwrap();
        assert_eq!(plans.get("team").unwrap().charge_period_days(0).unwrap(), 7);
    }

    #[test]
    fn test_hooks_attach_to_known_plans_only() {
        let mut plans = PlanRegistry::builtin();
        assert!(plans.set_activate_hook("pro", Arc::new(NoopHook)).is_ok());
        assert!(plans.get("pro").unwrap().hooks.activate.is_some());
        assert!(matches!(
            plans.set_deactivate_hook("gold", Arc::new(NoopHook)),
            Err(BillingError::PlanNotFound(_))
        ));
    }

    #[test]
    fn test_plan_details_serialization_skips_hooks() {
        let plans = PlanRegistry::builtin();
        let json = serde_json::to_value(plans.get("pro").unwrap()).unwrap();
        assert_eq!(json["slug"], "pro");
        assert_eq!(json["schedules"][1]["charge_period"], 365);
        assert!(json.get("hooks").is_none());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"plans":[{{"slug":"team","name":"Team","downgrade_to_slug":"free","schedules":[{{"charge_amount":900,"charge_period":30}}]}}]}}"#
        )
        .unwrap();

        let plans = PlanRegistry::from_file(file.path()).unwrap();
        let team = plans.get("team").unwrap();
        assert_eq!(team.name, "Team");
        assert_eq!(team.charge_period_days(0).unwrap(), 30);
        assert!(plans.get("pro").is_none());
    }

    #[test]
    fn test_from_file_rejects_negative_period() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"plans":[{{"slug":"team","name":"Team","schedules":[{{"charge_amount":900,"charge_period":-30}}]}}]}}"#
        )
        .unwrap();

        let err = PlanRegistry::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("charge_period -30"), "{}", err);
    }
}
