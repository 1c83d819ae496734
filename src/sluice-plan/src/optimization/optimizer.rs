use common_error::SluiceResult;
use common_sluice_config::ColumnPruneConfig;
use common_treenode::Transformed;

use super::rules::{ColumnPruner, OptimizerRule};
use crate::logical_plan::LogicalPlan;

/// Logical rule-based optimizer. Runs each rule once, in order.
pub struct Optimizer {
    pub rules: Vec<Box<dyn OptimizerRule>>,
}

impl Optimizer {
    pub fn new(config: ColumnPruneConfig) -> Self {
        Self::with_rules(vec![Box::new(ColumnPruner::new(config))])
    }

    pub fn with_rules(rules: Vec<Box<dyn OptimizerRule>>) -> Self {
        Self { rules }
    }

    pub fn optimize(&self, plan: LogicalPlan) -> SluiceResult<Transformed<LogicalPlan>> {
        plan.validate()?;
        self.rules
            .iter()
            .try_fold(Transformed::no(plan), |acc, rule| {
                let result = rule.try_optimize(acc.data)?;
                log::debug!(
                    "Rule {} {} the plan",
                    rule.name(),
                    if result.transformed { "changed" } else { "did not change" }
                );
                Ok(result.or(acc.transformed))
            })
    }
}

/// Column pruning configured from the `SLUICE_*` environment flags.
impl Default for Optimizer {
    fn default() -> Self {
        Self::new(ColumnPruneConfig::from_env())
    }
}
