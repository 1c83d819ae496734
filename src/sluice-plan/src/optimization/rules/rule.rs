use common_error::SluiceResult;
use common_treenode::Transformed;

use crate::logical_plan::LogicalPlan;

pub trait OptimizerRule {
    fn name(&self) -> &'static str;

    /// Try to optimize the logical plan with this rule.
    ///
    /// Returns the plan, marked as transformed if the rule changed it.
    fn try_optimize(&self, plan: LogicalPlan) -> SluiceResult<Transformed<LogicalPlan>>;
}
