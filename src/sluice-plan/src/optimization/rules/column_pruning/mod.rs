//! Removes fields no consumer needs, from every node of a plan, as close to
//! the sources as possible.
//!
//! The pass runs in four steps:
//! 1. [`fixpoint::solve`] walks the plan from its sinks back to its sources,
//!    applying the per-operator rules of [`requirement_rules`] until the
//!    required positions of every node and the map-key / bag-column trackers
//!    of [`subfields`] stop growing.
//! 2. [`projector::apply`] narrows every node to its requirement and
//!    renumbers every column reference in the plan.
//! 3. [`pushdown::push_projections`] offers the result to capable sources.
//! 4. [`diagnostics::report`] records what was removed from each Load.

mod diagnostics;
mod fixpoint;
mod projector;
mod pushdown;
mod required_fields;
mod requirement_rules;
mod subfields;

use common_error::SluiceResult;
use common_sluice_config::ColumnPruneConfig;
use common_treenode::Transformed;
pub use diagnostics::PruneDiagnostic;
pub use pushdown::PushdownOutcome;
pub use required_fields::RequiredFields;
pub use subfields::{KeySet, MapKeyTracker};

use super::OptimizerRule;
use crate::logical_plan::LogicalPlan;

/// Everything one pruning run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnPruneOutcome {
    /// Whether any schema, expression or projection changed.
    pub transformed: bool,
    pub diagnostics: Vec<PruneDiagnostic>,
    pub pushdowns: Vec<PushdownOutcome>,
    /// Node visits the fixpoint needed.
    pub visits: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnPruner {
    config: ColumnPruneConfig,
}

impl ColumnPruner {
    pub fn new(config: ColumnPruneConfig) -> Self {
        Self { config }
    }

    pub fn prune(&self, plan: &mut LogicalPlan) -> SluiceResult<ColumnPruneOutcome> {
        plan.validate()?;
        let before = diagnostics::load_exposures(plan);
        let trackers = subfields::SubfieldTrackers::new(self.config.enable_map_key_pruning);
        let requirements = fixpoint::solve(plan, trackers, self.config.retain_one_column)?;
        let transformed = projector::apply(plan, &requirements.required)?;
        plan.validate()?;

        let map_keys = self
            .config
            .enable_map_key_pruning
            .then_some(&requirements.trackers.map_keys);
        let pushdowns = if self.config.enable_projection_pushdown {
            pushdown::push_projections(plan, map_keys)?
        } else {
            vec![]
        };
        let diagnostics =
            diagnostics::report(plan, &before, map_keys, self.config.emit_diagnostics)?;
        Ok(ColumnPruneOutcome {
            transformed,
            diagnostics,
            pushdowns,
            visits: requirements.visits,
        })
    }
}

impl OptimizerRule for ColumnPruner {
    fn name(&self) -> &'static str {
        "ColumnPruning"
    }

    fn try_optimize(&self, mut plan: LogicalPlan) -> SluiceResult<Transformed<LogicalPlan>> {
        let outcome = self.prune(&mut plan)?;
        Ok(if outcome.transformed {
            Transformed::yes(plan)
        } else {
            Transformed::no(plan)
        })
    }
}
