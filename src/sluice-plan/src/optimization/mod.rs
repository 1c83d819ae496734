mod optimizer;
mod rules;

pub use optimizer::Optimizer;
pub use rules::{
    ColumnPruneOutcome, ColumnPruner, KeySet, MapKeyTracker, OptimizerRule, PruneDiagnostic,
    PushdownOutcome, RequiredFields,
};
