mod column_pruning;
mod rule;

pub use column_pruning::{
    ColumnPruneOutcome, ColumnPruner, KeySet, MapKeyTracker, PruneDiagnostic, PushdownOutcome,
    RequiredFields,
};
pub use rule::OptimizerRule;
