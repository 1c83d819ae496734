mod builder;
pub mod display;
pub mod logical_plan;
mod ops;
pub mod optimization;
pub mod source_info;
#[cfg(test)]
mod test;

pub use builder::PlanBuilder;
pub use logical_plan::{InputEdge, LogicalOp, LogicalPlan, NodeId, PlanNode};
pub use optimization::{
    ColumnPruneOutcome, ColumnPruner, KeySet, MapKeyTracker, Optimizer, OptimizerRule,
    PruneDiagnostic, PushdownOutcome, RequiredFields,
};
pub use source_info::{
    LoadFunc, LoadFuncRef, ProjectionRequest, ProjectionResponse, PushdownStatus, RequiredField,
    SourceInfo,
};
