use std::sync::Arc;

use common_error::SluiceResult;
use serde::Serialize;

use super::subfields::MapKeyTracker;
use crate::{
    logical_plan::{LogicalOp, LogicalPlan, NodeId},
    source_info::{ProjectionRequest, ProjectionResponse, PushdownStatus, RequiredField},
};

/// Result of offering the final projection to one Load's source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PushdownOutcome {
    pub node: NodeId,
    pub alias: Arc<str>,
    pub status: PushdownStatus,
}

/// Offers every Load with a load function the fields it still exposes.
/// A source that fails is logged and otherwise ignored.
pub fn push_projections(
    plan: &mut LogicalPlan,
    map_keys: Option<&MapKeyTracker>,
) -> SluiceResult<Vec<PushdownOutcome>> {
    let mut outcomes = vec![];
    for id in 0..plan.len() {
        let node = plan.node(id)?;
        let LogicalOp::Load(load) = &node.op else {
            continue;
        };
        let Some(load_func) = load.source_info.load_func.clone() else {
            continue;
        };
        let alias = node.display_name();
        let status = if load_func.supports_projection() {
            let source_schema = load.source_schema();
            let fields = node
                .exposed_natural_positions()
                .into_iter()
                .map(|index| {
                    let field = source_schema.get(index)?;
                    Ok(RequiredField {
                        index,
                        alias: field.name.clone(),
                        map_keys: map_keys
                            .and_then(|tracker| tracker.narrowed(field.uid))
                            .map(|keys| keys.iter().cloned().collect()),
                    })
                })
                .collect::<SluiceResult<Vec<_>>>()?;
            let request = ProjectionRequest { fields };
            match load_func.push_projection(&request) {
                Ok(ProjectionResponse::Accepted) => {
                    log::debug!("{} accepted projection for {alias}", load_func.name());
                    PushdownStatus::Accepted
                }
                Ok(ProjectionResponse::Declined) => {
                    log::debug!("{} declined projection for {alias}", load_func.name());
                    PushdownStatus::Declined
                }
                Err(err) => {
                    log::warn!(
                        "{} failed to push projection for {alias}, reading all fields: {err}",
                        load_func.name()
                    );
                    PushdownStatus::Failed(err.to_string())
                }
            }
        } else {
            PushdownStatus::Unsupported
        };
        if let LogicalOp::Load(load) = &mut plan.node_mut(id)?.op {
            load.pushdown_status = Some(status.clone());
        }
        outcomes.push(PushdownOutcome {
            node: id,
            alias,
            status,
        });
    }
    Ok(outcomes)
}
