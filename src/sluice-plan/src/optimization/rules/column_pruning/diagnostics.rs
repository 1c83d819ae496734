use std::{
    fmt::{Display, Formatter, Result},
    sync::Arc,
};

use common_error::SluiceResult;
use itertools::Itertools;
use serde::Serialize;

use super::subfields::MapKeyTracker;
use crate::logical_plan::{LogicalOp, LogicalPlan, NodeId, RequiredMapKeys};

/// Audit record of what a pruning run removed from a Load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PruneDiagnostic {
    /// Source positions the Load no longer produces.
    ColumnsPruned { alias: Arc<str>, positions: Vec<usize> },
    /// Keys still read from map fields, by source position.
    MapKeysRequired {
        alias: Arc<str>,
        fields: RequiredMapKeys,
    },
}

impl Display for PruneDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::ColumnsPruned { alias, positions } => write!(
                f,
                "Columns pruned for {alias}: {}",
                positions.iter().map(|p| format!("${p}")).join(", ")
            ),
            Self::MapKeysRequired { alias, fields } => write!(
                f,
                "Map key required for {alias}: {}",
                fields
                    .iter()
                    .map(|(p, keys)| format!("${p}->[{}]", keys.iter().join(", ")))
                    .join(", ")
            ),
        }
    }
}

/// Source positions each Load exposes, taken before the plan is rewritten.
pub fn load_exposures(plan: &LogicalPlan) -> Vec<(NodeId, Vec<usize>)> {
    plan.nodes()
        .iter()
        .filter(|node| matches!(node.op, LogicalOp::Load(..)))
        .map(|node| (node.id, node.exposed_natural_positions()))
        .collect()
}

/// Compares every Load against its exposure before the run and records the
/// narrowed map keys on it. Map-key records are only produced when the keys
/// differ from what the Load already recorded.
pub fn report(
    plan: &mut LogicalPlan,
    before: &[(NodeId, Vec<usize>)],
    map_keys: Option<&MapKeyTracker>,
    emit: bool,
) -> SluiceResult<Vec<PruneDiagnostic>> {
    let mut diagnostics = vec![];
    for (id, exposed_before) in before {
        let node = plan.node_mut(*id)?;
        let alias = node.display_name();
        let exposed = node.exposed_natural_positions();
        let LogicalOp::Load(load) = &mut node.op else {
            continue;
        };

        let positions: Vec<usize> = exposed_before
            .iter()
            .filter(|p| !exposed.contains(*p))
            .copied()
            .sorted()
            .collect();
        if !positions.is_empty() {
            diagnostics.push(PruneDiagnostic::ColumnsPruned {
                alias: alias.clone(),
                positions,
            });
        }

        let Some(tracker) = map_keys else {
            load.required_map_keys = None;
            continue;
        };
        let source_schema = load.source_schema().clone();
        let mut fields: RequiredMapKeys = vec![];
        for p in exposed.iter().sorted() {
            let field = source_schema.get(*p)?;
            if !field.dtype.is_map() {
                continue;
            }
            if let Some(keys) = tracker.narrowed(field.uid) {
                fields.push((*p, keys.iter().cloned().collect()));
            }
        }
        if fields.is_empty() {
            load.required_map_keys = None;
        } else if load.required_map_keys.as_ref() != Some(&fields) {
            load.required_map_keys = Some(fields.clone());
            diagnostics.push(PruneDiagnostic::MapKeysRequired { alias, fields });
        }
    }
    if !emit {
        return Ok(vec![]);
    }
    for diagnostic in &diagnostics {
        log::info!("{diagnostic}");
    }
    Ok(diagnostics)
}
