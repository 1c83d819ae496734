use std::collections::{BTreeSet, HashMap};

use common_error::SluiceResult;
use sluice_schema::field::FieldUid;

use super::{
    required_fields::RequiredFields,
    requirement_rules::input_requirements,
    subfields::{whole_read_demands, SubfieldTrackers},
};
use crate::logical_plan::{LogicalOp, LogicalPlan, NodeId};

/// Converged requirements of a whole plan.
#[derive(Clone, Debug)]
pub struct Requirements {
    /// Union over consumer edges of what is needed of each node's exposed output.
    pub required: Vec<RequiredFields>,
    pub trackers: SubfieldTrackers,
    /// Number of node visits until convergence.
    pub visits: usize,
}

/// Nodes whose rule reads the sub-field tracker entry of a uid they produce.
fn originators(plan: &LogicalPlan) -> HashMap<FieldUid, Vec<NodeId>> {
    let mut originators: HashMap<FieldUid, Vec<NodeId>> = HashMap::new();
    for node in plan.nodes() {
        let uids: Vec<FieldUid> = match &node.op {
            LogicalOp::CoGroup(cogroup) => cogroup.bags.iter().map(|(_, uid)| *uid).collect(),
            LogicalOp::Union(union) => union.output_fields.iter().map(|f| f.uid).collect(),
            _ => continue,
        };
        for uid in uids {
            originators.entry(uid).or_default().push(node.id);
        }
    }
    originators
}

/// Runs the requirement rules backwards from the sinks until nothing changes.
///
/// Nodes are popped highest id first. Every consumer has a higher id than its
/// inputs, so a node is normally visited after all of its consumers; it is
/// visited again whenever an edge requirement on it, or a sub-field entry it
/// produces, grows.
pub fn solve(
    plan: &LogicalPlan,
    mut trackers: SubfieldTrackers,
    retain_one_column: bool,
) -> SluiceResult<Requirements> {
    let originators = originators(plan);
    let mut required = vec![RequiredFields::none(); plan.len()];

    for sink in plan.sinks() {
        let node = plan.node(sink)?;
        required[sink] = RequiredFields::all();
        for field in &node.schema.fields {
            for demand in whole_read_demands(field) {
                trackers.apply(&demand);
            }
        }
    }

    let mut worklist: BTreeSet<NodeId> = (0..plan.len()).collect();
    let mut visits = 0;
    while let Some(id) = worklist.pop_last() {
        visits += 1;
        let node = plan.node(id)?;
        if retain_one_column && required[id].is_empty() && !node.schema.is_empty() {
            required[id].insert(0);
        }
        let demands = input_requirements(plan, id, &required[id], &trackers)?;
        for (edge, demand) in node.inputs.iter().zip(demands) {
            let mut changed = required[edge.node].merge(&demand.fields);
            for subfield in &demand.subfields {
                if trackers.apply(subfield) {
                    changed = true;
                    if let Some(nodes) = originators.get(&subfield.uid()) {
                        worklist.extend(nodes.iter().copied());
                    }
                }
            }
            if changed {
                worklist.insert(edge.node);
            }
        }
    }
    log::debug!(
        "Column requirements converged after {visits} visits over {} nodes",
        plan.len()
    );
    Ok(Requirements {
        required,
        trackers,
        visits,
    })
}

#[cfg(test)]
mod tests {
    use common_error::SluiceResult;
    use sluice_dsl::{col, lit};
    use sluice_schema::dtype::DataType;

    use super::*;
    use crate::{builder::PlanBuilder, logical_plan::InputEdge};

    #[test]
    fn split_input_needs_every_branch() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let schema = builder.schema([
            ("a0", DataType::Int32),
            ("a1", DataType::Int32),
            ("a2", DataType::Int32),
            ("a3", DataType::Int32),
        ]);
        let a = builder.load("A", "a.txt", schema, None)?;
        let s = builder.split("S", a, vec![col(0).lt(lit(5)), col(0).gt_eq(lit(5))])?;
        let b = builder.foreach("B", InputEdge::branch(s, 0), vec![col(1)])?;
        let c = builder.foreach("C", InputEdge::branch(s, 1), vec![col(2)])?;
        let u = builder.union("U", vec![b.into(), c.into()])?;
        builder.store(u, "out")?;
        let plan = builder.build()?;

        let requirements = solve(&plan, SubfieldTrackers::new(true), true)?;
        assert_eq!(requirements.required[a].to_string(), "{$0, $1, $2}");
        assert_eq!(requirements.required[s].to_string(), "{$1, $2}");
        Ok(())
    }

    #[test]
    fn fan_out_merges_every_consumer() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let schema = builder.schema([("a0", DataType::Int32), ("a1", DataType::Int32)]);
        let a = builder.load("A", "a.txt", schema, None)?;
        let b = builder.foreach("B", a, vec![col(0)])?;
        let c = builder.foreach("C", a, vec![col(1)])?;
        builder.store(b, "b")?;
        builder.store(c, "c")?;
        let plan = builder.build()?;

        let requirements = solve(&plan, SubfieldTrackers::new(true), true)?;
        assert!(requirements.visits >= plan.len());
        assert_eq!(requirements.required[a].to_string(), "{$0, $1}");
        Ok(())
    }

    #[test]
    fn unread_input_keeps_one_column() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a_schema = builder.schema([("a0", DataType::Int32), ("a1", DataType::Int32)]);
        let b_schema = builder.schema([("b0", DataType::Int32), ("b1", DataType::Int32)]);
        let a = builder.load("A", "a.txt", a_schema, None)?;
        let b = builder.load("B", "b.txt", b_schema, None)?;
        let c = builder.cross("C", vec![a.into(), b.into()])?;
        let d = builder.foreach("D", c, vec![col(0)])?;
        builder.store(d, "out")?;
        let plan = builder.build()?;

        let retained = solve(&plan, SubfieldTrackers::new(true), true)?;
        assert_eq!(retained.required[b].to_string(), "{$0}");
        let dropped = solve(&plan, SubfieldTrackers::new(true), false)?;
        assert!(dropped.required[b].is_empty());
        Ok(())
    }
}
