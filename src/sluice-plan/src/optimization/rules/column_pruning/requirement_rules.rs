use std::ops::Range;

use common_error::{SluiceError, SluiceResult};
use sluice_dsl::{
    optimization::{get_required_columns, has_star, FieldAccess, RequiredColumns},
    ExprRef,
};
use sluice_schema::{field::Field, schema::Schema};

use super::{
    required_fields::RequiredFields,
    subfields::{forward_demands, whole_read_demands, KeySet, SubfieldDemand, SubfieldTrackers},
};
use crate::logical_plan::{CoGroup, LogicalOp, LogicalPlan, NodeId, PlanNode};

/// What a node needs from one of its inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputDemand {
    pub fields: RequiredFields,
    pub subfields: Vec<SubfieldDemand>,
}

/// Accumulates the demand on one input schema.
struct DemandBuilder<'a> {
    schema: &'a Schema,
    fields: RequiredFields,
    subfields: Vec<SubfieldDemand>,
}

impl<'a> DemandBuilder<'a> {
    fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            fields: RequiredFields::none(),
            subfields: vec![],
        }
    }

    fn field(&self, position: usize) -> SluiceResult<&'a Field> {
        self.schema
            .get(position)
            .map_err(|e| SluiceError::InternalError(e.to_string()))
    }

    /// Requires a position without saying anything about its sub-fields.
    fn require(&mut self, position: usize) -> SluiceResult<&'a Field> {
        let field = self.field(position)?;
        self.fields.insert(position);
        Ok(field)
    }

    fn require_all_positions(&mut self) {
        self.fields.set_all();
    }

    fn read_whole(&mut self, position: usize) -> SluiceResult<()> {
        let field = self.require(position)?;
        self.subfields.extend(whole_read_demands(field));
        Ok(())
    }

    fn read_whole_all(&mut self) {
        self.fields.set_all();
        let schema = self.schema;
        self.subfields
            .extend(schema.fields.iter().flat_map(whole_read_demands));
    }

    fn forward(&mut self, position: usize) -> SluiceResult<()> {
        let field = self.require(position)?;
        self.subfields.extend(forward_demands(field));
        Ok(())
    }

    fn read(&mut self, required: RequiredColumns) -> SluiceResult<()> {
        if required.star {
            self.read_whole_all();
            return Ok(());
        }
        for (position, access) in required.accesses {
            match access {
                FieldAccess::Whole => self.read_whole(position)?,
                FieldAccess::MapKey(key) => {
                    let field = self.require(position)?;
                    if field.dtype.is_map() {
                        self.subfields.push(SubfieldDemand::MapKey(field.uid, key));
                    } else {
                        self.subfields.extend(whole_read_demands(field));
                    }
                }
                FieldAccess::Columns(columns) => {
                    let field = self.require(position)?;
                    match field.dtype.inner_schema() {
                        Some(inner) => {
                            let mut uids = Vec::with_capacity(columns.len());
                            for column in columns {
                                let inner_field = inner
                                    .get(column)
                                    .map_err(|e| SluiceError::InternalError(e.to_string()))?;
                                uids.push(inner_field.uid);
                                self.subfields.extend(whole_read_demands(inner_field));
                            }
                            self.subfields
                                .push(SubfieldDemand::BagColumns(field.uid, uids));
                        }
                        None => self.subfields.extend(whole_read_demands(field)),
                    }
                }
            }
        }
        Ok(())
    }

    fn read_expr(&mut self, expr: &ExprRef) -> SluiceResult<()> {
        self.read(get_required_columns(expr))
    }

    /// Keys are compared and hashed, so every field they touch is read whole.
    fn read_keys(&mut self, keys: &[ExprRef]) -> SluiceResult<()> {
        for key in keys {
            self.read(get_required_columns(key).into_whole())?;
        }
        Ok(())
    }

    fn require_range(&mut self, required: &[usize], range: Range<usize>) -> SluiceResult<()> {
        for p in required.iter().filter(|p| range.contains(p)) {
            self.require(p - range.start)?;
        }
        Ok(())
    }

    fn finish(self) -> InputDemand {
        InputDemand {
            fields: self.fields,
            subfields: self.subfields,
        }
    }
}

/// Translates a requirement on the exposed output into one on the natural output.
pub fn natural_required(node: &PlanNode, required: &RequiredFields) -> SluiceResult<RequiredFields> {
    let Some(projection) = &node.output_projection else {
        return Ok(required.clone());
    };
    match required {
        RequiredFields::All => Ok(RequiredFields::from_positions(projection.iter().copied())),
        RequiredFields::None => Ok(RequiredFields::none()),
        RequiredFields::Positions(positions) => positions
            .iter()
            .map(|p| {
                projection.get(*p).copied().ok_or_else(|| {
                    SluiceError::InternalError(format!(
                        "Position ${p} is not exposed by {}",
                        node.display_name()
                    ))
                })
            })
            .collect::<SluiceResult<Vec<_>>>()
            .map(RequiredFields::from_positions),
    }
}

/// Given what consumers need of a node's exposed output, computes what the
/// node needs of each of its inputs, in input order.
pub fn input_requirements(
    plan: &LogicalPlan,
    id: NodeId,
    required: &RequiredFields,
    trackers: &SubfieldTrackers,
) -> SluiceResult<Vec<InputDemand>> {
    let node = plan.node(id)?;
    let inputs = plan.input_schemas(id)?;
    let natural_arity = plan.natural_schema(id)?.len();
    let out = natural_required(node, required)?.resolve(natural_arity)?;
    let mut builders: Vec<DemandBuilder> = inputs.iter().map(|s| DemandBuilder::new(s)).collect();

    match &node.op {
        LogicalOp::Load(..) => {}
        LogicalOp::Store(..) | LogicalOp::Distinct(..) | LogicalOp::Stream(..) => {
            for builder in &mut builders {
                builder.read_whole_all();
            }
        }
        LogicalOp::Filter(filter) => {
            let builder = first(&mut builders, node)?;
            builder.require_range(&out, 0..natural_arity)?;
            builder.read_expr(&filter.predicate)?;
        }
        LogicalOp::Limit(..) => {
            first(&mut builders, node)?.require_range(&out, 0..natural_arity)?;
        }
        LogicalOp::OrderBy(order_by) => {
            let builder = first(&mut builders, node)?;
            builder.require_range(&out, 0..natural_arity)?;
            builder.read_keys(&order_by.sort_by)?;
        }
        LogicalOp::Split(split) => {
            let builder = first(&mut builders, node)?;
            builder.require_range(&out, 0..natural_arity)?;
            for predicate in &split.predicates {
                builder.read_expr(predicate)?;
            }
        }
        LogicalOp::ForEach(foreach) => {
            let builder = first(&mut builders, node)?;
            let ranges = foreach.item_ranges(builder.schema)?;
            for (item, range) in foreach.items.iter().zip(ranges) {
                // A flatten item decides how many rows come out, read or not.
                if !item.flatten && !out.iter().any(|p| range.contains(p)) {
                    continue;
                }
                if item.is_project_all() {
                    builder.require_all_positions();
                } else if has_star(&item.expr) {
                    builder.read_whole_all();
                } else if let Some(position) = item.expr.input_mapping() {
                    if item.flatten {
                        builder.forward(position)?;
                    } else {
                        builder.require(position)?;
                    }
                } else if item.flatten {
                    builder.read(get_required_columns(&item.expr).into_whole())?;
                } else {
                    builder.read_expr(&item.expr)?;
                }
            }
        }
        LogicalOp::Join(..) | LogicalOp::Cross(..) => {
            let mut offset = 0;
            for builder in &mut builders {
                let width = builder.schema.len();
                builder.require_range(&out, offset..offset + width)?;
                offset += width;
            }
            if let LogicalOp::Join(join) = &node.op {
                for (builder, keys) in builders.iter_mut().zip(join.keys.iter()) {
                    builder.read_keys(keys)?;
                }
            }
        }
        LogicalOp::CoGroup(cogroup) => {
            for (i, (builder, keys)) in builders.iter_mut().zip(cogroup.keys.iter()).enumerate() {
                builder.read_keys(keys)?;
                if !out.contains(&CoGroup::bag_position(i)) {
                    continue;
                }
                let Some((_, bag_uid)) = cogroup.bags.get(i) else {
                    return Err(SluiceError::InternalError(format!(
                        "{} has no bag for input {i}",
                        node.display_name()
                    )));
                };
                match trackers.bag_columns.get(*bag_uid) {
                    Some(KeySet::Only(columns)) => {
                        for uid in columns {
                            match builder.schema.position_of_uid(*uid) {
                                Some(position) => {
                                    builder.require(position)?;
                                }
                                None => builder.require_all_positions(),
                            }
                        }
                    }
                    Some(KeySet::All) | None => builder.require_all_positions(),
                }
            }
        }
        LogicalOp::Union(union) => {
            for (builder, mapping) in builders.iter_mut().zip(union.mappings.iter()) {
                for p in &out {
                    let output_field = union.output_fields.get(*p).ok_or_else(|| {
                        SluiceError::InternalError(format!(
                            "{} has no output ${p}",
                            node.display_name()
                        ))
                    })?;
                    match mapping.get(*p).copied().flatten() {
                        Some(position) => {
                            let field = builder.require(position)?;
                            let demands = translate_union_demands(output_field, field, trackers);
                            builder.subfields.extend(demands);
                        }
                        None => builder.read_whole_all(),
                    }
                }
            }
        }
    }
    Ok(builders.into_iter().map(DemandBuilder::finish).collect())
}

fn first<'a, 'b>(
    builders: &'b mut [DemandBuilder<'a>],
    node: &PlanNode,
) -> SluiceResult<&'b mut DemandBuilder<'a>> {
    builders.first_mut().ok_or_else(|| {
        SluiceError::InternalError(format!("{} is missing its input", node.display_name()))
    })
}

/// Re-records what consumers need of a union output on the input field that feeds it.
fn translate_union_demands(
    output: &Field,
    input: &Field,
    trackers: &SubfieldTrackers,
) -> Vec<SubfieldDemand> {
    if input.dtype.is_map() {
        match trackers.map_keys.get(output.uid) {
            Some(KeySet::Only(keys)) => keys
                .iter()
                .map(|key| SubfieldDemand::MapKey(input.uid, key.clone()))
                .collect(),
            Some(KeySet::All) | None => vec![SubfieldDemand::AllKeys(input.uid)],
        }
    } else {
        whole_read_demands(input)
    }
}

#[cfg(test)]
mod tests {
    use common_error::SluiceResult;
    use sluice_dsl::{col, lit, star, Expr};
    use sluice_schema::dtype::DataType;

    use super::*;
    use crate::{
        builder::PlanBuilder,
        logical_plan::{JoinStrategy, JoinType},
    };

    fn fields(demand: &InputDemand) -> String {
        demand.fields.to_string()
    }

    fn abc(builder: &mut PlanBuilder) -> SluiceResult<NodeId> {
        let schema = builder.schema([
            ("a0", DataType::Int32),
            ("a1", DataType::Map(Box::new(DataType::Int32))),
            ("a2", DataType::Int32),
        ]);
        builder.load("A", "a.txt", schema, None)
    }

    #[test]
    fn filter_adds_predicate_fields() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a = abc(&mut builder)?;
        let f = builder.filter("F", a, col(2).gt(lit(1)))?;
        let plan = builder.build()?;
        let trackers = SubfieldTrackers::new(true);
        let demands = input_requirements(&plan, f, &RequiredFields::from_positions([0]), &trackers)?;
        assert_eq!(fields(&demands[0]), "{$0, $2}");
        Ok(())
    }

    #[test]
    fn foreach_only_reads_required_items() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a = abc(&mut builder)?;
        let b = builder.foreach(
            "B",
            a,
            vec![col(1).map_lookup("key1"), col(2), col(0).gt(lit(0))],
        )?;
        let plan = builder.build()?;
        let trackers = SubfieldTrackers::new(true);
        let demands = input_requirements(&plan, b, &RequiredFields::from_positions([0]), &trackers)?;
        assert_eq!(fields(&demands[0]), "{$1}");
        let a1 = plan.node(a)?.schema.fields[1].uid;
        assert_eq!(demands[0].subfields, vec![SubfieldDemand::MapKey(a1, "key1".into())]);
        Ok(())
    }

    #[test]
    fn wildcard_argument_reads_everything() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a = abc(&mut builder)?;
        let b = builder.foreach("B", a, vec![Expr::call("SIZE", DataType::Int64, vec![star()])])?;
        let plan = builder.build()?;
        let trackers = SubfieldTrackers::new(true);
        let demands = input_requirements(&plan, b, &RequiredFields::all(), &trackers)?;
        assert!(demands[0].fields.is_all());
        let a1 = plan.node(a)?.schema.fields[1].uid;
        assert!(demands[0].subfields.contains(&SubfieldDemand::AllKeys(a1)));
        Ok(())
    }

    #[test]
    fn join_splits_requirement_by_side() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a = abc(&mut builder)?;
        let b_schema = builder.schema([("b0", DataType::Int32), ("b1", DataType::Int32)]);
        let b = builder.load("B", "b.txt", b_schema, None)?;
        let c = builder.join(
            "C",
            vec![(a.into(), vec![col(2)]), (b.into(), vec![col(1)])],
            JoinType::Inner,
            JoinStrategy::Hash,
        )?;
        let plan = builder.build()?;
        let trackers = SubfieldTrackers::new(true);
        let demands = input_requirements(&plan, c, &RequiredFields::from_positions([0, 3]), &trackers)?;
        assert_eq!(fields(&demands[0]), "{$0, $2}");
        assert_eq!(fields(&demands[1]), "{$0, $1}");
        Ok(())
    }

    #[test]
    fn map_key_used_as_sort_key_is_read_whole() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a = abc(&mut builder)?;
        let o = builder.order_by("O", a, vec![col(1).map_lookup("k")], vec![false])?;
        let plan = builder.build()?;
        let trackers = SubfieldTrackers::new(true);
        let demands = input_requirements(&plan, o, &RequiredFields::from_positions([0]), &trackers)?;
        let a1 = plan.node(a)?.schema.fields[1].uid;
        assert_eq!(fields(&demands[0]), "{$0, $1}");
        assert_eq!(demands[0].subfields, vec![SubfieldDemand::AllKeys(a1)]);
        Ok(())
    }

    #[test]
    fn cogroup_narrows_dereferenced_bags() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a = abc(&mut builder)?;
        let g = builder.group("G", a, vec![col(0)])?;
        let plan = builder.build()?;
        let a_schema = plan.node(a)?.schema.clone();
        let bag_uid = plan.node(g)?.schema.fields[1].uid;

        let mut trackers = SubfieldTrackers::new(true);
        let demands = input_requirements(&plan, g, &RequiredFields::from_positions([1]), &trackers)?;
        assert!(demands[0].fields.is_all());

        trackers.apply(&SubfieldDemand::BagColumns(bag_uid, vec![a_schema.fields[2].uid]));
        let demands = input_requirements(&plan, g, &RequiredFields::from_positions([1]), &trackers)?;
        assert_eq!(fields(&demands[0]), "{$0, $2}");

        let demands = input_requirements(&plan, g, &RequiredFields::from_positions([0]), &trackers)?;
        assert_eq!(fields(&demands[0]), "{$0}");
        Ok(())
    }

    #[test]
    fn union_translates_map_keys_per_input() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a = abc(&mut builder)?;
        let b = abc(&mut builder)?;
        let u = builder.union("U", vec![a.into(), b.into()])?;
        let plan = builder.build()?;
        let out_uid = plan.node(u)?.schema.fields[1].uid;
        let mut trackers = SubfieldTrackers::new(true);
        trackers.apply(&SubfieldDemand::MapKey(out_uid, "k".into()));
        let demands = input_requirements(&plan, u, &RequiredFields::from_positions([1]), &trackers)?;
        for (input, demand) in [a, b].iter().zip(demands.iter()) {
            let uid = plan.node(*input)?.schema.fields[1].uid;
            assert_eq!(fields(demand), "{$1}");
            assert_eq!(demand.subfields, vec![SubfieldDemand::MapKey(uid, "k".into())]);
        }
        Ok(())
    }

    #[test]
    fn out_of_range_requirement_is_internal_error() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a = abc(&mut builder)?;
        let l = builder.limit("L", a, 3)?;
        let plan = builder.build()?;
        let trackers = SubfieldTrackers::new(true);
        let err = input_requirements(&plan, l, &RequiredFields::from_positions([5]), &trackers).err();
        assert!(matches!(err, Some(SluiceError::InternalError(_))));
        Ok(())
    }
}
