use std::sync::Arc;

use common_error::{SluiceError, SluiceResult};
use indexmap::IndexMap;
use sluice_dsl::ExprRef;
use sluice_schema::{
    dtype::DataType,
    field::{Field, UidGenerator},
    schema::{Schema, SchemaRef},
};

use crate::{
    logical_plan::{InputEdge, LogicalOp, LogicalPlan, NodeId},
    ops,
    source_info::{LoadFuncRef, SourceInfo},
};

/// Builds a [`LogicalPlan`] node by node, assigning field identities as it goes.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    plan: LogicalPlan,
    uids: UidGenerator,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A field with a fresh identity.
    pub fn field<S: Into<Arc<str>>>(&mut self, name: S, dtype: DataType) -> Field {
        Field::new(name, dtype, self.uids.next_uid())
    }

    /// A schema of fresh fields.
    pub fn schema<S, I>(&mut self, fields: I) -> SchemaRef
    where
        S: Into<Arc<str>>,
        I: IntoIterator<Item = (S, DataType)>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, dtype)| self.field(name, dtype))
            .collect();
        Arc::new(Schema::new(fields))
    }

    pub fn schema_of(&self, node: NodeId) -> SluiceResult<SchemaRef> {
        Ok(self.plan.node(node)?.schema.clone())
    }

    fn input_schemas(&self, inputs: &[InputEdge]) -> SluiceResult<Vec<SchemaRef>> {
        inputs
            .iter()
            .map(|edge| self.schema_of(edge.node))
            .collect()
    }

    fn add(&mut self, alias: Option<&str>, op: LogicalOp, inputs: Vec<InputEdge>) -> SluiceResult<NodeId> {
        self.plan.push(alias.map(Arc::from), op, inputs)
    }

    pub fn load(
        &mut self,
        alias: &str,
        location: &str,
        schema: SchemaRef,
        load_func: Option<LoadFuncRef>,
    ) -> SluiceResult<NodeId> {
        let source_info = SourceInfo::new(location, schema, load_func);
        self.add(
            Some(alias),
            LogicalOp::Load(ops::Load::new(Arc::new(source_info))),
            vec![],
        )
    }

    pub fn store(&mut self, input: impl Into<InputEdge>, location: &str) -> SluiceResult<NodeId> {
        self.add(
            None,
            LogicalOp::Store(ops::Store::new(location.into())),
            vec![input.into()],
        )
    }

    pub fn foreach(
        &mut self,
        alias: &str,
        input: impl Into<InputEdge>,
        exprs: Vec<ExprRef>,
    ) -> SluiceResult<NodeId> {
        self.foreach_flatten(alias, input, exprs.into_iter().map(|e| (e, false)).collect())
    }

    /// ForEach whose items are `(expression, flatten)` pairs.
    pub fn foreach_flatten(
        &mut self,
        alias: &str,
        input: impl Into<InputEdge>,
        items: Vec<(ExprRef, bool)>,
    ) -> SluiceResult<NodeId> {
        let input = input.into();
        let input_schema = self.schema_of(input.node)?;
        let items = items
            .into_iter()
            .map(|(expr, flatten)| ops::GenerateItem::new(expr, flatten, self.uids.next_uid()))
            .collect();
        let foreach = ops::ForEach::try_new(items, &input_schema)?;
        self.add(Some(alias), LogicalOp::ForEach(foreach), vec![input])
    }

    pub fn filter(
        &mut self,
        alias: &str,
        input: impl Into<InputEdge>,
        predicate: ExprRef,
    ) -> SluiceResult<NodeId> {
        let input = input.into();
        let filter = ops::Filter::try_new(predicate, &*self.schema_of(input.node)?)?;
        self.add(Some(alias), LogicalOp::Filter(filter), vec![input])
    }

    pub fn join(
        &mut self,
        alias: &str,
        inputs: Vec<(InputEdge, Vec<ExprRef>)>,
        join_type: ops::JoinType,
        strategy: ops::JoinStrategy,
    ) -> SluiceResult<NodeId> {
        let (edges, keys): (Vec<_>, Vec<_>) = inputs.into_iter().unzip();
        let join = ops::Join::try_new(keys, join_type, strategy, &self.input_schemas(&edges)?)?;
        self.add(Some(alias), LogicalOp::Join(join), edges)
    }

    /// CoGroup of `(input, keys, inner)` triples. Each bag is named after its input.
    pub fn cogroup(
        &mut self,
        alias: &str,
        inputs: Vec<(InputEdge, Vec<ExprRef>, bool)>,
    ) -> SluiceResult<NodeId> {
        let mut edges = vec![];
        let mut keys = vec![];
        let mut inner = vec![];
        let mut bag_names: Vec<Arc<str>> = vec![];
        for (i, (edge, side_keys, side_inner)) in inputs.into_iter().enumerate() {
            let name = match &self.plan.node(edge.node)?.alias {
                Some(alias) => alias.clone(),
                None => format!("input{i}").into(),
            };
            edges.push(edge);
            keys.push(side_keys);
            inner.push(side_inner);
            bag_names.push(name);
        }
        let input_schemas = self.input_schemas(&edges)?;
        let cogroup = ops::CoGroup::try_new(keys, inner, bag_names, &input_schemas, &mut self.uids)?;
        self.add(Some(alias), LogicalOp::CoGroup(cogroup), edges)
    }

    pub fn group(
        &mut self,
        alias: &str,
        input: impl Into<InputEdge>,
        keys: Vec<ExprRef>,
    ) -> SluiceResult<NodeId> {
        self.cogroup(alias, vec![(input.into(), keys, false)])
    }

    pub fn group_all(&mut self, alias: &str, input: impl Into<InputEdge>) -> SluiceResult<NodeId> {
        self.cogroup(alias, vec![(input.into(), vec![], false)])
    }

    pub fn cross(&mut self, alias: &str, inputs: Vec<InputEdge>) -> SluiceResult<NodeId> {
        if inputs.len() < 2 {
            return Err(SluiceError::ValueError(
                "Cross needs at least two inputs".to_string(),
            ));
        }
        self.add(Some(alias), LogicalOp::Cross(ops::Cross::default()), inputs)
    }

    /// Union matching fields by position. Inputs narrower than the widest one
    /// are padded with nulls.
    pub fn union(&mut self, alias: &str, inputs: Vec<InputEdge>) -> SluiceResult<NodeId> {
        let schemas = self.input_schemas(&inputs)?;
        let width = schemas.iter().map(|s| s.len()).max().unwrap_or(0);
        let mut output_fields = Vec::with_capacity(width);
        for position in 0..width {
            let template = schemas
                .iter()
                .find_map(|s| s.fields.get(position))
                .ok_or_else(|| {
                    SluiceError::InternalError(format!("No union input has field ${position}"))
                })?;
            let (name, dtype) = (template.name.clone(), template.dtype.clone());
            output_fields.push(self.field(name, dtype));
        }
        let mappings = schemas
            .iter()
            .map(|s| (0..width).map(|p| (p < s.len()).then_some(p)).collect())
            .collect();
        self.add_union(alias, inputs, output_fields, mappings)
    }

    /// Union matching fields by name. Output fields are every distinct name in
    /// order of first appearance.
    pub fn union_onschema(&mut self, alias: &str, inputs: Vec<InputEdge>) -> SluiceResult<NodeId> {
        let schemas = self.input_schemas(&inputs)?;
        let mut names: IndexMap<Arc<str>, DataType> = IndexMap::new();
        for schema in &schemas {
            for field in &schema.fields {
                names
                    .entry(field.name.clone())
                    .or_insert_with(|| field.dtype.clone());
            }
        }
        let mappings = schemas
            .iter()
            .map(|s| {
                names
                    .keys()
                    .map(|name| s.fields.iter().position(|f| &f.name == name))
                    .collect()
            })
            .collect();
        let output_fields = names
            .into_iter()
            .map(|(name, dtype)| self.field(name, dtype))
            .collect();
        self.add_union(alias, inputs, output_fields, mappings)
    }

    fn add_union(
        &mut self,
        alias: &str,
        inputs: Vec<InputEdge>,
        output_fields: Vec<Field>,
        mappings: Vec<Vec<Option<usize>>>,
    ) -> SluiceResult<NodeId> {
        if inputs.len() < 2 {
            return Err(SluiceError::ValueError(
                "Union needs at least two inputs".to_string(),
            ));
        }
        self.add(
            Some(alias),
            LogicalOp::Union(ops::Union::new(output_fields, mappings)),
            inputs,
        )
    }

    pub fn distinct(&mut self, alias: &str, input: impl Into<InputEdge>) -> SluiceResult<NodeId> {
        self.add(
            Some(alias),
            LogicalOp::Distinct(ops::Distinct::default()),
            vec![input.into()],
        )
    }

    pub fn order_by(
        &mut self,
        alias: &str,
        input: impl Into<InputEdge>,
        sort_by: Vec<ExprRef>,
        descending: Vec<bool>,
    ) -> SluiceResult<NodeId> {
        let input = input.into();
        let order_by = ops::OrderBy::try_new(sort_by, descending, &*self.schema_of(input.node)?)?;
        self.add(Some(alias), LogicalOp::OrderBy(order_by), vec![input])
    }

    pub fn limit(&mut self, alias: &str, input: impl Into<InputEdge>, limit: u64) -> SluiceResult<NodeId> {
        self.add(
            Some(alias),
            LogicalOp::Limit(ops::Limit::new(limit)),
            vec![input.into()],
        )
    }

    /// Split with one branch per predicate. Read branch `i` through
    /// [`InputEdge::branch`].
    pub fn split(
        &mut self,
        alias: &str,
        input: impl Into<InputEdge>,
        predicates: Vec<ExprRef>,
    ) -> SluiceResult<NodeId> {
        let input = input.into();
        let split = ops::Split::try_new(predicates, &*self.schema_of(input.node)?)?;
        self.add(Some(alias), LogicalOp::Split(split), vec![input])
    }

    pub fn stream(
        &mut self,
        alias: &str,
        input: impl Into<InputEdge>,
        command: &str,
        output_schema: SchemaRef,
    ) -> SluiceResult<NodeId> {
        self.add(
            Some(alias),
            LogicalOp::Stream(ops::Stream::new(command.into(), output_schema)),
            vec![input.into()],
        )
    }

    pub fn build(self) -> SluiceResult<LogicalPlan> {
        self.plan.validate()?;
        Ok(self.plan)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common_error::SluiceResult;
    use sluice_dsl::{col, lit};
    use sluice_schema::dtype::DataType;

    use super::*;

    fn ints(builder: &mut PlanBuilder, names: &[&str]) -> SchemaRef {
        builder.schema(names.iter().map(|n| (*n, DataType::Int32)))
    }

    #[test]
    fn pass_through_nodes_share_the_input_schema() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let schema = ints(&mut builder, &["a0", "a1"]);
        let a = builder.load("A", "a.txt", schema, None)?;
        let b = builder.filter("B", a, col(0).gt(lit(1)))?;
        let plan = builder.build()?;
        assert!(Arc::ptr_eq(&plan.node(a)?.schema, &plan.node(b)?.schema));
        Ok(())
    }

    #[test]
    fn join_concatenates_inputs_and_keeps_uids() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a_schema = ints(&mut builder, &["a0", "a1"]);
        let b_schema = ints(&mut builder, &["b0"]);
        let a = builder.load("A", "a.txt", a_schema.clone(), None)?;
        let b = builder.load("B", "b.txt", b_schema.clone(), None)?;
        let c = builder.join(
            "C",
            vec![(a.into(), vec![col(1)]), (b.into(), vec![col(0)])],
            ops::JoinType::Inner,
            ops::JoinStrategy::Hash,
        )?;
        let plan = builder.build()?;
        let mut expected = a_schema.uids();
        expected.extend(b_schema.uids());
        assert_eq!(plan.node(c)?.schema.uids(), expected);
        Ok(())
    }

    #[test]
    fn cogroup_bags_are_named_after_inputs() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let schema = ints(&mut builder, &["a0", "a1"]);
        let a = builder.load("A", "a.txt", schema, None)?;
        let g = builder.group("G", a, vec![col(1)])?;
        let plan = builder.build()?;
        let names = plan.node(g)?.schema.names();
        assert_eq!(names[0].as_ref(), "group");
        assert_eq!(names[1].as_ref(), "A");
        assert!(plan.node(g)?.schema.fields[1].dtype.is_bag());
        Ok(())
    }

    #[test]
    fn union_pads_narrow_inputs() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a_schema = ints(&mut builder, &["a0", "a1"]);
        let b_schema = ints(&mut builder, &["b0"]);
        let a = builder.load("A", "a.txt", a_schema, None)?;
        let b = builder.load("B", "b.txt", b_schema, None)?;
        let u = builder.union("U", vec![a.into(), b.into()])?;
        let plan = builder.build()?;
        match &plan.node(u)?.op {
            LogicalOp::Union(union) => {
                assert_eq!(union.mappings, vec![vec![Some(0), Some(1)], vec![Some(0), None]]);
            }
            other => panic!("expected a union, got {}", other.name()),
        }
        Ok(())
    }

    #[test]
    fn union_onschema_matches_names() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let a_schema = ints(&mut builder, &["x", "y"]);
        let b_schema = ints(&mut builder, &["y", "z"]);
        let a = builder.load("A", "a.txt", a_schema, None)?;
        let b = builder.load("B", "b.txt", b_schema, None)?;
        let u = builder.union_onschema("U", vec![a.into(), b.into()])?;
        let plan = builder.build()?;
        match &plan.node(u)?.op {
            LogicalOp::Union(union) => {
                assert_eq!(
                    union.mappings,
                    vec![
                        vec![Some(0), Some(1), None],
                        vec![None, Some(0), Some(1)]
                    ]
                );
            }
            other => panic!("expected a union, got {}", other.name()),
        }
        Ok(())
    }

    #[test]
    fn invalid_expressions_are_rejected() {
        let mut builder = PlanBuilder::new();
        let schema = ints(&mut builder, &["a0"]);
        let a = builder.load("A", "a.txt", schema, None);
        assert!(a.is_ok());
        if let Ok(a) = a {
            assert!(builder.filter("B", a, col(3).gt(lit(1))).is_err());
            assert!(builder.filter("B", a, col(0)).is_err());
        }
    }

    #[test]
    fn split_branches_must_be_addressed() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let schema = ints(&mut builder, &["a0"]);
        let a = builder.load("A", "a.txt", schema, None)?;
        let s = builder.split("S", a, vec![col(0).gt(lit(1)), col(0).lt_eq(lit(1))])?;
        builder.limit("L", s, 1)?;
        assert!(builder.build().is_err());
        Ok(())
    }
}
