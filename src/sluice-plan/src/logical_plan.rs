use std::{collections::BTreeSet, sync::Arc};

use common_error::{SluiceError, SluiceResult};
use common_treenode::Transformed;
use sluice_dsl::ExprRef;
use sluice_schema::schema::{Schema, SchemaRef};
use snafu::Snafu;

pub use crate::ops::*;

/// Position of a node in its plan. Inputs always have smaller ids than their
/// consumers, so id order is a topological order.
pub type NodeId = usize;

/// Reference from a consumer to one of its inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputEdge {
    pub node: NodeId,
    /// Branch of a Split input. `None` for every other kind.
    pub branch: Option<usize>,
}

impl InputEdge {
    pub fn new(node: NodeId) -> Self {
        Self { node, branch: None }
    }

    pub fn branch(node: NodeId, branch: usize) -> Self {
        Self {
            node,
            branch: Some(branch),
        }
    }
}

impl From<NodeId> for InputEdge {
    fn from(node: NodeId) -> Self {
        Self::new(node)
    }
}

/// Reverse of an [`InputEdge`]: `consumer` reads the node as its `input_index`-th input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerEdge {
    pub consumer: NodeId,
    pub input_index: usize,
}

#[derive(Clone, Debug)]
pub enum LogicalOp {
    Load(Load),
    Store(Store),
    ForEach(ForEach),
    Filter(Filter),
    Join(Join),
    CoGroup(CoGroup),
    Cross(Cross),
    Union(Union),
    Distinct(Distinct),
    OrderBy(OrderBy),
    Limit(Limit),
    Split(Split),
    Stream(Stream),
}

impl LogicalOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load(..) => "Load",
            Self::Store(..) => "Store",
            Self::ForEach(..) => "ForEach",
            Self::Filter(..) => "Filter",
            Self::Join(..) => "Join",
            Self::CoGroup(..) => "CoGroup",
            Self::Cross(..) => "Cross",
            Self::Union(..) => "Union",
            Self::Distinct(..) => "Distinct",
            Self::OrderBy(..) => "OrderBy",
            Self::Limit(..) => "Limit",
            Self::Split(..) => "Split",
            Self::Stream(..) => "Stream",
        }
    }

    pub fn multiline_display(&self) -> Vec<String> {
        match self {
            Self::Load(load) => load.multiline_display(),
            Self::Store(store) => store.multiline_display(),
            Self::ForEach(foreach) => foreach.multiline_display(),
            Self::Filter(filter) => filter.multiline_display(),
            Self::Join(join) => join.multiline_display(),
            Self::CoGroup(cogroup) => cogroup.multiline_display(),
            Self::Cross(cross) => cross.multiline_display(),
            Self::Union(union) => union.multiline_display(),
            Self::Distinct(distinct) => distinct.multiline_display(),
            Self::OrderBy(order_by) => order_by.multiline_display(),
            Self::Limit(limit) => limit.multiline_display(),
            Self::Split(split) => split.multiline_display(),
            Self::Stream(stream) => stream.multiline_display(),
        }
    }

    /// Minimum and maximum number of inputs.
    fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Self::Load(..) => (0, Some(0)),
            Self::Store(..)
            | Self::ForEach(..)
            | Self::Filter(..)
            | Self::Distinct(..)
            | Self::OrderBy(..)
            | Self::Limit(..)
            | Self::Split(..)
            | Self::Stream(..) => (1, Some(1)),
            Self::Join(join) => (join.keys.len(), Some(join.keys.len())),
            Self::CoGroup(cogroup) => (cogroup.keys.len(), Some(cogroup.keys.len())),
            Self::Union(union) => (union.mappings.len(), Some(union.mappings.len())),
            Self::Cross(..) => (2, None),
        }
    }

    /// Output of the operator before any pruning of its exposed fields.
    pub fn natural_schema(&self, inputs: &[SchemaRef]) -> SluiceResult<Schema> {
        let first_input = || {
            inputs.first().map(|s| s.as_ref().clone()).ok_or_else(|| {
                SluiceError::InternalError(format!("{} is missing its input", self.name()))
            })
        };
        match self {
            Self::Load(load) => Ok(load.source_schema().as_ref().clone()),
            Self::Store(..) => Ok(Schema::empty()),
            Self::ForEach(foreach) => foreach.output_schema(&first_input()?),
            Self::Filter(..)
            | Self::Distinct(..)
            | Self::OrderBy(..)
            | Self::Limit(..)
            | Self::Split(..) => first_input(),
            Self::Join(..) | Self::Cross(..) => {
                Ok(Schema::concat(inputs.iter().map(|s| s.as_ref())))
            }
            Self::CoGroup(cogroup) => Ok(cogroup.output_schema(inputs)),
            Self::Union(union) => Ok(union.output_schema()),
            Self::Stream(stream) => Ok(stream.output_schema.as_ref().clone()),
        }
    }

    /// Whether the exposed output may be a subset of the natural output.
    /// ForEach and Union drop items and columns instead; Store exposes nothing.
    pub fn supports_output_projection(&self) -> bool {
        !matches!(self, Self::ForEach(..) | Self::Union(..) | Self::Store(..))
    }

    /// Every expression of the operator, paired with the index of the input
    /// it is evaluated against.
    pub fn expressions(&self) -> Vec<(usize, &ExprRef)> {
        match self {
            Self::ForEach(foreach) => foreach.items.iter().map(|item| (0, &item.expr)).collect(),
            Self::Filter(filter) => vec![(0, &filter.predicate)],
            Self::OrderBy(order_by) => order_by.sort_by.iter().map(|e| (0, e)).collect(),
            Self::Split(split) => split.predicates.iter().map(|e| (0, e)).collect(),
            Self::Join(Join { keys, .. }) | Self::CoGroup(CoGroup { keys, .. }) => keys
                .iter()
                .enumerate()
                .flat_map(|(i, side)| side.iter().map(move |e| (i, e)))
                .collect(),
            Self::Load(..)
            | Self::Store(..)
            | Self::Cross(..)
            | Self::Union(..)
            | Self::Distinct(..)
            | Self::Limit(..)
            | Self::Stream(..) => vec![],
        }
    }

    /// Rewrites every expression in place. Returns whether any changed.
    pub fn map_expressions<F>(&mut self, mut f: F) -> SluiceResult<bool>
    where
        F: FnMut(usize, ExprRef) -> SluiceResult<Transformed<ExprRef>>,
    {
        let mut transformed = false;
        let mut apply = |input: usize, expr: &mut ExprRef| -> SluiceResult<()> {
            let result = f(input, expr.clone())?;
            transformed |= result.transformed;
            *expr = result.data;
            Ok(())
        };
        match self {
            Self::ForEach(foreach) => {
                for item in &mut foreach.items {
                    apply(0, &mut item.expr)?;
                }
            }
            Self::Filter(filter) => apply(0, &mut filter.predicate)?,
            Self::OrderBy(order_by) => {
                for expr in &mut order_by.sort_by {
                    apply(0, expr)?;
                }
            }
            Self::Split(split) => {
                for expr in &mut split.predicates {
                    apply(0, expr)?;
                }
            }
            Self::Join(Join { keys, .. }) | Self::CoGroup(CoGroup { keys, .. }) => {
                for (i, side) in keys.iter_mut().enumerate() {
                    for expr in side {
                        apply(i, expr)?;
                    }
                }
            }
            Self::Load(..)
            | Self::Store(..)
            | Self::Cross(..)
            | Self::Union(..)
            | Self::Distinct(..)
            | Self::Limit(..)
            | Self::Stream(..) => {}
        }
        Ok(transformed)
    }
}

#[derive(Clone, Debug)]
pub struct PlanNode {
    pub id: NodeId,
    pub alias: Option<Arc<str>>,
    pub op: LogicalOp,
    pub inputs: Vec<InputEdge>,
    /// Fields exposed to consumers. Shared between nodes until one of them is pruned.
    pub schema: SchemaRef,
    /// Positions of the natural output that are exposed, when not all of them are.
    pub output_projection: Option<Vec<usize>>,
}

impl PlanNode {
    /// Positions of the natural output that are currently exposed.
    pub fn exposed_natural_positions(&self) -> Vec<usize> {
        match &self.output_projection {
            Some(projection) => projection.clone(),
            None => (0..self.schema.len()).collect(),
        }
    }

    /// Name used in diagnostics: the alias, or the location of a Load.
    pub fn display_name(&self) -> Arc<str> {
        match (&self.alias, &self.op) {
            (Some(alias), _) => alias.clone(),
            (None, LogicalOp::Load(load)) => load.source_info.location.clone(),
            (None, op) => format!("{}#{}", op.name(), self.id).into(),
        }
    }
}

/// A dataflow plan: a DAG of operators stored in construction order.
#[derive(Clone, Debug, Default)]
pub struct LogicalPlan {
    nodes: Vec<PlanNode>,
}

impl LogicalPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> SluiceResult<&PlanNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| SluiceError::InternalError(format!("Plan has no node #{id}")))
    }

    pub fn node_mut(&mut self, id: NodeId) -> SluiceResult<&mut PlanNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| SluiceError::InternalError(format!("Plan has no node #{id}")))
    }

    /// Last node carrying `alias`.
    pub fn find(&self, alias: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .rev()
            .find(|n| n.alias.as_deref() == Some(alias))
            .map(|n| n.id)
    }

    /// Appends a node whose exposed schema is its natural output. Nodes that
    /// simply forward their input share the input's schema object.
    pub(crate) fn push(
        &mut self,
        alias: Option<Arc<str>>,
        op: LogicalOp,
        inputs: Vec<InputEdge>,
    ) -> SluiceResult<NodeId> {
        let id = self.nodes.len();
        let input_schemas = inputs
            .iter()
            .map(|edge| self.node(edge.node).map(|n| n.schema.clone()))
            .collect::<SluiceResult<Vec<_>>>()?;
        let schema = match &op {
            LogicalOp::Filter(..)
            | LogicalOp::Distinct(..)
            | LogicalOp::OrderBy(..)
            | LogicalOp::Limit(..)
            | LogicalOp::Split(..) => input_schemas.first().cloned().ok_or_else(|| {
                SluiceError::ValueError(format!("{} needs an input", op.name()))
            })?,
            _ => Arc::new(op.natural_schema(&input_schemas)?),
        };
        self.nodes.push(PlanNode {
            id,
            alias,
            op,
            inputs,
            schema,
            output_projection: None,
        });
        Ok(id)
    }

    pub fn input_schemas(&self, id: NodeId) -> SluiceResult<Vec<SchemaRef>> {
        self.node(id)?
            .inputs
            .iter()
            .map(|edge| self.node(edge.node).map(|n| n.schema.clone()))
            .collect()
    }

    pub fn natural_schema(&self, id: NodeId) -> SluiceResult<Schema> {
        self.node(id)?.op.natural_schema(&self.input_schemas(id)?)
    }

    /// Consumer edges of every node, in consumer id order.
    pub fn consumers(&self) -> Vec<Vec<ConsumerEdge>> {
        let mut consumers = vec![vec![]; self.nodes.len()];
        for node in &self.nodes {
            for (input_index, edge) in node.inputs.iter().enumerate() {
                if let Some(list) = consumers.get_mut(edge.node) {
                    list.push(ConsumerEdge {
                        consumer: node.id,
                        input_index,
                    });
                }
            }
        }
        consumers
    }

    /// Nodes no other node reads from. Their output is the observable result.
    pub fn sinks(&self) -> Vec<NodeId> {
        self.consumers()
            .iter()
            .enumerate()
            .filter(|(_, consumers)| consumers.is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    /// Checks the structural invariants every pass relies on: acyclic input
    /// edges, valid split branches, in-range positions in every expression,
    /// mapping and projection, and exposed schemas that match the inputs.
    pub fn validate(&self) -> SluiceResult<()> {
        for (id, node) in self.nodes.iter().enumerate() {
            self.validate_node(id, node).map_err(|e| match e {
                SluiceError::InternalError(msg) => SluiceError::InternalError(msg),
                other => SluiceError::InternalError(format!("Invalid plan node #{id}: {other}")),
            })?;
        }
        Ok(())
    }

    fn validate_node(&self, id: NodeId, node: &PlanNode) -> SluiceResult<()> {
        let invalid = |msg: String| SluiceError::InternalError(format!("Invalid plan node #{id}: {msg}"));
        if node.id != id {
            return Err(invalid(format!("stored with id #{}", node.id)));
        }
        let (min, max) = node.op.arity();
        if node.inputs.len() < min || max.map_or(false, |max| node.inputs.len() > max) {
            return Err(invalid(format!(
                "{} has {} inputs",
                node.op.name(),
                node.inputs.len()
            )));
        }
        for edge in &node.inputs {
            if edge.node >= id {
                return Err(invalid(format!("input #{} is not upstream", edge.node)));
            }
            match (&self.nodes[edge.node].op, edge.branch) {
                (LogicalOp::Split(split), Some(branch)) if branch < split.predicates.len() => {}
                (LogicalOp::Split(..), _) => {
                    return Err(invalid(format!(
                        "reads Split #{} without a valid branch",
                        edge.node
                    )))
                }
                (_, None) => {}
                (_, Some(_)) => {
                    return Err(invalid(format!(
                        "addresses a branch of #{} which is not a Split",
                        edge.node
                    )))
                }
            }
        }
        let input_schemas = self.input_schemas(id)?;
        for (input, expr) in node.op.expressions() {
            let schema = input_schemas
                .get(input)
                .ok_or_else(|| invalid(format!("expression {expr} has no input {input}")))?;
            expr.get_type(schema)
                .map_err(|e| invalid(format!("expression {expr}: {e}")))?;
        }
        if let LogicalOp::Union(union) = &node.op {
            for (mapping, schema) in union.mappings.iter().zip(input_schemas.iter()) {
                if mapping.len() != union.output_fields.len() {
                    return Err(invalid("union mapping has the wrong width".to_string()));
                }
                if let Some(position) = mapping.iter().flatten().find(|p| **p >= schema.len()) {
                    return Err(invalid(format!("union maps to missing input field ${position}")));
                }
            }
        }
        let natural = node.op.natural_schema(&input_schemas)?;
        let exposed = match &node.output_projection {
            Some(projection) => {
                if !node.op.supports_output_projection() {
                    return Err(invalid(format!("{} cannot project its output", node.op.name())));
                }
                let distinct = projection.iter().collect::<BTreeSet<_>>();
                if distinct.len() != projection.len() {
                    return Err(invalid("output projection repeats a position".to_string()));
                }
                natural.project(projection)?
            }
            None => natural,
        };
        if exposed != *node.schema {
            return Err(invalid(format!(
                "exposed schema [{}] does not match its inputs [{exposed}]",
                node.schema
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display("Unable to create logical plan node.\nDue to: {}", source))]
    CreationError { source: SluiceError },
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for SluiceError {
    fn from(err: Error) -> Self {
        Self::External(err.into())
    }
}
