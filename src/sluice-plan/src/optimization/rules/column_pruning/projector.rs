use std::sync::Arc;

use common_error::{SluiceError, SluiceResult};
use sluice_dsl::optimization::{remap_columns, ColumnRemapper};
use sluice_schema::schema::{Schema, SchemaRef};

use super::required_fields::RequiredFields;
use crate::logical_plan::{ForEach, LogicalOp, LogicalPlan, PlanNode, Union};

fn internal(err: SluiceError) -> SluiceError {
    if err.is_internal() {
        err
    } else {
        SluiceError::InternalError(err.to_string())
    }
}

/// Old exposed position of a node to its new one, `None` when pruned.
type Renumbering = Vec<Option<usize>>;

fn renumbering(old_len: usize, kept: &[usize]) -> Renumbering {
    let mut renumbering = vec![None; old_len];
    for (new, old) in kept.iter().enumerate() {
        if let Some(slot) = renumbering.get_mut(*old) {
            *slot = Some(new);
        }
    }
    renumbering
}

/// Rewrites references into one input whose exposed schema was pruned.
struct InputRemapper<'a> {
    old_schema: SchemaRef,
    new_schema: SchemaRef,
    renumbering: &'a [Option<usize>],
}

impl ColumnRemapper for InputRemapper<'_> {
    fn remap_column(&self, position: usize) -> SluiceResult<usize> {
        self.renumbering
            .get(position)
            .copied()
            .flatten()
            .ok_or_else(|| {
                SluiceError::InternalError(format!(
                    "Column ${position} was pruned but is still referenced"
                ))
            })
    }

    fn remap_inner_columns(&self, position: usize, columns: &[usize]) -> SluiceResult<Vec<usize>> {
        let old_field = self.old_schema.get(position).map_err(internal)?;
        let new_field = self
            .new_schema
            .get(self.remap_column(position)?)
            .map_err(internal)?;
        let (Some(old_inner), Some(new_inner)) =
            (old_field.dtype.inner_schema(), new_field.dtype.inner_schema())
        else {
            return Err(SluiceError::InternalError(format!(
                "Column ${position} is dereferenced but is not a bag or tuple"
            )));
        };
        columns
            .iter()
            .map(|c| {
                let uid = old_inner.get(*c).map_err(internal)?.uid;
                new_inner.position_of_uid(uid).ok_or_else(|| {
                    SluiceError::InternalError(format!(
                        "Inner column ${c} of ${position} was pruned but is still referenced"
                    ))
                })
            })
            .collect()
    }
}

/// New state of one node.
struct Projected {
    op: Option<LogicalOp>,
    schema: Schema,
    output_projection: Option<Vec<usize>>,
    /// Old exposed positions that survive, in order.
    kept: Vec<usize>,
}

/// Narrows every node to its required fields and renumbers every reference.
/// Returns whether the plan changed.
pub fn apply(plan: &mut LogicalPlan, required: &[RequiredFields]) -> SluiceResult<bool> {
    let old_schemas: Vec<SchemaRef> = plan.nodes().iter().map(|n| n.schema.clone()).collect();
    let mut renumberings: Vec<Renumbering> = Vec::with_capacity(plan.len());
    let mut transformed = false;

    for id in 0..plan.len() {
        let node = plan.node(id)?;
        let node_required = required.get(id).ok_or_else(|| {
            SluiceError::InternalError(format!("No requirement was computed for node #{id}"))
        })?;
        let keep = node_required.resolve(old_schemas[id].len())?;
        let remappers = node
            .inputs
            .iter()
            .map(|edge| {
                Ok(InputRemapper {
                    old_schema: old_schemas[edge.node].clone(),
                    new_schema: plan.node(edge.node)?.schema.clone(),
                    renumbering: renumberings[edge.node].as_slice(),
                })
            })
            .collect::<SluiceResult<Vec<_>>>()?;

        let projected = match &node.op {
            LogicalOp::ForEach(foreach) => project_foreach(foreach, &keep, &remappers)?,
            LogicalOp::Union(union) => project_union(union, &keep, &remappers)?,
            _ => project_generic(node, &keep, &remappers)?,
        };
        renumberings.push(renumbering(old_schemas[id].len(), &projected.kept));

        let node = plan.node_mut(id)?;
        if let Some(op) = projected.op {
            node.op = op;
            transformed = true;
        }
        if node.output_projection != projected.output_projection {
            node.output_projection = projected.output_projection;
            transformed = true;
        }
        if *node.schema != projected.schema {
            // Nodes may share one schema object; only this node's copy changes.
            *Arc::make_mut(&mut node.schema) = projected.schema;
            transformed = true;
        }
    }
    Ok(transformed)
}

fn project_foreach(
    foreach: &ForEach,
    keep: &[usize],
    remappers: &[InputRemapper],
) -> SluiceResult<Projected> {
    let remapper = remappers
        .first()
        .ok_or_else(|| SluiceError::InternalError("ForEach is missing its input".to_string()))?;
    let ranges = foreach.item_ranges(&remapper.old_schema)?;
    let mut changed = false;
    let mut items = Vec::with_capacity(foreach.items.len());
    let mut kept = vec![];
    for (item, range) in foreach.items.iter().zip(ranges) {
        if !item.flatten && !keep.iter().any(|p| range.contains(p)) {
            changed = true;
            continue;
        }
        let expr = remap_columns(item.expr.clone(), remapper)?;
        changed |= expr.transformed;
        let mut item = item.clone();
        item.expr = expr.data;
        items.push(item);
        kept.extend(range);
    }
    let new_foreach = ForEach { items };
    let schema = new_foreach.output_schema(&remapper.new_schema)?;
    if schema.len() != kept.len() {
        return Err(SluiceError::InternalError(format!(
            "ForEach produces {} fields after pruning but {} were kept",
            schema.len(),
            kept.len()
        )));
    }
    Ok(Projected {
        op: changed.then_some(LogicalOp::ForEach(new_foreach)),
        schema,
        output_projection: None,
        kept,
    })
}

fn project_union(union: &Union, keep: &[usize], remappers: &[InputRemapper]) -> SluiceResult<Projected> {
    let output_fields = keep
        .iter()
        .map(|p| {
            union.output_fields.get(*p).cloned().ok_or_else(|| {
                SluiceError::InternalError(format!("Union has no output ${p}"))
            })
        })
        .collect::<SluiceResult<Vec<_>>>()?;
    let mappings = union
        .mappings
        .iter()
        .zip(remappers.iter())
        .map(|(mapping, remapper)| {
            keep.iter()
                .map(|p| {
                    mapping
                        .get(*p)
                        .copied()
                        .flatten()
                        .map(|q| remapper.remap_column(q))
                        .transpose()
                })
                .collect::<SluiceResult<Vec<_>>>()
        })
        .collect::<SluiceResult<Vec<_>>>()?;
    let new_union = Union {
        output_fields,
        mappings,
    };
    let changed = new_union != *union;
    Ok(Projected {
        schema: new_union.output_schema(),
        op: changed.then_some(LogicalOp::Union(new_union)),
        output_projection: None,
        kept: keep.to_vec(),
    })
}

/// Old natural position to new natural position.
fn natural_renumbering(op: &LogicalOp, remappers: &[InputRemapper], old_len: usize) -> Renumbering {
    match op {
        LogicalOp::Filter(..)
        | LogicalOp::Distinct(..)
        | LogicalOp::OrderBy(..)
        | LogicalOp::Limit(..)
        | LogicalOp::Split(..) => remappers
            .first()
            .map(|r| r.renumbering.to_vec())
            .unwrap_or_default(),
        LogicalOp::Join(..) | LogicalOp::Cross(..) => {
            let mut renumbering = Vec::with_capacity(old_len);
            let mut new_offset = 0;
            for remapper in remappers {
                renumbering.extend(remapper.renumbering.iter().map(|p| p.map(|p| p + new_offset)));
                new_offset += remapper.new_schema.len();
            }
            renumbering
        }
        LogicalOp::Load(..)
        | LogicalOp::CoGroup(..)
        | LogicalOp::Stream(..)
        | LogicalOp::Store(..)
        | LogicalOp::ForEach(..)
        | LogicalOp::Union(..) => (0..old_len).map(Some).collect(),
    }
}

fn project_generic(node: &PlanNode, keep: &[usize], remappers: &[InputRemapper]) -> SluiceResult<Projected> {
    let mut op = node.op.clone();
    let changed = op.map_expressions(|input, expr| {
        let remapper = remappers.get(input).ok_or_else(|| {
            SluiceError::InternalError(format!("{} has no input {input}", node.display_name()))
        })?;
        remap_columns(expr, remapper)
    })?;
    let new_inputs: Vec<SchemaRef> = remappers.iter().map(|r| r.new_schema.clone()).collect();
    let natural = op.natural_schema(&new_inputs)?;
    if !op.supports_output_projection() {
        return Ok(Projected {
            op: changed.then_some(op),
            schema: natural,
            output_projection: None,
            kept: keep.to_vec(),
        });
    }

    let old_inputs: Vec<SchemaRef> = remappers.iter().map(|r| r.old_schema.clone()).collect();
    let old_natural_len = node.op.natural_schema(&old_inputs)?.len();
    let old_exposed = node.exposed_natural_positions();
    let renumbering = natural_renumbering(&op, remappers, old_natural_len);
    let projection = keep
        .iter()
        .map(|p| {
            let natural = old_exposed.get(*p).copied().ok_or_else(|| {
                SluiceError::InternalError(format!(
                    "{} does not expose ${p}",
                    node.display_name()
                ))
            })?;
            renumbering.get(natural).copied().flatten().ok_or_else(|| {
                SluiceError::InternalError(format!(
                    "{} keeps ${p} but its input pruned it",
                    node.display_name()
                ))
            })
        })
        .collect::<SluiceResult<Vec<_>>>()?;
    let schema = natural.project(&projection)?;
    let is_identity =
        projection.len() == natural.len() && projection.iter().enumerate().all(|(i, p)| i == *p);
    Ok(Projected {
        op: changed.then_some(op),
        schema,
        output_projection: (!is_identity).then_some(projection),
        kept: keep.to_vec(),
    })
}
