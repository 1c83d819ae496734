use std::fmt::{self, Display, Formatter, Write};

use itertools::Itertools;

use crate::logical_plan::{InputEdge, LogicalPlan, PlanNode};

fn fmt_edge(edge: &InputEdge) -> String {
    match edge.branch {
        Some(branch) => format!("#{}[{branch}]", edge.node),
        None => format!("#{}", edge.node),
    }
}

fn fmt_node<W: Write>(node: &PlanNode, s: &mut W) -> fmt::Result {
    write!(s, "#{}", node.id)?;
    if let Some(alias) = &node.alias {
        write!(s, " {alias}")?;
    }
    write!(s, " = {}", node.op.multiline_display().join(", "))?;
    if !node.inputs.is_empty() {
        write!(s, " <- {}", node.inputs.iter().map(fmt_edge).join(", "))?;
    }
    if let Some(projection) = &node.output_projection {
        write!(
            s,
            " project({})",
            projection.iter().map(|p| format!("${p}")).join(", ")
        )?;
    }
    write!(s, " [{}]", node.schema)
}

impl Display for LogicalPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            fmt_node(node, f)?;
        }
        Ok(())
    }
}

impl LogicalPlan {
    /// One operator per line, in construction order.
    pub fn repr_indent(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use common_error::SluiceResult;
    use sluice_dsl::{col, lit};
    use sluice_schema::dtype::DataType;

    use crate::builder::PlanBuilder;

    #[test]
    fn repr_indent_lists_nodes_in_order() -> SluiceResult<()> {
        let mut builder = PlanBuilder::new();
        let schema = builder.schema([("a0", DataType::Int32), ("a1", DataType::Int64)]);
        let a = builder.load("A", "a.txt", schema, None)?;
        let b = builder.filter("B", a, col(0).gt(lit(1)))?;
        builder.store(b, "out")?;
        let plan = builder.build()?;
        assert_eq!(
            plan.repr_indent(),
            "#0 A = Load: a.txt [a0: int, a1: long]\n\
             #1 B = Filter: $0 > 1 <- #0 [a0: int, a1: long]\n\
             #2 = Store: out <- #1 []"
        );
        Ok(())
    }
}
