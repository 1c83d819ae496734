use std::ops::Range;

use common_error::SluiceResult;
use itertools::Itertools;
use sluice_dsl::{Expr, ExprRef};
use sluice_schema::{
    field::{Field, FieldUid},
    schema::Schema,
};
use snafu::ResultExt;

use crate::logical_plan::{self, CreationSnafu};

/// One expression of a `generate` list.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateItem {
    pub expr: ExprRef,
    /// Unnest a bag or tuple result into its inner fields.
    pub flatten: bool,
    /// Identity of the produced field when the item computes a new value.
    pub uid: FieldUid,
}

impl GenerateItem {
    pub fn new(expr: ExprRef, flatten: bool, uid: FieldUid) -> Self {
        Self { expr, flatten, uid }
    }

    /// Whether the item is a bare `*`, forwarding every input field.
    pub fn is_project_all(&self) -> bool {
        matches!(self.expr.as_ref(), Expr::Star)
    }

    /// Fields this item contributes to the output, given the input schema.
    /// Forwarded columns and unnested inner fields keep their identity.
    pub fn output_fields(&self, input: &Schema) -> SluiceResult<Vec<Field>> {
        if self.is_project_all() {
            return Ok(input.fields.clone());
        }
        if let Some(position) = self.expr.input_mapping() {
            let field = input.get(position)?;
            if self.flatten {
                if let Some(inner) = field.dtype.inner_schema() {
                    return Ok(inner.fields.clone());
                }
            }
            return Ok(vec![field.rename(self.expr.name(input)?)]);
        }
        let dtype = self.expr.get_type(input)?;
        if self.flatten {
            if let Some(inner) = dtype.inner_schema() {
                return Ok(inner.fields.clone());
            }
        }
        Ok(vec![Field::new(self.expr.name(input)?, dtype, self.uid)])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForEach {
    pub items: Vec<GenerateItem>,
}

impl ForEach {
    pub(crate) fn try_new(items: Vec<GenerateItem>, input_schema: &Schema) -> logical_plan::Result<Self> {
        let foreach = Self { items };
        foreach.output_schema(input_schema).context(CreationSnafu)?;
        Ok(foreach)
    }

    pub fn output_schema(&self, input: &Schema) -> SluiceResult<Schema> {
        let mut fields = vec![];
        for item in &self.items {
            fields.extend(item.output_fields(input)?);
        }
        Ok(Schema::new(fields))
    }

    /// Output positions covered by each item.
    pub fn item_ranges(&self, input: &Schema) -> SluiceResult<Vec<Range<usize>>> {
        let mut start = 0;
        self.items
            .iter()
            .map(|item| {
                let width = item.output_fields(input)?.len();
                let range = start..start + width;
                start += width;
                Ok(range)
            })
            .collect()
    }

    pub fn multiline_display(&self) -> Vec<String> {
        vec![format!(
            "ForEach: {}",
            self.items
                .iter()
                .map(|item| if item.flatten {
                    format!("flatten({})", item.expr)
                } else {
                    item.expr.to_string()
                })
                .join(", ")
        )]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common_error::SluiceResult;
    use sluice_dsl::{col, star};
    use sluice_schema::prelude::*;

    use super::*;

    fn input() -> Schema {
        let inner = Schema::new(vec![
            Field::new("x", DataType::Int32, FieldUid(10)),
            Field::new("y", DataType::Int32, FieldUid(11)),
        ]);
        Schema::new(vec![
            Field::new("k", DataType::Int32, FieldUid(0)),
            Field::new("bag", DataType::Bag(Arc::new(inner)), FieldUid(1)),
        ])
    }

    #[test]
    fn flatten_expands_inner_fields() -> SluiceResult<()> {
        let foreach = ForEach {
            items: vec![
                GenerateItem::new(col(0).alias("key"), false, FieldUid(20)),
                GenerateItem::new(col(1), true, FieldUid(21)),
            ],
        };
        let schema = foreach.output_schema(&input())?;
        assert_eq!(schema.uids(), vec![FieldUid(0), FieldUid(10), FieldUid(11)]);
        assert_eq!(schema.names()[0].as_ref(), "key");
        assert_eq!(foreach.item_ranges(&input())?, vec![0..1, 1..3]);
        Ok(())
    }

    #[test]
    fn derived_items_get_their_own_uid() -> SluiceResult<()> {
        let foreach = ForEach {
            items: vec![GenerateItem::new(col(0).gt(sluice_dsl::lit(1)), false, FieldUid(30))],
        };
        let schema = foreach.output_schema(&input())?;
        assert_eq!(schema.uids(), vec![FieldUid(30)]);
        assert_eq!(schema.fields[0].dtype, DataType::Boolean);
        Ok(())
    }

    #[test]
    fn project_all_forwards_everything() -> SluiceResult<()> {
        let foreach = ForEach {
            items: vec![GenerateItem::new(star(), false, FieldUid(40))],
        };
        assert_eq!(
            foreach.output_schema(&input())?.uids(),
            vec![FieldUid(0), FieldUid(1)]
        );
        Ok(())
    }
}
