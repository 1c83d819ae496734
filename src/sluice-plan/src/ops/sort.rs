use common_error::SluiceError;
use itertools::Itertools;
use sluice_dsl::ExprRef;
use sluice_schema::schema::Schema;
use snafu::ResultExt;

use crate::logical_plan::{self, CreationSnafu};

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub sort_by: Vec<ExprRef>,
    pub descending: Vec<bool>,
}

impl OrderBy {
    pub(crate) fn try_new(
        sort_by: Vec<ExprRef>,
        descending: Vec<bool>,
        input_schema: &Schema,
    ) -> logical_plan::Result<Self> {
        if sort_by.is_empty() || sort_by.len() != descending.len() {
            return Err(SluiceError::ValueError(format!(
                "OrderBy needs one direction per sort key, got {} keys and {} directions",
                sort_by.len(),
                descending.len()
            )))
            .context(CreationSnafu);
        }
        for expr in &sort_by {
            expr.get_type(input_schema).context(CreationSnafu)?;
        }
        Ok(Self {
            sort_by,
            descending,
        })
    }

    pub fn multiline_display(&self) -> Vec<String> {
        // Must have at least one expression to sort by.
        let pairs = self
            .sort_by
            .iter()
            .zip(self.descending.iter())
            .map(|(sb, d)| format!("({}, {})", sb, if *d { "descending" } else { "ascending" }))
            .join(", ");
        vec![format!("OrderBy: Sort by = {pairs}")]
    }
}
