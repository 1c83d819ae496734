use common_error::SluiceError;
use itertools::Itertools;
use sluice_dsl::ExprRef;
use sluice_schema::schema::Schema;
use snafu::ResultExt;

use crate::logical_plan::{self, CreationSnafu};

/// Routes every input row to each branch whose predicate it satisfies.
/// Consumers address a branch through their input edge.
#[derive(Clone, Debug, PartialEq)]
pub struct Split {
    pub predicates: Vec<ExprRef>,
}

impl Split {
    pub(crate) fn try_new(predicates: Vec<ExprRef>, input_schema: &Schema) -> logical_plan::Result<Self> {
        if predicates.is_empty() {
            return Err(SluiceError::ValueError(
                "Split needs at least one branch".to_string(),
            ))
            .context(CreationSnafu);
        }
        for predicate in &predicates {
            predicate.get_type(input_schema).context(CreationSnafu)?;
        }
        Ok(Self { predicates })
    }

    pub fn multiline_display(&self) -> Vec<String> {
        vec![format!(
            "Split: {}",
            self.predicates
                .iter()
                .enumerate()
                .map(|(i, p)| format!("[{i}] if {p}"))
                .join(", ")
        )]
    }
}
