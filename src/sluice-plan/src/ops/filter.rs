use common_error::SluiceError;
use sluice_dsl::ExprRef;
use sluice_schema::{dtype::DataType, schema::Schema};
use snafu::ResultExt;

use crate::logical_plan::{self, CreationSnafu};

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub predicate: ExprRef,
}

impl Filter {
    pub(crate) fn try_new(predicate: ExprRef, input_schema: &Schema) -> logical_plan::Result<Self> {
        let dtype = predicate.get_type(input_schema).context(CreationSnafu)?;
        if !matches!(dtype, DataType::Boolean | DataType::Null) {
            return Err(SluiceError::TypeError(format!(
                "Expected expression {predicate} to resolve to type Boolean, but received: {dtype}"
            )))
            .context(CreationSnafu);
        }
        Ok(Self { predicate })
    }

    pub fn multiline_display(&self) -> Vec<String> {
        vec![format!("Filter: {}", self.predicate)]
    }
}
