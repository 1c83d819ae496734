use itertools::Itertools;
use sluice_schema::{field::Field, schema::Schema};

/// Concatenates the rows of its inputs. Each input has its own mapping from
/// output position to input position; `None` pads that output with nulls.
#[derive(Clone, Debug, PartialEq)]
pub struct Union {
    pub output_fields: Vec<Field>,
    /// `mappings[input][output position]`
    pub mappings: Vec<Vec<Option<usize>>>,
}

impl Union {
    pub(crate) fn new(output_fields: Vec<Field>, mappings: Vec<Vec<Option<usize>>>) -> Self {
        Self {
            output_fields,
            mappings,
        }
    }

    pub fn output_schema(&self) -> Schema {
        Schema::new(self.output_fields.clone())
    }

    pub fn multiline_display(&self) -> Vec<String> {
        vec![format!(
            "Union: {}",
            self.mappings
                .iter()
                .map(|mapping| format!(
                    "[{}]",
                    mapping
                        .iter()
                        .map(|m| m.map_or_else(|| "null".to_string(), |p| format!("${p}")))
                        .join(", ")
                ))
                .join(", ")
        )]
    }
}
