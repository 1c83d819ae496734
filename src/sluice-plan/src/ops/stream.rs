use std::sync::Arc;

use sluice_schema::schema::SchemaRef;

/// Pipes every row through an external process with a declared output schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stream {
    pub command: Arc<str>,
    pub output_schema: SchemaRef,
}

impl Stream {
    pub(crate) fn new(command: Arc<str>, output_schema: SchemaRef) -> Self {
        Self {
            command,
            output_schema,
        }
    }

    pub fn multiline_display(&self) -> Vec<String> {
        vec![format!("Stream: `{}`", self.command)]
    }
}
