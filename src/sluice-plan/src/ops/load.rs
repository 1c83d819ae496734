use std::sync::Arc;

use itertools::Itertools;
use sluice_schema::schema::SchemaRef;

use crate::source_info::{PushdownStatus, SourceInfo};

/// Map keys a source must still provide, per source position, keys in the
/// order they were first required.
pub type RequiredMapKeys = Vec<(usize, Vec<Arc<str>>)>;

#[derive(Clone, Debug)]
pub struct Load {
    pub source_info: Arc<SourceInfo>,
    /// Narrowed map-key requirement recorded by the last pruning run.
    pub required_map_keys: Option<RequiredMapKeys>,
    /// Outcome of the last projection pushdown attempt.
    pub pushdown_status: Option<PushdownStatus>,
}

impl Load {
    pub(crate) fn new(source_info: Arc<SourceInfo>) -> Self {
        Self {
            source_info,
            required_map_keys: None,
            pushdown_status: None,
        }
    }

    pub fn source_schema(&self) -> &SchemaRef {
        &self.source_info.source_schema
    }

    pub fn multiline_display(&self) -> Vec<String> {
        let mut res = vec![format!("Load: {}", self.source_info.location)];
        if let Some(load_func) = &self.source_info.load_func {
            res.push(format!("Using = {}", load_func.name()));
        }
        if let Some(keys) = &self.required_map_keys {
            res.push(format!(
                "Map keys = {}",
                keys.iter()
                    .map(|(pos, keys)| format!("${pos}->[{}]", keys.iter().join(", ")))
                    .join(", ")
            ));
        }
        res
    }
}
