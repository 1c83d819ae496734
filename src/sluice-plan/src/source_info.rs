use std::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    ops::Deref,
    sync::Arc,
};

use common_error::SluiceResult;
use serde::{Deserialize, Serialize};
use sluice_schema::schema::SchemaRef;

/// A field the plan still reads from a source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredField {
    /// Position in the source schema.
    pub index: usize,
    /// Name of the field as the source knows it.
    pub alias: Arc<str>,
    /// Keys of a map field that are read, when fewer than all.
    pub map_keys: Option<Vec<Arc<str>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionRequest {
    pub fields: Vec<RequiredField>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionResponse {
    Accepted,
    Declined,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushdownStatus {
    Accepted,
    Declined,
    /// The source raised an error; the plan-level projection still applies.
    Failed(String),
    /// The source cannot skip fields physically.
    Unsupported,
}

/// Storage-layer boundary of a Load.
pub trait LoadFunc: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn supports_projection(&self) -> bool {
        false
    }

    /// Offers the final set of fields the plan reads. Declining or failing only
    /// means the source keeps reading every field.
    fn push_projection(&self, request: &ProjectionRequest) -> SluiceResult<ProjectionResponse>;
}

#[derive(Clone, Debug)]
pub struct LoadFuncRef(pub Arc<dyn LoadFunc>);

impl Deref for LoadFuncRef {
    type Target = dyn LoadFunc;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for LoadFuncRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for LoadFuncRef {}

impl Hash for LoadFuncRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).cast::<()>().hash(state);
    }
}

impl Display for LoadFuncRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub location: Arc<str>,
    pub source_schema: SchemaRef,
    pub load_func: Option<LoadFuncRef>,
}

impl SourceInfo {
    pub fn new<S: Into<Arc<str>>>(
        location: S,
        source_schema: SchemaRef,
        load_func: Option<LoadFuncRef>,
    ) -> Self {
        Self {
            location: location.into(),
            source_schema,
            load_func,
        }
    }
}
