
use std::sync::{Arc, Mutex};

use common_error::{SluiceError, SluiceResult};
pub use executor::{ints, sorted, Executor, Row, Value};

use crate::source_info::{LoadFunc, LoadFuncRef, ProjectionRequest, ProjectionResponse};

/// How a dummy source answers projection requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceBehavior {
    /// Cannot skip fields at all.
    #[default]
    NoProjection,
    Accept,
    Decline,
    Fail,
}

/// Dummy source that records every projection it is offered.
#[derive(Debug, Default)]
pub struct DummySource {
    behavior: SourceBehavior,
    requests: Mutex<Vec<ProjectionRequest>>,
}

impl DummySource {
    pub fn new(behavior: SourceBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            requests: Mutex::new(vec![]),
        })
    }

    pub fn requests(&self) -> Vec<ProjectionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl LoadFunc for DummySource {
    fn name(&self) -> &str {
        "DummySource"
    }

    fn supports_projection(&self) -> bool {
        self.behavior != SourceBehavior::NoProjection
    }

    fn push_projection(&self, request: &ProjectionRequest) -> SluiceResult<ProjectionResponse> {
        self.requests
            .lock()
            .map_err(|e| SluiceError::InternalError(e.to_string()))?
            .push(request.clone());
        match self.behavior {
            SourceBehavior::Fail => Err(SluiceError::ValueError(
                "dummy source cannot project".to_string(),
            )),
            SourceBehavior::Decline => Ok(ProjectionResponse::Declined),
            SourceBehavior::Accept | SourceBehavior::NoProjection => {
                Ok(ProjectionResponse::Accepted)
            }
        }
    }
}

/// Wraps a dummy source so it can be attached to a Load.
pub fn load_func(source: &Arc<DummySource>) -> LoadFuncRef {
    LoadFuncRef(source.clone())
}
