use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Store {
    pub location: Arc<str>,
}

impl Store {
    pub(crate) fn new(location: Arc<str>) -> Self {
        Self { location }
    }

    pub fn multiline_display(&self) -> Vec<String> {
        vec![format!("Store: {}", self.location)]
    }
}
