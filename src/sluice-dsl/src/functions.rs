use std::fmt::{Display, Formatter, Result};
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sluice_schema::dtype::DataType;

use crate::ExprRef;

/// An opaque user-defined function. Only its name and declared return type are
/// known; every argument is assumed to be read in full.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub name: Arc<str>,
    pub return_dtype: DataType,
}

impl FunctionExpr {
    pub fn new<S: Into<Arc<str>>>(name: S, return_dtype: DataType) -> Self {
        Self {
            name: name.into(),
            return_dtype,
        }
    }
}

impl Display for FunctionExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.name)
    }
}

pub(crate) fn function_display(
    f: &mut Formatter<'_>,
    func: &FunctionExpr,
    inputs: &[ExprRef],
) -> Result {
    write!(f, "{func}({})", inputs.iter().map(|e| e.to_string()).join(", "))
}
