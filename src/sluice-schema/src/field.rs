use std::{
    fmt::{Display, Formatter, Result},
    sync::Arc,
};

use derive_more::Display as DeriveDisplay;
use serde::{Deserialize, Serialize};

use crate::dtype::DataType;

/// Identity of a logical column. Stays the same while a column is forwarded
/// unchanged (including renames) from one operator to the next.
#[derive(
    Clone, Copy, Debug, DeriveDisplay, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("#{_0}")]
pub struct FieldUid(pub u64);

/// Hands out fresh, never reused [`FieldUid`]s for one plan.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UidGenerator {
    next: u64,
}

impl UidGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_uid(&mut self) -> FieldUid {
        let uid = FieldUid(self.next);
        self.next += 1;
        uid
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: Arc<str>,
    pub dtype: DataType,
    pub uid: FieldUid,
}

impl Field {
    pub fn new<S: Into<Arc<str>>>(name: S, dtype: DataType, uid: FieldUid) -> Self {
        Self {
            name: name.into(),
            dtype,
            uid,
        }
    }

    /// Same column under a different name.
    pub fn rename<S: Into<Arc<str>>>(&self, name: S) -> Self {
        Self {
            name: name.into(),
            dtype: self.dtype.clone(),
            uid: self.uid,
        }
    }

    pub fn with_dtype(&self, dtype: DataType) -> Self {
        Self {
            name: self.name.clone(),
            dtype,
            uid: self.uid,
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}: {}", self.name, self.dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_fresh() {
        let mut gen = UidGenerator::new();
        let a = gen.next_uid();
        let b = gen.next_uid();
        assert_ne!(a, b);
        assert_eq!(b.to_string(), "#1");
    }

    #[test]
    fn rename_keeps_identity() {
        let field = Field::new("a0", DataType::Int32, FieldUid(4));
        let renamed = field.rename("x");
        assert_eq!(renamed.uid, field.uid);
        assert_eq!(renamed.dtype, field.dtype);
        assert_eq!(renamed.name.as_ref(), "x");
    }
}
