use std::{
    fmt::{Display, Formatter, Result},
    sync::Arc,
};

use common_error::{SluiceError, SluiceResult};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::field::{Field, FieldUid};

pub type SchemaRef = Arc<Schema>;

/// Ordered list of fields. Fields are addressed by position; names may repeat
/// (for example after joining a relation with itself).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self { fields: vec![] }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, position: usize) -> SluiceResult<&Field> {
        self.fields.get(position).ok_or_else(|| {
            SluiceError::FieldNotFound(format!(
                "Position ${position} is out of range for schema [{self}]"
            ))
        })
    }

    pub fn position_of_uid(&self, uid: FieldUid) -> Option<usize> {
        self.fields.iter().position(|f| f.uid == uid)
    }

    pub fn names(&self) -> Vec<Arc<str>> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn uids(&self) -> Vec<FieldUid> {
        self.fields.iter().map(|f| f.uid).collect()
    }

    /// New schema made of the fields at `positions`, in that order.
    pub fn project(&self, positions: &[usize]) -> SluiceResult<Self> {
        let fields = positions
            .iter()
            .map(|p| self.get(*p).cloned())
            .collect::<SluiceResult<Vec<_>>>()?;
        Ok(Self { fields })
    }

    /// Concatenation of several schemas, used for join and cross outputs.
    pub fn concat<'a, I: IntoIterator<Item = &'a Self>>(schemas: I) -> Self {
        Self {
            fields: schemas
                .into_iter()
                .flat_map(|s| s.fields.iter().cloned())
                .collect(),
        }
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.fields.iter().map(|field| field.to_string()).join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DataType;

    fn abc() -> Schema {
        Schema::new(vec![
            Field::new("a", DataType::Int32, FieldUid(0)),
            Field::new("b", DataType::Map(Box::new(DataType::Chararray)), FieldUid(1)),
            Field::new("c", DataType::Int64, FieldUid(2)),
        ])
    }

    #[test]
    fn out_of_range_position_is_an_error() {
        let schema = abc();
        assert!(matches!(
            schema.get(3),
            Err(SluiceError::FieldNotFound(_))
        ));
    }

    #[test]
    fn project_reorders() -> SluiceResult<()> {
        let projected = abc().project(&[2, 0])?;
        assert_eq!(projected.uids(), vec![FieldUid(2), FieldUid(0)]);
        Ok(())
    }

    #[test]
    fn concat_keeps_uids() {
        let schema = abc();
        let joined = Schema::concat([&schema, &schema]);
        assert_eq!(joined.len(), 6);
        assert_eq!(joined.position_of_uid(FieldUid(1)), Some(1));
    }

    #[test]
    fn display_shows_names_and_types() {
        assert_eq!(
            abc().to_string(),
            "a: int, b: map[chararray], c: long"
        );
    }

    #[test]
    fn serde_is_transparent() -> SluiceResult<()> {
        let json = serde_json::to_string(&abc())?;
        assert!(json.starts_with('['));
        let back: Schema = serde_json::from_str(&json)?;
        assert_eq!(back, abc());
        Ok(())
    }
}
