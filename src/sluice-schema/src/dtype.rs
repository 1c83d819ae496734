use std::fmt::{Display, Formatter, Result};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaRef;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Chararray,
    Bytearray,
    /// A map from string keys to values of the given type. The key set is open.
    Map(Box<DataType>),
    Tuple(SchemaRef),
    /// An unordered collection of tuples with the given inner schema.
    Bag(SchemaRef),
}

impl DataType {
    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(..))
    }

    pub fn is_bag(&self) -> bool {
        matches!(self, Self::Bag(..))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::Int64 | Self::Float32 | Self::Float64
        )
    }

    /// Types whose sub-fields can be read individually (map keys, bag columns).
    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Map(..) | Self::Bag(..))
    }

    pub fn map_value_type(&self) -> Option<&Self> {
        match self {
            Self::Map(value) => Some(value.as_ref()),
            _ => None,
        }
    }

    /// Inner schema of a bag or tuple.
    pub fn inner_schema(&self) -> Option<&SchemaRef> {
        match self {
            Self::Bag(schema) | Self::Tuple(schema) => Some(schema),
            _ => None,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean => write!(f, "boolean"),
            Self::Int32 => write!(f, "int"),
            Self::Int64 => write!(f, "long"),
            Self::Float32 => write!(f, "float"),
            Self::Float64 => write!(f, "double"),
            Self::Chararray => write!(f, "chararray"),
            Self::Bytearray => write!(f, "bytearray"),
            Self::Map(value) => write!(f, "map[{value}]"),
            Self::Tuple(schema) => write!(
                f,
                "({})",
                schema.fields.iter().map(|field| field.to_string()).join(", ")
            ),
            Self::Bag(schema) => write!(
                f,
                "{{({})}}",
                schema.fields.iter().map(|field| field.to_string()).join(", ")
            ),
        }
    }
}
