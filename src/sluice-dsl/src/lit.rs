use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};
use sluice_schema::dtype::DataType;

use crate::expr::{Expr, ExprRef};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Chararray(String),
}

impl LiteralValue {
    pub fn get_type(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Boolean(_) => DataType::Boolean,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Chararray(_) => DataType::Chararray,
        }
    }
}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(val) => write!(f, "{val}"),
            Self::Int32(val) => write!(f, "{val}"),
            Self::Int64(val) => write!(f, "{val}L"),
            Self::Float64(val) => write!(f, "{val:?}"),
            Self::Chararray(val) => write!(f, "'{val}'"),
        }
    }
}

pub trait Literal {
    fn literal_value(self) -> LiteralValue;
}

impl Literal for bool {
    fn literal_value(self) -> LiteralValue {
        LiteralValue::Boolean(self)
    }
}

impl Literal for i32 {
    fn literal_value(self) -> LiteralValue {
        LiteralValue::Int32(self)
    }
}

impl Literal for i64 {
    fn literal_value(self) -> LiteralValue {
        LiteralValue::Int64(self)
    }
}

impl Literal for f64 {
    fn literal_value(self) -> LiteralValue {
        LiteralValue::Float64(self)
    }
}

impl Literal for &str {
    fn literal_value(self) -> LiteralValue {
        LiteralValue::Chararray(self.to_string())
    }
}

impl Literal for String {
    fn literal_value(self) -> LiteralValue {
        LiteralValue::Chararray(self)
    }
}

pub fn lit<L: Literal>(val: L) -> ExprRef {
    Expr::Literal(val.literal_value()).into()
}

pub fn null_lit() -> ExprRef {
    Expr::Literal(LiteralValue::Null).into()
}
