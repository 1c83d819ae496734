use std::{
    fmt::{Display, Formatter, Result},
    sync::Arc,
};

use common_error::{SluiceError, SluiceResult};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sluice_schema::{dtype::DataType, schema::Schema};

use crate::{
    functions::{function_display, FunctionExpr},
    lit::LiteralValue,
};

pub type ExprRef = Arc<Expr>;

/// Expression over the fields of a single input, addressed by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Alias(ExprRef, Arc<str>),
    BinaryOp {
        op: Operator,
        left: ExprRef,
        right: ExprRef,
    },
    Cast(ExprRef, DataType),
    /// `$i`: the field at position `i` of the input.
    Column(usize),
    /// `bag.($i, $j)`: selects inner columns of a bag or tuple.
    Dereference {
        input: ExprRef,
        columns: Vec<usize>,
    },
    Function {
        func: FunctionExpr,
        inputs: Vec<ExprRef>,
    },
    IfElse {
        if_true: ExprRef,
        if_false: ExprRef,
        predicate: ExprRef,
    },
    IsNull(ExprRef),
    Literal(LiteralValue),
    /// `map#'key'`
    MapLookup {
        input: ExprRef,
        key: Arc<str>,
    },
    Not(ExprRef),
    /// `*`: every field of the input, as one tuple.
    Star,
}

pub fn col(position: usize) -> ExprRef {
    Expr::Column(position).into()
}

pub fn star() -> ExprRef {
    Expr::Star.into()
}

pub fn binary_op(op: Operator, left: ExprRef, right: ExprRef) -> ExprRef {
    Expr::BinaryOp { op, left, right }.into()
}

fn next_child(children: &mut std::vec::IntoIter<ExprRef>, expr: &Expr) -> SluiceResult<ExprRef> {
    children.next().ok_or_else(|| {
        SluiceError::InternalError(format!("Too few children supplied to rebuild {expr}"))
    })
}

impl Expr {
    pub fn arced(self) -> ExprRef {
        Arc::new(self)
    }

    pub fn alias<S: Into<Arc<str>>>(self: &ExprRef, name: S) -> ExprRef {
        Self::Alias(self.clone(), name.into()).into()
    }

    pub fn cast(self: ExprRef, dtype: &DataType) -> ExprRef {
        Self::Cast(self, dtype.clone()).into()
    }

    pub fn if_else(self: ExprRef, if_true: ExprRef, if_false: ExprRef) -> ExprRef {
        Self::IfElse {
            if_true,
            if_false,
            predicate: self,
        }
        .into()
    }

    pub fn map_lookup<S: Into<Arc<str>>>(self: ExprRef, key: S) -> ExprRef {
        Self::MapLookup {
            input: self,
            key: key.into(),
        }
        .into()
    }

    pub fn dereference(self: ExprRef, columns: Vec<usize>) -> ExprRef {
        Self::Dereference {
            input: self,
            columns,
        }
        .into()
    }

    pub fn call<S: Into<Arc<str>>>(name: S, return_dtype: DataType, inputs: Vec<ExprRef>) -> ExprRef {
        Self::Function {
            func: FunctionExpr::new(name, return_dtype),
            inputs,
        }
        .into()
    }

    pub fn not(self: ExprRef) -> ExprRef {
        Self::Not(self).into()
    }

    pub fn is_null(self: ExprRef) -> ExprRef {
        Self::IsNull(self).into()
    }

    pub fn eq(self: ExprRef, other: ExprRef) -> ExprRef {
        binary_op(Operator::Eq, self, other)
    }

    pub fn not_eq(self: ExprRef, other: ExprRef) -> ExprRef {
        binary_op(Operator::NotEq, self, other)
    }

    pub fn lt(self: ExprRef, other: ExprRef) -> ExprRef {
        binary_op(Operator::Lt, self, other)
    }

    pub fn lt_eq(self: ExprRef, other: ExprRef) -> ExprRef {
        binary_op(Operator::LtEq, self, other)
    }

    pub fn gt(self: ExprRef, other: ExprRef) -> ExprRef {
        binary_op(Operator::Gt, self, other)
    }

    pub fn gt_eq(self: ExprRef, other: ExprRef) -> ExprRef {
        binary_op(Operator::GtEq, self, other)
    }

    pub fn and(self: ExprRef, other: ExprRef) -> ExprRef {
        binary_op(Operator::And, self, other)
    }

    pub fn or(self: ExprRef, other: ExprRef) -> ExprRef {
        binary_op(Operator::Or, self, other)
    }

    pub fn children(&self) -> Vec<ExprRef> {
        use Expr::*;
        match self {
            // No children.
            Column(..) | Literal(..) | Star => vec![],

            // One child.
            Not(expr) | IsNull(expr) | Cast(expr, ..) | Alias(expr, ..) => vec![expr.clone()],
            MapLookup { input, .. } | Dereference { input, .. } => vec![input.clone()],

            // Multiple children.
            Function { inputs, .. } => inputs.clone(),
            BinaryOp { left, right, .. } => vec![left.clone(), right.clone()],
            IfElse {
                if_true,
                if_false,
                predicate,
            } => vec![if_true.clone(), if_false.clone(), predicate.clone()],
        }
    }

    pub(crate) fn with_new_children(&self, children: Vec<ExprRef>) -> SluiceResult<Self> {
        use Expr::*;
        let mut children = children.into_iter();
        let children = &mut children;
        Ok(match self {
            Column(..) | Literal(..) | Star => self.clone(),
            Not(..) => Not(next_child(children, self)?),
            IsNull(..) => IsNull(next_child(children, self)?),
            Alias(.., name) => Alias(next_child(children, self)?, name.clone()),
            Cast(.., dtype) => Cast(next_child(children, self)?, dtype.clone()),
            MapLookup { key, .. } => MapLookup {
                input: next_child(children, self)?,
                key: key.clone(),
            },
            Dereference { columns, .. } => Dereference {
                input: next_child(children, self)?,
                columns: columns.clone(),
            },
            BinaryOp { op, .. } => BinaryOp {
                op: *op,
                left: next_child(children, self)?,
                right: next_child(children, self)?,
            },
            IfElse { .. } => IfElse {
                if_true: next_child(children, self)?,
                if_false: next_child(children, self)?,
                predicate: next_child(children, self)?,
            },
            Function { func, .. } => Function {
                func: func.clone(),
                inputs: children.collect(),
            },
        })
    }

    pub fn get_type(&self, schema: &Schema) -> SluiceResult<DataType> {
        use Expr::*;
        match self {
            Alias(expr, _) => expr.get_type(schema),
            Column(position) => Ok(schema.get(*position)?.dtype.clone()),
            Star => Ok(DataType::Tuple(Arc::new(schema.clone()))),
            Literal(value) => Ok(value.get_type()),
            Cast(_, dtype) => Ok(dtype.clone()),
            Function { func, .. } => Ok(func.return_dtype.clone()),
            IsNull(_) => Ok(DataType::Boolean),
            Not(expr) => match expr.get_type(schema)? {
                DataType::Boolean => Ok(DataType::Boolean),
                other => Err(SluiceError::TypeError(format!(
                    "Expected argument to be a Boolean expression, but received {other}"
                ))),
            },
            IfElse { if_true, .. } => if_true.get_type(schema),
            MapLookup { input, key } => match input.get_type(schema)? {
                DataType::Map(value) => Ok(*value),
                other => Err(SluiceError::TypeError(format!(
                    "Cannot look up key '{key}' in a value of type {other}"
                ))),
            },
            Dereference { input, columns } => match input.get_type(schema)? {
                DataType::Bag(inner) => Ok(DataType::Bag(Arc::new(inner.project(columns)?))),
                DataType::Tuple(inner) => Ok(DataType::Tuple(Arc::new(inner.project(columns)?))),
                other => Err(SluiceError::TypeError(format!(
                    "Cannot dereference columns of a value of type {other}"
                ))),
            },
            BinaryOp { op, left, right } => {
                let left = left.get_type(schema)?;
                let right = right.get_type(schema)?;
                if op.is_comparison() || op.is_logical() {
                    return Ok(DataType::Boolean);
                }
                numeric_supertype(&left, &right).ok_or_else(|| {
                    SluiceError::TypeError(format!(
                        "Cannot apply {op} to values of type {left} and {right}"
                    ))
                })
            }
        }
    }

    pub fn name(&self, schema: &Schema) -> SluiceResult<Arc<str>> {
        use Expr::*;
        match self {
            Alias(.., name) => Ok(name.clone()),
            Column(position) => Ok(schema.get(*position)?.name.clone()),
            Star => Ok("*".into()),
            Literal(..) => Ok("literal".into()),
            Function { func, .. } => Ok(func.name.clone()),
            Cast(expr, ..)
            | Not(expr)
            | IsNull(expr)
            | MapLookup { input: expr, .. }
            | Dereference { input: expr, .. } => expr.name(schema),
            BinaryOp { left, .. } => left.name(schema),
            IfElse { if_true, .. } => if_true.name(schema),
        }
    }

    /// The input position this expression forwards unchanged, if it is a plain
    /// (possibly renamed) column reference.
    pub fn input_mapping(&self) -> Option<usize> {
        match self {
            Self::Column(position) => Some(*position),
            Self::Alias(expr, _) => expr.input_mapping(),
            _ => None,
        }
    }
}

fn numeric_supertype(left: &DataType, right: &DataType) -> Option<DataType> {
    fn rank(dtype: &DataType) -> Option<u8> {
        match dtype {
            DataType::Int32 => Some(0),
            DataType::Int64 => Some(1),
            DataType::Float32 => Some(2),
            DataType::Float64 => Some(3),
            _ => None,
        }
    }
    match (left, right) {
        (DataType::Null, other) | (other, DataType::Null) if other.is_numeric() => {
            Some(other.clone())
        }
        _ => {
            let (l, r) = (rank(left)?, rank(right)?);
            Some(if l >= r { left.clone() } else { right.clone() })
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter) -> Result {
        use Expr::*;
        match self {
            Alias(expr, name) => write!(f, "{expr} AS {name}"),
            BinaryOp { op, left, right } => {
                let write_out_expr = |f: &mut Formatter, input: &Self| match input {
                    Alias(e, _) => write!(f, "{e}"),
                    BinaryOp { .. } => write!(f, "[{input}]"),
                    _ => write!(f, "{input}"),
                };

                write_out_expr(f, left)?;
                write!(f, " {op} ")?;
                write_out_expr(f, right)
            }
            Cast(expr, dtype) => write!(f, "({dtype}){expr}"),
            Column(position) => write!(f, "${position}"),
            Dereference { input, columns } => write!(
                f,
                "{input}.({})",
                columns.iter().map(|c| format!("${c}")).join(", ")
            ),
            Function { func, inputs } => function_display(f, func, inputs),
            IfElse {
                if_true,
                if_false,
                predicate,
            } => write!(f, "({predicate} ? {if_true} : {if_false})"),
            IsNull(expr) => write!(f, "{expr} is null"),
            Literal(val) => write!(f, "{val}"),
            MapLookup { input, key } => write!(f, "{input}#'{key}'"),
            Not(expr) => write!(f, "not({expr})"),
            Star => write!(f, "*"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulus,
    And,
    Or,
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        use Operator::*;
        let tkn = match self {
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            LtEq => "<=",
            Gt => ">",
            GtEq => ">=",
            Plus => "+",
            Minus => "-",
            Multiply => "*",
            Divide => "/",
            Modulus => "%",
            And => "and",
            Or => "or",
        };
        write!(f, "{tkn}")
    }
}

impl Operator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}
