mod expr;
pub mod functions;
mod lit;
pub mod optimization;
mod treenode;

pub use expr::{binary_op, col, star, Expr, ExprRef, Operator};
pub use lit::{lit, null_lit, LiteralValue};
