use std::{collections::BTreeSet, sync::Arc};

use common_error::SluiceResult;
use common_treenode::{Transformed, TreeNode, TreeNodeRecursion};

use crate::{Expr, ExprRef};

/// How an expression reads one of its input fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldAccess {
    /// The value is used as a whole.
    Whole,
    /// Only one key of a map is looked up.
    MapKey(Arc<str>),
    /// Only some inner columns of a bag or tuple are selected.
    Columns(Vec<usize>),
}

/// Every input field an expression reads, in visit order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequiredColumns {
    pub accesses: Vec<(usize, FieldAccess)>,
    /// A `*` appears somewhere, so every input field is read.
    pub star: bool,
}

impl RequiredColumns {
    pub fn positions(&self) -> BTreeSet<usize> {
        self.accesses.iter().map(|(p, _)| *p).collect()
    }

    /// Collapses every access to a whole read. Used where a value is compared,
    /// hashed or handed to opaque code.
    pub fn into_whole(self) -> Self {
        Self {
            accesses: self
                .accesses
                .into_iter()
                .map(|(p, _)| (p, FieldAccess::Whole))
                .collect(),
            star: self.star,
        }
    }
}

pub fn get_required_columns(e: &ExprRef) -> RequiredColumns {
    let mut required = RequiredColumns::default();
    let visit = e.apply(&mut |expr| {
        Ok(match expr.as_ref() {
            Expr::Column(position) => {
                required.accesses.push((*position, FieldAccess::Whole));
                TreeNodeRecursion::Continue
            }
            Expr::Star => {
                required.star = true;
                TreeNodeRecursion::Continue
            }
            Expr::MapLookup { input, key } => match input.as_ref() {
                Expr::Column(position) => {
                    required
                        .accesses
                        .push((*position, FieldAccess::MapKey(key.clone())));
                    TreeNodeRecursion::Jump
                }
                _ => TreeNodeRecursion::Continue,
            },
            Expr::Dereference { input, columns } => match input.as_ref() {
                Expr::Column(position) => {
                    required
                        .accesses
                        .push((*position, FieldAccess::Columns(columns.clone())));
                    TreeNodeRecursion::Jump
                }
                _ => TreeNodeRecursion::Continue,
            },
            _ => TreeNodeRecursion::Continue,
        })
    });
    debug_assert!(visit.is_ok(), "visiting an expression cannot fail");
    required
}

pub fn has_star(e: &ExprRef) -> bool {
    e.exists(|expr| Ok(matches!(expr.as_ref(), Expr::Star)))
        .unwrap_or(true)
}

/// Translates input positions when the input's schema is renumbered.
pub trait ColumnRemapper {
    fn remap_column(&self, position: usize) -> SluiceResult<usize>;

    /// New inner positions for `columns` of the bag or tuple at old `position`.
    fn remap_inner_columns(&self, position: usize, columns: &[usize]) -> SluiceResult<Vec<usize>>;
}

/// Rewrites every column reference in `expr`, including the inner positions
/// of dereferences applied directly to a column.
pub fn remap_columns(
    expr: ExprRef,
    remapper: &dyn ColumnRemapper,
) -> SluiceResult<Transformed<ExprRef>> {
    expr.transform_down(&mut |e| match e.as_ref() {
        Expr::Column(position) => {
            let new_position = remapper.remap_column(*position)?;
            Ok(if new_position == *position {
                Transformed::no(e)
            } else {
                Transformed::yes(Expr::Column(new_position).arced())
            })
        }
        Expr::Dereference { input, columns } => match input.as_ref() {
            Expr::Column(position) => {
                let new_position = remapper.remap_column(*position)?;
                let new_columns = remapper.remap_inner_columns(*position, columns)?;
                let transformed = new_position != *position || &new_columns != columns;
                let data = if transformed {
                    Expr::Dereference {
                        input: Expr::Column(new_position).arced(),
                        columns: new_columns,
                    }
                    .arced()
                } else {
                    e
                };
                Ok(Transformed::new(data, transformed, TreeNodeRecursion::Jump))
            }
            _ => Ok(Transformed::no(e)),
        },
        _ => Ok(Transformed::no(e)),
    })
}
