use std::sync::Arc;

use common_error::SluiceResult;
use common_treenode::DynTreeNode;

use crate::Expr;

impl DynTreeNode for Expr {
    fn arc_children(&self) -> Vec<Arc<Self>> {
        self.children()
    }

    fn with_new_arc_children(self: Arc<Self>, children: Vec<Arc<Self>>) -> SluiceResult<Arc<Self>> {
        Ok(self.with_new_children(children)?.into())
    }
}
