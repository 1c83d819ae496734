//! Generic visiting and rewriting of tree-shaped values.
//!
//! Implementors provide [`TreeNode::apply_children`] and [`TreeNode::map_children`];
//! traversal order, early exit and change tracking come from the provided methods.

use std::sync::Arc;

use common_error::SluiceResult;

/// Controls how a traversal proceeds after visiting a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeNodeRecursion {
    /// Continue into the node's children (pre-order) or siblings (post-order).
    Continue,
    /// Skip the node's children but keep visiting its siblings.
    Jump,
    /// Stop the whole traversal.
    Stop,
}

impl TreeNodeRecursion {
    fn visit_children<F>(self, f: F) -> SluiceResult<Self>
    where
        F: FnOnce() -> SluiceResult<Self>,
    {
        match self {
            Self::Continue => f(),
            Self::Jump => Ok(Self::Continue),
            Self::Stop => Ok(self),
        }
    }

    fn visit_sibling<F>(self, f: F) -> SluiceResult<Self>
    where
        F: FnOnce() -> SluiceResult<Self>,
    {
        match self {
            Self::Continue | Self::Jump => f(),
            Self::Stop => Ok(self),
        }
    }
}

/// The result of a rewrite: the (possibly new) value, whether it changed,
/// and how the traversal should continue.
#[derive(Debug, PartialEq, Eq)]
pub struct Transformed<T> {
    pub data: T,
    pub transformed: bool,
    pub tnr: TreeNodeRecursion,
}

impl<T> Transformed<T> {
    pub fn new(data: T, transformed: bool, tnr: TreeNodeRecursion) -> Self {
        Self {
            data,
            transformed,
            tnr,
        }
    }

    pub fn yes(data: T) -> Self {
        Self::new(data, true, TreeNodeRecursion::Continue)
    }

    pub fn no(data: T) -> Self {
        Self::new(data, false, TreeNodeRecursion::Continue)
    }

    /// Marks the rewrite as changed if `other` already was.
    pub fn or(mut self, transformed: bool) -> Self {
        self.transformed |= transformed;
        self
    }

    pub fn map_data<U, F>(self, f: F) -> SluiceResult<Transformed<U>>
    where
        F: FnOnce(T) -> SluiceResult<U>,
    {
        f(self.data).map(|data| Transformed::new(data, self.transformed, self.tnr))
    }
}

pub trait TransformedResult<T> {
    fn data(self) -> SluiceResult<T>;
}

impl<T> TransformedResult<T> for SluiceResult<Transformed<T>> {
    fn data(self) -> SluiceResult<T> {
        self.map(|t| t.data)
    }
}

pub trait TreeNode: Sized {
    /// Applies `f` to each direct child, honoring the returned recursion.
    fn apply_children<F>(&self, f: F) -> SluiceResult<TreeNodeRecursion>
    where
        F: FnMut(&Self) -> SluiceResult<TreeNodeRecursion>;

    /// Rebuilds this node with every direct child passed through `f`.
    fn map_children<F>(self, f: F) -> SluiceResult<Transformed<Self>>
    where
        F: FnMut(Self) -> SluiceResult<Transformed<Self>>;

    /// Pre-order visit of the node and its descendants.
    fn apply<F>(&self, f: &mut F) -> SluiceResult<TreeNodeRecursion>
    where
        F: FnMut(&Self) -> SluiceResult<TreeNodeRecursion>,
    {
        f(self)?.visit_children(|| self.apply_children(|c| c.apply(f)))
    }

    /// Returns true if any node in the tree satisfies `f`.
    fn exists<F>(&self, mut f: F) -> SluiceResult<bool>
    where
        F: FnMut(&Self) -> SluiceResult<bool>,
    {
        let mut found = false;
        self.apply(&mut |n| {
            Ok(if f(n)? {
                found = true;
                TreeNodeRecursion::Stop
            } else {
                TreeNodeRecursion::Continue
            })
        })?;
        Ok(found)
    }

    /// Pre-order rewrite. Returning `Jump` from `f` keeps `f`'s result without
    /// descending into it.
    fn transform_down<F>(self, f: &mut F) -> SluiceResult<Transformed<Self>>
    where
        F: FnMut(Self) -> SluiceResult<Transformed<Self>>,
    {
        let node = f(self)?;
        match node.tnr {
            TreeNodeRecursion::Continue => {
                let transformed = node.transformed;
                let children = node.data.map_children(|c| c.transform_down(f))?;
                Ok(children.or(transformed))
            }
            TreeNodeRecursion::Jump => Ok(Transformed::new(
                node.data,
                node.transformed,
                TreeNodeRecursion::Continue,
            )),
            TreeNodeRecursion::Stop => Ok(node),
        }
    }

    /// Post-order rewrite.
    fn transform_up<F>(self, f: &mut F) -> SluiceResult<Transformed<Self>>
    where
        F: FnMut(Self) -> SluiceResult<Transformed<Self>>,
    {
        let children = self.map_children(|c| c.transform_up(f))?;
        if children.tnr == TreeNodeRecursion::Stop {
            return Ok(children);
        }
        let transformed = children.transformed;
        Ok(f(children.data)?.or(transformed))
    }
}

/// Tree nodes that live behind an `Arc` and rebuild themselves from new children.
pub trait DynTreeNode {
    fn arc_children(&self) -> Vec<Arc<Self>>;

    fn with_new_arc_children(self: Arc<Self>, new_children: Vec<Arc<Self>>) -> SluiceResult<Arc<Self>>;
}

impl<T: DynTreeNode + ?Sized> TreeNode for Arc<T> {
    fn apply_children<F>(&self, mut f: F) -> SluiceResult<TreeNodeRecursion>
    where
        F: FnMut(&Self) -> SluiceResult<TreeNodeRecursion>,
    {
        let mut tnr = TreeNodeRecursion::Continue;
        for child in self.arc_children() {
            tnr = tnr.visit_sibling(|| f(&child))?;
            if tnr == TreeNodeRecursion::Stop {
                break;
            }
        }
        Ok(tnr)
    }

    fn map_children<F>(self, mut f: F) -> SluiceResult<Transformed<Self>>
    where
        F: FnMut(Self) -> SluiceResult<Transformed<Self>>,
    {
        let children = self.arc_children();
        if children.is_empty() {
            return Ok(Transformed::no(self));
        }
        let mut transformed = false;
        let mut tnr = TreeNodeRecursion::Continue;
        let mut new_children = Vec::with_capacity(children.len());
        for child in children {
            if tnr == TreeNodeRecursion::Stop {
                new_children.push(child);
                continue;
            }
            let result = f(child)?;
            transformed |= result.transformed;
            tnr = result.tnr;
            new_children.push(result.data);
        }
        let data = if transformed {
            self.with_new_arc_children(new_children)?
        } else {
            self
        };
        Ok(Transformed::new(data, transformed, tnr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Node {
        Leaf(i64),
        Sum(Vec<Arc<Node>>),
    }

    impl DynTreeNode for Node {
        fn arc_children(&self) -> Vec<Arc<Self>> {
            match self {
                Self::Leaf(_) => vec![],
                Self::Sum(children) => children.clone(),
            }
        }

        fn with_new_arc_children(
            self: Arc<Self>,
            new_children: Vec<Arc<Self>>,
        ) -> SluiceResult<Arc<Self>> {
            Ok(match self.as_ref() {
                Self::Leaf(_) => self,
                Self::Sum(_) => Arc::new(Self::Sum(new_children)),
            })
        }
    }

    fn tree() -> Arc<Node> {
        Arc::new(Node::Sum(vec![
            Arc::new(Node::Leaf(1)),
            Arc::new(Node::Sum(vec![Arc::new(Node::Leaf(2))])),
            Arc::new(Node::Leaf(3)),
        ]))
    }

    #[test]
    fn apply_visits_in_pre_order() -> SluiceResult<()> {
        let mut leaves = vec![];
        tree().apply(&mut |n| {
            if let Node::Leaf(v) = n.as_ref() {
                leaves.push(*v);
            }
            Ok(TreeNodeRecursion::Continue)
        })?;
        assert_eq!(leaves, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn jump_skips_children_only() -> SluiceResult<()> {
        let mut leaves = vec![];
        tree().apply(&mut |n| match n.as_ref() {
            Node::Leaf(v) => {
                leaves.push(*v);
                Ok(TreeNodeRecursion::Continue)
            }
            Node::Sum(children) if children.len() == 1 => Ok(TreeNodeRecursion::Jump),
            Node::Sum(_) => Ok(TreeNodeRecursion::Continue),
        })?;
        assert_eq!(leaves, vec![1, 3]);
        Ok(())
    }

    #[test]
    fn exists_stops_early() -> SluiceResult<()> {
        assert!(tree().exists(|n| Ok(matches!(n.as_ref(), Node::Leaf(2))))?);
        assert!(!tree().exists(|n| Ok(matches!(n.as_ref(), Node::Leaf(9))))?);
        Ok(())
    }

    #[test]
    fn transform_up_tracks_changes() -> SluiceResult<()> {
        let result = tree().transform_up(&mut |n| match n.as_ref() {
            Node::Leaf(v) if *v == 2 => Ok(Transformed::yes(Arc::new(Node::Leaf(20)))),
            _ => Ok(Transformed::no(n)),
        })?;
        assert!(result.transformed);
        let mut leaves = vec![];
        result.data.apply(&mut |n| {
            if let Node::Leaf(v) = n.as_ref() {
                leaves.push(*v);
            }
            Ok(TreeNodeRecursion::Continue)
        })?;
        assert_eq!(leaves, vec![1, 20, 3]);

        let untouched = tree().transform_up(&mut |n| Ok(Transformed::no(n)))?;
        assert!(!untouched.transformed);
        Ok(())
    }

    #[test]
    fn transform_down_jump_keeps_rewritten_node() -> SluiceResult<()> {
        let result = tree().transform_down(&mut |n| match n.as_ref() {
            Node::Sum(children) if children.len() == 1 => Ok(Transformed::new(
                Arc::new(Node::Leaf(0)),
                true,
                TreeNodeRecursion::Jump,
            )),
            _ => Ok(Transformed::no(n)),
        })?;
        assert!(result.transformed);
        assert_eq!(
            result.data.as_ref(),
            &Node::Sum(vec![
                Arc::new(Node::Leaf(1)),
                Arc::new(Node::Leaf(0)),
                Arc::new(Node::Leaf(3)),
            ])
        );
        Ok(())
    }
}
