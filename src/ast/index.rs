//! Flat, preorder index over one tree snapshot.
//!
//! The index gives every node a [`NodeId`] (its preorder position) and records parent,
//! children and subtree size, so passes can reason about node identity and
//! ancestry without mutating the tree. An index is only valid for the snapshot it was
//! built from.

use std::sync::Arc;

use super::{NodeId, NodeKind, NodeRef, Span, SyntaxTree};

#[derive(Debug, Clone)]
pub struct IndexedNode {
    pub node: NodeRef,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Number of nodes in this subtree, the node itself included.
    pub subtree_size: usize,
}

#[derive(Debug, Clone)]
pub struct TreeIndex {
    entries: Vec<IndexedNode>,
}

impl TreeIndex {
    pub fn build(tree: &SyntaxTree) -> Self {
        let mut entries = Vec::new();
        index_node(&mut entries, tree.root(), None);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: NodeId) -> &IndexedNode {
        &self.entries[id.0]
    }

    pub fn node(&self, id: NodeId) -> &NodeRef {
        &self.entries[id.0].node
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.entries[id.0].children
    }

    /// First id past the subtree rooted at `id`.
    pub fn subtree_end(&self, id: NodeId) -> NodeId {
        NodeId(id.0 + self.entries[id.0].subtree_size)
    }

    /// True when `id` lies inside the subtree rooted at `ancestor` (or is it).
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        ancestor <= id && id < self.subtree_end(ancestor)
    }

    /// Nodes in preorder.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &IndexedNode)> {
        self.entries.iter().enumerate().map(|(i, e)| (NodeId(i), e))
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    pub fn ancestors_and_self(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(id).chain(self.ancestors(id))
    }

    pub fn ancestor_or_self_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.ancestors_and_self(id)
            .find(|candidate| self.node(*candidate).kind == kind)
    }

    /// The deepest node whose span contains `span`.
    pub fn find_node(&self, span: Span) -> Option<NodeId> {
        if self.entries.is_empty() || !self.node(NodeId::ROOT).span.contains(span) {
            return None;
        }
        let mut current = NodeId::ROOT;
        while let Some(next) = self
            .children(current)
            .iter()
            .copied()
            .find(|child| self.node(*child).span.contains(span))
        {
            current = next;
        }
        Some(current)
    }
}

fn index_node(
    entries: &mut Vec<IndexedNode>,
    node: &NodeRef,
    parent: Option<NodeId>,
) -> NodeId {
    let id = NodeId(entries.len());
    entries.push(IndexedNode {
        node: Arc::clone(node),
        parent,
        children: Vec::with_capacity(node.children.len()),
        subtree_size: 1,
    });
    for child in node.children.iter() {
        let child_id = index_node(entries, child, Some(id));
        entries[id.0].children.push(child_id);
    }
    entries[id.0].subtree_size = entries.len() - id.0;
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;
    use crate::ast::Grammar;

    fn tree() -> SyntaxTree {
        SyntaxTree::new(
            Grammar::Basic,
            unit([
                import("Acme.Tools", Span::new(0, 17)),
                import("Acme.Tools", Span::new(18, 35)),
            ]),
        )
    }

    #[test]
    fn structurally_equal_nodes_get_distinct_ids() {
        let tree = tree();
        let index = TreeIndex::build(&tree);
        let imports: Vec<_> = index
            .iter()
            .filter(|(_, e)| e.node.kind == NodeKind::ImportDirective)
            .map(|(id, _)| id)
            .collect();
        assert_eq!(imports.len(), 2);
        assert_ne!(imports[0], imports[1]);
        assert_eq!(index.node(imports[0]).pretty(), index.node(imports[1]).pretty());
    }

    #[test]
    fn subtree_bounds_and_ancestry() {
        let index = TreeIndex::build(&tree());
        // unit, import, qualified, Acme, Tools, import, qualified, Acme, Tools
        assert_eq!(index.len(), 9);
        assert_eq!(index.subtree_end(NodeId(1)), NodeId(5));
        assert!(index.is_within(NodeId(3), NodeId(1)));
        assert!(!index.is_within(NodeId(6), NodeId(1)));
        let chain: Vec<_> = index.ancestors(NodeId(4)).collect();
        assert_eq!(chain, vec![NodeId(2), NodeId(1), NodeId(0)]);
        assert_eq!(index.get(NodeId(4)).subtree_size, 1);
    }

    #[test]
    fn find_node_maps_span_to_enclosing_import() {
        let index = TreeIndex::build(&tree());
        let found = index.find_node(Span::new(25, 30)).unwrap();
        assert_eq!(
            index.ancestor_or_self_of_kind(found, NodeKind::ImportDirective),
            Some(NodeId(5))
        );
        assert_eq!(index.find_node(Span::new(90, 95)), None);
    }
}
