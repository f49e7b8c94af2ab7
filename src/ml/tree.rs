// ============================================================
// Layer 5 — Binary Decision Tree Storage
// ============================================================
// Flat node storage shared by the random forest (leaves hold
// class probabilities) and the boosted trees (leaves hold a
// margin contribution). Children are pushed before their parent,
// so `root` is recorded explicitly.
//
// A split sends a row left when `row[feature] < threshold`.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node<L> {
    Leaf(L),
    Split {
        feature:   usize,
        threshold: f64,
        left:      usize,
        right:     usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree<L> {
    nodes: Vec<Node<L>>,
    root:  usize,
}

impl<L> Tree<L> {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), root: 0 }
    }

    /// Append a node and return its id.
    pub fn push(&mut self, node: Node<L>) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn set_root(&mut self, root: usize) {
        self.root = root;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Walk from the root to the leaf this row lands in.
    pub fn leaf(&self, row: ArrayView1<'_, f64>) -> &L {
        let mut id = self.root;
        loop {
            match &self.nodes[id] {
                Node::Leaf(value) => return value,
                Node::Split { feature, threshold, left, right } => {
                    id = if row[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Longest root-to-leaf path, counted in splits.
    pub fn depth(&self) -> usize {
        fn walk<L>(tree: &Tree<L>, id: usize) -> usize {
            match &tree.nodes[id] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(tree, *left).max(walk(tree, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(self, self.root) }
    }
}

impl<L> Default for Tree<L> {
    fn default() -> Self {
        Self::new()
    }
}
