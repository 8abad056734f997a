//! `Node`: one vertex of a contraction tree.
//!
//! Nodes live in a flat arena (`Network::nodes`) addressed by [`NodeId`]
//! rather than linked through parent/child pointers or `Rc`s, following the
//! specification's own redesign note that an index-addressed arena is the
//! idiomatic Rust shape for a tree whose structure is rebuilt wholesale on
//! every `construct()` call.

use std::collections::HashMap;

use symtensor_core::Qnum;
use symtensor_tensor::SymTensor;

/// An index into a [`crate::network::Network`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// What a node represents: either one of the network's input tensors, or
/// the pairwise contraction of two other nodes already in the arena.
#[derive(Debug, Clone, Copy)]
pub enum NodeKind {
    Leaf { tensor_index: usize },
    Internal { left: NodeId, right: NodeId },
}

/// One vertex of a contraction tree: its open (uncontracted) labels, the
/// element count a dense tensor with those labels would need (used by
/// [`metric`] to rank candidate pairings), and — once `launch()` has
/// evaluated it — the materialized tensor.
#[derive(Debug, Clone)]
pub struct Node<Q: Qnum> {
    pub kind: NodeKind,
    pub labels: Vec<i32>,
    pub dims: HashMap<i32, usize>,
    pub elem_num: usize,
    pub tensor: Option<SymTensor<Q>>,
}

impl<Q: Qnum> Node<Q> {
    pub fn leaf(tensor_index: usize, tensor: &SymTensor<Q>) -> Self {
        let dims = label_dims(tensor);
        let elem_num = dims.values().product::<usize>().max(1);
        Node {
            kind: NodeKind::Leaf { tensor_index },
            labels: tensor.labels().to_vec(),
            dims,
            elem_num,
            tensor: None,
        }
    }

    fn internal(left: NodeId, left_node: &Node<Q>, right: NodeId, right_node: &Node<Q>) -> Self {
        let shared: Vec<i32> = left_node
            .labels
            .iter()
            .copied()
            .filter(|l| right_node.labels.contains(l))
            .collect();
        let mut labels: Vec<i32> = left_node
            .labels
            .iter()
            .copied()
            .filter(|l| !shared.contains(l))
            .collect();
        labels.extend(right_node.labels.iter().copied().filter(|l| !shared.contains(l)));

        let mut dims = left_node.dims.clone();
        dims.extend(right_node.dims.clone());
        for l in &shared {
            dims.remove(l);
        }
        let elem_num = dims.values().product::<usize>().max(1);

        Node {
            kind: NodeKind::Internal { left, right },
            labels,
            dims,
            elem_num,
            tensor: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}

fn label_dims<Q: Qnum>(tensor: &SymTensor<Q>) -> HashMap<i32, usize> {
    tensor
        .labels()
        .iter()
        .zip(tensor.bonds())
        .map(|(&label, bond)| (label, bond.dim()))
        .collect()
}

/// Builds the internal node that would result from contracting `left` and
/// `right`, given their already-arena-resident nodes.
pub fn build_internal<Q: Qnum>(left: NodeId, left_node: &Node<Q>, right: NodeId, right_node: &Node<Q>) -> Node<Q> {
    Node::internal(left, left_node, right, right_node)
}

/// The element count a merge of `a` and `b` would produce, without
/// building the full `Node` (no arena ids needed here): same dims-merge
/// logic as [`Node::internal`].
fn merged_elem_num<Q: Qnum>(a: &Node<Q>, b: &Node<Q>) -> usize {
    let shared: Vec<i32> = a.labels.iter().copied().filter(|l| b.labels.contains(l)).collect();
    let mut dims = a.dims.clone();
    dims.extend(b.dims.clone());
    for l in &shared {
        dims.remove(l);
    }
    dims.values().product::<usize>().max(1)
}

/// The intermediate-storage cost of contracting `a` against `b`:
/// `elemNum(merged) - max(elemNum(a), elemNum(b))`, how many more elements
/// the merge needs to hold than the larger of its two operands already
/// does. Pairs sharing no label at all cannot be contracted and score
/// `i64::MAX` so `construct()`'s greedy search never picks them while a
/// contractible pair remains.
///
/// Grounded on the ratio-based pair scoring in
/// `other_examples/2de8cf4e_hoomania-QuaTenNet__src-tencon.rs.rs`'s
/// `ratio_matrix`/`select_best_nodes`, restated as a cost (lower is
/// better) rather than a ratio (higher is better), since it is combined
/// here with a plain `min_by_key` instead of a running best-score scan.
pub fn metric<Q: Qnum>(a: &Node<Q>, b: &Node<Q>) -> i64 {
    if !a.labels.iter().any(|l| b.labels.contains(l)) {
        return i64::MAX;
    }
    let merged = merged_elem_num(a, b) as i128;
    let largest = a.elem_num.max(b.elem_num) as i128;
    (merged - largest).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use symtensor_core::U1;
    use symtensor_tensor::{Bond, Direction, ScalarKind};

    fn leaf(labels: Vec<i32>, dim: usize) -> Node<U1> {
        let bonds: Vec<Bond<U1>> = labels
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let dir = if i == 0 { Direction::In } else { Direction::Out };
                Bond::new(dir, vec![(U1::new(0), dim)])
            })
            .collect();
        let row_bonds = bonds.iter().filter(|b| b.direction() == Direction::In).count();
        let t = SymTensor::new(bonds, labels, ScalarKind::Real, "leaf").unwrap();
        let _ = row_bonds;
        Node::leaf(0, &t)
    }

    #[test]
    fn metric_prefers_smaller_resulting_tensor() {
        let a = leaf(vec![1, 2], 4);
        let b = leaf(vec![2, 3], 4);
        let c = leaf(vec![4, 5], 4);
        assert!(metric(&a, &b) < metric(&a, &c));
    }

    #[test]
    fn metric_is_max_for_disjoint_labels() {
        let a = leaf(vec![1], 2);
        let b = leaf(vec![2], 2);
        assert_eq!(metric(&a, &b), i64::MAX);
    }
}
