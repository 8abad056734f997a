//! `Network`: a label-pattern-driven contraction tree over a fixed set of
//! named `SymTensor`s.
//!
//! Lifecycle mirrors the specification: a freshly built `Network` is
//! `Unloaded`; `construct()` builds the contraction tree (greedy pairwise
//! merge, grounded on
//! `other_examples/2de8cf4e_hoomania-QuaTenNet__src-tencon.rs.rs`'s
//! `contract_map`/`select_best_nodes`) and also regenerates the fermionic
//! swap bookkeeping, moving the network to `Loaded`; `launch()` evaluates
//! the tree bottom-up, materializing each internal node's tensor.

use std::collections::HashMap;

use symtensor_core::{Qnum, Result, SymTensorError};
use symtensor_tensor::SymTensor;
use tracing::{debug, instrument};

use crate::node::{build_internal, metric, Node, NodeId, NodeKind};
use crate::parser::NetworkSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Unloaded,
    Loaded,
}

/// A fermionic sign gate to apply to one operand immediately before a
/// particular internal node's contraction, recorded by
/// [`Network::construct`] and consumed by [`Network::launch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SwapGate {
    node: NodeId,
    label_a: i32,
    label_b: i32,
}

pub struct Network<Q: Qnum> {
    names: Vec<String>,
    tensors: Vec<SymTensor<Q>>,
    out_in_labels: Vec<i32>,
    out_out_labels: Vec<i32>,
    nodes: Vec<Node<Q>>,
    root: Option<NodeId>,
    swap_gates: Vec<SwapGate>,
    status: NetworkStatus,
}

impl<Q: Qnum> Network<Q> {
    /// Builds an `Unloaded` network from a parsed spec and the concrete
    /// tensors it names. Every tensor named in `spec` must be present in
    /// `tensors`; every spec entry's `in_labels ++ out_labels` is applied
    /// to the matching tensor via `set_label`.
    pub fn from_spec(spec: &NetworkSpec, mut tensors: HashMap<String, SymTensor<Q>>) -> Result<Self> {
        let mut names = Vec::with_capacity(spec.tensors.len());
        let mut ordered = Vec::with_capacity(spec.tensors.len());
        for entry in &spec.tensors {
            let mut tensor = tensors.remove(&entry.name).ok_or_else(|| {
                SymTensorError::InvalidNetwork(format!("network spec names unknown tensor '{}'", entry.name))
            })?;
            let mut labels = entry.in_labels.clone();
            labels.extend(entry.out_labels.clone());
            tensor.set_label(labels)?;
            names.push(entry.name.clone());
            ordered.push(tensor);
        }
        Ok(Network {
            names,
            tensors: ordered,
            out_in_labels: spec.out_in_labels.clone(),
            out_out_labels: spec.out_out_labels.clone(),
            nodes: Vec::new(),
            root: None,
            swap_gates: Vec::new(),
            status: NetworkStatus::Unloaded,
        })
    }

    pub fn status(&self) -> NetworkStatus {
        self.status
    }

    /// Rebinds the tensor bound to `name`, e.g. to feed a new operand
    /// through an already-`construct()`-ed contraction tree without paying
    /// for a full rebuild. Requires the replacement's labels (as a set) to
    /// match the original's, since the tree's label bookkeeping is keyed
    /// on them.
    pub fn replace_with(&mut self, name: &str, mut tensor: SymTensor<Q>) -> Result<()> {
        let idx = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| SymTensorError::InvalidNetwork(format!("no tensor named '{name}' in this network")))?;
        let mut existing_labels = self.tensors[idx].labels().to_vec();
        existing_labels.sort_unstable();
        let mut new_labels = tensor.labels().to_vec();
        new_labels.sort_unstable();
        if existing_labels != new_labels {
            return Err(SymTensorError::InvalidNetwork(format!(
                "replacement for '{name}' does not carry the same label set"
            )));
        }
        tensor.set_label(self.tensors[idx].labels().to_vec())?;
        self.tensors[idx] = tensor;
        for node in &mut self.nodes {
            node.tensor = None;
        }
        Ok(())
    }

    /// Destroys the contraction tree, returning the network to
    /// `Unloaded`. The bound tensors themselves are untouched.
    pub fn destruct(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.swap_gates.clear();
        self.status = NetworkStatus::Unloaded;
    }

    /// Greedily builds a binary contraction tree over the bound tensors
    /// (cheapest contractible pair first, by [`metric`]) and regenerates
    /// the fermionic swap-gate list from scratch — this list is never
    /// accumulated across calls, only ever recomputed from the current
    /// tree shape.
    #[instrument(skip(self))]
    pub fn construct(&mut self) -> Result<()> {
        self.destruct();
        if self.tensors.is_empty() {
            return Err(SymTensorError::InvalidNetwork("network has no tensors to contract".into()));
        }

        let mut arena: Vec<Node<Q>> = self
            .tensors
            .iter()
            .enumerate()
            .map(|(i, t)| Node::leaf(i, t))
            .collect();
        let mut live: Vec<NodeId> = (0..arena.len()).map(NodeId).collect();
        // Label order each live node's leaves appear in, left to right,
        // used only to detect crossings when recording swap gates.
        let mut history: HashMap<NodeId, Vec<i32>> = live
            .iter()
            .map(|&id| (id, arena[id.0].labels.clone()))
            .collect();

        while live.len() > 1 {
            // Ties on `cost` break on lower combined elemNum, then earlier
            // leaf/node index (arena ids grow monotonically with creation
            // order, so a lower id is an earlier-built node).
            let mut best: Option<(usize, usize, i64, usize)> = None;
            for i in 0..live.len() {
                for j in (i + 1)..live.len() {
                    let cost = metric(&arena[live[i].0], &arena[live[j].0]);
                    if cost == i64::MAX {
                        continue;
                    }
                    let combined = arena[live[i].0].elem_num + arena[live[j].0].elem_num;
                    let candidate_key = (cost, combined, live[i].0, live[j].0);
                    let better = match best {
                        None => true,
                        Some((bi, bj, bcost, bcombined)) => {
                            candidate_key < (bcost, bcombined, live[bi].0, live[bj].0)
                        }
                    };
                    if better {
                        best = Some((i, j, cost, combined));
                    }
                }
            }
            let (i, j, _, _) = best.ok_or_else(|| {
                SymTensorError::InvalidNetwork("network tensors do not form a single connected diagram".into())
            })?;
            let left = live[i];
            let right = live[j];

            let shared: Vec<i32> = arena[left.0]
                .labels
                .iter()
                .copied()
                .filter(|l| arena[right.0].labels.contains(l))
                .collect();
            let left_hist = &history[&left];
            let right_hist = &history[&right];
            for a in 0..shared.len() {
                for b in (a + 1)..shared.len() {
                    let crossed = order_of(left_hist, shared[a], shared[b]) != order_of(right_hist, shared[a], shared[b]);
                    if crossed {
                        debug!(node_a = shared[a], node_b = shared[b], "recording fermionic swap gate");
                        self.swap_gates.push(SwapGate {
                            node: NodeId(arena.len()),
                            label_a: shared[a],
                            label_b: shared[b],
                        });
                    }
                }
            }

            let internal = build_internal(left, &arena[left.0], right, &arena[right.0]);
            let new_id = NodeId(arena.len());
            let mut new_history = left_hist.clone();
            new_history.extend(right_hist.clone());
            history.insert(new_id, new_history);
            arena.push(internal);

            live.retain(|&id| id != left && id != right);
            live.push(new_id);
        }

        self.root = live.first().copied();
        self.nodes = arena;
        self.status = NetworkStatus::Loaded;
        Ok(())
    }

    /// Evaluates the contraction tree bottom-up and permutes the result to
    /// `out_labels`. Idempotent: calling `launch()` again without an
    /// intervening `construct()`/`replace_with()` returns the same
    /// (already memoized) result without recomputation.
    #[instrument(skip(self))]
    pub fn launch(&mut self) -> Result<SymTensor<Q>> {
        if self.status != NetworkStatus::Loaded {
            return Err(SymTensorError::InvalidNetwork("launch() requires a constructed network".into()));
        }
        let root = self.root.ok_or_else(|| SymTensorError::InvalidNetwork("network has no root node".into()))?;
        let mut result = self.evaluate(root)?;
        let mut out_labels = self.out_in_labels.clone();
        out_labels.extend(self.out_out_labels.clone());
        result.permute(&out_labels, self.out_in_labels.len())?;
        Ok(result)
    }

    fn evaluate(&mut self, id: NodeId) -> Result<SymTensor<Q>> {
        if let Some(cached) = &self.nodes[id.0].tensor {
            return Ok(cached.clone());
        }
        let tensor = match self.nodes[id.0].kind.clone() {
            NodeKind::Leaf { tensor_index } => self.tensors[tensor_index].clone(),
            NodeKind::Internal { left, right } => {
                let mut left_tensor = self.evaluate(left)?;
                let right_tensor = self.evaluate(right)?;
                for gate in self.swap_gates.clone() {
                    if gate.node == id {
                        left_tensor.add_gate(gate.label_a, gate.label_b)?;
                    }
                }
                left_tensor.contract(&right_tensor)?
            }
        };
        self.nodes[id.0].tensor = Some(tensor.clone());
        Ok(tensor)
    }
}

fn order_of(history: &[i32], a: i32, b: i32) -> bool {
    let pos_a = history.iter().position(|&l| l == a);
    let pos_b = history.iter().position(|&l| l == b);
    match (pos_a, pos_b) {
        (Some(x), Some(y)) => x < y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use symtensor_core::U1;
    use symtensor_tensor::{Bond, Direction, ScalarKind};

    fn make_matrix(labels: [i32; 2], values: [f64; 4]) -> SymTensor<U1> {
        let row = Bond::new(Direction::In, vec![(U1::new(0), 1), (U1::new(1), 1)]);
        let col = Bond::new(Direction::Out, vec![(U1::new(0), 1), (U1::new(1), 1)]);
        let mut t = SymTensor::new(vec![row, col], labels.to_vec(), ScalarKind::Real, "m").unwrap();
        t.set_raw_elem(&values.iter().map(|v| Complex64::new(*v, 0.0)).collect::<Vec<_>>())
            .unwrap();
        t
    }

    #[test]
    fn launch_matches_direct_contract_for_a_chain() {
        let a = make_matrix([1, 2], [1.0, 0.0, 0.0, 2.0]);
        let b = make_matrix([2, 3], [1.0, 0.0, 0.0, 3.0]);
        let expected = a.contract(&b).unwrap();

        let spec = NetworkSpec {
            tensors: vec![
                crate::parser::TensorSpec { name: "A".into(), in_labels: vec![1], out_labels: vec![2] },
                crate::parser::TensorSpec { name: "B".into(), in_labels: vec![2], out_labels: vec![3] },
            ],
            out_in_labels: vec![1],
            out_out_labels: vec![3],
        };
        let mut tensors = HashMap::new();
        tensors.insert("A".to_string(), a);
        tensors.insert("B".to_string(), b);
        let mut net = Network::from_spec(&spec, tensors).unwrap();
        net.construct().unwrap();
        let result = net.launch().unwrap();
        assert_eq!(result.get_raw_elem(), expected.get_raw_elem());
    }

    #[test]
    fn launch_is_idempotent() {
        let a = make_matrix([1, 2], [1.0, 0.0, 0.0, 2.0]);
        let b = make_matrix([2, 3], [1.0, 0.0, 0.0, 3.0]);
        let spec = NetworkSpec {
            tensors: vec![
                crate::parser::TensorSpec { name: "A".into(), in_labels: vec![1], out_labels: vec![2] },
                crate::parser::TensorSpec { name: "B".into(), in_labels: vec![2], out_labels: vec![3] },
            ],
            out_in_labels: vec![1],
            out_out_labels: vec![3],
        };
        let mut tensors = HashMap::new();
        tensors.insert("A".to_string(), a);
        tensors.insert("B".to_string(), b);
        let mut net = Network::from_spec(&spec, tensors).unwrap();
        net.construct().unwrap();
        let first = net.launch().unwrap();
        let second = net.launch().unwrap();
        assert_eq!(first.get_raw_elem(), second.get_raw_elem());
    }
}
