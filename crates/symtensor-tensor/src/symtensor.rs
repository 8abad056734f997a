//! `SymTensor`: a symmetry-adapted tensor stored as one dense [`Block`] per
//! conserved charge sector.
//!
//! Bonds are kept ordered with every `In` bond before every `Out` bond
//! (`row_bonds` records the split point), so a tensor's blocks are always
//! genuinely 2-D matrices: row index ranges over the `In` bonds' combined
//! states, column index over the `Out` bonds'. This is the same row/column
//! convention `tensor4all-linalg::svd::unfold_split` uses to turn a
//! dynamic-rank tensor into the 2-D shape its SVD/QR backends expect.

use std::collections::BTreeMap;

use num_complex::Complex64;
use symtensor_core::{Qnum, Result, SymTensorError};
use tracing::instrument;

use crate::block::{Block, ScalarKind};
use crate::bond::{Bond, Direction};
use crate::layout::{self, Sector};
use crate::profile;

/// Lifecycle/status bits, following the specification's HAVEBOND→HAVEELEM
/// progression.
pub mod status {
    pub const HAVEBOND: u8 = 1 << 0;
    pub const HAVEELEM: u8 = 1 << 1;
}

/// A symmetry-adapted tensor: a labelled list of bonds plus one dense
/// block per charge sector that actually occurs.
#[derive(Debug, Clone)]
pub struct SymTensor<Q: Qnum> {
    name: String,
    bonds: Vec<Bond<Q>>,
    labels: Vec<i32>,
    scalar_kind: ScalarKind,
    row_bonds: usize,
    blocks: BTreeMap<Q, Block>,
    status: u8,
}

impl<Q: Qnum> SymTensor<Q> {
    /// Builds a tensor with zero-filled blocks for every charge sector its
    /// bond structure admits. `bonds` must list every `In` bond before any
    /// `Out` bond.
    #[instrument(skip(bonds, labels), fields(name = %name.as_ref()))]
    pub fn new(
        bonds: Vec<Bond<Q>>,
        labels: Vec<i32>,
        scalar_kind: ScalarKind,
        name: impl AsRef<str>,
    ) -> Result<Self> {
        if bonds.len() != labels.len() {
            return Err(SymTensorError::LabelError(format!(
                "expected {} labels for {} bonds, got {}",
                bonds.len(),
                bonds.len(),
                labels.len()
            )));
        }
        let mut sorted_labels = labels.clone();
        sorted_labels.sort_unstable();
        sorted_labels.dedup();
        if sorted_labels.len() != labels.len() {
            return Err(SymTensorError::LabelError("duplicate bond labels".into()));
        }
        let row_bonds = bonds
            .iter()
            .position(|b| b.direction() == Direction::Out)
            .unwrap_or(bonds.len());
        if bonds[row_bonds..].iter().any(|b| b.direction() == Direction::In) {
            return Err(SymTensorError::BondMismatch {
                label_a: 0,
                label_b: 0,
                reason: "bonds must list every In bond before any Out bond".into(),
            });
        }
        let blocks = Self::allocate_blocks(&bonds, row_bonds, scalar_kind);
        let elems: usize = blocks.values().map(|b| {
            let (r, c) = b.shape();
            r * c
        }).sum();
        profile::tensor_created();
        profile::record_elem_alloc(elems);
        Ok(Self {
            name: name.as_ref().to_string(),
            bonds,
            labels,
            scalar_kind,
            row_bonds,
            blocks,
            status: status::HAVEBOND,
        })
    }

    fn allocate_blocks(bonds: &[Bond<Q>], row_bonds: usize, scalar_kind: ScalarKind) -> BTreeMap<Q, Block> {
        let row_sectors = layout::partition_by_charge(&as_in(&bonds[..row_bonds]));
        let col_sectors = layout::partition_by_charge(&as_in(&bonds[row_bonds..]));
        let mut blocks = BTreeMap::new();
        for (charge, row) in &row_sectors {
            if let Some(col) = col_sectors.get(charge) {
                blocks.insert(charge.clone(), Block::zeros(scalar_kind, row.dim, col.dim));
            }
        }
        blocks
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl AsRef<str>) {
        self.name = name.as_ref().to_string();
    }

    pub fn bonds(&self) -> &[Bond<Q>] {
        &self.bonds
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    pub fn row_bond_count(&self) -> usize {
        self.row_bonds
    }

    pub fn scalar_kind(&self) -> ScalarKind {
        self.scalar_kind
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn blocks(&self) -> &BTreeMap<Q, Block> {
        &self.blocks
    }

    /// Total dense dimension (product of every bond's `dim()`); `1` for a
    /// bondless (scalar) tensor.
    pub fn full_dim(&self) -> usize {
        self.bonds.iter().map(|b| b.dim()).product()
    }

    pub fn get_block(&self, charge: &Q) -> Option<&Block> {
        self.blocks.get(charge)
    }

    /// Replaces the block stored for `charge`. The replacement must match
    /// the shape the tensor's bond structure already allocated for that
    /// charge, unless `force` is set, in which case it overwrites with
    /// whatever is provided (including creating a sector the bond structure
    /// would otherwise forbid) — an escape hatch for callers that have
    /// already verified the shape themselves.
    pub fn put_block(&mut self, charge: Q, block: Block, force: bool) -> Result<()> {
        if force {
            self.blocks.insert(charge, block);
            self.status |= status::HAVEELEM;
            return Ok(());
        }
        match self.blocks.get(&charge) {
            None => Err(SymTensorError::BondMismatch {
                label_a: 0,
                label_b: 0,
                reason: format!("no sector for charge {charge:?} in this tensor's bond structure"),
            }),
            Some(existing) if existing.shape() != block.shape() => Err(SymTensorError::ShapeMismatch {
                expected: existing.shape(),
                actual: block.shape(),
            }),
            Some(_) => {
                self.blocks.insert(charge, block);
                self.status |= status::HAVEELEM;
                Ok(())
            }
        }
    }

    pub fn set_label(&mut self, labels: Vec<i32>) -> Result<()> {
        if labels.len() != self.bonds.len() {
            return Err(SymTensorError::LabelError(format!(
                "expected {} labels, got {}",
                self.bonds.len(),
                labels.len()
            )));
        }
        let mut sorted = labels.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != labels.len() {
            return Err(SymTensorError::LabelError("duplicate bond labels".into()));
        }
        self.labels = labels;
        Ok(())
    }

    /// Assigns the tensor's full, dense, row-major raw element array
    /// (length `full_dim()`, row bonds then column bonds). Any nonzero
    /// entry that falls outside every allocated charge sector raises
    /// [`SymTensorError::SymmetryViolation`].
    pub fn set_raw_elem(&mut self, elems: &[Complex64]) -> Result<()> {
        let total = self.full_dim();
        if elems.len() != total {
            return Err(SymTensorError::ShapeMismatch {
                expected: (total, 1),
                actual: (elems.len(), 1),
            });
        }
        let row_bonds = &self.bonds[..self.row_bonds];
        let col_bonds = &self.bonds[self.row_bonds..];
        let row_sectors = layout::partition_by_charge(&as_in(row_bonds));
        let col_sectors = layout::partition_by_charge(&as_in(col_bonds));
        let col_dim: usize = col_bonds.iter().map(|b| b.dim()).product();

        for (flat, value) in elems.iter().enumerate() {
            let row_flat = if col_dim == 0 { 0 } else { flat / col_dim };
            let col_flat = if col_dim == 0 { 0 } else { flat % col_dim };
            let located = locate_in_sector(row_bonds, &row_sectors, row_flat)
                .zip(locate_in_sector(col_bonds, &col_sectors, col_flat))
                .filter(|((rq, _), (cq, _))| rq == cq);
            match located {
                Some(((charge, row_off), (_, col_off))) => {
                    if let Some(block) = self.blocks.get_mut(&charge) {
                        block.set(row_off, col_off, *value)?;
                    } else if value.norm() > 0.0 {
                        return Err(SymTensorError::SymmetryViolation {
                            label: self.labels.clone(),
                            magnitude: value.norm(),
                        });
                    }
                }
                None => {
                    if value.norm() > 0.0 {
                        return Err(SymTensorError::SymmetryViolation {
                            label: self.labels.clone(),
                            magnitude: value.norm(),
                        });
                    }
                }
            }
        }
        self.status |= status::HAVEELEM;
        Ok(())
    }

    /// The dense, row-major raw element array: the inverse of
    /// [`Self::set_raw_elem`]. Positions the bond structure forbids read
    /// back as zero.
    pub fn get_raw_elem(&self) -> Vec<Complex64> {
        let total = self.full_dim();
        let mut elems = vec![Complex64::new(0.0, 0.0); total];
        let row_bonds = &self.bonds[..self.row_bonds];
        let col_bonds = &self.bonds[self.row_bonds..];
        let row_sectors = layout::partition_by_charge(&as_in(row_bonds));
        let col_sectors = layout::partition_by_charge(&as_in(col_bonds));
        let col_dim: usize = col_bonds.iter().map(|b| b.dim()).product();

        for flat in 0..total {
            let row_flat = if col_dim == 0 { 0 } else { flat / col_dim };
            let col_flat = if col_dim == 0 { 0 } else { flat % col_dim };
            let located = locate_in_sector(row_bonds, &row_sectors, row_flat)
                .zip(locate_in_sector(col_bonds, &col_sectors, col_flat))
                .filter(|((rq, _), (cq, _))| rq == cq);
            if let Some(((charge, row_off), (_, col_off))) = located {
                if let Some(block) = self.blocks.get(&charge) {
                    elems[flat] = block.get(row_off, col_off);
                }
            }
        }
        elems
    }

    /// Reorders bonds/labels to `new_labels` (a permutation of the
    /// tensor's current labels) and repartitions the first `new_row_bonds`
    /// of them as `In`/row bonds, the rest as `Out`/column bonds.
    ///
    /// A no-op identity permutation with an unchanged row/column split
    /// returns immediately without touching any block.
    #[instrument(skip(self, new_labels))]
    pub fn permute(&mut self, new_labels: &[i32], new_row_bonds: usize) -> Result<()> {
        if new_labels.len() != self.labels.len() {
            return Err(SymTensorError::LabelError(format!(
                "permute expected {} labels, got {}",
                self.labels.len(),
                new_labels.len()
            )));
        }
        let perm: Vec<usize> = new_labels
            .iter()
            .map(|l| {
                self.labels
                    .iter()
                    .position(|x| x == l)
                    .ok_or_else(|| SymTensorError::LabelError(format!("unknown label {l}")))
            })
            .collect::<Result<_>>()?;

        let is_identity = perm.iter().enumerate().all(|(i, &p)| i == p) && new_row_bonds == self.row_bonds;
        if is_identity {
            return Ok(());
        }

        let old_dims: Vec<usize> = self.bonds.iter().map(|b| b.dim()).collect();
        let old_elems = self.get_raw_elem();
        let new_dims: Vec<usize> = perm.iter().map(|&p| old_dims[p]).collect();
        let mut new_elems = vec![Complex64::new(0.0, 0.0); old_elems.len()];
        for (old_flat, value) in old_elems.iter().enumerate() {
            let old_idx = mixed_radix_decompose(&old_dims, old_flat);
            let mut new_idx = vec![0usize; old_idx.len()];
            for (new_pos, &old_pos) in perm.iter().enumerate() {
                new_idx[new_pos] = old_idx[old_pos];
            }
            let new_flat = mixed_radix_compose(&new_dims, &new_idx);
            new_elems[new_flat] = *value;
        }

        let mut new_bonds = Vec::with_capacity(perm.len());
        for (new_pos, &old_pos) in perm.iter().enumerate() {
            let desired = if new_pos < new_row_bonds { Direction::In } else { Direction::Out };
            let bond = &self.bonds[old_pos];
            new_bonds.push(if bond.direction() == desired { bond.clone() } else { bond.reverse() });
        }

        let freed: usize = self.blocks.values().map(|b| { let (r, c) = b.shape(); r * c }).sum();
        profile::record_elem_free(freed);
        self.bonds = new_bonds;
        self.labels = new_labels.to_vec();
        self.row_bonds = new_row_bonds;
        self.blocks = Self::allocate_blocks(&self.bonds, self.row_bonds, self.scalar_kind);
        let allocated: usize = self.blocks.values().map(|b| { let (r, c) = b.shape(); r * c }).sum();
        profile::record_elem_alloc(allocated);
        self.set_raw_elem(&new_elems)
    }

    /// Swaps the row and column bond groups, flipping each bond's
    /// direction (and negating its charges) in the process. An involution:
    /// `transpose` twice returns the original layout.
    pub fn transpose(&mut self) -> Result<()> {
        let col_count = self.bonds.len() - self.row_bonds;
        let mut new_labels = self.labels[self.row_bonds..].to_vec();
        new_labels.extend_from_slice(&self.labels[..self.row_bonds]);
        self.permute(&new_labels, col_count)
    }

    /// Contracts every bond `self` and `other` share by label. Remaining
    /// bonds from `self` become the result's row bonds (in their original
    /// relative order), remaining bonds from `other` become its column
    /// bonds.
    #[instrument(skip(self, other))]
    pub fn contract(&self, other: &Self) -> Result<Self> {
        let shared: Vec<i32> = self
            .labels
            .iter()
            .copied()
            .filter(|l| other.labels.contains(l))
            .collect();
        if shared.is_empty() {
            return Err(SymTensorError::LabelError("contract found no shared labels".into()));
        }
        for &label in &shared {
            let a = &self.bonds[self.labels.iter().position(|l| *l == label).unwrap()];
            let b = &other.bonds[other.labels.iter().position(|l| *l == label).unwrap()];
            if !a.contractible_with(b) {
                return Err(SymTensorError::BondMismatch {
                    label_a: label,
                    label_b: label,
                    reason: "shared bonds are not contractible (direction/state mismatch)".into(),
                });
            }
        }
        let mut shared_order = shared.clone();
        shared_order.sort_unstable();

        let free_self: Vec<i32> = self.labels.iter().copied().filter(|l| !shared_order.contains(l)).collect();
        let free_other: Vec<i32> = other.labels.iter().copied().filter(|l| !shared_order.contains(l)).collect();

        let mut self_order = free_self.clone();
        self_order.extend_from_slice(&shared_order);
        let mut lhs = self.clone();
        lhs.permute(&self_order, free_self.len())?;

        let mut other_order = shared_order.clone();
        other_order.extend_from_slice(&free_other);
        let mut rhs = other.clone();
        rhs.permute(&other_order, shared_order.len())?;

        let mut out_blocks = BTreeMap::new();
        for (charge, lhs_block) in &lhs.blocks {
            if let Some(rhs_block) = rhs.blocks.get(charge) {
                out_blocks.insert(charge.clone(), lhs_block.matmul(rhs_block)?);
            }
        }

        let mut out_bonds = lhs.bonds[..lhs.row_bonds].to_vec();
        out_bonds.extend_from_slice(&rhs.bonds[rhs.row_bonds..]);
        let mut out_labels = free_self.clone();
        out_labels.extend_from_slice(&free_other);
        let out_kind = if self.scalar_kind == ScalarKind::Complex || other.scalar_kind == ScalarKind::Complex {
            ScalarKind::Complex
        } else {
            ScalarKind::Real
        };

        let mut result = Self::new(
            out_bonds,
            out_labels,
            out_kind,
            format!("{}x{}", self.name, other.name),
        )?;
        for (charge, block) in out_blocks {
            result.blocks.insert(charge, block);
        }
        result.status |= status::HAVEELEM;
        Ok(result)
    }

    /// Contracts `label_a` against `label_b` on the same tensor (a trace
    /// over a bra/ket pair of bonds on `self`), returning the reduced
    /// tensor over every other bond.
    pub fn partial_trace(&self, label_a: i32, label_b: i32) -> Result<Self> {
        let pos_a = self
            .labels
            .iter()
            .position(|&l| l == label_a)
            .ok_or_else(|| SymTensorError::LabelError(format!("unknown label {label_a}")))?;
        let pos_b = self
            .labels
            .iter()
            .position(|&l| l == label_b)
            .ok_or_else(|| SymTensorError::LabelError(format!("unknown label {label_b}")))?;
        if pos_a == pos_b {
            return Err(SymTensorError::LabelError("cannot trace a bond against itself".into()));
        }
        if !self.bonds[pos_a].contractible_with(&self.bonds[pos_b]) {
            return Err(SymTensorError::BondMismatch {
                label_a,
                label_b,
                reason: "traced bonds are not contractible".into(),
            });
        }

        let dims: Vec<usize> = self.bonds.iter().map(|b| b.dim()).collect();
        let elems = self.get_raw_elem();
        let remaining: Vec<usize> = (0..self.bonds.len()).filter(|&p| p != pos_a && p != pos_b).collect();
        let remaining_dims: Vec<usize> = remaining.iter().map(|&p| dims[p]).collect();
        let out_total: usize = remaining_dims.iter().product();
        let mut out_elems = vec![Complex64::new(0.0, 0.0); out_total];

        for (flat, value) in elems.iter().enumerate() {
            let idx = mixed_radix_decompose(&dims, flat);
            if idx[pos_a] != idx[pos_b] {
                continue;
            }
            let remaining_idx: Vec<usize> = remaining.iter().map(|&p| idx[p]).collect();
            let out_flat = mixed_radix_compose(&remaining_dims, &remaining_idx);
            out_elems[out_flat] += value;
        }

        let new_bonds: Vec<Bond<Q>> = remaining.iter().map(|&p| self.bonds[p].clone()).collect();
        let new_labels: Vec<i32> = remaining.iter().map(|&p| self.labels[p]).collect();
        let mut result = Self::new(new_bonds, new_labels, self.scalar_kind, format!("{}_tr", self.name))?;
        result.set_raw_elem(&out_elems)?;
        Ok(result)
    }

    /// Merges the named, same-direction bonds into a single combined bond,
    /// relabelling the run with its first label. The bonds need not already
    /// sit at contiguous, ascending positions: they are first permuted
    /// adjacent, in the order `labels` lists them, so the merge always
    /// succeeds for any same-direction subset of bonds.
    pub fn combine_bond(&mut self, labels: &[i32]) -> Result<()> {
        if labels.len() < 2 {
            return Err(SymTensorError::LabelError("combineBond needs at least two labels".into()));
        }
        let positions: Vec<usize> = labels
            .iter()
            .map(|l| {
                self.labels
                    .iter()
                    .position(|x| x == l)
                    .ok_or_else(|| SymTensorError::LabelError(format!("unknown label {l}")))
            })
            .collect::<Result<_>>()?;
        let direction0 = self.bonds[positions[0]].direction();
        if positions.iter().any(|&p| self.bonds[p].direction() != direction0) {
            return Err(SymTensorError::BondMismatch {
                label_a: labels[0],
                label_b: *labels.last().unwrap(),
                reason: "combineBond requires all merged bonds to share a direction".into(),
            });
        }

        // Move the named bonds adjacent within their own side (row or
        // column) so the merge below always sees a contiguous run, without
        // ever asking `permute` to cross the row/column boundary (which
        // would force-reverse bonds that have nothing to do with this
        // merge).
        let named: std::collections::HashSet<i32> = labels.iter().copied().collect();
        let side = if direction0 == Direction::In {
            0..self.row_bonds
        } else {
            self.row_bonds..self.bonds.len()
        };
        let mut new_side: Vec<i32> = self.labels[side.clone()]
            .iter()
            .copied()
            .filter(|l| !named.contains(l))
            .collect();
        let first_named_pos = *positions.iter().min().unwrap();
        let insert_at = self.labels[side.start..first_named_pos]
            .iter()
            .filter(|l| !named.contains(l))
            .count();
        new_side.splice(insert_at..insert_at, labels.iter().copied());

        let mut new_order = self.labels[..side.start].to_vec();
        new_order.extend_from_slice(&new_side);
        new_order.extend_from_slice(&self.labels[side.end..]);
        self.permute(&new_order, self.row_bonds)?;

        let start = self.labels.iter().position(|l| l == &labels[0]).unwrap();
        let end = start + labels.len() - 1;

        let elems = self.get_raw_elem();
        let combined = (start + 1..=end)
            .fold(self.bonds[start].clone(), |acc, p| acc.combine(&self.bonds[p]));

        let mut new_bonds = self.bonds[..start].to_vec();
        new_bonds.push(combined);
        new_bonds.extend_from_slice(&self.bonds[end + 1..]);
        let mut new_labels = self.labels[..start].to_vec();
        new_labels.push(labels[0]);
        new_labels.extend_from_slice(&self.labels[end + 1..]);

        self.row_bonds = new_bonds.iter().filter(|b| b.direction() == Direction::In).count();
        self.bonds = new_bonds;
        self.labels = new_labels;
        self.blocks = Self::allocate_blocks(&self.bonds, self.row_bonds, self.scalar_kind);
        self.set_raw_elem(&elems)
    }

    /// Mode-grouped Higher-Order SVD. The first `mode_count * k` bonds
    /// (where `k = (rank - fixed_count) / mode_count`) are partitioned into
    /// `mode_count` contiguous groups of `k` bonds each; the trailing
    /// `fixed_count` bonds are left untouched. Each mode's factor is an
    /// independent unfolding of `self` (not of a sequentially-updated
    /// core), so the `mode_count` factors can be computed in any order; the
    /// core tensor is then obtained by contracting each factor's adjoint
    /// into `self`, one mode at a time.
    ///
    /// Returns the `mode_count` orthogonal factors (one per mode, legs:
    /// that mode's original bonds plus one new bond shared with the core),
    /// the core tensor (the `fixed_count` untouched bonds plus one new bond
    /// per mode, in processing order), and, if `return_singulars` is set,
    /// that mode's per-charge singular values in the same order.
    pub fn hosvd(
        &self,
        mode_count: usize,
        fixed_count: usize,
        return_singulars: bool,
    ) -> Result<(Vec<Self>, Self, Option<Vec<BTreeMap<Q, Vec<f64>>>>)> {
        if self.status & status::HAVEELEM == 0 {
            return Err(SymTensorError::UnboundTensor("hosvd requires assigned elements".into()));
        }
        if mode_count == 0 {
            return Err(SymTensorError::LabelError("hosvd requires mode_count >= 1".into()));
        }
        let rank = self.bonds.len();
        if fixed_count > rank {
            return Err(SymTensorError::LabelError("hosvd fixed_count exceeds tensor rank".into()));
        }
        let groupable = rank - fixed_count;
        if groupable % mode_count != 0 {
            return Err(SymTensorError::LabelError(
                "hosvd: (rank - fixed_count) must be evenly divisible by mode_count".into(),
            ));
        }
        let k = groupable / mode_count;
        let next_label = self.labels.iter().copied().max().unwrap_or(0) + 1;

        let mut factors = Vec::with_capacity(mode_count);
        let mut singulars = Vec::with_capacity(mode_count);
        let mut core = self.clone();

        for m in 0..mode_count {
            let mode_labels: Vec<i32> = self.labels[m * k..(m + 1) * k].to_vec();
            let new_label = next_label + m as i32;

            // Unfold the ORIGINAL tensor (not the running core) with this
            // mode's legs forced to row position, independent of the
            // other modes.
            let rest_labels: Vec<i32> =
                self.labels.iter().copied().filter(|l| !mode_labels.contains(l)).collect();
            let mut unfolded = self.clone();
            let mut order = mode_labels.clone();
            order.extend_from_slice(&rest_labels);
            unfolded.permute(&order, k)?;

            let mut u_blocks = BTreeMap::new();
            let mut svd_states: Vec<(Q, usize)> = Vec::new();
            let mut s_map = BTreeMap::new();
            for (charge, block) in &unfolded.blocks {
                let (rows, cols) = block.shape();
                let dense = block.densify();
                let (u_block, s) = match &dense {
                    Block::Real { data, .. } => {
                        let svd = symtensor_linalg::svd_f64(rows, cols, data)
                            .map_err(|e| SymTensorError::LinalgFailure(e.to_string()))?;
                        (Block::Real { rows, cols: svd.k, diag: false, data: svd.u }, svd.s)
                    }
                    Block::Complex { data, .. } => {
                        let svd = symtensor_linalg::svd_c64(rows, cols, data)
                            .map_err(|e| SymTensorError::LinalgFailure(e.to_string()))?;
                        (Block::Complex { rows, cols: svd.k, diag: false, data: svd.u }, svd.s)
                    }
                };
                svd_states.push((charge.clone(), s.len()));
                u_blocks.insert(charge.clone(), u_block);
                s_map.insert(charge.clone(), s);
            }

            let mut u_bonds = unfolded.bonds[..k].to_vec();
            u_bonds.push(Bond::new(Direction::Out, svd_states));
            let mut u_labels = mode_labels.clone();
            u_labels.push(new_label);
            let mut u_m = Self::new(u_bonds, u_labels, self.scalar_kind, format!("{}_U{m}", self.name))?;
            u_m.blocks = u_blocks;
            u_m.status |= status::HAVEELEM;

            // Adjoint: transpose swaps the mode legs into column position
            // (reversing their direction exactly once relative to
            // `unfolded`'s row bonds) and, for complex tensors, conjugate.
            let mut adjoint = u_m.clone();
            adjoint.transpose()?;
            if self.scalar_kind == ScalarKind::Complex {
                adjoint.blocks = adjoint.blocks.iter().map(|(c, b)| (c.clone(), b.conjugate())).collect();
            }

            // Bring the running core's (still untouched) mode-m bonds into
            // the SAME row-forced layout `unfolded` used, so they are
            // exactly the bonds `adjoint` was built to contract against.
            let core_rest: Vec<i32> =
                core.labels.iter().copied().filter(|l| !mode_labels.contains(l)).collect();
            let mut core_order = mode_labels.clone();
            core_order.extend_from_slice(&core_rest);
            core.permute(&core_order, k)?;

            core = core.contract(&adjoint)?;
            factors.push(u_m);
            if return_singulars {
                singulars.push(s_map);
            }
        }

        Ok((factors, core, if return_singulars { Some(singulars) } else { None }))
    }

    /// Multiplies every element whose two selected leg-states are both
    /// fermionic by `-1`, the sign `exSwap` leaves behind after physically
    /// swapping two fermionic legs past each other.
    pub fn add_gate(&mut self, label_a: i32, label_b: i32) -> Result<()> {
        let pos_a = self
            .labels
            .iter()
            .position(|&l| l == label_a)
            .ok_or_else(|| SymTensorError::LabelError(format!("unknown label {label_a}")))?;
        let pos_b = self
            .labels
            .iter()
            .position(|&l| l == label_b)
            .ok_or_else(|| SymTensorError::LabelError(format!("unknown label {label_b}")))?;

        let dims: Vec<usize> = self.bonds.iter().map(|b| b.dim()).collect();
        let mut elems = self.get_raw_elem();
        for (flat, value) in elems.iter_mut().enumerate() {
            let idx = mixed_radix_decompose(&dims, flat);
            let (state_a, _) = state_and_offset(&self.bonds[pos_a], idx[pos_a]);
            let (state_b, _) = state_and_offset(&self.bonds[pos_b], idx[pos_b]);
            let fermionic_a = self.bonds[pos_a].states()[state_a].qnum.is_fermionic();
            let fermionic_b = self.bonds[pos_b].states()[state_b].qnum.is_fermionic();
            if fermionic_a && fermionic_b {
                *value = -*value;
            }
        }
        self.set_raw_elem(&elems)
    }

    /// Physically swaps two legs (as [`Self::permute`] would) and applies
    /// the fermionic sign that swap picks up. Applying `exSwap` to the same
    /// pair twice restores the original tensor, signs included.
    pub fn ex_swap(&mut self, label_a: i32, label_b: i32) -> Result<()> {
        let pos_a = self
            .labels
            .iter()
            .position(|&l| l == label_a)
            .ok_or_else(|| SymTensorError::LabelError(format!("unknown label {label_a}")))?;
        let pos_b = self
            .labels
            .iter()
            .position(|&l| l == label_b)
            .ok_or_else(|| SymTensorError::LabelError(format!("unknown label {label_b}")))?;
        let mut new_labels = self.labels.clone();
        new_labels.swap(pos_a, pos_b);
        self.permute(&new_labels, self.row_bonds)?;
        self.add_gate(label_a, label_b)
    }
}

impl<Q: Qnum> Drop for SymTensor<Q> {
    fn drop(&mut self) {
        let freed: usize = self.blocks.values().map(|b| {
            let (r, c) = b.shape();
            r * c
        }).sum();
        profile::record_elem_free(freed);
    }
}

/// Clones `bonds`, forcing every direction to `In` (so a charge sum over
/// them is the plain, undirected sum of raw state charges). Used to derive
/// a tensor's row-sector and column-sector partitions, each of which is
/// internally homogeneous in direction already.
fn as_in<Q: Qnum>(bonds: &[Bond<Q>]) -> Vec<Bond<Q>> {
    bonds
        .iter()
        .map(|b| Bond::new(Direction::In, b.states().iter().map(|s| (s.qnum.clone(), s.degeneracy))))
        .collect()
}

fn state_and_offset<Q: Qnum>(bond: &Bond<Q>, mut local: usize) -> (usize, usize) {
    for (state_idx, state) in bond.states().iter().enumerate() {
        if local < state.degeneracy {
            return (state_idx, local);
        }
        local -= state.degeneracy;
    }
    unreachable!("dim index out of range for bond")
}

fn decompose_dim_index<Q: Qnum>(bonds: &[Bond<Q>], dim_index: usize) -> Vec<(usize, usize)> {
    let dims: Vec<usize> = bonds.iter().map(|b| b.dim()).collect();
    let per_dim = mixed_radix_decompose(&dims, dim_index);
    bonds.iter().zip(per_dim).map(|(b, i)| state_and_offset(b, i)).collect()
}

fn raw_charge<Q: Qnum>(bonds: &[Bond<Q>], state_indices: &[usize]) -> Q {
    let mut acc = Q::zero();
    for (bond, &si) in bonds.iter().zip(state_indices) {
        acc = acc.compose(&bond.states()[si].qnum);
    }
    acc
}

fn locate_in_sector<Q: Qnum>(bonds: &[Bond<Q>], sectors: &BTreeMap<Q, Sector>, dim_index: usize) -> Option<(Q, usize)> {
    let per_bond = decompose_dim_index(bonds, dim_index);
    let state_indices: Vec<usize> = per_bond.iter().map(|(s, _)| *s).collect();
    let charge = raw_charge(bonds, &state_indices);
    let sector = sectors.get(&charge)?;
    let combo = sector.combos.iter().find(|c| c.state_indices == state_indices)?;
    let mut sub_offset = 0usize;
    for (i, (state_idx, local)) in per_bond.iter().enumerate() {
        let deg = bonds[i].states()[*state_idx].degeneracy;
        sub_offset = sub_offset * deg + local;
    }
    Some((charge, combo.offset + sub_offset))
}

fn mixed_radix_decompose(dims: &[usize], mut flat: usize) -> Vec<usize> {
    let mut idx = vec![0usize; dims.len()];
    for i in (0..dims.len()).rev() {
        let d = dims[i].max(1);
        idx[i] = flat % d;
        flat /= d;
    }
    idx
}

fn mixed_radix_compose(dims: &[usize], idx: &[usize]) -> usize {
    let mut flat = 0usize;
    for i in 0..dims.len() {
        flat = flat * dims[i].max(1) + idx[i];
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use symtensor_core::U1;

    fn matrix_tensor(values: &[f64], rows_charges: Vec<(U1, usize)>, cols_charges: Vec<(U1, usize)>) -> SymTensor<U1> {
        let row_bond = Bond::new(Direction::In, rows_charges);
        let col_bond = Bond::new(Direction::Out, cols_charges);
        let mut t = SymTensor::new(vec![row_bond, col_bond], vec![1, 2], ScalarKind::Real, "t").unwrap();
        let elems: Vec<Complex64> = values.iter().map(|v| Complex64::new(*v, 0.0)).collect();
        t.set_raw_elem(&elems).unwrap();
        t
    }

    #[test]
    fn set_and_get_raw_elem_roundtrip() {
        let t = matrix_tensor(
            &[1.0, 0.0, 0.0, 0.0, 0.0, 2.0],
            vec![(U1::new(0), 1), (U1::new(1), 1)],
            vec![(U1::new(0), 1), (U1::new(1), 1), (U1::new(2), 1)],
        );
        let back = t.get_raw_elem();
        assert_eq!(back[0].re, 1.0);
        assert_eq!(back[5].re, 2.0);
    }

    #[test]
    fn set_raw_elem_rejects_symmetry_forbidden_nonzero() {
        let row_bond = Bond::new(Direction::In, vec![(U1::new(0), 1)]);
        let col_bond = Bond::new(Direction::Out, vec![(U1::new(1), 1)]);
        let mut t = SymTensor::new(vec![row_bond, col_bond], vec![1, 2], ScalarKind::Real, "t").unwrap();
        let err = t.set_raw_elem(&[Complex64::new(1.0, 0.0)]).unwrap_err();
        assert!(matches!(err, SymTensorError::SymmetryViolation { .. }));
    }

    #[test]
    fn permute_is_self_inverse() {
        let mut t = matrix_tensor(
            &[1.0, 2.0, 3.0, 4.0],
            vec![(U1::new(0), 1), (U1::new(1), 1)],
            vec![(U1::new(0), 1), (U1::new(1), 1)],
        );
        let original = t.get_raw_elem();
        t.permute(&[2, 1], 1).unwrap();
        t.permute(&[1, 2], 1).unwrap();
        assert_eq!(t.get_raw_elem(), original);
    }

    #[test]
    fn transpose_is_involution() {
        let mut t = matrix_tensor(
            &[1.0, 2.0, 3.0, 4.0],
            vec![(U1::new(0), 1), (U1::new(1), 1)],
            vec![(U1::new(0), 1), (U1::new(1), 1)],
        );
        let original_labels = t.labels().to_vec();
        t.transpose().unwrap();
        t.transpose().unwrap();
        assert_eq!(t.labels(), original_labels.as_slice());
    }

    #[test]
    fn combine_bond_permutes_non_contiguous_reversed_labels_first() {
        let b1 = Bond::new(Direction::In, vec![(U1::new(0), 2)]);
        let b2 = Bond::new(Direction::In, vec![(U1::new(0), 2)]);
        let b3 = Bond::new(Direction::Out, vec![(U1::new(0), 4)]);
        let mut t = SymTensor::new(vec![b1, b2, b3], vec![1, 2, 3], ScalarKind::Real, "t").unwrap();
        let elems: Vec<Complex64> = (0..16).map(|v| Complex64::new(v as f64, 0.0)).collect();
        t.set_raw_elem(&elems).unwrap();

        // labels [2, 1] are neither contiguous-ascending nor in position
        // order; combine_bond must permute them adjacent in listed order
        // before merging rather than erroring.
        t.combine_bond(&[2, 1]).unwrap();

        assert_eq!(t.labels(), &[2, 3]);
        assert_eq!(t.bonds()[0].dim(), 4);
        let out = t.get_raw_elem();
        // label1_idx=1, label2_idx=0, label3_idx=3
        assert_eq!(out[7].re, 11.0);
        // label1_idx=0, label2_idx=1, label3_idx=2
        assert_eq!(out[10].re, 6.0);
    }

    #[test]
    fn contract_matches_identity_block_multiply() {
        let a = matrix_tensor(
            &[1.0, 0.0, 0.0, 2.0],
            vec![(U1::new(0), 1), (U1::new(1), 1)],
            vec![(U1::new(0), 1), (U1::new(1), 1)],
        );
        let identity_row = Bond::new(Direction::In, vec![(U1::new(0), 1), (U1::new(1), 1)]);
        let identity_col = Bond::new(Direction::Out, vec![(U1::new(0), 1), (U1::new(1), 1)]);
        let mut identity = SymTensor::new(vec![identity_row, identity_col], vec![2, 3], ScalarKind::Real, "id").unwrap();
        identity
            .set_raw_elem(&[
                Complex64::new(1.0, 0.0),
                Complex64::new(0.0, 0.0),
                Complex64::new(0.0, 0.0),
                Complex64::new(1.0, 0.0),
            ])
            .unwrap();
        let result = a.contract(&identity).unwrap();
        assert_eq!(result.labels(), &[1, 3]);
        assert_eq!(result.get_raw_elem(), a.get_raw_elem());
    }

    #[test]
    fn partial_trace_sums_block_diagonals() {
        let row_bond = Bond::new(Direction::In, vec![(U1::new(0), 2)]);
        let col_bond = row_bond.reverse();
        let mut t = SymTensor::new(vec![row_bond, col_bond], vec![1, 2], ScalarKind::Real, "t").unwrap();
        t.set_raw_elem(&[
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(3.0, 0.0),
        ])
        .unwrap();
        let traced = t.partial_trace(1, 2).unwrap();
        assert_eq!(traced.full_dim(), 1);
        assert_eq!(traced.get_raw_elem()[0].re, 4.0);
    }

    #[test]
    fn hosvd_of_rank_three_tensor_returns_one_factor_per_mode() {
        let bonds: Vec<Bond<U1>> = (0..3)
            .map(|i| {
                let dir = if i == 0 { Direction::In } else { Direction::Out };
                Bond::new(dir, vec![(U1::new(0), 4)])
            })
            .collect();
        let mut t = SymTensor::new(bonds, vec![1, 2, 3], ScalarKind::Real, "t").unwrap();
        let elems: Vec<Complex64> = (0..64).map(|v| Complex64::new(v as f64, 0.0)).collect();
        t.set_raw_elem(&elems).unwrap();

        let (factors, core, singulars) = t.hosvd(3, 0, true).unwrap();
        assert_eq!(factors.len(), 3);
        for (m, factor) in factors.iter().enumerate() {
            assert_eq!(factor.labels()[0], t.labels()[m]);
            assert_eq!(factor.bonds()[0].dim(), 4);
        }
        assert_eq!(core.labels().len(), 3);
        assert_eq!(singulars.unwrap().len(), 3);

        let (_, _, no_singulars) = t.hosvd(3, 0, false).unwrap();
        assert!(no_singulars.is_none());
    }

    #[test]
    fn hosvd_rejects_indivisible_mode_count() {
        let bonds: Vec<Bond<U1>> = (0..3)
            .map(|i| {
                let dir = if i == 0 { Direction::In } else { Direction::Out };
                Bond::new(dir, vec![(U1::new(0), 2)])
            })
            .collect();
        let mut t = SymTensor::new(bonds, vec![1, 2, 3], ScalarKind::Real, "t").unwrap();
        t.set_raw_elem(&vec![Complex64::new(0.0, 0.0); 8]).unwrap();
        assert!(t.hosvd(2, 0, false).is_err());
    }

    #[test]
    fn ex_swap_twice_restores_original() {
        let a = Bond::new(Direction::In, vec![(symtensor_core::U1::fermionic(1), 1)]);
        let b = Bond::new(Direction::Out, vec![(symtensor_core::U1::fermionic(1), 1)]);
        let mut t = SymTensor::new(vec![a, b], vec![1, 2], ScalarKind::Real, "t").unwrap();
        t.set_raw_elem(&[Complex64::new(5.0, 0.0)]).unwrap();
        let original = t.get_raw_elem();
        t.ex_swap(1, 2).unwrap();
        t.ex_swap(1, 2).unwrap();
        assert_eq!(t.get_raw_elem(), original);
    }
}
