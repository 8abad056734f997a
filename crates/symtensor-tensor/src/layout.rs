//! Block-charge partitioning: turning a list of `Bond`s into the set of
//! charge sectors a `SymTensor` actually stores, plus the row/column
//! offset maps used to unfold a sector into the flat matrix a `Block`
//! holds.
//!
//! Grounded on the specification's "Auxiliary maps" (§3) and the
//! `unfold_split` helper `tensor4all-linalg::svd` uses to turn a
//! dynamic-rank tensor into the 2-D shape SVD/QR need.

use std::collections::BTreeMap;

use symtensor_core::Qnum;

use crate::bond::{Bond, Direction};

/// One concrete combination of per-bond state indices that composes to a
/// particular total charge, together with its offset inside that
/// charge's flattened (row or column) index range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combo {
    /// Index into `bond.states()` for each bond in the group, in bond order.
    pub state_indices: Vec<usize>,
    /// Offset of this combo's first element within the charge sector.
    pub offset: usize,
    /// Number of flat elements this combo contributes (product of the
    /// chosen states' degeneracies).
    pub degeneracy: usize,
}

/// All combos that compose to one particular total charge, plus the
/// sector's total flat dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub combos: Vec<Combo>,
    pub dim: usize,
}

/// Directed composed charge of a bond group: `In` bonds contribute their
/// state's charge, `Out` bonds contribute its negation, and the result is
/// the `Qnum::compose` of all of them in bond order.
fn directed_charge<Q: Qnum>(bonds: &[Bond<Q>], state_indices: &[usize]) -> Q {
    let mut acc = Q::zero();
    for (bond, &state_idx) in bonds.iter().zip(state_indices) {
        let raw = bond.states()[state_idx].qnum.clone();
        let signed = match bond.direction() {
            Direction::In => raw,
            Direction::Out => raw.negate(),
        };
        acc = acc.compose(&signed);
    }
    acc
}

/// Partitions the Cartesian product of `bonds`' states by directed total
/// charge, assigning each charge sector a contiguous, deterministically
/// ordered offset range.
///
/// Iteration order is row-major over bond state indices (innermost bond
/// varies fastest), which is this crate's own internal convention, not an
/// externally specified byte layout — `symtensor-io`'s binary format only
/// fixes the order blocks themselves are written in (ascending `Qnum`),
/// not the layout within a block.
pub fn partition_by_charge<Q: Qnum>(bonds: &[Bond<Q>]) -> BTreeMap<Q, Sector> {
    let mut raw: BTreeMap<Q, Vec<(Vec<usize>, usize)>> = BTreeMap::new();

    if bonds.is_empty() {
        raw.entry(Q::zero()).or_default().push((Vec::new(), 1));
    } else {
        let mut indices = vec![0usize; bonds.len()];
        loop {
            let degeneracy: usize = bonds
                .iter()
                .zip(indices.iter())
                .map(|(b, &i)| b.states()[i].degeneracy)
                .product();
            let charge = directed_charge(bonds, &indices);
            raw.entry(charge).or_default().push((indices.clone(), degeneracy));

            // Odometer increment, innermost (last) bond fastest.
            let mut pos = bonds.len();
            loop {
                if pos == 0 {
                    return finalize(raw);
                }
                pos -= 1;
                indices[pos] += 1;
                if indices[pos] < bonds[pos].num_states() {
                    break;
                }
                indices[pos] = 0;
                if pos == 0 {
                    return finalize(raw);
                }
            }
        }
    }

    finalize(raw)
}

fn finalize<Q: Qnum>(raw: BTreeMap<Q, Vec<(Vec<usize>, usize)>>) -> BTreeMap<Q, Sector> {
    raw.into_iter()
        .map(|(charge, combos_raw)| {
            let mut offset = 0usize;
            let combos = combos_raw
                .into_iter()
                .map(|(state_indices, degeneracy)| {
                    let combo = Combo {
                        state_indices,
                        offset,
                        degeneracy,
                    };
                    offset += degeneracy;
                    combo
                })
                .collect();
            (charge, Sector { combos, dim: offset })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use symtensor_core::U1;

    #[test]
    fn single_bond_partitions_one_sector_per_state() {
        let bonds = vec![Bond::new(
            Direction::In,
            vec![(U1::new(0), 2), (U1::new(1), 3)],
        )];
        let sectors = partition_by_charge(&bonds);
        assert_eq!(sectors.len(), 2);
        assert_eq!(sectors[&U1::new(0)].dim, 2);
        assert_eq!(sectors[&U1::new(1)].dim, 3);
    }

    #[test]
    fn two_bonds_merge_combos_with_same_total_charge() {
        let a = Bond::new(Direction::In, vec![(U1::new(0), 1), (U1::new(1), 1)]);
        let b = Bond::new(Direction::In, vec![(U1::new(0), 1), (U1::new(-1), 1)]);
        let sectors = partition_by_charge(&[a, b]);
        // charge 0 sectors: (0,0) and (1,-1)
        let sector = &sectors[&U1::new(0)];
        assert_eq!(sector.combos.len(), 2);
        assert_eq!(sector.dim, 2);
    }

    #[test]
    fn out_bond_negates_charge_contribution() {
        let a = Bond::new(Direction::In, vec![(U1::new(1), 1)]);
        let b = Bond::new(Direction::Out, vec![(U1::new(1), 1)]);
        let sectors = partition_by_charge(&[a, b]);
        // 1 + (-1) = 0
        assert!(sectors.contains_key(&U1::new(0)));
        assert_eq!(sectors.len(), 1);
    }

    #[test]
    fn empty_bond_list_has_single_zero_charge_sector_of_dim_one() {
        let sectors: BTreeMap<U1, Sector> = partition_by_charge::<U1>(&[]);
        assert_eq!(sectors.len(), 1);
        assert_eq!(sectors[&U1::zero()].dim, 1);
    }
}
