//! `Bond`: a tensor index carrying a direction and an ordered list of
//! `(Qnum, multiplicity)` states.
//!
//! States are kept sorted by charge and merged on construction, the same
//! sorted-insert idiom the teacher crate uses to keep its tag sets
//! canonical (`tensor4all-core::tagset`'s `_add_tag_ordered`), applied here
//! to charge states instead of tags.

use symtensor_core::Qnum;

/// The direction a bond's indices flow: `In` contributes its charge,
/// `Out` contributes the negated charge, when a tensor's total charge is
/// computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }
}

/// One `(charge, multiplicity)` state of a bond, sorted into place at
/// construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondState<Q: Qnum> {
    pub qnum: Q,
    pub degeneracy: usize,
}

/// A single index of a `SymTensor`.
///
/// `states` is always sorted ascending by `Qnum` and contains at most one
/// entry per distinct charge: duplicate charges passed to [`Bond::new`] are
/// merged by summing their degeneracies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bond<Q: Qnum> {
    direction: Direction,
    states: Vec<BondState<Q>>,
}

impl<Q: Qnum> Bond<Q> {
    /// Builds a bond from a (possibly unsorted, possibly duplicate-keyed)
    /// list of `(Qnum, degeneracy)` pairs.
    pub fn new(direction: Direction, states: impl IntoIterator<Item = (Q, usize)>) -> Self {
        let mut merged: Vec<BondState<Q>> = Vec::new();
        for (qnum, degeneracy) in states {
            if degeneracy == 0 {
                continue;
            }
            match merged.binary_search_by(|s| s.qnum.cmp(&qnum)) {
                Ok(idx) => merged[idx].degeneracy += degeneracy,
                Err(idx) => merged.insert(idx, BondState { qnum, degeneracy }),
            }
        }
        Self {
            direction,
            states: merged,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn states(&self) -> &[BondState<Q>] {
        &self.states
    }

    /// Total dimension of the bond (sum of all state degeneracies).
    pub fn dim(&self) -> usize {
        self.states.iter().map(|s| s.degeneracy).sum()
    }

    /// Number of distinct charge sectors.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// The degeneracy of a given charge, or 0 if the bond does not carry it.
    pub fn degeneracy(&self, qnum: &Q) -> usize {
        self.states
            .binary_search_by(|s| s.qnum.cmp(qnum))
            .map(|idx| self.states[idx].degeneracy)
            .unwrap_or(0)
    }

    /// A bond with the same states but the opposite direction and every
    /// charge negated, used when reversing an index (e.g. transpose of a
    /// bra/ket pair).
    pub fn reverse(&self) -> Self {
        let states = self
            .states
            .iter()
            .map(|s| (s.qnum.negate(), s.degeneracy))
            .collect::<Vec<_>>();
        Self::new(self.direction.flip(), states)
    }

    /// A bond whose states are the pairwise composition (`Qnum::compose`)
    /// of every state of `self` with every state of `other`, the
    /// multi-index fold used by `SymTensor::combineBond`.
    pub fn combine(&self, other: &Bond<Q>) -> Self {
        let mut states = Vec::with_capacity(self.states.len() * other.states.len());
        for a in &self.states {
            for b in &other.states {
                states.push((a.qnum.compose(&b.qnum), a.degeneracy * b.degeneracy));
            }
        }
        Self::new(self.direction, states)
    }

    /// Whether two bonds can be contracted against each other: opposite
    /// direction, and identical charge/degeneracy structure once one side's
    /// charges are negated back (the canonical dual of a bond built via
    /// `reverse()` carries negated charges, not identical ones — negation
    /// can also reorder states, so states are matched by negated charge via
    /// lookup rather than by position).
    pub fn contractible_with(&self, other: &Bond<Q>) -> bool {
        if self.direction == other.direction || self.states.len() != other.states.len() {
            return false;
        }
        self.states
            .iter()
            .all(|s| other.degeneracy(&s.qnum.negate()) == s.degeneracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symtensor_core::U1;

    #[test]
    fn new_sorts_and_merges_duplicate_charges() {
        let bond = Bond::new(
            Direction::In,
            vec![(U1::new(1), 2), (U1::new(-1), 3), (U1::new(1), 1)],
        );
        assert_eq!(bond.states().len(), 2);
        assert_eq!(bond.degeneracy(&U1::new(1)), 3);
        assert_eq!(bond.degeneracy(&U1::new(-1)), 3);
        assert_eq!(bond.dim(), 6);
    }

    #[test]
    fn reverse_flips_direction_and_negates_charge() {
        let bond = Bond::new(Direction::In, vec![(U1::new(1), 2), (U1::new(-1), 3)]);
        let reversed = bond.reverse();
        assert_eq!(reversed.direction(), Direction::Out);
        assert_eq!(reversed.degeneracy(&U1::new(-1)), 2);
        assert_eq!(reversed.degeneracy(&U1::new(1)), 3);
    }

    #[test]
    fn combine_composes_charges_and_multiplies_degeneracy() {
        let a = Bond::new(Direction::In, vec![(U1::new(1), 2)]);
        let b = Bond::new(Direction::In, vec![(U1::new(2), 3)]);
        let combined = a.combine(&b);
        assert_eq!(combined.degeneracy(&U1::new(3)), 6);
    }

    #[test]
    fn contractible_with_requires_opposite_direction_and_equal_states() {
        let a = Bond::new(Direction::In, vec![(U1::new(1), 2)]);
        let b = a.reverse();
        assert!(a.contractible_with(&b));
        assert!(!a.contractible_with(&a));
    }
}
