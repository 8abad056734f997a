//! The `Qnum` contract and two concrete abelian charges.
//!
//! The specification treats `Qnum` as an external collaborator: a value type
//! with equality, a strict total order (so it can key a `BTreeMap`), pairwise
//! addition (bond-state composition), and unary negation (direction
//! reversal). `U1` and `Z2` are the two concrete charges a real symmetric
//! tensor user reaches for first; both additionally report whether a state
//! carries a fermion line, which `SymTensor::exSwap`/`addGate` consult.

use std::fmt::Debug;

/// An abelian conserved charge.
///
/// Implementors must provide a strict total order so a `Qnum` can be used as
/// a `BTreeMap` key for block lookup, and the order must be consistent with
/// `Eq` (uni10's own `Qnum` is ordered primarily by its `U1` component, then
/// by parity).
pub trait Qnum: Clone + Eq + Ord + Debug + Send + Sync + 'static {
    /// The additive identity (the charge of a bond with no constituent
    /// states, and the starting accumulator for a multi-state sum).
    fn zero() -> Self;

    /// Compose two charges (summing the charges of two bond states that are
    /// combined, e.g. by `Bond::combine` or a row/column multi-index fold).
    fn compose(&self, other: &Self) -> Self;

    /// The additive inverse, used when a bond's direction is reversed.
    fn negate(&self) -> Self;

    /// Whether a state carrying this charge represents a fermionic
    /// (odd-parity) line. Used only by the fermionic-swap machinery.
    fn is_fermionic(&self) -> bool;

    /// Appends this charge's wire representation to `out`, for the binary
    /// `SymTensor` format's `Qnum bytes` fields.
    fn write_bytes(&self, out: &mut Vec<u8>);

    /// Consumes this charge's wire representation from the front of
    /// `input`, advancing the cursor past it.
    fn read_bytes(input: &mut &[u8]) -> Self;
}

/// A U(1) charge: a single signed integer (e.g. particle number).
///
/// Bosonic by default; `U1::fermionic` tags odd charges as carrying a
/// fermion line, mirroring uni10's separate `PRTF` (fermion parity) field
/// without introducing a third general-purpose parity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct U1 {
    charge: i64,
    fermionic: bool,
}

impl U1 {
    /// A bosonic U(1) charge.
    pub fn new(charge: i64) -> Self {
        Self {
            charge,
            fermionic: false,
        }
    }

    /// A U(1) charge whose fermion parity is the parity of `charge`.
    pub fn fermionic(charge: i64) -> Self {
        Self {
            charge,
            fermionic: charge.rem_euclid(2) != 0,
        }
    }

    pub fn charge(&self) -> i64 {
        self.charge
    }
}

impl Qnum for U1 {
    fn zero() -> Self {
        Self::new(0)
    }

    fn compose(&self, other: &Self) -> Self {
        Self {
            charge: self.charge + other.charge,
            fermionic: self.fermionic ^ other.fermionic,
        }
    }

    fn negate(&self) -> Self {
        Self {
            charge: -self.charge,
            fermionic: self.fermionic,
        }
    }

    fn is_fermionic(&self) -> bool {
        self.fermionic
    }

    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.charge.to_le_bytes());
        out.push(self.fermionic as u8);
    }

    fn read_bytes(input: &mut &[u8]) -> Self {
        let (charge_bytes, rest) = input.split_at(8);
        let (flag_byte, rest) = rest.split_at(1);
        *input = rest;
        Self {
            charge: i64::from_le_bytes(charge_bytes.try_into().unwrap()),
            fermionic: flag_byte[0] != 0,
        }
    }
}

/// A Z2 (mod-2) parity charge in `{0, 1}`.
///
/// The charge value doubles as the fermion-parity flag: a `Z2` state with
/// charge 1 is a fermion line, charge 0 is bosonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Z2 {
    parity: u8,
}

impl Z2 {
    pub fn new(parity: u8) -> Self {
        Self { parity: parity & 1 }
    }

    pub fn parity(&self) -> u8 {
        self.parity
    }
}

impl Qnum for Z2 {
    fn zero() -> Self {
        Self::new(0)
    }

    fn compose(&self, other: &Self) -> Self {
        Self::new(self.parity ^ other.parity)
    }

    fn negate(&self) -> Self {
        // Z2 is its own inverse under XOR.
        *self
    }

    fn is_fermionic(&self) -> bool {
        self.parity == 1
    }

    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.push(self.parity);
    }

    fn read_bytes(input: &mut &[u8]) -> Self {
        let (byte, rest) = input.split_at(1);
        *input = rest;
        Self::new(byte[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u1_compose_and_negate() {
        let a = U1::new(2);
        let b = U1::new(-3);
        assert_eq!(a.compose(&b).charge(), -1);
        assert_eq!(a.negate().charge(), -2);
        assert_eq!(U1::zero().charge(), 0);
    }

    #[test]
    fn u1_fermionic_tagging() {
        assert!(!U1::fermionic(2).is_fermionic());
        assert!(U1::fermionic(3).is_fermionic());
        assert!(!U1::new(3).is_fermionic());
    }

    #[test]
    fn z2_compose_is_xor() {
        let a = Z2::new(1);
        let b = Z2::new(1);
        assert_eq!(a.compose(&b), Z2::new(0));
        assert_eq!(a.negate(), a);
        assert!(Z2::new(1).is_fermionic());
        assert!(!Z2::new(0).is_fermionic());
    }

    #[test]
    fn total_order_is_consistent_with_eq() {
        let mut charges = vec![U1::new(3), U1::new(-1), U1::new(0)];
        charges.sort();
        assert_eq!(
            charges,
            vec![U1::new(-1), U1::new(0), U1::new(3)]
        );
    }
}
