//! Shared error type for the symtensor workspace.
//!
//! One variant per error kind named in the specification's error-handling
//! design (§7), following the `thiserror`-derived, data-carrying style of
//! the teacher crate's `SvdError`/`QrError`.

use thiserror::Error;

/// Errors raised by `symtensor-tensor` and `symtensor-linalg` operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SymTensorError {
    #[error("bond mismatch contracting labels {label_a} and {label_b}: {reason}")]
    BondMismatch {
        label_a: i32,
        label_b: i32,
        reason: String,
    },

    #[error("shape mismatch in putBlock: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("label error: {0}")]
    LabelError(String),

    #[error("symmetry violation: non-zero element at charge-forbidden position (label={label:?}, magnitude={magnitude})")]
    SymmetryViolation { label: Vec<i32>, magnitude: f64 },

    #[error("operation attempted on an unbound tensor: {0}")]
    UnboundTensor(String),

    #[error("scalar kind mismatch: {0}")]
    ScalarKindMismatch(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("dense kernel failure: {0}")]
    LinalgFailure(String),
}

pub type Result<T> = std::result::Result<T, SymTensorError>;
