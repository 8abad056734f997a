//! Shared primitives for the symtensor workspace: the `Qnum` contract with
//! two concrete charges, and the error type propagated by every fallible
//! operation above this crate.

pub mod error;
pub mod qnum;

pub use error::{Result, SymTensorError};
pub use qnum::{Qnum, U1, Z2};
