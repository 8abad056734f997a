//! Bonds, dense charge-sector blocks, and the `SymTensor` type built from
//! them.

pub mod block;
pub mod bond;
pub mod layout;
pub mod profile;
pub mod symtensor;

pub use block::{Block, ScalarKind};
pub use bond::{Bond, BondState, Direction};
pub use symtensor::{status, SymTensor};
