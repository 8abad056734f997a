//! Symmetry-adapted tensor networks, re-exported as a single crate.
//!
//! `symtensor-core` (charges and the shared error type), `symtensor-tensor`
//! (`Bond`/`Block`/`SymTensor`), `symtensor-linalg` (SVD/QR), and
//! `symtensor-network` (`Node`/`Network` and the text spec parser) each
//! stay independently publishable; this crate is the single dependency
//! most callers want.

pub use symtensor_core::{Qnum, Result, SymTensorError, U1, Z2};

pub use symtensor_tensor::{status, Block, Bond, BondState, Direction, ScalarKind, SymTensor};

pub use symtensor_linalg::{qr_c64, qr_f64, svd_c64, svd_f64, LinalgError, Qr, QrError, Svd, SvdError};

pub use symtensor_network::{parse, Network, NetworkSpec, NetworkStatus, Node, NodeId, NodeKind, TensorSpec};

pub use symtensor_io::{load, print_diagram, print_raw_elem, profile, save, BinaryError};
