//! Contraction-tree construction/execution (`Node`, `Network`) and the
//! text network-spec format that builds a `Network` from named tensors.

pub mod network;
pub mod node;
pub mod parser;

pub use network::{Network, NetworkStatus};
pub use node::{Node, NodeId, NodeKind};
pub use parser::{parse, NetworkSpec, TensorSpec};
