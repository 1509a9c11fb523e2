/// Builder collecting words and driving minimization and layout.
pub mod builder;
/// DAWG minimization by signature interning.
pub mod minimize;
/// Construction-time node and children types.
pub mod node;

pub use builder::{Builder, IntoWord};
pub use minimize::Dawg;
pub use node::{BuildNode, Children, NodeId};
