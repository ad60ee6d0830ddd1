//! Repository tree model, construction from listings, and presence diffing.

pub mod builder;
pub mod diff;
pub mod node;

pub use builder::TreeBuilder;
pub use diff::diff;
pub use node::{ContentHandle, DiffNode, FileDescriptor, Node, TreeNode};
