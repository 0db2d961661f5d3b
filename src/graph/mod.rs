//! Core data structures of the pricing graph.

pub mod dag;
pub mod node;

pub use dag::TariffGraph;
pub use node::{InputType, Node};
