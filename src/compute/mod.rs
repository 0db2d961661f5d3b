//! Executes the pricing graph.

pub mod cache;
pub mod engine;
pub mod trace;

pub use cache::EvaluationCache;
pub use engine::Evaluator;
pub use trace::{Trace, TraceEntry};
