//! Evaluation engine for declaratively-defined insurance pricing formulas.
//!
//! A tariff compiles (via an external loader) into a [`TariffGraph`]: a DAG
//! of named nodes over a closed variant set (constants, inputs, table
//! lookups, arithmetic reductions, conditionals, rounding). The
//! [`Evaluator`] walks the graph bottom-up against a per-call context,
//! memoizing each node so diamond dependencies cost linear work, and returns
//! either an exact decimal result, a full audit [`Trace`], or a structured
//! [`EvalError`] carrying the dependency path that failed.
//!
//! ```
//! use rating_core::{Evaluator, Node, TariffGraph, Value};
//! use rust_decimal_macros::dec;
//!
//! let graph = TariffGraph::build(vec![
//!     Node::constant("base_premium", dec!(500)),
//!     Node::constant("fee", dec!(25)),
//!     Node::add("total", vec!["base_premium".into(), "fee".into()]),
//! ])
//! .unwrap();
//!
//! let result = Evaluator::new(&graph)
//!     .evaluate("total", &Default::default())
//!     .unwrap();
//! assert_eq!(result, Some(Value::Number(dec!(525))));
//! ```

pub mod compute;
pub mod error;
pub mod graph;
pub mod metadata;
pub mod profiler;
pub mod tables;
pub mod value;

pub use compute::{EvaluationCache, Evaluator, Trace, TraceEntry};
pub use error::EvalError;
pub use graph::{InputType, Node, TariffGraph};
pub use metadata::{ChangelogEntry, TariffMetadata};
pub use profiler::{NoopProfiler, PerformanceProfiler, ProfileReport, Profiler};
pub use tables::{ExactMatchTable, KeyType, RangeRow, RangeTable, Table, DEFAULT_KEY};
pub use value::{ComparisonOp, EvaluationContext, RoundingMode, Value};

pub use rust_decimal::Decimal;
