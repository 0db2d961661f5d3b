//! Structured evaluation errors.
//!
//! Every failure raised while walking a pricing graph is enriched exactly
//! once with the name of the node where it surfaced and the full dependency
//! path from the evaluation root (`EvalError::Node`). The top-level entry
//! point additionally attaches a snapshot of the offending context, so a
//! production pricing discrepancy can be diagnosed without re-running the
//! evaluation with tracing enabled.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::value::EvaluationContext;

/// How many context entries are echoed into a top-level error message.
const CONTEXT_SNAPSHOT_LIMIT: usize = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A leaf input node's required context key is absent.
    #[error("missing input variable '{0}'")]
    MissingInput(String),

    /// A dependency referenced a node name that is not present in the graph.
    #[error("unknown node '{name}' (path: {})", fmt_path(.path))]
    UnknownNode { name: String, path: Vec<String> },

    /// The requested evaluation target does not exist. Carries a truncated
    /// list of known node names for diagnostics.
    #[error("target node '{name}' not found in graph (known nodes: {})", .known.join(", "))]
    UnknownTarget { name: String, known: Vec<String> },

    /// A range-table lookup fell outside every range and no default exists.
    #[error("value {0} outside all ranges and no default defined")]
    OutOfRange(Decimal),

    /// An exact-match lookup found no row and no default exists.
    #[error("no matching row for key '{0}' and no default defined")]
    NoMatchingKey(String),

    /// A table lookup received a null key and no default exists.
    #[error("missing lookup key and no default defined")]
    NullKey,

    /// A node that cannot tolerate a null operand received one.
    #[error("node '{node}' cannot operate on null from '{dependency}'")]
    NullOperand { node: String, dependency: String },

    /// A numeric operation received a text value.
    #[error("node '{node}' expected a number from '{dependency}', got text")]
    NonNumericOperand { node: String, dependency: String },

    /// A switch node found no matching case and has no default.
    #[error("switch node '{node}': no case matches '{value}' and no default defined")]
    NoMatchingCase { node: String, value: String },

    /// Arithmetic exceeded the representable decimal range.
    #[error("arithmetic overflow in node '{0}'")]
    Overflow(String),

    /// A numeric literal could not be parsed as an exact decimal.
    #[error("invalid numeric value '{0}'")]
    InvalidNumber(String),

    /// Construction-time rejection of an impossible node configuration.
    #[error("invalid node configuration: {0}")]
    InvalidConfiguration(String),

    /// The node collection contains a dependency cycle.
    #[error("cycle detected involving node '{0}'")]
    CycleDetected(String),

    /// The enrichment wrapper. Applied once, at the node where the
    /// underlying error was raised; outer frames propagate it unchanged.
    #[error("evaluation of node '{node}' failed (path: {}{})", fmt_path(.path), fmt_context(.context))]
    Node {
        node: String,
        path: Vec<String>,
        /// Snapshot of the triggering context, set at the top level only.
        context: Option<String>,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    /// Wraps `self` with the originating node's name and dependency path,
    /// unless it is already enriched (avoids double-wrapping).
    pub(crate) fn enrich(self, node: &str, path: &[String]) -> Self {
        match self {
            wrapped @ EvalError::Node { .. } => wrapped,
            inner => EvalError::Node {
                node: node.to_owned(),
                path: path.to_vec(),
                context: None,
                source: Box::new(inner),
            },
        }
    }

    /// Attaches a context snapshot to an enriched error. Called once, by the
    /// top-level evaluation entry point.
    pub(crate) fn with_context(self, ctx: &EvaluationContext) -> Self {
        match self {
            EvalError::Node {
                node,
                path,
                context: None,
                source,
            } => EvalError::Node {
                node,
                path,
                context: Some(summarize_context(ctx)),
                source,
            },
            other => other,
        }
    }

    /// Walks the source chain down to the error that started the failure.
    pub fn root_cause(&self) -> &EvalError {
        let mut current = self;
        while let EvalError::Node { source, .. } = current {
            current = source;
        }
        current
    }
}

fn fmt_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_owned()
    } else {
        path.join(" -> ")
    }
}

fn fmt_context(context: &Option<String>) -> String {
    match context {
        Some(ctx) => format!("; context: {{{ctx}}}"),
        None => String::new(),
    }
}

fn summarize_context(ctx: &EvaluationContext) -> String {
    let mut keys: Vec<&String> = ctx.keys().collect();
    keys.sort();
    let mut parts: Vec<String> = keys
        .iter()
        .take(CONTEXT_SNAPSHOT_LIMIT)
        .map(|k| match &ctx[*k] {
            Some(v) => format!("{k}={v}"),
            None => format!("{k}=null"),
        })
        .collect();
    if keys.len() > CONTEXT_SNAPSHOT_LIMIT {
        parts.push("...".to_owned());
    }
    parts.join(", ")
}
