//! Optional per-node audit record of one evaluation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::value::Value;

/// What one node produced during a traced evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    /// The computed value; decimals serialize as exact text.
    pub value: Option<Value>,
    /// The node's type tag (e.g. "LOOKUP").
    pub node_type: &'static str,
    /// Node names from the evaluation root down to this node.
    pub dependency_path: Vec<String>,
}

/// A record of every node evaluated during one call, keyed by node name.
///
/// Ordered by name so exports are stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Trace {
    entries: BTreeMap<String, TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(
        &mut self,
        name: &str,
        value: Option<Value>,
        node_type: &'static str,
        dependency_path: Vec<String>,
    ) {
        self.entries.insert(
            name.to_owned(),
            TraceEntry {
                value,
                node_type,
                dependency_path,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&TraceEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TraceEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the trace for export to audit tooling.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
