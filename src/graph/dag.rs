//! The compiled tariff graph: an immutable name-to-node map.
//!
//! Nodes reference each other by name, so the logical DAG can express
//! diamond dependencies without ownership cycles. `build` runs a DFS
//! topological check so a cyclic definition is rejected up front instead of
//! recursing without bound at evaluation time. Dangling dependency names are
//! deliberately NOT rejected here; they surface as `UnknownNode` during
//! evaluation, matching the loader contract.

use std::collections::HashMap;

use crate::error::EvalError;
use crate::graph::node::Node;
use crate::metadata::TariffMetadata;

#[derive(Debug, Clone)]
pub struct TariffGraph {
    nodes: HashMap<String, Node>,
    metadata: Option<TariffMetadata>,
}

impl TariffGraph {
    /// Builds a graph from an externally-validated node collection.
    ///
    /// Rejects duplicate names, per-node configuration errors and dependency
    /// cycles among the supplied nodes.
    pub fn build(nodes: Vec<Node>) -> Result<Self, EvalError> {
        let mut map = HashMap::with_capacity(nodes.len());
        for node in nodes {
            node.validate()?;
            let name = node.name().to_owned();
            if map.insert(name.clone(), node).is_some() {
                return Err(EvalError::InvalidConfiguration(format!(
                    "duplicate node name '{name}'"
                )));
            }
        }
        let graph = Self {
            nodes: map,
            metadata: None,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    pub fn with_metadata(mut self, metadata: TariffMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metadata(&self) -> Option<&TariffMetadata> {
        self.metadata.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// A sorted, truncated name list for "unknown target" diagnostics.
    pub(crate) fn known_names(&self, limit: usize) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.keys().cloned().collect();
        names.sort();
        names.truncate(limit);
        names
    }

    /// Three-color DFS over the name graph. Dependencies on names absent
    /// from the map are skipped; those fail later as `UnknownNode`.
    fn check_acyclic(&self) -> Result<(), EvalError> {
        let mut state: HashMap<&str, VisitState> = HashMap::with_capacity(self.nodes.len());
        for name in self.nodes.keys() {
            if !state.contains_key(name.as_str()) {
                self.visit(name, &mut state)?;
            }
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        state: &mut HashMap<&'a str, VisitState>,
    ) -> Result<(), EvalError> {
        match state.get(name) {
            Some(VisitState::Visited) => return Ok(()),
            Some(VisitState::Visiting) => {
                return Err(EvalError::CycleDetected(name.to_owned()));
            }
            None => {
                state.insert(name, VisitState::Visiting);
            }
        }

        if let Some(node) = self.nodes.get(name) {
            for dep in node.dependencies() {
                if let Some((dep_key, _)) = self.nodes.get_key_value(dep) {
                    self.visit(dep_key, state)?;
                }
            }
        }

        state.insert(name, VisitState::Visited);
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}
