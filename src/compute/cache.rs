//! Per-call memoization of node values.

use std::collections::HashMap;

use crate::value::Value;

/// Values already computed during one evaluation call.
///
/// Created fresh per call and discarded afterwards; never shared across
/// contexts, so batch rows cannot leak values into each other. The entry for
/// a node may itself be `None` (a computed null), which is distinct from the
/// node not having been evaluated yet.
#[derive(Debug, Default)]
pub struct EvaluationCache {
    values: HashMap<String, Option<Value>>,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Option<Value>> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: String, value: Option<Value>) {
        self.values.insert(name, value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
