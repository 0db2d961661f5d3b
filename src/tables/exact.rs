//! Discrete-key lookup table with an optional sentinel default.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::EvalError;
use crate::value::Value;

/// Reserved key tried when no exact match exists.
pub const DEFAULT_KEY: &str = "__DEFAULT__";

/// The declared type of a table's keys. Incoming lookup keys are coerced to
/// this type before matching, so a context value `"5"` finds an integer row
/// `5` in a zone table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Text,
    Integer,
    Number,
}

/// A mapping from discrete keys to decimal values.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactMatchTable {
    mapping: HashMap<Value, Decimal>,
    key_type: KeyType,
}

impl ExactMatchTable {
    pub fn new(mapping: HashMap<Value, Decimal>, key_type: KeyType) -> Self {
        Self { mapping, key_type }
    }

    /// Convenience constructor for string-keyed tables.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Decimal)>,
        K: Into<String>,
    {
        let mapping = pairs
            .into_iter()
            .map(|(k, v)| (Value::Text(k.into()), v))
            .collect();
        Self::new(mapping, KeyType::Text)
    }

    /// Resolves `key`, trying the exact row first and the sentinel default
    /// second. A null key goes straight to the default.
    pub fn lookup(&self, key: Option<&Value>) -> Result<Decimal, EvalError> {
        let Some(key) = key else {
            return self.default().ok_or(EvalError::NullKey);
        };

        let coerced = self.coerce(key)?;
        if let Some(value) = self.mapping.get(&coerced) {
            return Ok(*value);
        }
        self.default()
            .ok_or_else(|| EvalError::NoMatchingKey(key.to_string()))
    }

    fn default(&self) -> Option<Decimal> {
        self.mapping.get(&Value::Text(DEFAULT_KEY.to_owned())).copied()
    }

    fn coerce(&self, key: &Value) -> Result<Value, EvalError> {
        match self.key_type {
            KeyType::Text => Ok(Value::Text(key.to_string())),
            KeyType::Number => match key {
                Value::Number(d) => Ok(Value::Number(*d)),
                Value::Text(s) => Value::parse_number(s).map(Value::Number),
            },
            KeyType::Integer => {
                let d = match key {
                    Value::Number(d) => *d,
                    Value::Text(s) => Value::parse_number(s)?,
                };
                if d.fract().is_zero() {
                    Ok(Value::Number(d.trunc()))
                } else {
                    Err(EvalError::InvalidNumber(d.to_string()))
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}
