//! Lookup tables consumed by `Lookup` nodes.
//!
//! Tables are built once by an external loader and shared read-only across
//! every evaluation. The core only sees the already-typed structures.

pub mod exact;
pub mod range;

pub use exact::{ExactMatchTable, KeyType, DEFAULT_KEY};
pub use range::{RangeRow, RangeTable};

use rust_decimal::Decimal;

use crate::error::EvalError;
use crate::value::Value;

/// Either table kind behind one lookup entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    Range(RangeTable),
    Exact(ExactMatchTable),
}

impl Table {
    /// Resolves `key` against the table. A `None` key follows the table's
    /// default policy; a missing match fails with the table's error kind.
    pub fn lookup(&self, key: Option<&Value>) -> Result<Decimal, EvalError> {
        match self {
            Table::Range(table) => {
                let key = match key {
                    None => None,
                    Some(Value::Number(d)) => Some(*d),
                    // Range bounds are numeric; text keys must parse exactly.
                    Some(Value::Text(s)) => Some(Value::parse_number(s)?),
                };
                table.lookup(key)
            }
            Table::Exact(table) => table.lookup(key),
        }
    }
}

impl From<RangeTable> for Table {
    fn from(t: RangeTable) -> Self {
        Table::Range(t)
    }
}

impl From<ExactMatchTable> for Table {
    fn from(t: ExactMatchTable) -> Self {
        Table::Exact(t)
    }
}
