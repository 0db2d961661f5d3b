//! Interval-keyed lookup table with binary search.

use rust_decimal::Decimal;

use crate::error::EvalError;

/// One `[min, max] -> value` interval. Bounds are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRow {
    pub min: Decimal,
    pub max: Decimal,
    pub value: Decimal,
}

impl RangeRow {
    pub fn new(min: Decimal, max: Decimal, value: Decimal) -> Self {
        Self { min, max, value }
    }

    fn contains(&self, key: Decimal) -> bool {
        self.min <= key && key <= self.max
    }
}

/// An ordered sequence of intervals with an optional default.
///
/// Rows are sorted by `min` once at construction; lookups are O(log n).
/// Ranges are assumed non-overlapping; overlaps are not verified and the
/// first containing candidate near the insertion point wins.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeTable {
    rows: Vec<RangeRow>,
    default: Option<Decimal>,
}

impl RangeTable {
    pub fn new(mut rows: Vec<RangeRow>, default: Option<Decimal>) -> Self {
        rows.sort_by(|a, b| a.min.cmp(&b.min));
        Self { rows, default }
    }

    /// Resolves `key` to the value of the containing range.
    ///
    /// The binary search only guarantees proximity, not containment, so both
    /// immediate neighbors of the insertion point are checked: the range just
    /// below (the most likely match) and the range at the insertion point
    /// itself (covers a key equal to a later range's min).
    pub fn lookup(&self, key: Option<Decimal>) -> Result<Decimal, EvalError> {
        let Some(key) = key else {
            return self.default.ok_or(EvalError::NullKey);
        };

        let insertion = self.rows.partition_point(|r| r.min < key);
        if insertion > 0 && self.rows[insertion - 1].contains(key) {
            return Ok(self.rows[insertion - 1].value);
        }
        if insertion < self.rows.len() && self.rows[insertion].contains(key) {
            return Ok(self.rows[insertion].value);
        }

        self.default.ok_or(EvalError::OutOfRange(key))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
