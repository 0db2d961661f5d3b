//! Decimal value primitives shared by nodes, tables and the evaluator.
//!
//! All monetary arithmetic is exact base-10 via `rust_decimal`. Conversions
//! from binary floats go through a text round-trip so the representational
//! error of the float never contaminates the decimal.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// The caller-supplied runtime inputs for one evaluation. `None` is an
/// explicit null, distinct from an absent key.
pub type EvaluationContext = HashMap<String, Option<Value>>;

/// A computed or supplied value flowing through the graph.
///
/// Nodes produce either an exact decimal or a piece of text (e.g. a vehicle
/// brand feeding an exact-match table). Null is represented outside this
/// type, as `Option<Value>`, so absence propagates instead of coercing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(Decimal),
    Text(String),
}

impl Value {
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(d) => Some(*d),
            Value::Text(_) => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Parses text into an exact decimal.
    pub fn parse_number(text: &str) -> Result<Decimal, EvalError> {
        Decimal::from_str(text.trim()).map_err(|_| EvalError::InvalidNumber(text.to_owned()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Number(d)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Number(Decimal::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(Decimal::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl TryFrom<f64> for Value {
    type Error = EvalError;

    /// Converts through the float's shortest text form. `0.1_f64` becomes
    /// exactly `0.1`, not `0.1000000000000000055511151231257827`.
    fn try_from(f: f64) -> Result<Self, Self::Error> {
        Value::parse_number(&f.to_string()).map(Value::Number)
    }
}

/// Rounding rules supported by quantization, matching the two financial
/// conventions the tariff definitions use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Round half away from zero: 123.455 -> 123.46.
    HalfUp,
    /// Banker's rounding, half to even: 123.445 -> 123.44, 123.455 -> 123.46.
    HalfEven,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }

    /// Rounds `value` to `decimals` fractional digits under this mode.
    pub fn quantize(self, value: Decimal, decimals: u32) -> Decimal {
        value.round_dp_with_strategy(decimals, self.strategy())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoundingMode::HalfUp => "HALF_UP",
            RoundingMode::HalfEven => "HALF_EVEN",
        }
    }
}

impl FromStr for RoundingMode {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HALF_UP" => Ok(RoundingMode::HalfUp),
            "HALF_EVEN" => Ok(RoundingMode::HalfEven),
            other => Err(EvalError::InvalidConfiguration(format!(
                "unknown rounding mode '{other}'"
            ))),
        }
    }
}

/// Comparison operators usable in conditional nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn apply(self, lhs: Decimal, rhs: Decimal) -> bool {
        match self {
            ComparisonOp::Lt => lhs < rhs,
            ComparisonOp::Le => lhs <= rhs,
            ComparisonOp::Gt => lhs > rhs,
            ComparisonOp::Ge => lhs >= rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(ComparisonOp::Lt),
            "<=" => Ok(ComparisonOp::Le),
            ">" => Ok(ComparisonOp::Gt),
            ">=" => Ok(ComparisonOp::Ge),
            other => Err(EvalError::InvalidConfiguration(format!(
                "unknown operator symbol '{other}'"
            ))),
        }
    }
}
