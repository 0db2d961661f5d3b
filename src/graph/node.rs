//! The closed set of node variants making up a pricing graph.
//!
//! A node references its dependencies by name only; the evaluator resolves
//! names through the graph's map and hands the node already-computed values
//! via the per-call cache. `evaluate` is therefore a pure function of the
//! node's own fields and the cache; it never recurses.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use smallvec::SmallVec;

use crate::compute::EvaluationCache;
use crate::error::EvalError;
use crate::tables::Table;
use crate::value::{ComparisonOp, EvaluationContext, RoundingMode, Value};

/// Declared type of an input variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Number,
    Text,
}

/// A named unit of computation in the pricing graph.
#[derive(Debug, Clone)]
pub enum Node {
    /// A fixed decimal value.
    Constant { name: String, value: Decimal },
    /// A leaf reading `context[name]` and coercing it to `dtype`.
    Input { name: String, dtype: InputType },
    /// A table lookup keyed by another node's value.
    Lookup {
        name: String,
        table: Arc<Table>,
        key: String,
    },
    /// Left-fold with `+`, identity 0. Null-short-circuits.
    Add { name: String, inputs: Vec<String> },
    /// Left-fold with `*`, identity 1. Null-short-circuits.
    Multiply { name: String, inputs: Vec<String> },
    /// Minimum of the non-null inputs.
    Min { name: String, inputs: Vec<String> },
    /// Maximum of the non-null inputs.
    Max { name: String, inputs: Vec<String> },
    /// First non-null input, in declared order.
    Coalesce { name: String, inputs: Vec<String> },
    /// Compares a tested node against a threshold and picks a branch value.
    If {
        name: String,
        var: String,
        op: ComparisonOp,
        threshold: Decimal,
        then_val: Decimal,
        else_val: Decimal,
    },
    /// Exact match of a tested node against a case map.
    Switch {
        name: String,
        var: String,
        cases: HashMap<Value, Decimal>,
        default: Option<Decimal>,
    },
    /// Quantizes its input to `decimals` digits under `mode`.
    Round {
        name: String,
        input: String,
        decimals: u32,
        mode: RoundingMode,
    },
    /// Absolute value of its input.
    Abs { name: String, input: String },
}

/// Dependency-name list. Inlined for the common small-fanin case.
pub type DepNames<'a> = SmallVec<[&'a str; 4]>;

impl Node {
    pub fn constant(name: impl Into<String>, value: Decimal) -> Self {
        Node::Constant {
            name: name.into(),
            value,
        }
    }

    pub fn input(name: impl Into<String>, dtype: InputType) -> Self {
        Node::Input {
            name: name.into(),
            dtype,
        }
    }

    pub fn lookup(name: impl Into<String>, table: Arc<Table>, key: impl Into<String>) -> Self {
        Node::Lookup {
            name: name.into(),
            table,
            key: key.into(),
        }
    }

    pub fn add(name: impl Into<String>, inputs: Vec<String>) -> Self {
        Node::Add {
            name: name.into(),
            inputs,
        }
    }

    pub fn multiply(name: impl Into<String>, inputs: Vec<String>) -> Self {
        Node::Multiply {
            name: name.into(),
            inputs,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Constant { name, .. }
            | Node::Input { name, .. }
            | Node::Lookup { name, .. }
            | Node::Add { name, .. }
            | Node::Multiply { name, .. }
            | Node::Min { name, .. }
            | Node::Max { name, .. }
            | Node::Coalesce { name, .. }
            | Node::If { name, .. }
            | Node::Switch { name, .. }
            | Node::Round { name, .. }
            | Node::Abs { name, .. } => name,
        }
    }

    /// The type tag used in traces and tariff definitions.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Constant { .. } => "CONSTANT",
            Node::Input { .. } => "INPUT",
            Node::Lookup { .. } => "LOOKUP",
            Node::Add { .. } => "ADD",
            Node::Multiply { .. } => "MULTIPLY",
            Node::Min { .. } => "MIN",
            Node::Max { .. } => "MAX",
            Node::Coalesce { .. } => "COALESCE",
            Node::If { .. } => "IF",
            Node::Switch { .. } => "SWITCH",
            Node::Round { .. } => "ROUND",
            Node::Abs { .. } => "ABS",
        }
    }

    /// Names of the nodes this node reads, in declared order.
    pub fn dependencies(&self) -> DepNames<'_> {
        match self {
            Node::Constant { .. } | Node::Input { .. } => SmallVec::new(),
            Node::Lookup { key, .. } => SmallVec::from_slice(&[key.as_str()]),
            Node::Add { inputs, .. }
            | Node::Multiply { inputs, .. }
            | Node::Min { inputs, .. }
            | Node::Max { inputs, .. }
            | Node::Coalesce { inputs, .. } => inputs.iter().map(String::as_str).collect(),
            Node::If { var, .. } | Node::Switch { var, .. } => {
                SmallVec::from_slice(&[var.as_str()])
            }
            Node::Round { input, .. } | Node::Abs { input, .. } => {
                SmallVec::from_slice(&[input.as_str()])
            }
        }
    }

    /// Rejects impossible configurations. Run by `TariffGraph::build` so a
    /// malformed definition fails before the first evaluation.
    pub fn validate(&self) -> Result<(), EvalError> {
        let invalid = |msg: String| Err(EvalError::InvalidConfiguration(msg));
        match self {
            Node::Add { name, inputs }
            | Node::Multiply { name, inputs }
            | Node::Min { name, inputs }
            | Node::Max { name, inputs }
            | Node::Coalesce { name, inputs } => {
                if inputs.is_empty() {
                    return invalid(format!(
                        "{} node '{name}' requires at least one input",
                        self.kind()
                    ));
                }
                Ok(())
            }
            Node::Switch { name, cases, .. } => {
                if cases.is_empty() {
                    return invalid(format!("SWITCH node '{name}' requires at least one case"));
                }
                Ok(())
            }
            Node::Round { name, decimals, .. } => {
                // rust_decimal carries at most 28 fractional digits.
                if *decimals > 28 {
                    return invalid(format!(
                        "ROUND node '{name}' scale {decimals} exceeds the supported 28 digits"
                    ));
                }
                Ok(())
            }
            Node::Lookup { name, key, .. } => {
                if key.is_empty() {
                    return invalid(format!("LOOKUP node '{name}' requires a key node"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Computes this node's value from the context and the already-resolved
    /// dependency values in `cache`.
    pub fn evaluate(
        &self,
        context: &EvaluationContext,
        cache: &EvaluationCache,
    ) -> Result<Option<Value>, EvalError> {
        match self {
            Node::Constant { value, .. } => Ok(Some(Value::Number(*value))),

            Node::Input { name, dtype } => {
                let Some(raw) = context.get(name) else {
                    return Err(EvalError::MissingInput(name.clone()));
                };
                let Some(raw) = raw else {
                    return Ok(None); // explicit null propagates
                };
                let coerced = match (dtype, raw) {
                    (InputType::Number, Value::Number(d)) => Value::Number(*d),
                    (InputType::Number, Value::Text(s)) => Value::Number(Value::parse_number(s)?),
                    (InputType::Text, v) => Value::Text(v.to_string()),
                };
                Ok(Some(coerced))
            }

            Node::Lookup { table, key, .. } => {
                let key_value = resolved(cache, key);
                table
                    .lookup(key_value.as_ref())
                    .map(|d| Some(Value::Number(d)))
            }

            Node::Add { name, inputs } => {
                fold(name, inputs, cache, Decimal::ZERO, Decimal::checked_add)
            }

            Node::Multiply { name, inputs } => {
                fold(name, inputs, cache, Decimal::ONE, Decimal::checked_mul)
            }

            Node::Min { name, inputs } => Ok(survivors(name, inputs, cache)?
                .into_iter()
                .min()
                .map(Value::Number)),

            Node::Max { name, inputs } => Ok(survivors(name, inputs, cache)?
                .into_iter()
                .max()
                .map(Value::Number)),

            Node::Coalesce { inputs, .. } => {
                for input in inputs {
                    if let Some(v) = resolved(cache, input) {
                        return Ok(Some(v));
                    }
                }
                Ok(None)
            }

            Node::If {
                name,
                var,
                op,
                threshold,
                then_val,
                else_val,
            } => {
                let Some(tested) = resolved(cache, var) else {
                    // A comparison against null has no defined outcome.
                    return Err(EvalError::NullOperand {
                        node: name.clone(),
                        dependency: var.clone(),
                    });
                };
                let tested = numeric(name, var, &tested)?;
                let picked = if op.apply(tested, *threshold) {
                    then_val
                } else {
                    else_val
                };
                Ok(Some(Value::Number(*picked)))
            }

            Node::Switch {
                name,
                var,
                cases,
                default,
            } => {
                let tested = resolved(cache, var);
                if let Some(tested) = &tested {
                    if let Some(value) = cases.get(tested) {
                        return Ok(Some(Value::Number(*value)));
                    }
                }
                if let Some(default) = default {
                    return Ok(Some(Value::Number(*default)));
                }
                Err(EvalError::NoMatchingCase {
                    node: name.clone(),
                    value: tested.map_or_else(|| "null".to_owned(), |v| v.to_string()),
                })
            }

            Node::Round {
                name,
                input,
                decimals,
                mode,
            } => match resolved(cache, input) {
                None => Ok(None),
                Some(v) => {
                    let d = numeric(name, input, &v)?;
                    Ok(Some(Value::Number(mode.quantize(d, *decimals))))
                }
            },

            Node::Abs { name, input } => match resolved(cache, input) {
                None => Ok(None),
                Some(v) => {
                    let d = numeric(name, input, &v)?;
                    Ok(Some(Value::Number(d.abs())))
                }
            },
        }
    }
}

/// Null-short-circuiting reduction used by `Add` and `Multiply`: a single
/// null operand makes the whole pipeline uncomputable.
fn fold(
    name: &str,
    inputs: &[String],
    cache: &EvaluationCache,
    identity: Decimal,
    op: impl Fn(Decimal, Decimal) -> Option<Decimal>,
) -> Result<Option<Value>, EvalError> {
    let mut acc = identity;
    for input in inputs {
        let Some(v) = resolved(cache, input) else {
            return Ok(None);
        };
        let d = numeric(name, input, &v)?;
        acc = op(acc, d).ok_or_else(|| EvalError::Overflow(name.to_owned()))?;
    }
    Ok(Some(Value::Number(acc)))
}

/// Null-filtering collection used by `Min` and `Max`: missing contributors
/// are skipped rather than poisoning the aggregate.
fn survivors(
    name: &str,
    inputs: &[String],
    cache: &EvaluationCache,
) -> Result<SmallVec<[Decimal; 4]>, EvalError> {
    let mut values = SmallVec::new();
    for input in inputs {
        if let Some(v) = resolved(cache, input) {
            values.push(numeric(name, input, &v)?);
        }
    }
    Ok(values)
}

/// Reads a dependency's value from the cache. The evaluator resolves every
/// dependency before its dependent, so an absent entry is a traversal bug.
fn resolved(cache: &EvaluationCache, dep: &str) -> Option<Value> {
    cache
        .get(dep)
        .expect("dependency resolved before dependent")
        .clone()
}

fn numeric(node: &str, dependency: &str, value: &Value) -> Result<Decimal, EvalError> {
    value.as_number().ok_or_else(|| EvalError::NonNumericOperand {
        node: node.to_owned(),
        dependency: dependency.to_owned(),
    })
}
