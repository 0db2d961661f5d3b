//! A synchronous, single-threaded recursive evaluator with per-call
//! memoization.
//!
//! Evaluation is a post-order DFS over the implicit DAG: every dependency is
//! fully resolved and cached strictly before its dependent evaluates, and
//! the cache guarantees each node evaluates at most once per call even in
//! diamond-dependency graphs. Batch evaluation gives every context its own
//! cache; the shared graph and tables are read-only, which also makes the
//! rayon-parallel variant safe without locking.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::compute::cache::EvaluationCache;
use crate::compute::trace::Trace;
use crate::error::EvalError;
use crate::graph::TariffGraph;
use crate::profiler::{NoopProfiler, Profiler};
use crate::value::{EvaluationContext, Value};

/// How many known node names an unknown-target error lists.
const KNOWN_NAMES_LIMIT: usize = 10;

pub struct Evaluator<'g> {
    graph: &'g TariffGraph,
}

impl<'g> Evaluator<'g> {
    pub fn new(graph: &'g TariffGraph) -> Self {
        Self { graph }
    }

    /// Computes the value of `root` against `context`.
    pub fn evaluate(
        &self,
        root: &str,
        context: &EvaluationContext,
    ) -> Result<Option<Value>, EvalError> {
        self.run(root, context, None, &mut NoopProfiler)
    }

    /// Like `evaluate`, reporting timings and cache counters to `profiler`.
    pub fn evaluate_profiled(
        &self,
        root: &str,
        context: &EvaluationContext,
        profiler: &mut dyn Profiler,
    ) -> Result<Option<Value>, EvalError> {
        self.run(root, context, None, profiler)
    }

    /// Evaluates `root` and returns the full per-node trace instead of the
    /// bare value.
    pub fn evaluate_traced(
        &self,
        root: &str,
        context: &EvaluationContext,
    ) -> Result<Trace, EvalError> {
        let mut trace = Trace::new();
        self.run(root, context, Some(&mut trace), &mut NoopProfiler)?;
        Ok(trace)
    }

    /// Evaluates many contexts, aborting on the first failure.
    pub fn evaluate_batch(
        &self,
        root: &str,
        contexts: &[EvaluationContext],
    ) -> Result<Vec<Option<Value>>, EvalError> {
        contexts
            .iter()
            .map(|context| self.evaluate(root, context))
            .collect()
    }

    /// Evaluates many contexts, capturing per-row failures as data so the
    /// remaining rows still price. Appropriate for portfolio-wide batches
    /// where partial results remain useful.
    pub fn evaluate_batch_collect(
        &self,
        root: &str,
        contexts: &[EvaluationContext],
    ) -> Vec<Result<Option<Value>, EvalError>> {
        contexts
            .iter()
            .enumerate()
            .map(|(row, context)| {
                let result = self.evaluate(root, context);
                if let Err(error) = &result {
                    warn!(row, %error, "batch row failed");
                }
                result
            })
            .collect()
    }

    /// `evaluate_batch_collect` across worker threads. Each context owns an
    /// isolated cache; the graph and tables are shared read-only.
    pub fn par_evaluate_batch(
        &self,
        root: &str,
        contexts: &[EvaluationContext],
    ) -> Vec<Result<Option<Value>, EvalError>> {
        contexts
            .par_iter()
            .map(|context| self.evaluate(root, context))
            .collect()
    }

    fn run(
        &self,
        root: &str,
        context: &EvaluationContext,
        mut trace: Option<&mut Trace>,
        profiler: &mut dyn Profiler,
    ) -> Result<Option<Value>, EvalError> {
        // Checked before recursion begins so the caller gets a diagnostic
        // listing what the graph does contain.
        if !self.graph.contains(root) {
            return Err(EvalError::UnknownTarget {
                name: root.to_owned(),
                known: self.graph.known_names(KNOWN_NAMES_LIMIT),
            });
        }

        debug!(target = root, "evaluating pricing graph");
        let mut cache = EvaluationCache::new();
        let mut path: Vec<String> = Vec::new();
        self.eval_node(root, context, &mut cache, &mut path, &mut trace, profiler)
            .map_err(|err| err.with_context(context))
    }

    fn eval_node(
        &self,
        name: &str,
        context: &EvaluationContext,
        cache: &mut EvaluationCache,
        path: &mut Vec<String>,
        trace: &mut Option<&mut Trace>,
        profiler: &mut dyn Profiler,
    ) -> Result<Option<Value>, EvalError> {
        // The single memoization point.
        if let Some(hit) = cache.get(name) {
            profiler.record_hit(name);
            return Ok(hit.clone());
        }
        profiler.record_miss(name);

        let Some(node) = self.graph.get(name) else {
            return Err(EvalError::UnknownNode {
                name: name.to_owned(),
                path: path.clone(),
            });
        };

        path.push(name.to_owned());

        for dep in node.dependencies() {
            if let Err(err) = self.eval_node(dep, context, cache, path, trace, profiler) {
                let err = err.enrich(name, path);
                path.pop();
                return Err(err);
            }
        }

        profiler.start(name);
        let result = node.evaluate(context, cache);
        profiler.end(name);

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                let err = err.enrich(name, path);
                path.pop();
                return Err(err);
            }
        };

        cache.insert(name.to_owned(), value.clone());
        if let Some(trace) = trace.as_deref_mut() {
            trace.record(name, value.clone(), node.kind(), path.clone());
        }

        path.pop();
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{InputType, Node};
    use crate::profiler::PerformanceProfiler;
    use crate::tables::{ExactMatchTable, RangeRow, RangeTable, Table, DEFAULT_KEY};
    use crate::value::{ComparisonOp, RoundingMode};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn ctx(entries: &[(&str, Option<Value>)]) -> EvaluationContext {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    /// The motor tariff from the reference data: base premium scaled by
    /// age, brand and density factors, plus a fee, rounded HALF_UP.
    fn motor_graph() -> TariffGraph {
        let age_table = Arc::new(Table::from(RangeTable::new(
            vec![
                RangeRow::new(dec!(18), dec!(25), dec!(1.8)),
                RangeRow::new(dec!(26), dec!(65), dec!(1.0)),
                RangeRow::new(dec!(66), dec!(99), dec!(1.3)),
            ],
            None,
        )));
        let brand_table = Arc::new(Table::from(ExactMatchTable::from_pairs([
            ("BMW", dec!(1.2)),
            ("Audi", dec!(1.1)),
            (DEFAULT_KEY, dec!(1.0)),
        ])));

        TariffGraph::build(vec![
            Node::constant("base_premium", dec!(500)),
            Node::input("driver_age", InputType::Number),
            Node::input("brand", InputType::Text),
            Node::input("density", InputType::Number),
            Node::lookup("driver_age_factor", age_table, "driver_age"),
            Node::lookup("brand_factor", brand_table, "brand"),
            Node::If {
                name: "density_factor".into(),
                var: "density".into(),
                op: ComparisonOp::Gt,
                threshold: dec!(1000),
                then_val: dec!(1.2),
                else_val: dec!(1.0),
            },
            Node::multiply(
                "technical_premium",
                names(&[
                    "base_premium",
                    "driver_age_factor",
                    "brand_factor",
                    "density_factor",
                ]),
            ),
            Node::constant("fee", dec!(25)),
            Node::add("raw_total", names(&["technical_premium", "fee"])),
            Node::Round {
                name: "total_premium".into(),
                input: "raw_total".into(),
                decimals: 2,
                mode: RoundingMode::HalfUp,
            },
        ])
        .unwrap()
    }

    fn motor_ctx(age: Decimal, brand: &str, density: Decimal) -> EvaluationContext {
        ctx(&[
            ("driver_age", Some(Value::Number(age))),
            ("brand", Some(Value::from(brand))),
            ("density", Some(Value::Number(density))),
        ])
    }

    #[test]
    fn test_motor_tariff_scenarios() {
        let graph = motor_graph();
        let evaluator = Evaluator::new(&graph);

        // 500 * 1.8 * 1.2 * 1.2 = 1296, + 25 = 1321
        let result = evaluator
            .evaluate("total_premium", &motor_ctx(dec!(22), "BMW", dec!(1500)))
            .unwrap();
        assert_eq!(result, Some(Value::Number(dec!(1321.00))));

        // 500 * 1.0 * 1.0 * 1.0 = 500, + 25 = 525
        let result = evaluator
            .evaluate("total_premium", &motor_ctx(dec!(40), "Toyota", dec!(500)))
            .unwrap();
        assert_eq!(result, Some(Value::Number(dec!(525.00))));

        // 500 * 1.3 * 1.1 * 1.2 = 858, + 25 = 883
        let result = evaluator
            .evaluate("total_premium", &motor_ctx(dec!(70), "Audi", dec!(2000)))
            .unwrap();
        assert_eq!(result, Some(Value::Number(dec!(883.00))));
    }

    #[test]
    fn test_determinism() {
        let graph = motor_graph();
        let evaluator = Evaluator::new(&graph);
        let context = motor_ctx(dec!(22), "BMW", dec!(1500));

        let first = evaluator.evaluate("total_premium", &context).unwrap();
        let second = evaluator.evaluate("total_premium", &context).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_diamond_dependency_evaluates_shared_ancestor_once() {
        // base feeds both factors; total references it three times overall.
        let graph = TariffGraph::build(vec![
            Node::constant("base", dec!(100)),
            Node::multiply("left", names(&["base"])),
            Node::multiply("right", names(&["base"])),
            Node::add("total", names(&["left", "right", "base"])),
        ])
        .unwrap();
        let evaluator = Evaluator::new(&graph);
        let mut profiler = PerformanceProfiler::new();

        let result = evaluator
            .evaluate_profiled("total", &EvaluationContext::new(), &mut profiler)
            .unwrap();
        assert_eq!(result, Some(Value::Number(dec!(300))));

        // Three references, one evaluation: hits == references - 1.
        assert_eq!(profiler.misses("base"), 1);
        assert_eq!(profiler.hits("base"), 2);
        assert_eq!(profiler.calls("base"), 1);
    }

    #[test]
    fn test_null_propagates_to_root() {
        let graph = TariffGraph::build(vec![
            Node::input("optional", InputType::Number),
            Node::constant("fee", dec!(25)),
            Node::add("total", names(&["optional", "fee"])),
        ])
        .unwrap();
        let evaluator = Evaluator::new(&graph);

        let result = evaluator
            .evaluate("total", &ctx(&[("optional", None)]))
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_unknown_target_lists_known_nodes() {
        let graph = motor_graph();
        let evaluator = Evaluator::new(&graph);

        let err = evaluator
            .evaluate("grand_total", &EvaluationContext::new())
            .unwrap_err();
        match err {
            EvalError::UnknownTarget { name, known } => {
                assert_eq!(name, "grand_total");
                assert!(known.contains(&"base_premium".to_owned()));
                assert!(known.len() <= 10);
            }
            other => panic!("expected UnknownTarget, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dependency_is_enriched_with_path() {
        let graph = TariffGraph::build(vec![
            Node::add("total", names(&["subtotal"])),
            Node::add("subtotal", names(&["ghost"])),
        ])
        .unwrap();
        let evaluator = Evaluator::new(&graph);

        let err = evaluator
            .evaluate("total", &EvaluationContext::new())
            .unwrap_err();
        match &err {
            EvalError::Node { node, path, .. } => {
                assert_eq!(node, "subtotal");
                assert_eq!(path, &vec!["total".to_owned(), "subtotal".to_owned()]);
            }
            other => panic!("expected enriched error, got {other:?}"),
        }
        assert_eq!(
            err.root_cause(),
            &EvalError::UnknownNode {
                name: "ghost".into(),
                path: vec!["total".into(), "subtotal".into()],
            }
        );
    }

    #[test]
    fn test_missing_input_error_carries_path_and_context() {
        let graph = motor_graph();
        let evaluator = Evaluator::new(&graph);

        // density missing entirely.
        let context = ctx(&[
            ("driver_age", Some(Value::Number(dec!(22)))),
            ("brand", Some(Value::from("BMW"))),
        ]);
        let err = evaluator.evaluate("total_premium", &context).unwrap_err();

        assert_eq!(err.root_cause(), &EvalError::MissingInput("density".into()));
        let msg = err.to_string();
        assert!(msg.contains("total_premium"), "{msg}");
        assert!(msg.contains("context"), "{msg}");
    }

    #[test]
    fn test_out_of_range_age_fails() {
        let graph = motor_graph();
        let evaluator = Evaluator::new(&graph);

        let err = evaluator
            .evaluate("total_premium", &motor_ctx(dec!(17), "BMW", dec!(500)))
            .unwrap_err();
        assert_eq!(err.root_cause(), &EvalError::OutOfRange(dec!(17)));
    }

    #[test]
    fn test_traced_evaluation_records_every_node() {
        let graph = motor_graph();
        let evaluator = Evaluator::new(&graph);

        let trace = evaluator
            .evaluate_traced("total_premium", &motor_ctx(dec!(22), "BMW", dec!(1500)))
            .unwrap();

        assert_eq!(trace.len(), graph.len());
        let total = trace.get("total_premium").unwrap();
        assert_eq!(total.value, Some(Value::Number(dec!(1321.00))));
        assert_eq!(total.node_type, "ROUND");
        assert_eq!(total.dependency_path, vec!["total_premium".to_owned()]);

        let age = trace.get("driver_age").unwrap();
        assert_eq!(age.node_type, "INPUT");
        assert_eq!(
            age.dependency_path,
            vec![
                "total_premium".to_owned(),
                "raw_total".to_owned(),
                "technical_premium".to_owned(),
                "driver_age_factor".to_owned(),
                "driver_age".to_owned(),
            ]
        );
    }

    #[test]
    fn test_batch_fail_fast_aborts() {
        let graph = motor_graph();
        let evaluator = Evaluator::new(&graph);

        let contexts = vec![
            motor_ctx(dec!(22), "BMW", dec!(1500)),
            ctx(&[("brand", Some(Value::from("BMW")))]), // driver_age missing
            motor_ctx(dec!(40), "Toyota", dec!(500)),
        ];
        assert!(evaluator.evaluate_batch("total_premium", &contexts).is_err());
    }

    #[test]
    fn test_batch_collect_captures_partial_failure() {
        let graph = motor_graph();
        let evaluator = Evaluator::new(&graph);

        let contexts = vec![
            motor_ctx(dec!(22), "BMW", dec!(1500)),
            ctx(&[("brand", Some(Value::from("BMW")))]),
            motor_ctx(dec!(40), "Toyota", dec!(500)),
        ];
        let results = evaluator.evaluate_batch_collect("total_premium", &contexts);

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &Some(Value::Number(dec!(1321.00)))
        );
        assert!(results[1].is_err());
        assert_eq!(
            results[2].as_ref().unwrap(),
            &Some(Value::Number(dec!(525.00)))
        );
    }

    #[test]
    fn test_parallel_batch_matches_sequential() {
        let graph = motor_graph();
        let evaluator = Evaluator::new(&graph);

        let contexts: Vec<EvaluationContext> = (0..64)
            .map(|i| {
                let age = Decimal::from(18 + (i % 70));
                let brand = if i % 2 == 0 { "BMW" } else { "Toyota" };
                motor_ctx(age, brand, Decimal::from(i * 50))
            })
            .collect();

        let sequential = evaluator.evaluate_batch_collect("total_premium", &contexts);
        let parallel = evaluator.par_evaluate_batch("total_premium", &contexts);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_batch_caches_do_not_leak_across_contexts() {
        // If the cache leaked, the second row would reuse the first row's
        // input value instead of failing.
        let graph = TariffGraph::build(vec![Node::input("age", InputType::Number)]).unwrap();
        let evaluator = Evaluator::new(&graph);

        let contexts = vec![ctx(&[("age", Some(Value::from(30)))]), ctx(&[])];
        let results = evaluator.evaluate_batch_collect("age", &contexts);
        assert_eq!(results[0].as_ref().unwrap(), &Some(Value::from(30)));
        assert!(results[1].is_err());
    }
}
