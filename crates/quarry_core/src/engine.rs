//! Engine construction and top-level execution.

use std::sync::Arc;

use quarry_error::Result;
use tracing::debug;

use crate::aggcontext::{AggContextRef, Summarize};
use crate::coerce::TypeCoercion;
use crate::execute::{BinaryOpTable, Evaluator, Registry, default_registry};
use crate::expr::ExprRef;
use crate::scope::Scope;
use crate::source::TableSource;
use crate::timerange::TimeRange;
use crate::value::Value;

/// Owns the immutable per-process state: the dispatch registry, the
/// type coercion table, the binary operator table, and the data source.
///
/// Registration happens here, once, before any evaluation; afterwards
/// everything is shared by reference. Each `execute` call builds its own
/// scope and aggregation context, so concurrent evaluations never share
/// mutable state.
#[derive(Debug)]
pub struct Engine {
    registry: Registry,
    coercion: TypeCoercion,
    binops: BinaryOpTable,
    source: Box<dyn TableSource>,
}

impl Engine {
    pub fn new(source: Box<dyn TableSource>) -> Self {
        Engine {
            registry: default_registry(),
            coercion: TypeCoercion::new(),
            binops: BinaryOpTable::with_defaults(),
            source,
        }
    }

    /// Build with a caller-assembled registry, e.g. to specialize or
    /// extend the built-in rules before start-up.
    pub fn with_registry(source: Box<dyn TableSource>, registry: Registry) -> Self {
        Engine {
            registry,
            coercion: TypeCoercion::new(),
            binops: BinaryOpTable::with_defaults(),
            source,
        }
    }

    pub fn source(&self) -> &dyn TableSource {
        self.source.as_ref()
    }

    pub fn coercion(&self) -> &TypeCoercion {
        &self.coercion
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator {
            registry: &self.registry,
            coercion: &self.coercion,
            binops: &self.binops,
            source: self.source.as_ref(),
        }
    }

    /// Evaluate an expression with an empty scope and no time range.
    pub fn execute(&self, expr: &ExprRef) -> Result<Value> {
        self.execute_with(expr, Scope::new(), None)
    }

    /// Evaluate with caller-provided bindings and an optional time
    /// range restriction.
    pub fn execute_with(
        &self,
        expr: &ExprRef,
        scope: Scope,
        time_range: Option<TimeRange>,
    ) -> Result<Value> {
        debug!(kind = %expr.kind, ?time_range, "executing expression");
        let aggcontext: AggContextRef = Arc::new(Summarize);
        self.evaluator()
            .evaluate(expr, &scope, time_range, &aggcontext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::column::Column;
    use crate::arrays::datatype::DataType;
    use crate::arrays::frame::DataFrame;
    use crate::arrays::scalar::ScalarValue;
    use crate::expr::build;
    use crate::source::MemorySource;

    fn engine() -> Engine {
        let sales = DataFrame::from_columns([
            ("g".to_string(), Column::int64s(&[1, 1, 2])),
            ("v".to_string(), Column::int64s(&[1, 2, 3])),
        ])
        .unwrap();
        let events = DataFrame::from_columns([
            ("time".to_string(), Column::timestamps(&[10, 20, 30])),
            ("v".to_string(), Column::int64s(&[100, 200, 300])),
        ])
        .unwrap();
        Engine::new(Box::new(
            MemorySource::new()
                .with_table("sales", sales)
                .with_table("events", events),
        ))
    }

    fn as_series(value: Value) -> Arc<Column> {
        match value {
            Value::Series(col) => col,
            other => panic!("expected a series, got {other:?}"),
        }
    }

    #[test]
    fn literal_and_arithmetic() {
        let engine = engine();
        let expr = build::add(&build::lit(1_i64), &build::lit(2_i64));
        match engine.execute(&expr).unwrap() {
            Value::Scalar(ScalarValue::Int64(3)) => (),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn column_arithmetic_over_table() {
        let engine = engine();
        let table = build::table("sales");
        let v = build::column(&table, "v", DataType::Int64);
        let expr = build::mul(&v, &build::lit(10_i64));
        let col = as_series(engine.execute(&expr).unwrap());
        assert_eq!(col.as_ref(), &Column::int64s(&[10, 20, 30]));
    }

    #[test]
    fn scope_memoization_is_by_identity() {
        let engine = engine();
        let table = build::table("sales");
        let bound = Arc::new(Column::int64s(&[7, 8]));
        let scope = Scope::bind(&table, None, Value::Series(Arc::clone(&bound)));

        // The bound value comes back as the same object, not a copy.
        let first = as_series(engine.execute_with(&table, scope.clone(), None).unwrap());
        let second = as_series(engine.execute_with(&table, scope, None).unwrap());
        assert!(Arc::ptr_eq(&first, &bound));
        assert!(Arc::ptr_eq(&first, &second));

        // A structurally identical but distinct node misses the scope
        // and recomputes from the source.
        let other_table = build::table("sales");
        let recomputed = engine.execute(&other_table).unwrap();
        assert!(matches!(recomputed, Value::Frame(_)));
    }

    #[test]
    fn materialized_type_agrees_with_declared_type() {
        let engine = engine();
        let table = build::table("sales");
        let v = build::column(&table, "v", DataType::Int64);
        let col = as_series(engine.execute(&v).unwrap());
        assert!(engine.coercion().column_matches(&col, &v.datatype));
    }

    #[test]
    fn cast_of_same_type_is_noop() {
        let engine = engine();
        let table = build::table("sales");
        let v = build::column(&table, "v", DataType::Int64);
        let plain = as_series(engine.execute(&v).unwrap());
        let casted = as_series(engine.execute(&build::cast(&v, DataType::Int64)).unwrap());
        assert_eq!(plain.as_ref(), casted.as_ref());
    }

    #[test]
    fn bool_to_timestamp_cast_fails_for_every_input() {
        let engine = engine();
        for value in [true, false] {
            let expr = build::cast(&build::lit(value), DataType::timestamp());
            let err = engine.execute(&expr).unwrap_err();
            assert_eq!(err.kind(), quarry_error::ErrorKind::Cast);
        }
    }

    #[test]
    fn where_shapes() {
        let engine = engine();
        let table = build::table("sales");
        let v = build::column(&table, "v", DataType::Int64);

        // Array condition over array branches.
        let cond = build::gt(&v, &build::lit(1_i64));
        let expr = build::where_(&cond, &v, &build::lit(9_i64));
        let col = as_series(engine.execute(&expr).unwrap());
        assert_eq!(col.as_ref(), &Column::int64s(&[9, 2, 3]));

        // Scalar condition picks a branch without broadcasting.
        let expr = build::where_(&build::lit(true), &v, &build::lit(9_i64));
        let col = as_series(engine.execute(&expr).unwrap());
        assert_eq!(col.as_ref(), &Column::int64s(&[1, 2, 3]));

        let expr = build::where_(&build::lit(false), &v, &build::lit(9_i64));
        match engine.execute(&expr).unwrap() {
            Value::Scalar(ScalarValue::Int64(9)) => (),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn aggregation_grouped_metrics() {
        let engine = engine();
        let table = build::table("sales");
        let g = build::column(&table, "g", DataType::Int64);
        let v = build::column(&table, "v", DataType::Int64);
        let agg = build::aggregate(
            &table,
            vec![
                build::named(build::sum(&v, None), "total"),
                build::named(build::count(&v, None), "n"),
            ],
            vec![g],
            vec![],
            vec![],
        );

        let out = engine.execute(&agg).unwrap();
        let frame = out.expect_frame("aggregation").unwrap();
        assert_eq!(frame.column("g").unwrap().as_ref(), &Column::int64s(&[1, 2]));
        assert_eq!(
            frame.column("total").unwrap().as_ref(),
            &Column::int64s(&[3, 3])
        );
        assert_eq!(frame.column("n").unwrap().as_ref(), &Column::int64s(&[2, 1]));
    }

    #[test]
    fn aggregation_predicates_filter_before_grouping() {
        let engine = engine();
        let table = build::table("sales");
        let g = build::column(&table, "g", DataType::Int64);
        let v = build::column(&table, "v", DataType::Int64);
        let agg = build::aggregate(
            &table,
            vec![build::named(build::sum(&v, None), "total")],
            vec![g],
            vec![],
            vec![build::gt(&v, &build::lit(1_i64))],
        );

        let out = engine.execute(&agg).unwrap();
        let frame = out.expect_frame("aggregation").unwrap();
        assert_eq!(
            frame.column("total").unwrap().as_ref(),
            &Column::int64s(&[2, 3])
        );
    }

    #[test]
    fn having_without_group_by_is_invalid() {
        let engine = engine();
        let table = build::table("sales");
        let v = build::column(&table, "v", DataType::Int64);
        let having = build::gt(&build::sum(&v, None), &build::lit(0_i64));
        let agg = build::aggregate(
            &table,
            vec![build::named(build::sum(&v, None), "total")],
            vec![],
            vec![having],
            vec![],
        );

        let err = engine.execute(&agg).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::InvalidAggregation);
    }

    #[test]
    fn aggregation_having_filters_groups() {
        let engine = engine();
        let table = build::table("sales");
        let g = build::column(&table, "g", DataType::Int64);
        let v = build::column(&table, "v", DataType::Int64);
        let having = build::gt(&build::count(&v, None), &build::lit(1_i64));
        let agg = build::aggregate(
            &table,
            vec![build::named(build::sum(&v, None), "total")],
            vec![g],
            vec![having],
            vec![],
        );

        let out = engine.execute(&agg).unwrap();
        let frame = out.expect_frame("aggregation").unwrap();
        assert_eq!(frame.num_rows(), 1);
        assert_eq!(
            frame.column("total").unwrap().as_ref(),
            &Column::int64s(&[3])
        );
    }

    #[test]
    fn time_range_filters_table_leaf() {
        let engine = engine();
        let table = build::table("events");
        let out = engine
            .execute_with(&table, Scope::new(), Some(TimeRange::new(15, 30)))
            .unwrap();
        let frame = out.expect_frame("table").unwrap();
        assert_eq!(frame.num_rows(), 1);
        assert_eq!(
            frame.column("v").unwrap().as_ref(),
            &Column::int64s(&[200])
        );
    }

    #[test]
    fn time_range_requires_time_column() {
        let engine = engine();
        let table = build::table("sales");
        let err = engine
            .execute_with(&table, Scope::new(), Some(TimeRange::new(0, 10)))
            .unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::MissingTimeColumn);
    }

    #[test]
    fn first_failing_operand_reports() {
        let engine = engine();
        // Both operands fail; the left one's error (a bad cast) is the
        // one surfaced.
        let bad_left = build::cast(&build::lit(true), DataType::timestamp());
        let bad_right = build::cast(&build::lit(false), DataType::Interval(
            crate::arrays::datatype::IntervalUnit::Second,
        ));
        let expr = build::add(&bad_left, &bad_right);
        let err = engine.execute(&expr).unwrap_err();
        assert!(err.to_string().contains("timestamps"));
    }

    #[test]
    fn unregistered_combination_is_a_dispatch_miss() {
        let engine = engine();
        let table = build::table("sales");
        // Negating a whole frame has no implementation.
        let expr = build::negate(&table);
        let err = engine.execute(&expr).unwrap_err();
        assert_eq!(
            err.kind(),
            quarry_error::ErrorKind::NoImplementationFound
        );
    }

    #[test]
    fn row_wise_shape_mismatch_is_rejected() {
        let engine = engine();
        let table = build::table("sales");
        let v = build::column(&table, "v", DataType::Int64);
        // A 3-row column combined with a 2-row column.
        let other = build::column(&build::limit(&table, 2, 0), "v", DataType::Int64);
        let expr = build::greatest(vec![v, other]);
        let err = engine.execute(&expr).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::ShapeMismatch);
    }
}
