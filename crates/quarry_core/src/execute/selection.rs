//! Row filtering and column projection over a materialized frame.

use std::sync::Arc;

use quarry_error::{EngineError, Result};

use crate::arrays::column::Column;
use crate::arrays::compute::Computed;
use crate::arrays::frame::DataFrame;
use crate::dispatch::{Pattern, TypeClass};
use crate::execute::generic::{predicate_conjunction, table_arg};
use crate::execute::{EvalCtx, Registry};
use crate::expr::{ExprRef, OpKind};
use crate::scope::Scope;
use crate::value::Value;

pub fn register(registry: &mut Registry) {
    use Pattern::Exact;

    registry.register(
        &[OpKind::Selection],
        &[
            Exact(TypeClass::Frame),
            Exact(TypeClass::Subtrees),
            Exact(TypeClass::Subtrees),
        ],
        selection_frame,
    );
}

fn selection_frame(ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let data = Arc::clone(operands[0].expect_frame("selection")?);
    let projections = operands[1].expect_subtrees("selection projections")?;
    let predicates = operands[2].expect_subtrees("selection predicates")?;
    let table = table_arg(node)?;

    let frame = if predicates.is_empty() {
        data
    } else {
        let scope = ctx.scope.merge(&Scope::bind(
            table,
            ctx.time_range,
            Value::Frame(Arc::clone(&data)),
        ));
        let mask =
            predicate_conjunction(ctx, predicates, &scope, ctx.aggcontext, data.num_rows())?;
        Arc::new(data.filter(&mask)?)
    };

    if projections.is_empty() {
        return Ok(Value::Frame(frame));
    }

    // Projections see the filtered table.
    let scope = ctx.scope.merge(&Scope::bind(
        table,
        ctx.time_range,
        Value::Frame(Arc::clone(&frame)),
    ));
    let mut columns: Vec<(String, Column)> = Vec::with_capacity(projections.len());
    for projection in projections {
        let value = ctx.evaluate_under(projection, &scope, ctx.aggcontext)?;
        let column = match value.to_computed("projection")? {
            Computed::Column(col) => col,
            Computed::Scalar(v) => Column::repeat(&v, frame.num_rows())?,
        };
        if column.len() != frame.num_rows() {
            return Err(EngineError::shape_mismatch(format!(
                "projection '{}' produced {} rows over a frame of {}",
                projection.result_name(),
                column.len(),
                frame.num_rows()
            )));
        }
        columns.push((projection.result_name(), column));
    }
    Ok(Value::frame(DataFrame::from_columns(columns)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::engine::Engine;
    use crate::expr::build;
    use crate::source::MemorySource;

    fn engine() -> Engine {
        let frame = DataFrame::from_columns([
            ("a".to_string(), Column::int64s(&[1, 2, 3, 4])),
            ("b".to_string(), Column::int64s(&[10, 20, 30, 40])),
        ])
        .unwrap();
        Engine::new(Box::new(MemorySource::new().with_table("t", frame)))
    }

    #[test]
    fn filter_and_project() {
        let engine = engine();
        let table = build::table("t");
        let a = build::column(&table, "a", DataType::Int64);
        let b = build::column(&table, "b", DataType::Int64);
        let doubled = build::named(build::mul(&b, &build::lit(2_i64)), "b2");
        let selected = build::selection(
            &table,
            vec![a.clone(), doubled],
            vec![build::gt(&a, &build::lit(2_i64))],
        );

        let out = engine.execute(&selected).unwrap();
        let frame = out.expect_frame("test").unwrap();
        assert_eq!(frame.num_rows(), 2);
        assert_eq!(frame.column("a").unwrap().as_ref(), &Column::int64s(&[3, 4]));
        assert_eq!(
            frame.column("b2").unwrap().as_ref(),
            &Column::int64s(&[60, 80])
        );
    }

    #[test]
    fn no_projections_returns_filtered_table() {
        let engine = engine();
        let table = build::table("t");
        let a = build::column(&table, "a", DataType::Int64);
        let selected = build::selection(&table, vec![], vec![build::lt(&a, &build::lit(2_i64))]);

        let out = engine.execute(&selected).unwrap();
        let frame = out.expect_frame("test").unwrap();
        assert_eq!(frame.num_rows(), 1);
        assert_eq!(frame.num_columns(), 2);
    }
}
