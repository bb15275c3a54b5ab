//! Window operation execution.
//!
//! The window handler owns evaluation of its operand: it re-executes
//! the operand's root table, regroups it under the window's partition
//! keys, and selects the aggregation context from the frame bounds —
//! unbounded frames broadcast per group, bounded frames reduce per row
//! frame. The operand itself never sees this machinery; its reductions
//! simply call whatever context they are handed.

use std::sync::Arc;

use quarry_error::{EngineError, Result};

use crate::aggcontext::{AggContextRef, Transform, Windowed};
use crate::arrays::column::Column;
use crate::arrays::compute::Computed;
use crate::arrays::groupby::{GroupedFrame, Grouping};
use crate::dispatch::{Pattern, TypeClass};
use crate::execute::{EvalCtx, Registry};
use crate::expr::{self, ExprRef, OpKind, WindowSpec};
use crate::scope::Scope;
use crate::value::Value;

pub fn register(registry: &mut Registry) {
    use Pattern::Exact;

    registry.register(
        &[OpKind::Window],
        &[Exact(TypeClass::Subtrees), Exact(TypeClass::Window)],
        window_op,
    );
}

fn window_op(ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let subtrees = operands[0].expect_subtrees("window operand")?;
    let operand = subtrees
        .first()
        .ok_or_else(|| EngineError::internal("window has no operand"))?;
    let spec = match &operands[1] {
        Value::Window(spec) => spec,
        other => {
            return Err(EngineError::internal(format!(
                "window expected a frame spec, got {}",
                other.shape_name()
            )));
        }
    };

    let roots = expr::root_tables(operand);
    let root = match roots.as_slice() {
        [root] => root,
        _ => {
            return Err(EngineError::internal(format!(
                "window operand must derive from exactly one table, found {}",
                roots.len()
            )));
        }
    };
    let data = Arc::clone(ctx.evaluate(root)?.expect_frame("window source")?);

    let source = if spec.group_by.is_empty() {
        Value::Frame(Arc::clone(&data))
    } else {
        let grouping = window_grouping(ctx, root, spec, &data)?;
        Value::FrameGroupBy(GroupedFrame::new(Arc::clone(&data), grouping)?)
    };

    let scope = ctx.scope.merge(&Scope::bind(root, ctx.time_range, source));
    let aggcontext: AggContextRef = if spec.is_unbounded() {
        Arc::new(Transform)
    } else {
        Arc::new(Windowed {
            preceding: spec.preceding,
            following: spec.following,
        })
    };

    // Post-process: a result that kept its grouping flattens back to a
    // plain series aligned to the source's row order.
    match ctx.evaluate_under(operand, &scope, &aggcontext)? {
        Value::SeriesGroupBy(grouped) => Ok(Value::Series(grouped.column)),
        other => Ok(other),
    }
}

fn window_grouping(
    ctx: &EvalCtx<'_>,
    root: &ExprRef,
    spec: &WindowSpec,
    data: &Arc<crate::arrays::frame::DataFrame>,
) -> Result<Arc<Grouping>> {
    let scope = ctx.scope.merge(&Scope::bind(
        root,
        ctx.time_range,
        Value::Frame(Arc::clone(data)),
    ));
    let mut keys = Vec::with_capacity(spec.group_by.len());
    for key_expr in &spec.group_by {
        let name = key_expr.result_name();
        let column = match key_expr.column_name().and_then(|n| data.column(n)) {
            Some(column) => column.as_ref().clone(),
            None => {
                let value = ctx.evaluate_under(key_expr, &scope, ctx.aggcontext)?;
                match value.to_computed("window partition key")? {
                    Computed::Column(col) => col,
                    Computed::Scalar(v) => Column::repeat(&v, data.num_rows())?,
                }
            }
        };
        keys.push((name, column));
    }
    Grouping::from_keys(keys, data.num_rows())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::arrays::frame::DataFrame;
    use crate::engine::Engine;
    use crate::expr::build;
    use crate::source::MemorySource;

    fn engine() -> Engine {
        let frame = DataFrame::from_columns([
            ("g".to_string(), Column::int64s(&[1, 1, 2])),
            ("v".to_string(), Column::int64s(&[1, 2, 3])),
        ])
        .unwrap();
        Engine::new(Box::new(MemorySource::new().with_table("t", frame)))
    }

    #[test]
    fn unbounded_grouped_window_broadcasts() {
        let engine = engine();
        let table = build::table("t");
        let g = build::column(&table, "g", DataType::Int64);
        let v = build::column(&table, "v", DataType::Int64);
        let windowed = build::window(
            &build::count(&v, None),
            WindowSpec {
                group_by: vec![g],
                preceding: None,
                following: None,
            },
        );

        let out = engine.execute(&windowed).unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.as_ref(), &Column::int64s(&[2, 2, 1])),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn bounded_window_reduces_per_frame() {
        let engine = engine();
        let table = build::table("t");
        let v = build::column(&table, "v", DataType::Int64);
        let windowed = build::window(
            &build::sum(&v, None),
            WindowSpec {
                group_by: vec![],
                preceding: Some(1),
                following: Some(0),
            },
        );

        let out = engine.execute(&windowed).unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.as_ref(), &Column::int64s(&[1, 3, 5])),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ungrouped_unbounded_window_broadcasts_total() {
        let engine = engine();
        let table = build::table("t");
        let v = build::column(&table, "v", DataType::Int64);
        let windowed = build::window(
            &build::sum(&v, None),
            WindowSpec {
                group_by: vec![],
                preceding: None,
                following: None,
            },
        );

        let out = engine.execute(&windowed).unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.as_ref(), &Column::int64s(&[6, 6, 6])),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
