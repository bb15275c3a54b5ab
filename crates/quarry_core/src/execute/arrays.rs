//! Execution rules for array operations.

use quarry_error::{EngineError, Result};

use crate::arrays::compute::unary_elementwise;
use crate::arrays::scalar::ScalarValue;
use crate::dispatch::{Pattern, TypeClass};
use crate::execute::{EvalCtx, Registry};
use crate::expr::{ExprRef, OpKind};
use crate::value::Value;

const ARRAYISH: &[TypeClass] = &[TypeClass::List, TypeClass::Null, TypeClass::Series];

pub fn register(registry: &mut Registry) {
    use Pattern::{Exact, OneOf};

    registry.register(&[OpKind::ArrayLength], &[OneOf(ARRAYISH)], array_length);
    registry.register(
        &[OpKind::ArrayIndex],
        &[OneOf(ARRAYISH), Exact(TypeClass::Integer)],
        array_index,
    );
    registry.register(
        &[OpKind::ArraySlice],
        &[
            OneOf(ARRAYISH),
            Exact(TypeClass::Integer),
            OneOf(&[TypeClass::Integer, TypeClass::Null]),
        ],
        array_slice,
    );
    registry.register(
        &[OpKind::ArrayConcat],
        &[OneOf(ARRAYISH), OneOf(ARRAYISH)],
        array_concat,
    );
    registry.register(
        &[OpKind::ArrayRepeat],
        &[
            OneOf(&[TypeClass::List, TypeClass::Integer, TypeClass::Series]),
            OneOf(&[TypeClass::List, TypeClass::Integer, TypeClass::Series]),
        ],
        array_repeat,
    );
}

fn expect_list(value: &ScalarValue) -> Result<&Vec<ScalarValue>> {
    match value {
        ScalarValue::List(items) => Ok(items),
        other => Err(EngineError::unsupported_type(format!(
            "expected an array value, got {}",
            other.datatype()
        ))),
    }
}

fn array_length(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("array length")?;
    Ok(unary_elementwise(&operand, |v| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        Ok(ScalarValue::Int64(expect_list(v)?.len() as i64))
    })?
    .into())
}

/// Python-style index resolution: negatives count from the end, out of
/// bounds is absent.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

fn array_index(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("array index")?;
    let index = operands[1]
        .expect_scalar("array index")?
        .to_i64()
        .ok_or_else(|| EngineError::internal("array index must be an integer"))?;
    Ok(unary_elementwise(&operand, move |v| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        let items = expect_list(v)?;
        Ok(match resolve_index(index, items.len()) {
            Some(idx) => items[idx].clone(),
            None => ScalarValue::Null,
        })
    })?
    .into())
}

fn array_slice(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("array slice")?;
    let start = operands[1]
        .expect_scalar("slice start")?
        .to_i64()
        .ok_or_else(|| EngineError::internal("slice start must be an integer"))?;
    let stop = operands[2].expect_scalar("slice stop")?.to_i64();
    Ok(unary_elementwise(&operand, move |v| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        let items = expect_list(v)?;
        let len = items.len() as i64;
        let clamp = |bound: i64| -> usize {
            let resolved = if bound < 0 { bound + len } else { bound };
            resolved.clamp(0, len) as usize
        };
        let begin = clamp(start);
        let end = clamp(stop.unwrap_or(len));
        Ok(ScalarValue::List(if begin < end {
            items[begin..end].to_vec()
        } else {
            Vec::new()
        }))
    })?
    .into())
}

fn array_concat(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let left = operands[0].to_computed("array concat")?;
    let right = operands[1].to_computed("array concat")?;
    Ok(
        crate::arrays::compute::binary_elementwise(&left, &right, |a, b| {
            if a.is_null() || b.is_null() {
                return Ok(ScalarValue::Null);
            }
            let mut out = expect_list(a)?.clone();
            out.extend(expect_list(b)?.iter().cloned());
            Ok(ScalarValue::List(out))
        })?
        .into(),
    )
}

fn array_repeat(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let left = operands[0].to_computed("array repeat")?;
    let right = operands[1].to_computed("array repeat")?;
    Ok(
        crate::arrays::compute::binary_elementwise(&left, &right, |a, b| {
            if a.is_null() || b.is_null() {
                return Ok(ScalarValue::Null);
            }
            let (items, count) = match (a, b) {
                (ScalarValue::List(items), count) => (items, count),
                (count, ScalarValue::List(items)) => (items, count),
                _ => {
                    return Err(EngineError::unsupported_type(
                        "array repeat expects an array and an integer",
                    ));
                }
            };
            let count = count.to_i64().unwrap_or(0).max(0) as usize;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(ScalarValue::List(out))
        })?
        .into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::column::Column;
    use crate::arrays::datatype::{DataType, ListTypeMeta};
    use crate::arrays::frame::DataFrame;
    use crate::engine::Engine;
    use crate::expr::build;
    use crate::source::MemorySource;

    fn list(items: &[i64]) -> ScalarValue {
        ScalarValue::List(items.iter().map(|&v| ScalarValue::Int64(v)).collect())
    }

    fn engine() -> Engine {
        let col = Column::List {
            values: vec![
                Some(vec![ScalarValue::Int64(1), ScalarValue::Int64(2)]),
                Some(vec![ScalarValue::Int64(3)]),
                None,
            ],
            datatype: Box::new(DataType::Int64),
        };
        let frame = DataFrame::from_columns([("xs".to_string(), col)]).unwrap();
        Engine::new(Box::new(MemorySource::new().with_table("t", frame)))
    }

    fn xs() -> (Engine, crate::expr::ExprRef) {
        let engine = engine();
        let table = build::table("t");
        let xs = build::column(
            &table,
            "xs",
            DataType::List(ListTypeMeta::new(DataType::Int64)),
        );
        (engine, xs)
    }

    #[test]
    fn length_and_index() {
        let (engine, xs) = xs();

        let out = engine.execute(&build::array_length(&xs)).unwrap();
        match out {
            Value::Series(col) => {
                assert_eq!(
                    col.as_ref(),
                    &Column::Int64(vec![Some(2), Some(1), None])
                );
            }
            other => panic!("unexpected: {other:?}"),
        }

        let out = engine.execute(&build::array_index(&xs, -1)).unwrap();
        match out {
            Value::Series(col) => {
                assert_eq!(col.get(0), Some(ScalarValue::Int64(2)));
                assert_eq!(col.get(1), Some(ScalarValue::Int64(3)));
            }
            other => panic!("unexpected: {other:?}"),
        }

        // Out of bounds indexes to null.
        let out = engine.execute(&build::array_index(&xs, 5)).unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.get(0), Some(ScalarValue::Null)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn concat_and_repeat_scalars() {
        let engine = engine();
        let concat = build::array_concat(&build::lit(list(&[1])), &build::lit(list(&[2, 3])));
        match engine.execute(&concat).unwrap() {
            Value::Scalar(v) => assert_eq!(v, list(&[1, 2, 3])),
            other => panic!("unexpected: {other:?}"),
        }

        let repeat = build::array_repeat(&build::lit(list(&[7])), &build::lit(2_i64));
        match engine.execute(&repeat).unwrap() {
            Value::Scalar(v) => assert_eq!(v, list(&[7, 7])),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn slice_with_negative_bounds() {
        let engine = engine();
        let sliced = build::array_slice(&build::lit(list(&[1, 2, 3, 4])), 1, Some(-1));
        match engine.execute(&sliced).unwrap() {
            Value::Scalar(v) => assert_eq!(v, list(&[2, 3])),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
