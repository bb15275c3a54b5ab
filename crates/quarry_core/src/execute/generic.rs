//! Execution rules for generic operations: literals, table leaves,
//! casts, element-wise value operations, conditionals, reductions, and
//! aggregation.

use std::sync::Arc;

use quarry_error::{EngineError, ErrorKind, Result};

use crate::aggcontext::{AggContextRef, AggInput, Summarize};
use crate::arrays::column::Column;
use crate::arrays::compute::{
    self,
    Computed,
    Reducer,
    binary_elementwise,
    unary_elementwise,
};
use crate::arrays::frame::DataFrame;
use crate::arrays::groupby::{GroupedColumn, Grouping};
use crate::arrays::ordkey::KeyValue;
use crate::arrays::scalar::ScalarValue;
use crate::dispatch::{COMPUTABLE, Pattern, SIMPLE, TypeClass};
use crate::execute::{EvalCtx, Registry};
use crate::expr::{Arg, ExprRef, OpKind};
use crate::scope::Scope;
use crate::source::TIME_COL;
use crate::value::Value;

const BINARY_OPS: &[OpKind] = &[
    OpKind::Add,
    OpKind::Subtract,
    OpKind::Multiply,
    OpKind::Divide,
    OpKind::Modulus,
    OpKind::Equals,
    OpKind::NotEquals,
    OpKind::Less,
    OpKind::LessEqual,
    OpKind::Greater,
    OpKind::GreaterEqual,
    OpKind::And,
    OpKind::Or,
];

const MATH_UNARY_OPS: &[OpKind] = &[
    OpKind::Abs,
    OpKind::Ceil,
    OpKind::Floor,
    OpKind::Sqrt,
    OpKind::Exp,
    OpKind::Ln,
    OpKind::Log2,
    OpKind::Log10,
    OpKind::Sign,
];

const REDUCTIONS: &[OpKind] = &[
    OpKind::Sum,
    OpKind::Mean,
    OpKind::Min,
    OpKind::Max,
    OpKind::Count,
    OpKind::CountDistinct,
    OpKind::Any,
    OpKind::All,
    OpKind::NotAny,
    OpKind::NotAll,
    OpKind::ArrayCollect,
];

const MASKABLE: &[TypeClass] = &[TypeClass::Series, TypeClass::SeriesGroupBy, TypeClass::Null];

pub fn register(registry: &mut Registry) {
    use Pattern::{Any, Exact, OneOf};

    // Leaves.
    registry.register(
        &[OpKind::Literal],
        &[Any, Exact(TypeClass::Type)],
        literal_value,
    );
    registry.register(
        &[OpKind::DatabaseTable],
        &[Exact(TypeClass::Str)],
        database_table,
    );
    registry.register(
        &[OpKind::TableColumn],
        &[Exact(TypeClass::Frame), Exact(TypeClass::Str)],
        table_column_frame,
    );
    registry.register(
        &[OpKind::TableColumn],
        &[Exact(TypeClass::FrameGroupBy), Exact(TypeClass::Str)],
        table_column_frame_group_by,
    );
    registry.register(
        &[OpKind::SelfReference],
        &[Exact(TypeClass::Frame)],
        self_reference,
    );
    registry.register(&[OpKind::RowId], &[Exact(TypeClass::Frame)], row_id);

    // Casts. The grouped variant is registered after the generic series
    // handler and dispatches more specifically, never shadowed by it.
    registry.register(
        &[OpKind::Cast],
        &[OneOf(SIMPLE), Exact(TypeClass::Type)],
        cast_scalar,
    );
    registry.register(
        &[OpKind::Cast],
        &[Exact(TypeClass::Series), Exact(TypeClass::Type)],
        cast_series,
    );
    registry.register(
        &[OpKind::Cast],
        &[Exact(TypeClass::SeriesGroupBy), Exact(TypeClass::Type)],
        cast_series_group_by,
    );

    // Unary value ops.
    registry.register(&[OpKind::Negate], &[OneOf(COMPUTABLE)], negate);
    registry.register(
        &[OpKind::Negate],
        &[Exact(TypeClass::SeriesGroupBy)],
        negate_group_by,
    );
    registry.register(&[OpKind::Not], &[OneOf(COMPUTABLE)], not);
    registry.register(
        &[OpKind::IsNull, OpKind::NotNull],
        &[OneOf(COMPUTABLE)],
        null_test,
    );
    registry.register(
        &[OpKind::IsNan, OpKind::IsInf],
        &[OneOf(&[TypeClass::Floating, TypeClass::Null, TypeClass::Series])],
        float_test,
    );
    registry.register(MATH_UNARY_OPS, &[OneOf(COMPUTABLE)], math_unary);
    registry.register(
        MATH_UNARY_OPS,
        &[Exact(TypeClass::SeriesGroupBy)],
        math_unary_group_by,
    );

    // Binary value ops, with grouped-column specializations.
    registry.register(
        BINARY_OPS,
        &[OneOf(COMPUTABLE), OneOf(COMPUTABLE)],
        binary_op,
    );
    registry.register(
        BINARY_OPS,
        &[
            Exact(TypeClass::SeriesGroupBy),
            Exact(TypeClass::SeriesGroupBy),
        ],
        binary_op_group_by_group_by,
    );
    registry.register(
        BINARY_OPS,
        &[Exact(TypeClass::SeriesGroupBy), OneOf(COMPUTABLE)],
        binary_op_group_by_other,
    );
    registry.register(
        BINARY_OPS,
        &[OneOf(COMPUTABLE), Exact(TypeClass::SeriesGroupBy)],
        binary_op_other_group_by,
    );

    registry.register(
        &[OpKind::Log],
        &[
            OneOf(COMPUTABLE),
            OneOf(&[
                TypeClass::Integer,
                TypeClass::Floating,
                TypeClass::Null,
                TypeClass::Series,
            ]),
        ],
        log_with_base,
    );
    registry.register(
        &[OpKind::Round],
        &[
            OneOf(COMPUTABLE),
            OneOf(&[TypeClass::Integer, TypeClass::Null, TypeClass::Series]),
        ],
        round,
    );
    let clip_bound = OneOf(&[
        TypeClass::Integer,
        TypeClass::Floating,
        TypeClass::Null,
        TypeClass::Series,
    ]);
    registry.register(
        &[OpKind::Clip],
        &[OneOf(COMPUTABLE), clip_bound, clip_bound],
        clip,
    );

    // Conditionals.
    registry.register(
        &[OpKind::Where],
        &[OneOf(&[TypeClass::Boolean, TypeClass::Null]), Any, Any],
        where_scalar_cond,
    );
    registry.register(
        &[OpKind::Where],
        &[Exact(TypeClass::Series), Any, Any],
        where_series_cond,
    );
    registry.register(
        &[OpKind::SimpleCase],
        &[
            OneOf(COMPUTABLE),
            Exact(TypeClass::Sequence),
            Exact(TypeClass::Sequence),
            Any,
        ],
        simple_case,
    );
    registry.register(
        &[OpKind::SearchedCase],
        &[Exact(TypeClass::Sequence), Exact(TypeClass::Sequence), Any],
        searched_case,
    );
    registry.register(
        &[OpKind::IfNull],
        &[OneOf(COMPUTABLE), OneOf(COMPUTABLE)],
        if_null,
    );
    registry.register(
        &[OpKind::NullIf],
        &[OneOf(COMPUTABLE), OneOf(COMPUTABLE)],
        null_if,
    );
    registry.register(&[OpKind::NullIfZero], &[OneOf(COMPUTABLE)], null_if_zero);
    registry.register(
        &[OpKind::Coalesce, OpKind::Greatest, OpKind::Least],
        &[Exact(TypeClass::Sequence)],
        row_wise_reduction,
    );
    registry.register(
        &[OpKind::Between],
        &[OneOf(COMPUTABLE), OneOf(COMPUTABLE), OneOf(COMPUTABLE)],
        between,
    );
    registry.register(
        &[OpKind::Contains, OpKind::NotContains],
        &[OneOf(COMPUTABLE), Exact(TypeClass::Sequence)],
        contains,
    );

    // Reductions over columns, plain and grouped.
    registry.register(
        REDUCTIONS,
        &[Exact(TypeClass::Series), OneOf(MASKABLE)],
        reduction_series,
    );
    registry.register(
        REDUCTIONS,
        &[Exact(TypeClass::SeriesGroupBy), OneOf(MASKABLE)],
        reduction_series_group_by,
    );
    let spread = &[OpKind::Variance, OpKind::StandardDev];
    registry.register(
        spread,
        &[Exact(TypeClass::Series), OneOf(MASKABLE), Exact(TypeClass::Str)],
        reduction_series,
    );
    registry.register(
        spread,
        &[
            Exact(TypeClass::SeriesGroupBy),
            OneOf(MASKABLE),
            Exact(TypeClass::Str),
        ],
        reduction_series_group_by,
    );
    registry.register(
        &[OpKind::Arbitrary],
        &[Exact(TypeClass::Series), OneOf(MASKABLE), Exact(TypeClass::Str)],
        reduction_series,
    );
    registry.register(
        &[OpKind::Arbitrary],
        &[
            Exact(TypeClass::SeriesGroupBy),
            OneOf(MASKABLE),
            Exact(TypeClass::Str),
        ],
        reduction_series_group_by,
    );
    registry.register(
        &[OpKind::Count],
        &[Exact(TypeClass::Frame), Exact(TypeClass::Null)],
        count_frame,
    );
    registry.register(
        &[OpKind::Count],
        &[Exact(TypeClass::FrameGroupBy), Exact(TypeClass::Null)],
        count_frame_group_by,
    );

    // Aggregation.
    registry.register(
        &[OpKind::Aggregation],
        &[
            Exact(TypeClass::Frame),
            Exact(TypeClass::Subtrees),
            Exact(TypeClass::Subtrees),
            Exact(TypeClass::Subtrees),
            Exact(TypeClass::Subtrees),
        ],
        aggregation_frame,
    );

    // Table ops.
    registry.register(
        &[OpKind::Limit],
        &[
            Exact(TypeClass::Frame),
            Exact(TypeClass::Integer),
            Exact(TypeClass::Integer),
        ],
        limit_frame,
    );
    registry.register(&[OpKind::Distinct], &[Exact(TypeClass::Frame)], distinct_frame);
    registry.register(
        &[OpKind::Union],
        &[
            Exact(TypeClass::Frame),
            Exact(TypeClass::Frame),
            Exact(TypeClass::Boolean),
        ],
        union_frames,
    );
    registry.register(
        &[OpKind::Intersection],
        &[Exact(TypeClass::Frame), Exact(TypeClass::Frame)],
        intersection_frames,
    );
    registry.register(
        &[OpKind::Difference],
        &[Exact(TypeClass::Frame), Exact(TypeClass::Frame)],
        difference_frames,
    );
}

// Leaves.

fn literal_value(ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let value = operands[0].expect_scalar("literal")?;
    let datatype = operands[1].expect_type("literal")?;
    Ok(Value::Scalar(
        ctx.evaluator.coercion.convert_scalar(value, datatype)?,
    ))
}

fn database_table(ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let name = operands[0]
        .expect_scalar("table leaf")?
        .as_str()
        .ok_or_else(|| EngineError::internal("table leaf expects a name"))?
        .to_string();
    let frame = ctx.evaluator.source.lookup_table(&name)?;

    let Some(range) = ctx.time_range else {
        return Ok(Value::Frame(frame));
    };

    let time_col = frame.column(TIME_COL).ok_or_else(|| {
        EngineError::new(
            ErrorKind::MissingTimeColumn,
            format!(
                "table '{name}' must have a time column named '{TIME_COL}' \
                 to execute with a time range"
            ),
        )
    })?;
    let mask: Vec<bool> = match time_col.as_ref() {
        Column::Timestamp { values, .. } => values
            .iter()
            .map(|v| v.map(|t| range.contains(t)).unwrap_or(false))
            .collect(),
        other => {
            return Err(EngineError::new(
                ErrorKind::MissingTimeColumn,
                format!(
                    "time column '{TIME_COL}' of table '{name}' has type {}, \
                     expected a timestamp",
                    other.datatype()
                ),
            ));
        }
    };
    Ok(Value::frame(frame.filter(&mask)?))
}

fn table_column_frame(_ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let frame = operands[0].expect_frame("table column")?;
    let name = operands[1]
        .expect_scalar("table column")?
        .as_str()
        .ok_or_else(|| EngineError::internal("table column expects a name"))?;
    let column = frame.column(name).ok_or_else(|| {
        EngineError::internal(format!(
            "no column '{name}' in the table for {}",
            node.kind
        ))
    })?;
    Ok(Value::Series(Arc::clone(column)))
}

fn table_column_frame_group_by(
    _ctx: &EvalCtx<'_>,
    _node: &ExprRef,
    operands: Vec<Value>,
) -> Result<Value> {
    let grouped = match &operands[0] {
        Value::FrameGroupBy(grouped) => grouped,
        other => {
            return Err(EngineError::internal(format!(
                "grouped table column expected a grouped frame, got {}",
                other.shape_name()
            )));
        }
    };
    let name = operands[1]
        .expect_scalar("table column")?
        .as_str()
        .ok_or_else(|| EngineError::internal("table column expects a name"))?;
    Ok(Value::SeriesGroupBy(grouped.column(name)?))
}

fn self_reference(_ctx: &EvalCtx<'_>, _node: &ExprRef, mut operands: Vec<Value>) -> Result<Value> {
    Ok(operands.remove(0))
}

fn row_id(_ctx: &EvalCtx<'_>, _node: &ExprRef, _operands: Vec<Value>) -> Result<Value> {
    Err(EngineError::operation_not_defined(
        "row ids are not supported by this backend",
    ))
}

// Casts.

fn cast_scalar(ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let value = operands[0].expect_scalar("cast")?;
    let target = operands[1].expect_type("cast")?;
    Ok(Value::Scalar(
        ctx.evaluator.coercion.convert_scalar(value, target)?,
    ))
}

fn cast_series(ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let column = operands[0].expect_series("cast")?;
    let target = operands[1].expect_type("cast")?;
    Ok(Value::series(
        ctx.evaluator.coercion.convert_column(column, target)?,
    ))
}

fn cast_series_group_by(ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let grouped = expect_group_by(&operands[0])?;
    let target = operands[1].expect_type("cast")?;
    let converted = ctx
        .evaluator
        .coercion
        .convert_column(&grouped.column, target)?;
    Ok(Value::SeriesGroupBy(grouped.with_column(converted)?))
}

// Unary ops.

fn negate(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("negate")?;
    Ok(unary_elementwise(&operand, compute::negate_scalar)?.into())
}

fn negate_group_by(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let grouped = expect_group_by(&operands[0])?;
    let negated = unary_elementwise(
        &Computed::Column(grouped.column.as_ref().clone()),
        compute::negate_scalar,
    )?;
    regroup(grouped, negated)
}

fn not(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("not")?;
    Ok(unary_elementwise(&operand, compute::not_scalar)?.into())
}

fn null_test(_ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("null test")?;
    let want_null = node.kind == OpKind::IsNull;
    Ok(unary_elementwise(&operand, |v| {
        Ok(ScalarValue::Boolean(v.is_null() == want_null))
    })?
    .into())
}

fn float_test(_ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("float test")?;
    let want_nan = node.kind == OpKind::IsNan;
    Ok(unary_elementwise(&operand, move |v| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        let value = v.to_f64().ok_or_else(|| {
            EngineError::unsupported_type(format!(
                "expected a floating value, got {}",
                v.datatype()
            ))
        })?;
        Ok(ScalarValue::Boolean(if want_nan {
            value.is_nan()
        } else {
            value.is_infinite()
        }))
    })?
    .into())
}

fn math_unary(_ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("math")?;
    let kind = node.kind;
    Ok(unary_elementwise(&operand, move |v| math_kernel(kind, v))?.into())
}

fn math_unary_group_by(ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let grouped = expect_group_by(&operands[0])?;
    let result = math_unary(
        ctx,
        node,
        vec![Value::Series(Arc::clone(&grouped.column))],
    )?;
    regroup(grouped, result.to_computed("math")?)
}

fn math_kernel(kind: OpKind, v: &ScalarValue) -> Result<ScalarValue> {
    if v.is_null() {
        return Ok(ScalarValue::Null);
    }
    match kind {
        OpKind::Abs => match v {
            ScalarValue::Float32(x) => Ok(ScalarValue::Float32(x.abs())),
            ScalarValue::Float64(x) => Ok(ScalarValue::Float64(x.abs())),
            other => match other.to_i64() {
                Some(x) => Ok(ScalarValue::Int64(x.abs())),
                None => Err(non_numeric(v)),
            },
        },
        OpKind::Ceil => float_to_int(v, f64::ceil),
        OpKind::Floor => float_to_int(v, f64::floor),
        OpKind::Sqrt => compute::float_unary(v, f64::sqrt),
        OpKind::Exp => compute::float_unary(v, f64::exp),
        OpKind::Ln => compute::float_unary(v, f64::ln),
        OpKind::Log2 => compute::float_unary(v, f64::log2),
        OpKind::Log10 => compute::float_unary(v, f64::log10),
        OpKind::Sign => {
            let x = v.to_f64().ok_or_else(|| non_numeric(v))?;
            Ok(ScalarValue::Int64(if x == 0.0 {
                0
            } else if x < 0.0 {
                -1
            } else {
                1
            }))
        }
        other => Err(EngineError::internal(format!(
            "{other} is not a math unary operation"
        ))),
    }
}

fn float_to_int(v: &ScalarValue, f: impl Fn(f64) -> f64) -> Result<ScalarValue> {
    let x = v.to_f64().ok_or_else(|| non_numeric(v))?;
    Ok(ScalarValue::Int64(f(x) as i64))
}

fn non_numeric(v: &ScalarValue) -> EngineError {
    EngineError::unsupported_type(format!("expected a numeric value, got {}", v.datatype()))
}

// Binary ops.

fn binary_op(ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let kernel = ctx.evaluator.binops.kernel(node.kind)?;
    let left = operands[0].to_computed("binary op")?;
    let right = operands[1].to_computed("binary op")?;
    Ok(binary_elementwise(&left, &right, kernel)?.into())
}

fn binary_op_group_by_group_by(
    ctx: &EvalCtx<'_>,
    node: &ExprRef,
    operands: Vec<Value>,
) -> Result<Value> {
    let left = expect_group_by(&operands[0])?;
    let right = expect_group_by(&operands[1])?;
    if !Arc::ptr_eq(&left.grouping, &right.grouping) && left.grouping != right.grouping {
        return Err(EngineError::shape_mismatch(format!(
            "cannot perform {} on two series with different groupings",
            node.kind
        )));
    }
    let result = binary_op(
        ctx,
        node,
        vec![
            Value::Series(Arc::clone(&left.column)),
            Value::Series(Arc::clone(&right.column)),
        ],
    )?;
    regroup(left, result.to_computed("binary op")?)
}

fn binary_op_group_by_other(
    ctx: &EvalCtx<'_>,
    node: &ExprRef,
    operands: Vec<Value>,
) -> Result<Value> {
    let left = expect_group_by(&operands[0])?;
    let result = binary_op(
        ctx,
        node,
        vec![Value::Series(Arc::clone(&left.column)), operands[1].clone()],
    )?;
    regroup(left, result.to_computed("binary op")?)
}

fn binary_op_other_group_by(
    ctx: &EvalCtx<'_>,
    node: &ExprRef,
    operands: Vec<Value>,
) -> Result<Value> {
    let right = expect_group_by(&operands[1])?;
    let result = binary_op(
        ctx,
        node,
        vec![operands[0].clone(), Value::Series(Arc::clone(&right.column))],
    )?;
    regroup(right, result.to_computed("binary op")?)
}

fn log_with_base(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("log")?;
    let base = operands[1].to_computed("log base")?;
    Ok(binary_elementwise(&operand, &base, |v, base| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        let x = v.to_f64().ok_or_else(|| non_numeric(v))?;
        match base {
            ScalarValue::Null => Ok(ScalarValue::Float64(x.ln())),
            base => {
                let b = base.to_f64().ok_or_else(|| non_numeric(base))?;
                Ok(ScalarValue::Float64(x.ln() / b.ln()))
            }
        }
    })?
    .into())
}

fn round(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("round")?;
    let places = operands[1].to_computed("round places")?;
    Ok(binary_elementwise(&operand, &places, |v, places| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        let x = v.to_f64().ok_or_else(|| non_numeric(v))?;
        match places {
            // No digits requested: round to an integer.
            ScalarValue::Null => Ok(ScalarValue::Int64(x.round() as i64)),
            places => {
                let digits = places.to_i64().ok_or_else(|| non_numeric(places))?;
                let factor = 10_f64.powi(digits as i32);
                Ok(ScalarValue::Float64((x * factor).round() / factor))
            }
        }
    })?
    .into())
}

fn clip(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("clip")?;
    let lower = operands[1].to_computed("clip lower")?;
    let upper = operands[2].to_computed("clip upper")?;
    // A null bound means no bound on that side.
    let clipped = binary_elementwise(&operand, &lower, |v, lo| {
        if v.is_null() || lo.is_null() {
            return Ok(v.clone());
        }
        Ok(match compute::compare_scalars(v, lo)? {
            Some(std::cmp::Ordering::Less) => lo.clone(),
            _ => v.clone(),
        })
    })?;
    Ok(binary_elementwise(&clipped, &upper, |v, hi| {
        if v.is_null() || hi.is_null() {
            return Ok(v.clone());
        }
        Ok(match compute::compare_scalars(v, hi)? {
            Some(std::cmp::Ordering::Greater) => hi.clone(),
            _ => v.clone(),
        })
    })?
    .into())
}

// Conditionals.

fn where_scalar_cond(_ctx: &EvalCtx<'_>, _node: &ExprRef, mut operands: Vec<Value>) -> Result<Value> {
    // All operands are materialized; picking a branch here avoids any
    // broadcast allocation.
    let cond = operands[0]
        .expect_scalar("where condition")?
        .as_bool()
        .unwrap_or(false);
    let picked = if cond { 1 } else { 2 };
    Ok(operands.remove(picked))
}

fn where_series_cond(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let cond = operands[0].expect_series("where condition")?;
    let truthy = operands[1].to_computed("where true branch")?;
    let falsy = operands[2].to_computed("where false branch")?;
    Ok(Value::series(compute::select(cond, &truthy, &falsy)?))
}

fn case_select(
    conditions: Vec<Computed>,
    results: Vec<Computed>,
    default: Computed,
) -> Result<Value> {
    if conditions.len() != results.len() {
        return Err(EngineError::shape_mismatch(format!(
            "case has {} conditions but {} results",
            conditions.len(),
            results.len()
        )));
    }
    let mut all: Vec<Computed> = conditions.clone();
    all.extend(results.iter().cloned());
    all.push(default.clone());

    match compute::final_size(&all)? {
        None => {
            for (cond, result) in conditions.iter().zip(&results) {
                if cond.value_at(0).as_bool().unwrap_or(false) {
                    return Ok(Value::Scalar(result.value_at(0)));
                }
            }
            Ok(Value::Scalar(default.value_at(0)))
        }
        Some(rows) => {
            let values = (0..rows).map(|row| {
                conditions
                    .iter()
                    .position(|cond| cond.value_at(row).as_bool().unwrap_or(false))
                    .map(|idx| results[idx].value_at(row))
                    .unwrap_or_else(|| default.value_at(row))
            });
            Ok(Value::series(Column::from_values_inferred(values)?))
        }
    }
}

fn sequence_to_computed(value: &Value, what: &str) -> Result<Vec<Computed>> {
    match value {
        Value::Sequence(values) => values.iter().map(|v| v.to_computed(what)).collect(),
        other => Err(EngineError::internal(format!(
            "{what} expected a sequence, got {}",
            other.shape_name()
        ))),
    }
}

fn simple_case(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let base = operands[0].to_computed("case base")?;
    let whens = sequence_to_computed(&operands[1], "case conditions")?;
    let thens = sequence_to_computed(&operands[2], "case results")?;
    let default = operands[3].to_computed("case default")?;

    let conditions = whens
        .iter()
        .map(|when| binary_elementwise(&base, when, compute::eq_scalars))
        .collect::<Result<Vec<_>>>()?;
    case_select(conditions, thens, default)
}

fn searched_case(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let whens = sequence_to_computed(&operands[0], "case conditions")?;
    let thens = sequence_to_computed(&operands[1], "case results")?;
    let default = operands[2].to_computed("case default")?;
    case_select(whens, thens, default)
}

fn if_null(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let value = operands[0].to_computed("ifnull")?;
    let replacement = operands[1].to_computed("ifnull")?;
    Ok(binary_elementwise(&value, &replacement, compute::coalesce_scalars)?.into())
}

fn null_if(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let value = operands[0].to_computed("nullif")?;
    let sentinel = operands[1].to_computed("nullif")?;
    Ok(binary_elementwise(&value, &sentinel, |v, s| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        if s.is_null() {
            return Ok(v.clone());
        }
        Ok(match compute::compare_scalars(v, s)? {
            Some(std::cmp::Ordering::Equal) => ScalarValue::Null,
            _ => v.clone(),
        })
    })?
    .into())
}

fn null_if_zero(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let value = operands[0].to_computed("nullifzero")?;
    Ok(unary_elementwise(&value, |v| {
        Ok(match v.to_f64() {
            Some(x) if x == 0.0 => ScalarValue::Null,
            _ => v.clone(),
        })
    })?
    .into())
}

fn row_wise_reduction(_ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let values = sequence_to_computed(&operands[0], "row-wise reduction")?;
    let kernel = match node.kind {
        OpKind::Coalesce => compute::coalesce_scalars,
        OpKind::Greatest => compute::greatest_scalars,
        OpKind::Least => compute::least_scalars,
        other => {
            return Err(EngineError::internal(format!(
                "{other} is not a row-wise reduction"
            )));
        }
    };
    Ok(compute::row_reduce(&values, kernel)?.into())
}

fn between(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let value = operands[0].to_computed("between")?;
    let lower = operands[1].to_computed("between lower")?;
    let upper = operands[2].to_computed("between upper")?;
    let above = binary_elementwise(&value, &lower, compute::gteq_scalars)?;
    let below = binary_elementwise(&value, &upper, compute::lteq_scalars)?;
    Ok(binary_elementwise(&above, &below, compute::and_scalars)?.into())
}

fn contains(_ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let value = operands[0].to_computed("contains")?;
    let elements = match &operands[1] {
        Value::Sequence(values) => values
            .iter()
            .map(|v| {
                let scalar = v.expect_scalar("contains element")?;
                KeyValue::from_scalar(scalar)
            })
            .collect::<Result<hashbrown::HashSet<_>>>()?,
        other => {
            return Err(EngineError::internal(format!(
                "contains expected a sequence of values, got {}",
                other.shape_name()
            )));
        }
    };
    let negate = node.kind == OpKind::NotContains;
    Ok(unary_elementwise(&value, move |v| {
        let found = KeyValue::from_scalar(v)
            .map(|key| elements.contains(&key))
            .unwrap_or(false);
        Ok(ScalarValue::Boolean(found != negate))
    })?
    .into())
}

// Reductions.

fn reducer_for(node: &ExprRef, operands: &[Value]) -> Result<Reducer> {
    Ok(match node.kind {
        OpKind::Sum => Reducer::Sum,
        OpKind::Mean => Reducer::Mean,
        OpKind::Min => Reducer::Min,
        OpKind::Max => Reducer::Max,
        OpKind::Count => Reducer::Count,
        OpKind::CountDistinct => Reducer::CountDistinct,
        OpKind::Any | OpKind::NotAny => Reducer::Any,
        OpKind::All | OpKind::NotAll => Reducer::All,
        OpKind::ArrayCollect => Reducer::Collect,
        OpKind::Variance | OpKind::StandardDev => {
            let how = operands[2]
                .expect_scalar("variance mode")?
                .as_str()
                .unwrap_or_default()
                .to_string();
            let ddof = match how.as_str() {
                "sample" => 1,
                "pop" => 0,
                other => {
                    return Err(EngineError::invalid_aggregation(format!(
                        "unknown variance mode '{other}'"
                    )));
                }
            };
            if node.kind == OpKind::Variance {
                Reducer::Variance { ddof }
            } else {
                Reducer::StandardDev { ddof }
            }
        }
        OpKind::Arbitrary => {
            let how = operands[2]
                .expect_scalar("arbitrary mode")?
                .as_str()
                .unwrap_or("first")
                .to_string();
            match how.as_str() {
                "first" => Reducer::First,
                "last" => Reducer::Last,
                other => {
                    return Err(EngineError::operation_not_defined(format!(
                        "Arbitrary '{other}' is not supported"
                    )));
                }
            }
        }
        other => {
            return Err(EngineError::internal(format!(
                "{other} is not a reduction"
            )));
        }
    })
}

fn reduction_mask(value: &Value) -> Result<Option<Vec<bool>>> {
    match value {
        Value::Scalar(ScalarValue::Null) => Ok(None),
        Value::Series(col) => Ok(Some(col.as_bool_mask()?)),
        Value::SeriesGroupBy(grouped) => Ok(Some(grouped.column.as_bool_mask()?)),
        other => Err(EngineError::internal(format!(
            "reduction mask must be boolean, got {}",
            other.shape_name()
        ))),
    }
}

/// Negate the result of a `NotAny`/`NotAll` reduction, whatever its
/// shape.
fn maybe_negate(node: &ExprRef, value: Value) -> Result<Value> {
    if !matches!(node.kind, OpKind::NotAny | OpKind::NotAll) {
        return Ok(value);
    }
    let computed = value.to_computed("reduction")?;
    Ok(unary_elementwise(&computed, compute::not_scalar)?.into())
}

fn reduction_series(ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let column = operands[0].expect_series("reduction")?;
    let reducer = reducer_for(node, &operands)?;
    let mask = reduction_mask(&operands[1])?;
    let result = ctx
        .aggcontext
        .agg(AggInput::Series(column.as_ref()), &reducer, mask.as_deref())?;
    maybe_negate(node, result)
}

fn reduction_series_group_by(
    ctx: &EvalCtx<'_>,
    node: &ExprRef,
    operands: Vec<Value>,
) -> Result<Value> {
    let grouped = expect_group_by(&operands[0])?;
    let reducer = reducer_for(node, &operands)?;
    let mask = reduction_mask(&operands[1])?;
    let result = ctx
        .aggcontext
        .agg(AggInput::Grouped(grouped), &reducer, mask.as_deref())?;
    maybe_negate(node, result)
}

fn count_frame(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let frame = operands[0].expect_frame("count")?;
    Ok(Value::Scalar(ScalarValue::Int64(frame.num_rows() as i64)))
}

fn count_frame_group_by(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let grouped = match &operands[0] {
        Value::FrameGroupBy(grouped) => grouped,
        other => {
            return Err(EngineError::internal(format!(
                "count expected a grouped frame, got {}",
                other.shape_name()
            )));
        }
    };
    Ok(Value::series(grouped.group_sizes()))
}

// Aggregation.

pub(crate) fn table_arg(node: &ExprRef) -> Result<&ExprRef> {
    match node.args.first() {
        Some(Arg::Node(table)) => Ok(table),
        _ => Err(EngineError::internal(format!(
            "{} has no table operand",
            node.kind
        ))),
    }
}

/// Evaluate predicate expressions and AND them into one mask over
/// `rows` rows.
pub(crate) fn predicate_conjunction(
    ctx: &EvalCtx<'_>,
    predicates: &[ExprRef],
    scope: &Scope,
    aggcontext: &AggContextRef,
    rows: usize,
) -> Result<Vec<bool>> {
    let mut conjunction: Option<Computed> = None;
    for predicate in predicates {
        let value = ctx.evaluate_under(predicate, scope, aggcontext)?;
        let computed = value.to_computed("predicate")?;
        conjunction = Some(match conjunction {
            None => computed,
            Some(existing) => binary_elementwise(&existing, &computed, compute::and_scalars)?,
        });
    }
    match conjunction {
        None => Ok(vec![true; rows]),
        Some(Computed::Column(col)) => col.as_bool_mask(),
        Some(Computed::Scalar(value)) => Ok(vec![value.as_bool().unwrap_or(false); rows]),
    }
}

fn aggregation_frame(ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let data = Arc::clone(operands[0].expect_frame("aggregation")?);
    let metrics = operands[1].expect_subtrees("aggregation metrics")?;
    let by = operands[2].expect_subtrees("aggregation grouping keys")?;
    let having = operands[3].expect_subtrees("aggregation having")?;
    let predicates = operands[4].expect_subtrees("aggregation predicates")?;

    if metrics.is_empty() {
        return Err(EngineError::invalid_aggregation(
            "no metrics found during aggregation execution",
        ));
    }
    let table = table_arg(node)?;
    let summarize: AggContextRef = Arc::new(Summarize);

    // Predicate filters apply before any grouping, ANDed together.
    let frame = if predicates.is_empty() {
        data
    } else {
        let scope = ctx
            .scope
            .merge(&Scope::bind(table, ctx.time_range, Value::Frame(Arc::clone(&data))));
        let mask = predicate_conjunction(ctx, predicates, &scope, ctx.aggcontext, data.num_rows())?;
        Arc::new(data.filter(&mask)?)
    };

    // Group keys: plain column references resolve by name, anything
    // else evaluates against the filtered table.
    let grouping = if by.is_empty() {
        None
    } else {
        let filtered_scope = ctx.scope.merge(&Scope::bind(
            table,
            ctx.time_range,
            Value::Frame(Arc::clone(&frame)),
        ));
        let mut keys = Vec::with_capacity(by.len());
        for key_expr in by {
            let name = key_expr.result_name();
            let column = match key_expr.column_name().and_then(|n| frame.column(n)) {
                Some(column) => column.as_ref().clone(),
                None => {
                    let value =
                        ctx.evaluate_under(key_expr, &filtered_scope, ctx.aggcontext)?;
                    match value.to_computed("grouping key")? {
                        Computed::Column(col) => col,
                        Computed::Scalar(v) => Column::repeat(&v, frame.num_rows())?,
                    }
                }
            };
            keys.push((name, column));
        }
        Some(Grouping::from_keys(keys, frame.num_rows())?)
    };

    // Metric sub-expressions see the grouped source in place of the
    // plain table; the extension lives in a merged scope and never
    // leaks to siblings.
    let source = match &grouping {
        Some(grouping) => Value::FrameGroupBy(crate::arrays::groupby::GroupedFrame::new(
            Arc::clone(&frame),
            Arc::clone(grouping),
        )?),
        None => Value::Frame(Arc::clone(&frame)),
    };
    let metric_scope = ctx
        .scope
        .merge(&Scope::bind(table, ctx.time_range, source));

    let expected_rows = grouping
        .as_ref()
        .map(|g| g.num_groups())
        .unwrap_or(1);

    let mut columns: Vec<(String, Column)> = Vec::new();
    if let Some(grouping) = &grouping {
        for (name, column) in grouping.key_columns() {
            columns.push((name.clone(), column.clone()));
        }
    }
    for metric in metrics {
        let value = ctx.evaluate_under(metric, &metric_scope, &summarize)?;
        let column = match value.to_computed("aggregation metric")? {
            Computed::Column(col) => col,
            Computed::Scalar(v) => Column::repeat(&v, expected_rows)?,
        };
        if column.len() != expected_rows {
            return Err(EngineError::internal(format!(
                "metric '{}' produced {} rows, expected {expected_rows}",
                metric.result_name(),
                column.len()
            )));
        }
        columns.push((metric.result_name(), column));
    }
    let result = DataFrame::from_columns(columns)?;

    if !having.is_empty() {
        if by.is_empty() {
            return Err(EngineError::invalid_aggregation(
                "filtering out aggregation values is not allowed without at \
                 least one grouping key",
            ));
        }
        let mask = predicate_conjunction(
            ctx,
            having,
            &metric_scope,
            &summarize,
            result.num_rows(),
        )?;
        if mask.len() != result.num_rows() {
            return Err(EngineError::internal(format!(
                "length of having predicate ({}) does not match length of the \
                 aggregated frame ({})",
                mask.len(),
                result.num_rows()
            )));
        }
        return Ok(Value::frame(result.filter(&mask)?));
    }
    Ok(Value::frame(result))
}

// Table ops.

fn limit_frame(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let frame = operands[0].expect_frame("limit")?;
    let nrows = operands[1]
        .expect_scalar("limit")?
        .to_i64()
        .unwrap_or(0)
        .max(0) as usize;
    let offset = operands[2]
        .expect_scalar("limit offset")?
        .to_i64()
        .unwrap_or(0)
        .max(0) as usize;
    Ok(Value::frame(frame.slice(offset, nrows)?))
}

fn frame_row_keys(frame: &DataFrame) -> Result<Vec<Vec<KeyValue>>> {
    let columns: Vec<_> = frame.iter_columns().map(|(_, col)| col.as_ref()).collect();
    (0..frame.num_rows())
        .map(|row| crate::arrays::ordkey::row_key(&columns, row))
        .collect()
}

fn distinct_frame(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let frame = operands[0].expect_frame("distinct")?;
    let keys = frame_row_keys(frame)?;
    let mut seen = hashbrown::HashSet::new();
    let mask: Vec<bool> = keys.into_iter().map(|key| seen.insert(key)).collect();
    Ok(Value::frame(frame.filter(&mask)?))
}

fn union_frames(ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let left = operands[0].expect_frame("union")?;
    let right = operands[1].expect_frame("union")?;
    let distinct = operands[2]
        .expect_scalar("union distinct flag")?
        .as_bool()
        .unwrap_or(false);
    let stacked = left.vstack(right)?;
    if distinct {
        return distinct_frame(ctx, node, vec![Value::frame(stacked)]);
    }
    Ok(Value::frame(stacked))
}

fn intersection_frames(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let left = operands[0].expect_frame("intersection")?;
    let right = operands[1].expect_frame("intersection")?;
    let right_keys: hashbrown::HashSet<_> = frame_row_keys(right)?.into_iter().collect();
    let mask: Vec<bool> = frame_row_keys(left)?
        .into_iter()
        .map(|key| right_keys.contains(&key))
        .collect();
    Ok(Value::frame(left.filter(&mask)?))
}

fn difference_frames(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let left = operands[0].expect_frame("difference")?;
    let right = operands[1].expect_frame("difference")?;
    let left_keys = frame_row_keys(left)?;
    let right_keys = frame_row_keys(right)?;
    let left_set: hashbrown::HashSet<_> = left_keys.iter().cloned().collect();
    let right_set: hashbrown::HashSet<_> = right_keys.iter().cloned().collect();

    let left_mask: Vec<bool> = left_keys
        .iter()
        .map(|key| !right_set.contains(key))
        .collect();
    let right_mask: Vec<bool> = right_keys
        .iter()
        .map(|key| !left_set.contains(key))
        .collect();
    Ok(Value::frame(
        left.filter(&left_mask)?.vstack(&right.filter(&right_mask)?)?,
    ))
}

// Shared helpers.

pub(crate) fn expect_group_by(value: &Value) -> Result<&GroupedColumn> {
    match value {
        Value::SeriesGroupBy(grouped) => Ok(grouped),
        other => Err(EngineError::internal(format!(
            "expected a grouped series, got {}",
            other.shape_name()
        ))),
    }
}

/// Re-attach a transformed column to its source grouping.
pub(crate) fn regroup(grouped: &GroupedColumn, computed: Computed) -> Result<Value> {
    let column = match computed {
        Computed::Column(col) => col,
        Computed::Scalar(v) => Column::repeat(&v, grouped.column.len())?,
    };
    Ok(Value::SeriesGroupBy(grouped.with_column(column)?))
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
            ("g".to_string(), Column::int64s(&[1, 1, 2, 2])),
            ("v".to_string(), Column::Int64(vec![Some(1), Some(2), None, Some(4)])),
            ("s".to_string(), Column::utf8s(&["a", "b", "a", "c"])),
        ])
        .unwrap();
        Engine::new(Box::new(MemorySource::new().with_table("t", frame)))
    }

    fn as_series(value: Value) -> Arc<Column> {
        match value {
            Value::Series(col) => col,
            other => panic!("expected a series, got {other:?}"),
        }
    }

    #[test]
    fn masked_reduction_over_series() {
        let engine = engine();
        let table = build::table("t");
        let v = build::column(&table, "v", DataType::Int64);
        let mask = build::eq(
            &build::column(&table, "g", DataType::Int64),
            &build::lit(1_i64),
        );

        match engine.execute(&build::sum(&v, Some(&mask))).unwrap() {
            Value::Scalar(ScalarValue::Int64(3)) => (),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn coalesce_broadcasts_and_picks_first_non_null() {
        let engine = engine();
        let table = build::table("t");
        let v = build::column(&table, "v", DataType::Int64);
        let expr = build::coalesce(vec![v, build::lit(0_i64)]);

        let col = as_series(engine.execute(&expr).unwrap());
        assert_eq!(col.as_ref(), &Column::int64s(&[1, 2, 0, 4]));
    }

    #[test]
    fn between_and_contains() {
        let engine = engine();
        let table = build::table("t");
        let v = build::column(&table, "v", DataType::Int64);

        let expr = build::between(&v, &build::lit(2_i64), &build::lit(4_i64));
        let col = as_series(engine.execute(&expr).unwrap());
        assert_eq!(
            col.as_ref(),
            &Column::Boolean(vec![Some(false), Some(true), None, Some(true)])
        );

        let s = build::column(&table, "s", DataType::Utf8);
        let expr = build::contains(&s, vec![build::lit("a"), build::lit("c")]);
        let col = as_series(engine.execute(&expr).unwrap());
        assert_eq!(col.as_ref(), &Column::bools(&[true, false, true, true]));
    }

    #[test]
    fn searched_case_with_default() {
        let engine = engine();
        let table = build::table("t");
        let v = build::column(&table, "v", DataType::Int64);
        let expr = build::searched_case(
            vec![
                build::lt(&v, &build::lit(2_i64)),
                build::lt(&v, &build::lit(3_i64)),
            ],
            vec![build::lit("low"), build::lit("mid")],
            Some(&build::lit("high")),
        );

        let col = as_series(engine.execute(&expr).unwrap());
        assert_eq!(col.as_ref(), &Column::utf8s(&["low", "mid", "high", "high"]));
    }

    #[test]
    fn grouped_binary_op_keeps_grouping() {
        let engine = engine();
        let table = build::table("t");
        let g = build::column(&table, "g", DataType::Int64);
        let v = build::column(&table, "v", DataType::Int64);

        // Per-group share of the group total: v / sum(v) over g.
        let share = build::div(&v, &build::sum(&v, None));
        let windowed = build::window(
            &share,
            crate::expr::WindowSpec {
                group_by: vec![g],
                preceding: None,
                following: None,
            },
        );

        let col = as_series(engine.execute(&windowed).unwrap());
        assert_eq!(
            col.as_ref(),
            &Column::Float64(vec![
                Some(1.0 / 3.0),
                Some(2.0 / 3.0),
                None,
                Some(1.0),
            ])
        );
    }

    #[test]
    fn distinct_union_limit() {
        let engine = engine();
        let table = build::table("t");
        let s_only = build::selection(
            &table,
            vec![build::column(&table, "s", DataType::Utf8)],
            vec![],
        );

        let out = engine.execute(&build::distinct(&s_only)).unwrap();
        let frame = out.expect_frame("distinct").unwrap();
        assert_eq!(
            frame.column("s").unwrap().as_ref(),
            &Column::utf8s(&["a", "b", "c"])
        );

        let unioned = build::union(&s_only, &s_only, true);
        let out = engine.execute(&unioned).unwrap();
        assert_eq!(out.expect_frame("union").unwrap().num_rows(), 3);

        let limited = build::limit(&table, 2, 1);
        let out = engine.execute(&limited).unwrap();
        let frame = out.expect_frame("limit").unwrap();
        assert_eq!(
            frame.column("v").unwrap().as_ref(),
            &Column::Int64(vec![Some(2), None])
        );
    }

    #[test]
    fn arbitrary_modes() {
        let engine = engine();
        let table = build::table("t");
        let v = build::column(&table, "v", DataType::Int64);

        match engine
            .execute(&build::arbitrary(&v, None, "first"))
            .unwrap()
        {
            Value::Scalar(ScalarValue::Int64(1)) => (),
            other => panic!("unexpected: {other:?}"),
        }

        let err = engine
            .execute(&build::arbitrary(&v, None, "median"))
            .unwrap_err();
        assert_eq!(
            err.kind(),
            quarry_error::ErrorKind::OperationNotDefined
        );
    }
}
