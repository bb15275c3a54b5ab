//! Helpers for constructing expression trees.
//!
//! The query-building layer proper lives upstream; these exist so tests
//! and embedders can assemble trees without hand-writing nodes.

use std::sync::Arc;

use crate::arrays::datatype::{DataType, IntervalUnit};
use crate::arrays::scalar::{IntervalScalar, ScalarValue};
use crate::expr::{Arg, Expr, ExprRef, OpKind, WindowSpec};

/// Rename an expression's result column.
pub fn named(expr: ExprRef, name: impl Into<String>) -> ExprRef {
    Arc::new(Expr {
        kind: expr.kind,
        args: expr.args.clone(),
        datatype: expr.datatype.clone(),
        name: Some(name.into()),
    })
}

pub fn table(name: impl Into<String>) -> ExprRef {
    Expr::new(
        OpKind::DatabaseTable,
        vec![Arg::Scalar(ScalarValue::Utf8(name.into()))],
        DataType::Null,
    )
}

pub fn self_reference(table: &ExprRef) -> ExprRef {
    Expr::new(
        OpKind::SelfReference,
        vec![Arg::Node(Arc::clone(table))],
        DataType::Null,
    )
}

pub fn column(table: &ExprRef, name: impl Into<String>, datatype: DataType) -> ExprRef {
    Expr::new(
        OpKind::TableColumn,
        vec![
            Arg::Node(Arc::clone(table)),
            Arg::Scalar(ScalarValue::Utf8(name.into())),
        ],
        datatype,
    )
}

/// A literal with its type inferred from the value.
pub fn lit(value: impl Into<ScalarValue>) -> ExprRef {
    let value = value.into();
    let datatype = value.datatype();
    lit_typed(value, datatype)
}

pub fn lit_typed(value: impl Into<ScalarValue>, datatype: DataType) -> ExprRef {
    Expr::new(
        OpKind::Literal,
        vec![Arg::Scalar(value.into()), Arg::Type(datatype.clone())],
        datatype,
    )
}

pub fn interval_lit(count: i64, unit: IntervalUnit) -> ExprRef {
    lit_typed(
        ScalarValue::Interval(IntervalScalar::new(count, unit)),
        DataType::Interval(unit),
    )
}

pub fn cast(expr: &ExprRef, to: DataType) -> ExprRef {
    Expr::new(
        OpKind::Cast,
        vec![Arg::Node(Arc::clone(expr)), Arg::Type(to.clone())],
        to,
    )
}

fn unary(kind: OpKind, operand: &ExprRef, datatype: DataType) -> ExprRef {
    Expr::new(kind, vec![Arg::Node(Arc::clone(operand))], datatype)
}

pub fn negate(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Negate, operand, operand.datatype.clone())
}

pub fn not(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Not, operand, DataType::Boolean)
}

pub fn is_null(operand: &ExprRef) -> ExprRef {
    unary(OpKind::IsNull, operand, DataType::Boolean)
}

pub fn not_null(operand: &ExprRef) -> ExprRef {
    unary(OpKind::NotNull, operand, DataType::Boolean)
}

pub fn is_nan(operand: &ExprRef) -> ExprRef {
    unary(OpKind::IsNan, operand, DataType::Boolean)
}

pub fn is_inf(operand: &ExprRef) -> ExprRef {
    unary(OpKind::IsInf, operand, DataType::Boolean)
}

pub fn abs(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Abs, operand, operand.datatype.clone())
}

pub fn ceil(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Ceil, operand, DataType::Int64)
}

pub fn floor(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Floor, operand, DataType::Int64)
}

pub fn sqrt(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Sqrt, operand, DataType::Float64)
}

pub fn exp(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Exp, operand, DataType::Float64)
}

pub fn ln(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Ln, operand, DataType::Float64)
}

pub fn log2(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Log2, operand, DataType::Float64)
}

pub fn log10(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Log10, operand, DataType::Float64)
}

pub fn sign(operand: &ExprRef) -> ExprRef {
    unary(OpKind::Sign, operand, DataType::Int64)
}

fn binary(kind: OpKind, left: &ExprRef, right: &ExprRef, datatype: DataType) -> ExprRef {
    Expr::new(
        kind,
        vec![Arg::Node(Arc::clone(left)), Arg::Node(Arc::clone(right))],
        datatype,
    )
}

fn arith_result(left: &ExprRef, right: &ExprRef) -> DataType {
    if left.datatype.is_floating() || right.datatype.is_floating() {
        DataType::Float64
    } else {
        left.datatype.clone()
    }
}

pub fn add(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::Add, left, right, arith_result(left, right))
}

pub fn sub(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::Subtract, left, right, arith_result(left, right))
}

pub fn mul(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::Multiply, left, right, arith_result(left, right))
}

pub fn div(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::Divide, left, right, DataType::Float64)
}

pub fn modulus(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::Modulus, left, right, arith_result(left, right))
}

pub fn eq(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::Equals, left, right, DataType::Boolean)
}

pub fn neq(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::NotEquals, left, right, DataType::Boolean)
}

pub fn lt(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::Less, left, right, DataType::Boolean)
}

pub fn lteq(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::LessEqual, left, right, DataType::Boolean)
}

pub fn gt(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::Greater, left, right, DataType::Boolean)
}

pub fn gteq(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::GreaterEqual, left, right, DataType::Boolean)
}

pub fn and(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::And, left, right, DataType::Boolean)
}

pub fn or(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::Or, left, right, DataType::Boolean)
}

/// Logarithm with an optional base; natural log when absent.
pub fn log(operand: &ExprRef, base: Option<&ExprRef>) -> ExprRef {
    Expr::new(
        OpKind::Log,
        vec![
            Arg::Node(Arc::clone(operand)),
            base.map(|b| Arg::Node(Arc::clone(b))).unwrap_or(Arg::None),
        ],
        DataType::Float64,
    )
}

pub fn round(operand: &ExprRef, places: Option<&ExprRef>) -> ExprRef {
    let datatype = if places.is_some() {
        DataType::Float64
    } else {
        DataType::Int64
    };
    Expr::new(
        OpKind::Round,
        vec![
            Arg::Node(Arc::clone(operand)),
            places.map(|p| Arg::Node(Arc::clone(p))).unwrap_or(Arg::None),
        ],
        datatype,
    )
}

pub fn clip(operand: &ExprRef, lower: Option<&ExprRef>, upper: Option<&ExprRef>) -> ExprRef {
    Expr::new(
        OpKind::Clip,
        vec![
            Arg::Node(Arc::clone(operand)),
            lower.map(|e| Arg::Node(Arc::clone(e))).unwrap_or(Arg::None),
            upper.map(|e| Arg::Node(Arc::clone(e))).unwrap_or(Arg::None),
        ],
        operand.datatype.clone(),
    )
}

pub fn where_(cond: &ExprRef, truthy: &ExprRef, falsy: &ExprRef) -> ExprRef {
    Expr::new(
        OpKind::Where,
        vec![
            Arg::Node(Arc::clone(cond)),
            Arg::Node(Arc::clone(truthy)),
            Arg::Node(Arc::clone(falsy)),
        ],
        truthy.datatype.clone(),
    )
}

pub fn simple_case(
    base: &ExprRef,
    whens: Vec<ExprRef>,
    thens: Vec<ExprRef>,
    default: Option<&ExprRef>,
) -> ExprRef {
    let datatype = thens
        .first()
        .map(|t| t.datatype.clone())
        .unwrap_or(DataType::Null);
    Expr::new(
        OpKind::SimpleCase,
        vec![
            Arg::Node(Arc::clone(base)),
            Arg::List(whens),
            Arg::List(thens),
            default.map(|e| Arg::Node(Arc::clone(e))).unwrap_or(Arg::None),
        ],
        datatype,
    )
}

pub fn searched_case(
    whens: Vec<ExprRef>,
    thens: Vec<ExprRef>,
    default: Option<&ExprRef>,
) -> ExprRef {
    let datatype = thens
        .first()
        .map(|t| t.datatype.clone())
        .unwrap_or(DataType::Null);
    Expr::new(
        OpKind::SearchedCase,
        vec![
            Arg::List(whens),
            Arg::List(thens),
            default.map(|e| Arg::Node(Arc::clone(e))).unwrap_or(Arg::None),
        ],
        datatype,
    )
}

pub fn if_null(value: &ExprRef, replacement: &ExprRef) -> ExprRef {
    binary(OpKind::IfNull, value, replacement, value.datatype.clone())
}

pub fn null_if(value: &ExprRef, sentinel: &ExprRef) -> ExprRef {
    binary(OpKind::NullIf, value, sentinel, value.datatype.clone())
}

pub fn null_if_zero(value: &ExprRef) -> ExprRef {
    unary(OpKind::NullIfZero, value, value.datatype.clone())
}

fn value_list(kind: OpKind, operands: Vec<ExprRef>) -> ExprRef {
    let datatype = operands
        .first()
        .map(|e| e.datatype.clone())
        .unwrap_or(DataType::Null);
    Expr::new(kind, vec![Arg::List(operands)], datatype)
}

pub fn coalesce(operands: Vec<ExprRef>) -> ExprRef {
    value_list(OpKind::Coalesce, operands)
}

pub fn greatest(operands: Vec<ExprRef>) -> ExprRef {
    value_list(OpKind::Greatest, operands)
}

pub fn least(operands: Vec<ExprRef>) -> ExprRef {
    value_list(OpKind::Least, operands)
}

pub fn between(value: &ExprRef, lower: &ExprRef, upper: &ExprRef) -> ExprRef {
    Expr::new(
        OpKind::Between,
        vec![
            Arg::Node(Arc::clone(value)),
            Arg::Node(Arc::clone(lower)),
            Arg::Node(Arc::clone(upper)),
        ],
        DataType::Boolean,
    )
}

pub fn contains(value: &ExprRef, elements: Vec<ExprRef>) -> ExprRef {
    Expr::new(
        OpKind::Contains,
        vec![Arg::Node(Arc::clone(value)), Arg::List(elements)],
        DataType::Boolean,
    )
}

pub fn not_contains(value: &ExprRef, elements: Vec<ExprRef>) -> ExprRef {
    Expr::new(
        OpKind::NotContains,
        vec![Arg::Node(Arc::clone(value)), Arg::List(elements)],
        DataType::Boolean,
    )
}

fn reduction(
    kind: OpKind,
    operand: &ExprRef,
    mask: Option<&ExprRef>,
    datatype: DataType,
) -> ExprRef {
    Expr::new(
        kind,
        vec![
            Arg::Node(Arc::clone(operand)),
            mask.map(|m| Arg::Node(Arc::clone(m))).unwrap_or(Arg::None),
        ],
        datatype,
    )
}

pub fn sum(operand: &ExprRef, mask: Option<&ExprRef>) -> ExprRef {
    reduction(OpKind::Sum, operand, mask, operand.datatype.clone())
}

pub fn mean(operand: &ExprRef, mask: Option<&ExprRef>) -> ExprRef {
    reduction(OpKind::Mean, operand, mask, DataType::Float64)
}

pub fn min(operand: &ExprRef, mask: Option<&ExprRef>) -> ExprRef {
    reduction(OpKind::Min, operand, mask, operand.datatype.clone())
}

pub fn max(operand: &ExprRef, mask: Option<&ExprRef>) -> ExprRef {
    reduction(OpKind::Max, operand, mask, operand.datatype.clone())
}

pub fn count(operand: &ExprRef, mask: Option<&ExprRef>) -> ExprRef {
    reduction(OpKind::Count, operand, mask, DataType::Int64)
}

pub fn count_distinct(operand: &ExprRef, mask: Option<&ExprRef>) -> ExprRef {
    reduction(OpKind::CountDistinct, operand, mask, DataType::Int64)
}

pub fn any(operand: &ExprRef) -> ExprRef {
    reduction(OpKind::Any, operand, None, DataType::Boolean)
}

pub fn all(operand: &ExprRef) -> ExprRef {
    reduction(OpKind::All, operand, None, DataType::Boolean)
}

pub fn not_any(operand: &ExprRef) -> ExprRef {
    reduction(OpKind::NotAny, operand, None, DataType::Boolean)
}

pub fn not_all(operand: &ExprRef) -> ExprRef {
    reduction(OpKind::NotAll, operand, None, DataType::Boolean)
}

/// Variance with `how` one of `"sample"` or `"pop"`.
pub fn variance(operand: &ExprRef, mask: Option<&ExprRef>, how: &str) -> ExprRef {
    Expr::new(
        OpKind::Variance,
        vec![
            Arg::Node(Arc::clone(operand)),
            mask.map(|m| Arg::Node(Arc::clone(m))).unwrap_or(Arg::None),
            Arg::Scalar(ScalarValue::Utf8(how.to_string())),
        ],
        DataType::Float64,
    )
}

pub fn standard_dev(operand: &ExprRef, mask: Option<&ExprRef>, how: &str) -> ExprRef {
    Expr::new(
        OpKind::StandardDev,
        vec![
            Arg::Node(Arc::clone(operand)),
            mask.map(|m| Arg::Node(Arc::clone(m))).unwrap_or(Arg::None),
            Arg::Scalar(ScalarValue::Utf8(how.to_string())),
        ],
        DataType::Float64,
    )
}

/// Pick an arbitrary value per group; `how` is `"first"` or `"last"`.
pub fn arbitrary(operand: &ExprRef, mask: Option<&ExprRef>, how: &str) -> ExprRef {
    Expr::new(
        OpKind::Arbitrary,
        vec![
            Arg::Node(Arc::clone(operand)),
            mask.map(|m| Arg::Node(Arc::clone(m))).unwrap_or(Arg::None),
            Arg::Scalar(ScalarValue::Utf8(how.to_string())),
        ],
        operand.datatype.clone(),
    )
}

pub fn array_collect(operand: &ExprRef) -> ExprRef {
    reduction(
        OpKind::ArrayCollect,
        operand,
        None,
        DataType::List(crate::arrays::datatype::ListTypeMeta::new(
            operand.datatype.clone(),
        )),
    )
}

pub fn aggregate(
    table: &ExprRef,
    metrics: Vec<ExprRef>,
    by: Vec<ExprRef>,
    having: Vec<ExprRef>,
    predicates: Vec<ExprRef>,
) -> ExprRef {
    Expr::new(
        OpKind::Aggregation,
        vec![
            Arg::Node(Arc::clone(table)),
            Arg::Subtrees(metrics),
            Arg::Subtrees(by),
            Arg::Subtrees(having),
            Arg::Subtrees(predicates),
        ],
        DataType::Null,
    )
}

pub fn window(operand: &ExprRef, spec: WindowSpec) -> ExprRef {
    Expr::new(
        OpKind::Window,
        vec![
            Arg::Subtrees(vec![Arc::clone(operand)]),
            Arg::Window(spec),
        ],
        operand.datatype.clone(),
    )
}

pub fn selection(table: &ExprRef, projections: Vec<ExprRef>, predicates: Vec<ExprRef>) -> ExprRef {
    Expr::new(
        OpKind::Selection,
        vec![
            Arg::Node(Arc::clone(table)),
            Arg::Subtrees(projections),
            Arg::Subtrees(predicates),
        ],
        DataType::Null,
    )
}

pub fn limit(table: &ExprRef, nrows: i64, offset: i64) -> ExprRef {
    Expr::new(
        OpKind::Limit,
        vec![
            Arg::Node(Arc::clone(table)),
            Arg::Scalar(ScalarValue::Int64(nrows)),
            Arg::Scalar(ScalarValue::Int64(offset)),
        ],
        DataType::Null,
    )
}

pub fn distinct(table: &ExprRef) -> ExprRef {
    Expr::new(
        OpKind::Distinct,
        vec![Arg::Node(Arc::clone(table))],
        DataType::Null,
    )
}

pub fn union(left: &ExprRef, right: &ExprRef, distinct: bool) -> ExprRef {
    Expr::new(
        OpKind::Union,
        vec![
            Arg::Node(Arc::clone(left)),
            Arg::Node(Arc::clone(right)),
            Arg::Scalar(ScalarValue::Boolean(distinct)),
        ],
        DataType::Null,
    )
}

pub fn intersection(left: &ExprRef, right: &ExprRef) -> ExprRef {
    Expr::new(
        OpKind::Intersection,
        vec![Arg::Node(Arc::clone(left)), Arg::Node(Arc::clone(right))],
        DataType::Null,
    )
}

pub fn difference(left: &ExprRef, right: &ExprRef) -> ExprRef {
    Expr::new(
        OpKind::Difference,
        vec![Arg::Node(Arc::clone(left)), Arg::Node(Arc::clone(right))],
        DataType::Null,
    )
}

fn join(kind: OpKind, left: &ExprRef, right: &ExprRef, predicates: Vec<ExprRef>) -> ExprRef {
    Expr::new(
        kind,
        vec![
            Arg::Node(Arc::clone(left)),
            Arg::Node(Arc::clone(right)),
            Arg::Subtrees(predicates),
        ],
        DataType::Null,
    )
}

pub fn cross_join(left: &ExprRef, right: &ExprRef) -> ExprRef {
    join(OpKind::CrossJoin, left, right, Vec::new())
}

pub fn inner_join(left: &ExprRef, right: &ExprRef, predicates: Vec<ExprRef>) -> ExprRef {
    join(OpKind::InnerJoin, left, right, predicates)
}

pub fn left_join(left: &ExprRef, right: &ExprRef, predicates: Vec<ExprRef>) -> ExprRef {
    join(OpKind::LeftJoin, left, right, predicates)
}

pub fn outer_join(left: &ExprRef, right: &ExprRef, predicates: Vec<ExprRef>) -> ExprRef {
    join(OpKind::OuterJoin, left, right, predicates)
}

fn temporal_unary(kind: OpKind, operand: &ExprRef, datatype: DataType) -> ExprRef {
    unary(kind, operand, datatype)
}

pub fn extract_year(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::ExtractYear, operand, DataType::Int32)
}

pub fn extract_month(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::ExtractMonth, operand, DataType::Int32)
}

pub fn extract_day(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::ExtractDay, operand, DataType::Int32)
}

pub fn extract_hour(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::ExtractHour, operand, DataType::Int32)
}

pub fn extract_minute(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::ExtractMinute, operand, DataType::Int32)
}

pub fn extract_second(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::ExtractSecond, operand, DataType::Int32)
}

pub fn extract_millisecond(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::ExtractMillisecond, operand, DataType::Int32)
}

pub fn day_of_week_index(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::DayOfWeekIndex, operand, DataType::Int16)
}

pub fn day_of_week_name(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::DayOfWeekName, operand, DataType::Utf8)
}

pub fn date(operand: &ExprRef) -> ExprRef {
    temporal_unary(OpKind::DateTruncate, operand, operand.datatype.clone())
}

/// Truncate to `unit`: one of `Y`, `M`, `D`, `h`, `m`, `s`.
pub fn timestamp_truncate(operand: &ExprRef, unit: &str) -> ExprRef {
    Expr::new(
        OpKind::TimestampTruncate,
        vec![
            Arg::Node(Arc::clone(operand)),
            Arg::Scalar(ScalarValue::Utf8(unit.to_string())),
        ],
        operand.datatype.clone(),
    )
}

pub fn array_length(operand: &ExprRef) -> ExprRef {
    unary(OpKind::ArrayLength, operand, DataType::Int64)
}

pub fn array_index(operand: &ExprRef, index: i64) -> ExprRef {
    Expr::new(
        OpKind::ArrayIndex,
        vec![
            Arg::Node(Arc::clone(operand)),
            Arg::Scalar(ScalarValue::Int64(index)),
        ],
        DataType::Null,
    )
}

pub fn array_slice(operand: &ExprRef, start: i64, stop: Option<i64>) -> ExprRef {
    Expr::new(
        OpKind::ArraySlice,
        vec![
            Arg::Node(Arc::clone(operand)),
            Arg::Scalar(ScalarValue::Int64(start)),
            stop.map(|s| Arg::Scalar(ScalarValue::Int64(s)))
                .unwrap_or(Arg::None),
        ],
        operand.datatype.clone(),
    )
}

pub fn array_concat(left: &ExprRef, right: &ExprRef) -> ExprRef {
    binary(OpKind::ArrayConcat, left, right, left.datatype.clone())
}

pub fn array_repeat(operand: &ExprRef, times: &ExprRef) -> ExprRef {
    binary(OpKind::ArrayRepeat, operand, times, operand.datatype.clone())
}

pub fn struct_field(operand: &ExprRef, field: impl Into<String>) -> ExprRef {
    Expr::new(
        OpKind::StructField,
        vec![
            Arg::Node(Arc::clone(operand)),
            Arg::Scalar(ScalarValue::Utf8(field.into())),
        ],
        DataType::Null,
    )
}

pub fn row_id(table: &ExprRef) -> ExprRef {
    Expr::new(
        OpKind::RowId,
        vec![Arg::Node(Arc::clone(table))],
        DataType::Int64,
    )
}
