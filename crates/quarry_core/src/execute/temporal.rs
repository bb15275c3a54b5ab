//! Execution rules for timestamp and date operations.
//!
//! Field extraction and truncation work on the wall clock a value reads
//! as in its own timezone; truncation re-localizes the truncated wall
//! time so the zone metadata survives.

use chrono::{Datelike, NaiveDate, Timelike};
use quarry_error::{EngineError, Result};

use crate::arrays::datatype::{TimeUnit, TimestampTypeMeta};
use crate::arrays::scalar::ScalarValue;
use crate::coerce::{localize_wall, wall_nanos};
use crate::dispatch::{Pattern, TypeClass};
use crate::execute::{EvalCtx, Registry};
use crate::expr::{ExprRef, OpKind};
use crate::value::Value;

const NANOS_PER_DAY: i64 = 24 * 3_600_000_000_000;

const EXTRACT_OPS: &[OpKind] = &[
    OpKind::ExtractYear,
    OpKind::ExtractMonth,
    OpKind::ExtractDay,
    OpKind::ExtractHour,
    OpKind::ExtractMinute,
    OpKind::ExtractSecond,
    OpKind::ExtractMillisecond,
    OpKind::DayOfWeekIndex,
    OpKind::DayOfWeekName,
];

const TEMPORAL: &[TypeClass] = &[
    TypeClass::Timestamp,
    TypeClass::Date,
    TypeClass::Null,
    TypeClass::Series,
];

pub fn register(registry: &mut Registry) {
    use Pattern::{Exact, OneOf};

    registry.register(EXTRACT_OPS, &[OneOf(TEMPORAL)], extract_field);
    registry.register(&[OpKind::DateTruncate], &[OneOf(TEMPORAL)], date_truncate);
    registry.register(
        &[OpKind::TimestampTruncate],
        &[OneOf(TEMPORAL), Exact(TypeClass::Str)],
        timestamp_truncate,
    );
}

/// The wall-clock datetime a temporal scalar reads as.
fn wall_datetime(value: &ScalarValue) -> Result<chrono::NaiveDateTime> {
    match value {
        ScalarValue::Timestamp(ts) => {
            let wall = wall_nanos(ts)?;
            Ok(chrono::DateTime::from_timestamp_nanos(wall).naive_utc())
        }
        ScalarValue::Date(days) => {
            let date = NaiveDate::from_num_days_from_ce_opt(*days + 719_163).ok_or_else(|| {
                EngineError::cast(format!("date {days} out of range"))
            })?;
            Ok(date.and_hms_opt(0, 0, 0).unwrap())
        }
        other => Err(EngineError::unsupported_type(format!(
            "expected a timestamp or date, got {}",
            other.datatype()
        ))),
    }
}

fn extract_field(_ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("extract")?;
    let kind = node.kind;
    Ok(crate::arrays::compute::unary_elementwise(&operand, move |v| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        let dt = wall_datetime(v)?;
        Ok(match kind {
            OpKind::ExtractYear => ScalarValue::Int32(dt.year()),
            OpKind::ExtractMonth => ScalarValue::Int32(dt.month() as i32),
            OpKind::ExtractDay => ScalarValue::Int32(dt.day() as i32),
            OpKind::ExtractHour => ScalarValue::Int32(dt.hour() as i32),
            OpKind::ExtractMinute => ScalarValue::Int32(dt.minute() as i32),
            OpKind::ExtractSecond => ScalarValue::Int32(dt.second() as i32),
            OpKind::ExtractMillisecond => {
                ScalarValue::Int32((dt.nanosecond() / 1_000_000) as i32)
            }
            // Monday is 0, matching the substrate's day-of-week index.
            OpKind::DayOfWeekIndex => {
                ScalarValue::Int16(dt.weekday().num_days_from_monday() as i16)
            }
            OpKind::DayOfWeekName => ScalarValue::Utf8(dt.format("%A").to_string()),
            other => {
                return Err(EngineError::internal(format!(
                    "{other} is not a temporal extraction"
                )));
            }
        })
    })?
    .into())
}

fn date_truncate(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("date")?;
    Ok(crate::arrays::compute::unary_elementwise(&operand, |v| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        if let ScalarValue::Date(_) = v {
            return Ok(v.clone());
        }
        match v {
            ScalarValue::Timestamp(ts) => {
                let wall = wall_nanos(ts)?;
                Ok(ScalarValue::Date(wall.div_euclid(NANOS_PER_DAY) as i32))
            }
            other => Err(EngineError::unsupported_type(format!(
                "expected a timestamp, got {}",
                other.datatype()
            ))),
        }
    })?
    .into())
}

fn timestamp_truncate(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("truncate")?;
    let unit = operands[1]
        .expect_scalar("truncate unit")?
        .as_str()
        .unwrap_or_default()
        .to_string();
    Ok(crate::arrays::compute::unary_elementwise(&operand, move |v| {
        if v.is_null() {
            return Ok(ScalarValue::Null);
        }
        let ScalarValue::Timestamp(ts) = v else {
            return Err(EngineError::unsupported_type(format!(
                "expected a timestamp, got {}",
                v.datatype()
            )));
        };
        let dt = wall_datetime(v)?;
        let truncated = match unit.as_str() {
            "Y" => NaiveDate::from_ymd_opt(dt.year(), 1, 1).unwrap().and_hms_opt(0, 0, 0),
            "M" => NaiveDate::from_ymd_opt(dt.year(), dt.month(), 1)
                .unwrap()
                .and_hms_opt(0, 0, 0),
            "D" => dt.date().and_hms_opt(0, 0, 0),
            "h" => dt.date().and_hms_opt(dt.hour(), 0, 0),
            "m" => dt.date().and_hms_opt(dt.hour(), dt.minute(), 0),
            "s" => dt.date().and_hms_opt(dt.hour(), dt.minute(), dt.second()),
            other => {
                return Err(EngineError::unsupported_type(format!(
                    "unsupported truncation unit '{other}'"
                )));
            }
        }
        .unwrap();
        let wall = truncated
            .and_utc()
            .timestamp_nanos_opt()
            .ok_or_else(|| EngineError::cast("timestamp out of range"))?;
        let meta = match &ts.timezone {
            Some(tz) => TimestampTypeMeta::with_timezone(TimeUnit::Nanosecond, tz.clone()),
            None => TimestampTypeMeta::new(TimeUnit::Nanosecond),
        };
        localize_wall(wall, &meta)
    })?
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::column::Column;
    use crate::arrays::datatype::DataType;
    use crate::arrays::frame::DataFrame;
    use crate::arrays::scalar::TimestampScalar;
    use crate::engine::Engine;
    use crate::expr::build;
    use crate::source::MemorySource;

    const HOUR: i64 = 3_600_000_000_000;

    fn engine() -> Engine {
        // 1970-01-01 00:00, 1970-01-02 03:00, 1970-01-03 06:00.
        let frame = DataFrame::from_columns([(
            "ts".to_string(),
            Column::timestamps(&[0, NANOS_PER_DAY + 3 * HOUR, 2 * NANOS_PER_DAY + 6 * HOUR]),
        )])
        .unwrap();
        Engine::new(Box::new(MemorySource::new().with_table("t", frame)))
    }

    #[test]
    fn extract_fields() {
        let engine = engine();
        let table = build::table("t");
        let ts = build::column(&table, "ts", DataType::timestamp());

        let out = engine.execute(&build::extract_day(&ts)).unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.as_ref(), &Column::int32s(&[1, 2, 3])),
            other => panic!("unexpected: {other:?}"),
        }

        let out = engine.execute(&build::extract_hour(&ts)).unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.as_ref(), &Column::int32s(&[0, 3, 6])),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn day_of_week() {
        let engine = engine();
        let table = build::table("t");
        let ts = build::column(&table, "ts", DataType::timestamp());

        // 1970-01-01 was a Thursday.
        let out = engine.execute(&build::day_of_week_index(&ts)).unwrap();
        match out {
            Value::Series(col) => {
                assert_eq!(col.get(0), Some(ScalarValue::Int16(3)));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let out = engine.execute(&build::day_of_week_name(&ts)).unwrap();
        match out {
            Value::Series(col) => {
                assert_eq!(col.get(0), Some(ScalarValue::from("Thursday")));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn truncate_to_day() {
        let engine = engine();
        let table = build::table("t");
        let ts = build::column(&table, "ts", DataType::timestamp());

        let out = engine
            .execute(&build::timestamp_truncate(&ts, "D"))
            .unwrap();
        match out {
            Value::Series(col) => {
                assert_eq!(
                    col.get(1),
                    Some(ScalarValue::Timestamp(TimestampScalar::new(NANOS_PER_DAY)))
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn date_truncation_drops_time_of_day() {
        let engine = engine();
        let table = build::table("t");
        let ts = build::column(&table, "ts", DataType::timestamp());

        let out = engine.execute(&build::date(&ts)).unwrap();
        match out {
            Value::Series(col) => {
                assert_eq!(col.as_ref(), &Column::Date(vec![Some(0), Some(1), Some(2)]));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
