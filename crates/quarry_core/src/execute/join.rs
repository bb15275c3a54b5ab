//! Equality hash joins and cross join over materialized frames.
//!
//! Only equality predicates between plain column references are
//! supported; overlapping non-key column names take pandas-style
//! `_x`/`_y` suffixes.

use std::sync::Arc;

use hashbrown::HashMap;
use quarry_error::{EngineError, Result};

use crate::arrays::column::Column;
use crate::arrays::frame::DataFrame;
use crate::arrays::ordkey::{KeyValue, row_key};
use crate::arrays::scalar::ScalarValue;
use crate::dispatch::{Pattern, TypeClass};
use crate::execute::{EvalCtx, Registry};
use crate::expr::{Arg, ExprRef, OpKind};
use crate::value::Value;

/// Suffixes applied to overlapping column names, left and right.
pub const JOIN_SUFFIXES: (&str, &str) = ("_x", "_y");

const JOIN_KINDS: &[OpKind] = &[OpKind::InnerJoin, OpKind::LeftJoin, OpKind::OuterJoin];

pub fn register(registry: &mut Registry) {
    use Pattern::Exact;

    let frames = [
        Exact(TypeClass::Frame),
        Exact(TypeClass::Frame),
        Exact(TypeClass::Subtrees),
    ];
    registry.register(&[OpKind::CrossJoin], &frames, cross_join);
    registry.register(JOIN_KINDS, &frames, equality_join);
}

/// Pull (left column, right column) name pairs out of the equality
/// predicates.
fn join_keys(predicates: &[ExprRef]) -> Result<(Vec<String>, Vec<String>)> {
    let mut left_keys = Vec::with_capacity(predicates.len());
    let mut right_keys = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        if predicate.kind != OpKind::Equals {
            return Err(EngineError::unsupported_type(format!(
                "only equality join predicates are supported, got {}",
                predicate.kind
            )));
        }
        let mut sides = predicate.args.iter().filter_map(|arg| match arg {
            Arg::Node(side) => side.column_name().map(str::to_string),
            _ => None,
        });
        let (Some(left), Some(right)) = (sides.next(), sides.next()) else {
            return Err(EngineError::unsupported_type(
                "join predicates must compare plain table columns",
            ));
        };
        left_keys.push(left);
        right_keys.push(right);
    }
    if left_keys.is_empty() {
        return Err(EngineError::unsupported_type(
            "joins require at least one equality predicate",
        ));
    }
    Ok((left_keys, right_keys))
}

/// Gather rows by optional index; `None` produces a null row.
fn take_optional(column: &Column, rows: &[Option<usize>]) -> Result<Column> {
    let datatype = column.datatype();
    Column::from_values(
        &datatype,
        rows.iter().map(|row| match row {
            Some(row) => column.get(*row).unwrap_or(ScalarValue::Null),
            None => ScalarValue::Null,
        }),
    )
}

/// Column layout of a join result: all left columns then all right
/// columns, suffixing names both sides share. Key columns with the same
/// name on both sides collapse into the left one.
fn assemble(
    left: &DataFrame,
    right: &DataFrame,
    left_rows: &[Option<usize>],
    right_rows: &[Option<usize>],
    shared_keys: &[(String, String)],
) -> Result<Value> {
    let collapsed: Vec<&str> = shared_keys
        .iter()
        .filter(|(l, r)| l == r)
        .map(|(l, _)| l.as_str())
        .collect();

    let mut columns: Vec<(String, Column)> = Vec::new();
    for (name, col) in left.iter_columns() {
        let out_name = if right.has_column(name) && !collapsed.contains(&name) {
            format!("{name}{}", JOIN_SUFFIXES.0)
        } else {
            name.to_string()
        };
        columns.push((out_name, take_optional(col, left_rows)?));
    }
    for (name, col) in right.iter_columns() {
        if collapsed.contains(&name) {
            continue;
        }
        let out_name = if left.has_column(name) {
            format!("{name}{}", JOIN_SUFFIXES.1)
        } else {
            name.to_string()
        };
        columns.push((out_name, take_optional(col, right_rows)?));
    }
    Ok(Value::frame(DataFrame::from_columns(columns)?))
}

fn key_columns<'a>(frame: &'a DataFrame, names: &[String], side: &str) -> Result<Vec<&'a Column>> {
    names
        .iter()
        .map(|name| {
            frame
                .column(name)
                .map(|col| col.as_ref())
                .ok_or_else(|| {
                    EngineError::internal(format!("{side} join key '{name}' is missing"))
                })
        })
        .collect()
}

fn cross_join(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let left = Arc::clone(operands[0].expect_frame("cross join")?);
    let right = Arc::clone(operands[1].expect_frame("cross join")?);

    let mut left_rows = Vec::with_capacity(left.num_rows() * right.num_rows());
    let mut right_rows = Vec::with_capacity(left.num_rows() * right.num_rows());
    for l in 0..left.num_rows() {
        for r in 0..right.num_rows() {
            left_rows.push(Some(l));
            right_rows.push(Some(r));
        }
    }
    assemble(&left, &right, &left_rows, &right_rows, &[])
}

fn equality_join(_ctx: &EvalCtx<'_>, node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let left = Arc::clone(operands[0].expect_frame("join")?);
    let right = Arc::clone(operands[1].expect_frame("join")?);
    let predicates = operands[2].expect_subtrees("join predicates")?;
    let (left_keys, right_keys) = join_keys(predicates)?;

    let left_cols = key_columns(&left, &left_keys, "left")?;
    let right_cols = key_columns(&right, &right_keys, "right")?;

    // Build side: key -> row indices. Rows with a null key never match.
    let mut build: HashMap<Vec<KeyValue>, Vec<usize>> = HashMap::new();
    for row in 0..right.num_rows() {
        let key = row_key(&right_cols, row)?;
        if key.iter().any(|k| matches!(k, KeyValue::Null)) {
            continue;
        }
        build.entry(key).or_default().push(row);
    }

    let mut left_rows: Vec<Option<usize>> = Vec::new();
    let mut right_rows: Vec<Option<usize>> = Vec::new();
    let mut matched_right = vec![false; right.num_rows()];

    for row in 0..left.num_rows() {
        let key = row_key(&left_cols, row)?;
        let matches = if key.iter().any(|k| matches!(k, KeyValue::Null)) {
            None
        } else {
            build.get(&key)
        };
        match matches {
            Some(rows) => {
                for &r in rows {
                    matched_right[r] = true;
                    left_rows.push(Some(row));
                    right_rows.push(Some(r));
                }
            }
            None => {
                if matches!(node.kind, OpKind::LeftJoin | OpKind::OuterJoin) {
                    left_rows.push(Some(row));
                    right_rows.push(None);
                }
            }
        }
    }
    if node.kind == OpKind::OuterJoin {
        for (row, matched) in matched_right.iter().enumerate() {
            if !matched {
                left_rows.push(None);
                right_rows.push(Some(row));
            }
        }
    }

    let shared: Vec<(String, String)> = left_keys
        .into_iter()
        .zip(right_keys)
        .collect();
    assemble(&left, &right, &left_rows, &right_rows, &shared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::engine::Engine;
    use crate::expr::build;
    use crate::source::MemorySource;

    fn engine() -> Engine {
        let left = DataFrame::from_columns([
            ("k".to_string(), Column::int64s(&[1, 2, 3])),
            ("v".to_string(), Column::int64s(&[10, 20, 30])),
        ])
        .unwrap();
        let right = DataFrame::from_columns([
            ("k".to_string(), Column::int64s(&[2, 3, 4])),
            ("v".to_string(), Column::int64s(&[200, 300, 400])),
        ])
        .unwrap();
        Engine::new(Box::new(
            MemorySource::new()
                .with_table("l", left)
                .with_table("r", right),
        ))
    }

    fn join_exprs() -> (ExprRef, ExprRef, ExprRef) {
        let l = build::table("l");
        let r = build::table("r");
        let pred = build::eq(
            &build::column(&l, "k", DataType::Int64),
            &build::column(&r, "k", DataType::Int64),
        );
        (l, r, pred)
    }

    #[test]
    fn inner_join_with_suffixes() {
        let engine = engine();
        let (l, r, pred) = join_exprs();
        let joined = build::inner_join(&l, &r, vec![pred]);

        let out = engine.execute(&joined).unwrap();
        let frame = out.expect_frame("test").unwrap();
        let names: Vec<_> = frame.column_names().collect();
        assert_eq!(names, vec!["k", "v_x", "v_y"]);
        assert_eq!(frame.column("k").unwrap().as_ref(), &Column::int64s(&[2, 3]));
        assert_eq!(
            frame.column("v_x").unwrap().as_ref(),
            &Column::int64s(&[20, 30])
        );
        assert_eq!(
            frame.column("v_y").unwrap().as_ref(),
            &Column::int64s(&[200, 300])
        );
    }

    #[test]
    fn left_join_fills_nulls() {
        let engine = engine();
        let (l, r, pred) = join_exprs();
        let joined = build::left_join(&l, &r, vec![pred]);

        let out = engine.execute(&joined).unwrap();
        let frame = out.expect_frame("test").unwrap();
        assert_eq!(frame.num_rows(), 3);
        assert_eq!(
            frame.column("v_y").unwrap().as_ref(),
            &Column::Int64(vec![None, Some(200), Some(300)]),
        );
    }

    #[test]
    fn outer_join_keeps_both_sides() {
        let engine = engine();
        let (l, r, pred) = join_exprs();
        let joined = build::outer_join(&l, &r, vec![pred]);

        let out = engine.execute(&joined).unwrap();
        let frame = out.expect_frame("test").unwrap();
        assert_eq!(frame.num_rows(), 4);
    }

    #[test]
    fn cross_join_is_cartesian() {
        let engine = engine();
        let (l, r, _) = join_exprs();
        let joined = build::cross_join(&l, &r);

        let out = engine.execute(&joined).unwrap();
        let frame = out.expect_frame("test").unwrap();
        assert_eq!(frame.num_rows(), 9);
        let names: Vec<_> = frame.column_names().collect();
        assert_eq!(names, vec!["k_x", "v_x", "k_y", "v_y"]);
    }

    #[test]
    fn non_equality_predicate_rejected() {
        let engine = engine();
        let l = build::table("l");
        let r = build::table("r");
        let pred = build::lt(
            &build::column(&l, "k", DataType::Int64),
            &build::column(&r, "k", DataType::Int64),
        );
        let joined = build::inner_join(&l, &r, vec![pred]);
        assert!(engine.execute(&joined).is_err());
    }
}
