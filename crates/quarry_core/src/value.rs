use std::sync::Arc;

use quarry_error::{EngineError, Result};

use crate::arrays::column::Column;
use crate::arrays::compute::Computed;
use crate::arrays::datatype::DataType;
use crate::arrays::frame::DataFrame;
use crate::arrays::groupby::{GroupedColumn, GroupedFrame};
use crate::arrays::scalar::ScalarValue;
use crate::expr::{ExprRef, WindowSpec};

/// A materialized evaluation result, or a pass-through operand payload.
///
/// Dispatch keys on the runtime shape of these values, not on the
/// declared logical types of the nodes that produced them.
#[derive(Debug, Clone)]
pub enum Value {
    Scalar(ScalarValue),
    /// A columnar sequence aligned to a logical row index.
    Series(Arc<Column>),
    /// A columnar sequence plus the grouping it is partitioned by.
    SeriesGroupBy(GroupedColumn),
    Frame(Arc<DataFrame>),
    FrameGroupBy(GroupedFrame),
    /// A logical type payload, e.g. a cast target.
    Type(DataType),
    /// Element-wise evaluated operand list.
    Sequence(Vec<Value>),
    /// Unevaluated sub-expressions owned by the handler.
    Subtrees(Vec<ExprRef>),
    /// Window frame payload.
    Window(WindowSpec),
}

impl Value {
    pub fn series(column: Column) -> Value {
        Value::Series(Arc::new(column))
    }

    pub fn frame(frame: DataFrame) -> Value {
        Value::Frame(Arc::new(frame))
    }

    pub const fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    pub fn expect_scalar(&self, what: &str) -> Result<&ScalarValue> {
        match self {
            Value::Scalar(v) => Ok(v),
            other => Err(operand_error(what, "a scalar", other)),
        }
    }

    pub fn expect_series(&self, what: &str) -> Result<&Arc<Column>> {
        match self {
            Value::Series(col) => Ok(col),
            other => Err(operand_error(what, "a series", other)),
        }
    }

    pub fn expect_frame(&self, what: &str) -> Result<&Arc<DataFrame>> {
        match self {
            Value::Frame(df) => Ok(df),
            other => Err(operand_error(what, "a frame", other)),
        }
    }

    pub fn expect_type(&self, what: &str) -> Result<&DataType> {
        match self {
            Value::Type(datatype) => Ok(datatype),
            other => Err(operand_error(what, "a type", other)),
        }
    }

    pub fn expect_subtrees(&self, what: &str) -> Result<&[ExprRef]> {
        match self {
            Value::Subtrees(exprs) => Ok(exprs),
            other => Err(operand_error(what, "sub-expressions", other)),
        }
    }

    /// View as a kernel input, scalar or columnar.
    pub fn to_computed(&self, what: &str) -> Result<Computed> {
        match self {
            Value::Scalar(v) => Ok(Computed::Scalar(v.clone())),
            Value::Series(col) => Ok(Computed::Column(col.as_ref().clone())),
            other => Err(operand_error(what, "a scalar or series", other)),
        }
    }

    /// A short description of the runtime shape, for diagnostics.
    pub fn shape_name(&self) -> String {
        match self {
            Value::Scalar(v) => format!("scalar {}", v.datatype()),
            Value::Series(col) => format!("series of {}", col.datatype()),
            Value::SeriesGroupBy(gc) => format!("grouped series of {}", gc.column.datatype()),
            Value::Frame(_) => "frame".to_string(),
            Value::FrameGroupBy(_) => "grouped frame".to_string(),
            Value::Type(datatype) => format!("type {datatype}"),
            Value::Sequence(values) => format!("sequence of {} values", values.len()),
            Value::Subtrees(exprs) => format!("{} sub-expressions", exprs.len()),
            Value::Window(_) => "window frame".to_string(),
        }
    }
}

impl From<Computed> for Value {
    fn from(computed: Computed) -> Self {
        match computed {
            Computed::Scalar(v) => Value::Scalar(v),
            Computed::Column(col) => Value::series(col),
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(value: ScalarValue) -> Self {
        Value::Scalar(value)
    }
}

fn operand_error(what: &str, wanted: &str, got: &Value) -> EngineError {
    EngineError::internal(format!(
        "{what} expected {wanted}, got {}",
        got.shape_name()
    ))
}
