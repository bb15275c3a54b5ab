//! Immutable query expression nodes.
//!
//! Nodes form a DAG shared through [`ExprRef`]; identity (not structural
//! equality) keys scope bindings. A node's operation is a closed
//! [`OpKind`] tag; its operands are a heterogeneous [`Arg`] list that
//! mixes sub-expressions with pass-through payloads such as a cast
//! target type.

pub mod build;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;

/// Operation tag of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    // Leaves.
    Literal,
    DatabaseTable,
    TableColumn,
    SelfReference,
    RowId,

    // Casts.
    Cast,

    // Unary value ops.
    Negate,
    Not,
    IsNull,
    NotNull,
    IsNan,
    IsInf,
    Abs,
    Ceil,
    Floor,
    Sqrt,
    Exp,
    Ln,
    Log2,
    Log10,
    Sign,

    // Binary value ops.
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Equals,
    NotEquals,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Log,
    Round,
    Clip,

    // Conditionals and row-wise combinations.
    Where,
    SimpleCase,
    SearchedCase,
    IfNull,
    NullIf,
    NullIfZero,
    Coalesce,
    Greatest,
    Least,
    Between,
    Contains,
    NotContains,

    // Reductions.
    Sum,
    Mean,
    Min,
    Max,
    Count,
    CountDistinct,
    Any,
    All,
    NotAny,
    NotAll,
    Variance,
    StandardDev,
    Arbitrary,
    ArrayCollect,

    // Table ops.
    Aggregation,
    Window,
    Selection,
    Limit,
    Distinct,
    Union,
    Intersection,
    Difference,

    // Joins.
    CrossJoin,
    InnerJoin,
    LeftJoin,
    OuterJoin,

    // Temporal.
    ExtractYear,
    ExtractMonth,
    ExtractDay,
    ExtractHour,
    ExtractMinute,
    ExtractSecond,
    ExtractMillisecond,
    DayOfWeekIndex,
    DayOfWeekName,
    DateTruncate,
    TimestampTruncate,

    // Arrays and structs.
    ArrayLength,
    ArrayIndex,
    ArraySlice,
    ArrayConcat,
    ArrayRepeat,
    StructField,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Row-framed window description.
///
/// `preceding`/`following` are row counts; `None` is unbounded on that
/// side. A frame unbounded on both sides covers the whole partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSpec {
    pub group_by: Vec<ExprRef>,
    pub preceding: Option<usize>,
    pub following: Option<usize>,
}

impl WindowSpec {
    pub const fn is_unbounded(&self) -> bool {
        self.preceding.is_none() && self.following.is_none()
    }
}

/// One operand of an expression node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Arg {
    /// A sub-expression, evaluated before dispatch.
    Node(ExprRef),
    /// A list of sub-expressions, evaluated element-wise before
    /// dispatch.
    List(Vec<ExprRef>),
    /// Sub-expressions passed through unevaluated; the handler owns
    /// their evaluation, typically under an extended scope.
    Subtrees(Vec<ExprRef>),
    /// A logical type payload.
    Type(DataType),
    /// A constant payload.
    Scalar(ScalarValue),
    /// A window frame payload.
    Window(WindowSpec),
    /// An absent optional operand.
    None,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Expr {
    pub kind: OpKind,
    pub args: Vec<Arg>,
    /// The declared logical type of this expression's value. Frame
    /// producing nodes carry `Null`.
    pub datatype: DataType,
    pub name: Option<String>,
}

pub type ExprRef = Arc<Expr>;

impl Expr {
    pub fn new(kind: OpKind, args: Vec<Arg>, datatype: DataType) -> ExprRef {
        Arc::new(Expr {
            kind,
            args,
            datatype,
            name: None,
        })
    }

    pub fn named(
        kind: OpKind,
        args: Vec<Arg>,
        datatype: DataType,
        name: impl Into<String>,
    ) -> ExprRef {
        Arc::new(Expr {
            kind,
            args,
            datatype,
            name: Some(name.into()),
        })
    }

    /// The name this expression's result column should carry.
    pub fn result_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match self.kind {
            OpKind::TableColumn => self
                .column_name()
                .map(str::to_string)
                .unwrap_or_else(|| self.kind.to_string()),
            kind => kind.to_string(),
        }
    }

    /// For a table-column node, the referenced column name.
    pub fn column_name(&self) -> Option<&str> {
        if self.kind != OpKind::TableColumn {
            return None;
        }
        self.args.iter().find_map(|arg| match arg {
            Arg::Scalar(ScalarValue::Utf8(name)) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Whether this node materializes a frame.
    pub const fn produces_frame(&self) -> bool {
        matches!(
            self.kind,
            OpKind::DatabaseTable
                | OpKind::SelfReference
                | OpKind::Aggregation
                | OpKind::Selection
                | OpKind::Limit
                | OpKind::Distinct
                | OpKind::Union
                | OpKind::Intersection
                | OpKind::Difference
                | OpKind::CrossJoin
                | OpKind::InnerJoin
                | OpKind::LeftJoin
                | OpKind::OuterJoin
        )
    }

}

fn collect_root_tables(expr: &ExprRef, out: &mut Vec<ExprRef>) {
    if expr.produces_frame() {
        if !out.iter().any(|existing| Arc::ptr_eq(existing, expr)) {
            out.push(Arc::clone(expr));
        }
        return;
    }
    for arg in &expr.args {
        match arg {
            Arg::Node(child) => collect_root_tables(child, out),
            Arg::List(children) | Arg::Subtrees(children) => {
                for child in children {
                    collect_root_tables(child, out);
                }
            }
            Arg::Window(spec) => {
                for child in &spec.group_by {
                    collect_root_tables(child, out);
                }
            }
            _ => (),
        }
    }
}

/// The highest frame-producing nodes under (and including) the given
/// expression, deduplicated by identity.
pub fn root_tables(expr: &ExprRef) -> Vec<ExprRef> {
    let mut out = Vec::new();
    collect_root_tables(expr, &mut out);
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(name) = &self.name {
            write!(f, " as {name}")?;
        }
        Ok(())
    }
}
