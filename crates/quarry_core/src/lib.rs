//! quarry: a type-directed dispatch interpreter for columnar query
//! expression trees.
//!
//! An immutable expression DAG is evaluated recursively against an
//! in-process columnar substrate. For every node, the implementation to
//! invoke is resolved from a [`dispatch::DispatchRegistry`] keyed on the
//! node's operation kind and the *runtime* types of its already
//! evaluated operands. Evaluation context — a [`scope::Scope`] of
//! bindings, an optional [`timerange::TimeRange`], and an
//! [`aggcontext::AggregationContext`] strategy — threads through every
//! recursive call.
//!
//! The [`engine::Engine`] wires the registry, type coercion table,
//! binary operator table, and a [`source::TableSource`] together and is
//! the entry point for evaluation.

pub mod aggcontext;
pub mod arrays;
pub mod coerce;
pub mod dispatch;
pub mod engine;
pub mod execute;
pub mod expr;
pub mod scope;
pub mod source;
pub mod timerange;
pub mod value;

pub use engine::Engine;
pub use quarry_error::{EngineError, ErrorKind, Result};
pub use value::Value;
