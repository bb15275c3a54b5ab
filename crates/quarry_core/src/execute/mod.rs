//! The recursive evaluator.
//!
//! Evaluation of a node: consult the scope by node identity (a hit
//! short-circuits recursion), evaluate operands left-to-right, resolve
//! an implementation from the dispatch registry keyed on the node's kind
//! and the operands' runtime classes, and invoke it. Handlers may
//! recurse for sub-expressions they own, under extended scopes that
//! never leak into sibling branches.

pub mod arrays;
pub mod generic;
pub mod join;
pub mod selection;
pub mod structs;
pub mod temporal;
pub mod window;

use hashbrown::HashMap;
use quarry_error::{EngineError, Result};
use tracing::trace;

use crate::aggcontext::AggContextRef;
use crate::arrays::scalar::ScalarValue;
use crate::coerce::TypeCoercion;
use crate::dispatch::{DispatchRegistry, classify};
use crate::expr::{Arg, ExprRef, OpKind};
use crate::scope::Scope;
use crate::source::TableSource;
use crate::timerange::TimeRange;
use crate::value::Value;

/// A physical implementation of one (operation, operand types) pairing.
pub type HandlerFn = fn(&EvalCtx<'_>, &ExprRef, Vec<Value>) -> Result<Value>;

pub type Registry = DispatchRegistry<HandlerFn>;

/// Element kernel for a binary operation.
pub type ScalarKernel = fn(&ScalarValue, &ScalarValue) -> Result<ScalarValue>;

/// Constructed-once lookup from binary operation kind to element
/// kernel. Injected into the evaluator; nothing consults it ambiently.
#[derive(Debug)]
pub struct BinaryOpTable {
    entries: HashMap<OpKind, ScalarKernel>,
}

impl BinaryOpTable {
    pub fn with_defaults() -> Self {
        use crate::arrays::compute;

        let mut entries: HashMap<OpKind, ScalarKernel> = HashMap::new();
        entries.insert(OpKind::Add, compute::add_scalars);
        entries.insert(OpKind::Subtract, compute::sub_scalars);
        entries.insert(OpKind::Multiply, compute::mul_scalars);
        entries.insert(OpKind::Divide, compute::div_scalars);
        entries.insert(OpKind::Modulus, compute::rem_scalars);
        entries.insert(OpKind::Equals, compute::eq_scalars);
        entries.insert(OpKind::NotEquals, compute::neq_scalars);
        entries.insert(OpKind::Less, compute::lt_scalars);
        entries.insert(OpKind::LessEqual, compute::lteq_scalars);
        entries.insert(OpKind::Greater, compute::gt_scalars);
        entries.insert(OpKind::GreaterEqual, compute::gteq_scalars);
        entries.insert(OpKind::And, compute::and_scalars);
        entries.insert(OpKind::Or, compute::or_scalars);
        BinaryOpTable { entries }
    }

    pub fn kernel(&self, kind: OpKind) -> Result<ScalarKernel> {
        self.entries.get(&kind).copied().ok_or_else(|| {
            EngineError::new(
                quarry_error::ErrorKind::NoImplementationFound,
                format!("binary operation {kind} has no registered kernel"),
            )
        })
    }
}

/// Borrowed engine state shared by every node evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    pub registry: &'a Registry,
    pub coercion: &'a TypeCoercion,
    pub binops: &'a BinaryOpTable,
    pub source: &'a dyn TableSource,
}

impl<'a> Evaluator<'a> {
    /// Evaluate an expression node to a materialized value.
    pub fn evaluate(
        &self,
        node: &ExprRef,
        scope: &Scope,
        time_range: Option<TimeRange>,
        aggcontext: &AggContextRef,
    ) -> Result<Value> {
        // The only memoization in the system: explicit scope bindings by
        // node identity. Structurally identical nodes recompute.
        if let Some(bound) = scope.get(node, time_range) {
            trace!(kind = %node.kind, "scope hit");
            return Ok(bound.clone());
        }
        // Bindings made without time sensitivity apply under any range,
        // except for table leaves: those must match the active range or
        // be rematerialized with it applied.
        if time_range.is_some() && node.kind != OpKind::DatabaseTable {
            if let Some(bound) = scope.get(node, None) {
                trace!(kind = %node.kind, "scope hit (time-insensitive)");
                return Ok(bound.clone());
            }
        }

        let ctx = EvalCtx {
            evaluator: *self,
            scope,
            time_range,
            aggcontext,
        };

        // Left-to-right; the first operand to fail determines the
        // reported error.
        let mut operands = Vec::with_capacity(node.args.len());
        for arg in &node.args {
            operands.push(ctx.evaluate_arg(arg)?);
        }

        let classes: Vec<_> = operands.iter().map(classify).collect();
        let handler = self.registry.resolve(node.kind, &classes)?;

        trace!(kind = %node.kind, operands = operands.len(), "dispatching");
        handler(&ctx, node, operands)
    }
}

/// Per-call evaluation context handed to handlers.
#[derive(Debug, Clone, Copy)]
pub struct EvalCtx<'a> {
    pub evaluator: Evaluator<'a>,
    pub scope: &'a Scope,
    pub time_range: Option<TimeRange>,
    pub aggcontext: &'a AggContextRef,
}

impl<'a> EvalCtx<'a> {
    /// Recurse with this context's scope and aggregation context.
    pub fn evaluate(&self, node: &ExprRef) -> Result<Value> {
        self.evaluator
            .evaluate(node, self.scope, self.time_range, self.aggcontext)
    }

    /// Recurse under a different scope and aggregation context. The
    /// caller owns the extension; this context is unaffected.
    pub fn evaluate_under(
        &self,
        node: &ExprRef,
        scope: &Scope,
        aggcontext: &AggContextRef,
    ) -> Result<Value> {
        self.evaluator
            .evaluate(node, scope, self.time_range, aggcontext)
    }

    fn evaluate_arg(&self, arg: &Arg) -> Result<Value> {
        Ok(match arg {
            Arg::Node(node) => self.evaluate(node)?,
            Arg::List(nodes) => Value::Sequence(
                nodes
                    .iter()
                    .map(|node| self.evaluate(node))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Arg::Subtrees(nodes) => Value::Subtrees(nodes.clone()),
            Arg::Type(datatype) => Value::Type(datatype.clone()),
            Arg::Scalar(value) => Value::Scalar(value.clone()),
            Arg::Window(spec) => Value::Window(spec.clone()),
            Arg::None => Value::Scalar(ScalarValue::Null),
        })
    }
}

/// Build the registry with every built-in execution rule.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    generic::register(&mut registry);
    selection::register(&mut registry);
    join::register(&mut registry);
    window::register(&mut registry);
    temporal::register(&mut registry);
    arrays::register(&mut registry);
    structs::register(&mut registry);
    registry
}
