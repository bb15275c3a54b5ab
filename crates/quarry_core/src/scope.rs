//! Binding environment threaded through evaluation.
//!
//! A scope maps node *identity* (not structure) plus the active time
//! range to an already-materialized value. Extending a scope for a
//! sub-tree never mutates the original: `merge` builds a new scope that
//! shadows prior bindings, so sibling branches sharing a parent scope
//! are unaffected.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::expr::ExprRef;
use crate::timerange::TimeRange;
use crate::value::Value;

/// Identity of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn of(expr: &ExprRef) -> NodeId {
        NodeId(Arc::as_ptr(expr) as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ScopeKey {
    node: NodeId,
    time: Option<TimeRange>,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    // Bound expressions are held alongside their values so node
    // identities stay live for the lifetime of the scope.
    bindings: HashMap<ScopeKey, (ExprRef, Value), ahash::RandomState>,
}

impl Scope {
    pub fn new() -> Scope {
        Scope::default()
    }

    /// A scope with a single binding.
    pub fn bind(node: &ExprRef, time: Option<TimeRange>, value: Value) -> Scope {
        Scope::new().with_binding(node, time, value)
    }

    /// Extend with one binding, shadowing any previous binding for the
    /// same (node, time) key.
    pub fn with_binding(&self, node: &ExprRef, time: Option<TimeRange>, value: Value) -> Scope {
        let mut out = self.clone();
        out.bindings.insert(
            ScopeKey {
                node: NodeId::of(node),
                time,
            },
            (Arc::clone(node), value),
        );
        out
    }

    /// Merge `other` over self: bindings in `other` shadow.
    pub fn merge(&self, other: &Scope) -> Scope {
        let mut out = self.clone();
        for (key, entry) in &other.bindings {
            out.bindings.insert(*key, entry.clone());
        }
        out
    }

    /// Look up a binding by node identity and time range.
    pub fn get(&self, node: &ExprRef, time: Option<TimeRange>) -> Option<&Value> {
        self.bindings
            .get(&ScopeKey {
                node: NodeId::of(node),
                time,
            })
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::scalar::ScalarValue;
    use crate::expr::build;

    #[test]
    fn merge_shadows_without_mutating() {
        let node = build::lit(1_i64);
        let base = Scope::bind(&node, None, Value::Scalar(ScalarValue::Int64(1)));
        let shadowing = Scope::bind(&node, None, Value::Scalar(ScalarValue::Int64(2)));

        let merged = base.merge(&shadowing);
        match merged.get(&node, None) {
            Some(Value::Scalar(ScalarValue::Int64(2))) => (),
            other => panic!("unexpected binding: {other:?}"),
        }
        // The original scope still sees its own binding.
        match base.get(&node, None) {
            Some(Value::Scalar(ScalarValue::Int64(1))) => (),
            other => panic!("unexpected binding: {other:?}"),
        }
    }

    #[test]
    fn identity_not_structure() {
        let a = build::lit(1_i64);
        let b = build::lit(1_i64);
        let scope = Scope::bind(&a, None, Value::Scalar(ScalarValue::Int64(1)));
        assert!(scope.get(&a, None).is_some());
        assert!(scope.get(&b, None).is_none());
    }

    #[test]
    fn time_ranges_never_collide() {
        let table = build::table("t");
        let range_a = TimeRange::new(0, 10);
        let range_b = TimeRange::new(10, 20);

        let scope = Scope::bind(&table, Some(range_a), Value::Scalar(ScalarValue::Int64(1)));
        assert!(scope.get(&table, Some(range_a)).is_some());
        assert!(scope.get(&table, Some(range_b)).is_none());
        assert!(scope.get(&table, None).is_none());
    }
}
