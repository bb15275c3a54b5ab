//! Type-signature keyed dispatch.
//!
//! The registry maps an operation kind plus an ordered list of operand
//! type patterns to an implementation. Resolution picks the most
//! specific registered signature for the runtime classes of the
//! evaluated operands: exact match beats union-member match beats
//! wildcard, compared left-to-right across positions, with ties broken
//! by registration order (later registrations shadow earlier ones for
//! identical signatures).
//!
//! Candidate lists are insertion-ordered vectors. Nothing here depends
//! on hash iteration order, so resolution is stable across runs.

use std::fmt;

use hashbrown::HashMap;
use quarry_error::{EngineError, ErrorKind, Result};

use crate::arrays::scalar::ScalarValue;
use crate::expr::OpKind;
use crate::value::Value;

/// Runtime shape class of an operand value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Null,
    Boolean,
    Integer,
    Floating,
    Str,
    Timestamp,
    Date,
    Interval,
    List,
    Struct,
    /// A logical type payload.
    Type,
    Series,
    SeriesGroupBy,
    Frame,
    FrameGroupBy,
    /// An element-wise evaluated operand list.
    Sequence,
    /// Unevaluated sub-expressions.
    Subtrees,
    /// A window frame payload.
    Window,
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Classify a runtime value for dispatch.
pub fn classify(value: &Value) -> TypeClass {
    match value {
        Value::Scalar(scalar) => match scalar {
            ScalarValue::Null => TypeClass::Null,
            ScalarValue::Boolean(_) => TypeClass::Boolean,
            ScalarValue::Int8(_)
            | ScalarValue::Int16(_)
            | ScalarValue::Int32(_)
            | ScalarValue::Int64(_)
            | ScalarValue::UInt8(_)
            | ScalarValue::UInt16(_)
            | ScalarValue::UInt32(_)
            | ScalarValue::UInt64(_) => TypeClass::Integer,
            ScalarValue::Float32(_) | ScalarValue::Float64(_) => TypeClass::Floating,
            ScalarValue::Utf8(_) => TypeClass::Str,
            ScalarValue::Timestamp(_) => TypeClass::Timestamp,
            ScalarValue::Date(_) => TypeClass::Date,
            ScalarValue::Interval(_) => TypeClass::Interval,
            ScalarValue::List(_) => TypeClass::List,
            ScalarValue::Struct(_) => TypeClass::Struct,
        },
        Value::Series(_) => TypeClass::Series,
        Value::SeriesGroupBy(_) => TypeClass::SeriesGroupBy,
        Value::Frame(_) => TypeClass::Frame,
        Value::FrameGroupBy(_) => TypeClass::FrameGroupBy,
        Value::Type(_) => TypeClass::Type,
        Value::Sequence(_) => TypeClass::Sequence,
        Value::Subtrees(_) => TypeClass::Subtrees,
        Value::Window(_) => TypeClass::Window,
    }
}

/// All plain scalar classes.
pub const SIMPLE: &[TypeClass] = &[
    TypeClass::Null,
    TypeClass::Boolean,
    TypeClass::Integer,
    TypeClass::Floating,
    TypeClass::Str,
    TypeClass::Timestamp,
    TypeClass::Date,
    TypeClass::Interval,
];

/// Scalar or columnar value classes.
pub const COMPUTABLE: &[TypeClass] = &[
    TypeClass::Null,
    TypeClass::Boolean,
    TypeClass::Integer,
    TypeClass::Floating,
    TypeClass::Str,
    TypeClass::Timestamp,
    TypeClass::Date,
    TypeClass::Interval,
    TypeClass::Series,
];

/// One position of an operand type signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Exact(TypeClass),
    OneOf(&'static [TypeClass]),
    Any,
}

impl Pattern {
    fn matches(&self, class: TypeClass) -> bool {
        match self {
            Pattern::Exact(want) => *want == class,
            Pattern::OneOf(options) => options.contains(&class),
            Pattern::Any => true,
        }
    }

    /// Exact > union-member > wildcard.
    const fn specificity(&self) -> u8 {
        match self {
            Pattern::Exact(_) => 2,
            Pattern::OneOf(_) => 1,
            Pattern::Any => 0,
        }
    }
}

#[derive(Debug)]
struct Registration<H> {
    patterns: Vec<Pattern>,
    handler: H,
    seq: usize,
}

/// Multi-argument, type-based lookup from (operation kind, operand type
/// signature) to an implementation.
///
/// Registration happens once at engine construction; the registry is
/// immutable afterwards and shared by reference across evaluations.
#[derive(Debug)]
pub struct DispatchRegistry<H> {
    entries: HashMap<OpKind, Vec<Registration<H>>>,
    next_seq: usize,
}

impl<H> Default for DispatchRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> DispatchRegistry<H> {
    pub fn new() -> Self {
        DispatchRegistry {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Register a handler for each of the given operation kinds under
    /// one operand signature.
    pub fn register(&mut self, kinds: &[OpKind], patterns: &[Pattern], handler: H)
    where
        H: Clone,
    {
        for &kind in kinds {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.entries.entry(kind).or_default().push(Registration {
                patterns: patterns.to_vec(),
                handler: handler.clone(),
                seq,
            });
        }
    }

    /// Select the most specific implementation for the operand classes.
    pub fn resolve(&self, kind: OpKind, classes: &[TypeClass]) -> Result<&H> {
        let candidates = self.entries.get(&kind);
        let mut best: Option<&Registration<H>> = None;

        for candidate in candidates.into_iter().flatten() {
            if candidate.patterns.len() != classes.len() {
                continue;
            }
            if !candidate
                .patterns
                .iter()
                .zip(classes)
                .all(|(pattern, &class)| pattern.matches(class))
            {
                continue;
            }
            best = Some(match best {
                None => candidate,
                Some(current) => match rank(candidate).cmp(&rank(current)) {
                    std::cmp::Ordering::Greater => candidate,
                    std::cmp::Ordering::Equal if candidate.seq > current.seq => candidate,
                    _ => current,
                },
            });
        }

        match best {
            Some(registration) => Ok(&registration.handler),
            None => {
                let classes = classes
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(EngineError::new(
                    ErrorKind::NoImplementationFound,
                    format!("operation {kind} is not implemented for operand types ({classes})"),
                ))
            }
        }
    }
}

/// Per-position specificity vector, compared lexicographically
/// left-to-right.
fn rank<H>(registration: &Registration<H>) -> Vec<u8> {
    registration
        .patterns
        .iter()
        .map(|p| p.specificity())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_beats_union_beats_any() {
        let mut registry: DispatchRegistry<&'static str> = DispatchRegistry::new();
        registry.register(&[OpKind::Cast], &[Pattern::Any, Pattern::Any], "any");
        registry.register(
            &[OpKind::Cast],
            &[Pattern::OneOf(COMPUTABLE), Pattern::Exact(TypeClass::Type)],
            "union",
        );
        registry.register(
            &[OpKind::Cast],
            &[
                Pattern::Exact(TypeClass::Series),
                Pattern::Exact(TypeClass::Type),
            ],
            "exact",
        );

        let got = registry
            .resolve(OpKind::Cast, &[TypeClass::Series, TypeClass::Type])
            .unwrap();
        assert_eq!(*got, "exact");

        let got = registry
            .resolve(OpKind::Cast, &[TypeClass::Integer, TypeClass::Type])
            .unwrap();
        assert_eq!(*got, "union");

        let got = registry
            .resolve(OpKind::Cast, &[TypeClass::Frame, TypeClass::Frame])
            .unwrap();
        assert_eq!(*got, "any");
    }

    #[test]
    fn grouped_variant_never_shadowed_by_generic() {
        let mut registry: DispatchRegistry<&'static str> = DispatchRegistry::new();
        registry.register(
            &[OpKind::Cast],
            &[
                Pattern::Exact(TypeClass::Series),
                Pattern::Exact(TypeClass::Type),
            ],
            "series",
        );
        registry.register(
            &[OpKind::Cast],
            &[
                Pattern::Exact(TypeClass::SeriesGroupBy),
                Pattern::Exact(TypeClass::Type),
            ],
            "grouped",
        );

        for _ in 0..100 {
            let got = registry
                .resolve(OpKind::Cast, &[TypeClass::SeriesGroupBy, TypeClass::Type])
                .unwrap();
            assert_eq!(*got, "grouped");
        }
    }

    #[test]
    fn later_registration_shadows_identical_signature() {
        let mut registry: DispatchRegistry<&'static str> = DispatchRegistry::new();
        let patterns = [
            Pattern::Exact(TypeClass::Series),
            Pattern::Exact(TypeClass::Type),
        ];
        registry.register(&[OpKind::Cast], &patterns, "old");
        registry.register(&[OpKind::Cast], &patterns, "new");

        let got = registry
            .resolve(OpKind::Cast, &[TypeClass::Series, TypeClass::Type])
            .unwrap();
        assert_eq!(*got, "new");
    }

    #[test]
    fn leftmost_position_dominates() {
        let mut registry: DispatchRegistry<&'static str> = DispatchRegistry::new();
        registry.register(
            &[OpKind::Add],
            &[Pattern::Exact(TypeClass::Series), Pattern::Any],
            "left-exact",
        );
        registry.register(
            &[OpKind::Add],
            &[
                Pattern::OneOf(COMPUTABLE),
                Pattern::Exact(TypeClass::Series),
            ],
            "right-exact",
        );

        let got = registry
            .resolve(OpKind::Add, &[TypeClass::Series, TypeClass::Series])
            .unwrap();
        assert_eq!(*got, "left-exact");
    }

    #[test]
    fn miss_is_no_implementation_found() {
        let registry: DispatchRegistry<&'static str> = DispatchRegistry::new();
        let err = registry
            .resolve(OpKind::Add, &[TypeClass::Series])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoImplementationFound);
        assert!(err.to_string().contains("Add"));
        assert!(err.to_string().contains("Series"));
    }

    #[test]
    fn arity_must_match() {
        let mut registry: DispatchRegistry<&'static str> = DispatchRegistry::new();
        registry.register(&[OpKind::Add], &[Pattern::Any, Pattern::Any], "binary");
        assert!(registry.resolve(OpKind::Add, &[TypeClass::Series]).is_err());
    }
}
