//! Hashable, totally-ordered views of scalar values.
//!
//! Grouping keys and distinct sets need `Eq + Hash` over values that
//! include floats. Floats are compared by canonicalized bit pattern:
//! `-0.0` folds to `0.0` and all NaNs fold to one NaN.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use quarry_error::{EngineError, Result};

use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrdF64(pub f64);

impl OrdF64 {
    fn canonical_bits(&self) -> u64 {
        if self.0.is_nan() {
            f64::NAN.to_bits()
        } else if self.0 == 0.0 {
            0.0_f64.to_bits()
        } else {
            self.0.to_bits()
        }
    }
}

impl Eq for OrdF64 {}

impl Hash for OrdF64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bits().hash(state)
    }
}

impl PartialOrd for OrdF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A scalar value reduced to a hashable key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Null,
    Boolean(bool),
    Int(i64),
    UInt(u64),
    Float(OrdF64),
    Utf8(String),
    Timestamp(i64, Option<String>),
    Date(i32),
    Interval(i64),
    List(Vec<KeyValue>),
    Struct(Vec<(String, KeyValue)>),
}

impl KeyValue {
    pub fn from_scalar(value: &ScalarValue) -> Result<Self> {
        Ok(match value {
            ScalarValue::Null => KeyValue::Null,
            ScalarValue::Boolean(v) => KeyValue::Boolean(*v),
            ScalarValue::Int8(v) => KeyValue::Int(*v as i64),
            ScalarValue::Int16(v) => KeyValue::Int(*v as i64),
            ScalarValue::Int32(v) => KeyValue::Int(*v as i64),
            ScalarValue::Int64(v) => KeyValue::Int(*v),
            ScalarValue::UInt8(v) => KeyValue::UInt(*v as u64),
            ScalarValue::UInt16(v) => KeyValue::UInt(*v as u64),
            ScalarValue::UInt32(v) => KeyValue::UInt(*v as u64),
            ScalarValue::UInt64(v) => KeyValue::UInt(*v),
            ScalarValue::Float32(v) => KeyValue::Float(OrdF64(*v as f64)),
            ScalarValue::Float64(v) => KeyValue::Float(OrdF64(*v)),
            ScalarValue::Utf8(v) => KeyValue::Utf8(v.clone()),
            ScalarValue::Timestamp(ts) => KeyValue::Timestamp(ts.value, ts.timezone.clone()),
            ScalarValue::Date(v) => KeyValue::Date(*v),
            ScalarValue::Interval(iv) => KeyValue::Interval(iv.nanos),
            ScalarValue::List(values) => KeyValue::List(
                values
                    .iter()
                    .map(KeyValue::from_scalar)
                    .collect::<Result<Vec<_>>>()?,
            ),
            ScalarValue::Struct(fields) => KeyValue::Struct(
                fields
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), KeyValue::from_scalar(value)?)))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }
}

/// Build the composite key for one row across several key columns.
pub fn row_key(columns: &[&crate::arrays::column::Column], row: usize) -> Result<Vec<KeyValue>> {
    columns
        .iter()
        .map(|col| {
            let value = col.get(row).ok_or_else(|| {
                EngineError::internal(format!("key row {row} out of bounds"))
            })?;
            KeyValue::from_scalar(&value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_keys_canonicalize() {
        assert_eq!(KeyValue::Float(OrdF64(0.0)), KeyValue::Float(OrdF64(0.0)));
        let a = OrdF64(-0.0);
        let b = OrdF64(0.0);
        assert_eq!(a.canonical_bits(), b.canonical_bits());

        let nan_a = OrdF64(f64::NAN);
        let nan_b = OrdF64(0.0_f64 / 0.0_f64);
        assert_eq!(nan_a.canonical_bits(), nan_b.canonical_bits());
    }
}
