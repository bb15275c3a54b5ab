//! Data source boundary.
//!
//! The engine treats table storage as an external collaborator: all it
//! needs is name-based lookup returning a materialized frame. The
//! in-memory source here exists for embedding and tests.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use quarry_error::{EngineError, Result};

use crate::arrays::column::Column;
use crate::arrays::datatype::DataType;
use crate::arrays::frame::{DataFrame, Field, Schema};
use crate::arrays::scalar::ScalarValue;

/// The designated time column consulted by time-range restriction.
pub const TIME_COL: &str = "time";

pub trait TableSource: fmt::Debug {
    fn lookup_table(&self, name: &str) -> Result<Arc<DataFrame>>;
    fn list_tables(&self) -> Vec<String>;
}

/// Name-to-frame dictionary source.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: IndexMap<String, Arc<DataFrame>>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource::default()
    }

    pub fn load_table(&mut self, name: impl Into<String>, frame: DataFrame) {
        self.tables.insert(name.into(), Arc::new(frame));
    }

    pub fn with_table(mut self, name: impl Into<String>, frame: DataFrame) -> Self {
        self.load_table(name, frame);
        self
    }
}

impl TableSource for MemorySource {
    fn lookup_table(&self, name: &str) -> Result<Arc<DataFrame>> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::internal(format!("table '{name}' does not exist")))
    }

    fn list_tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

/// Infer a schema for a materialized frame, honoring explicit per-column
/// overrides.
///
/// Typed columns report their own type. Untyped (object) columns are
/// inferred from their values when they are uniformly strings or
/// booleans; anything mixed or decimal-like is rejected with a pointer
/// at the override mechanism, never guessed.
pub fn infer_schema(
    frame: &DataFrame,
    overrides: &HashMap<String, DataType>,
) -> Result<Schema> {
    let mut fields = Vec::with_capacity(frame.num_columns());
    for (name, col) in frame.iter_columns() {
        if let Some(datatype) = overrides.get(name) {
            fields.push(Field::new(name, datatype.clone()));
            continue;
        }
        let datatype = match col.as_ref() {
            Column::Object(values) => infer_object_column(name, values)?,
            typed => typed.datatype(),
        };
        fields.push(Field::new(name, datatype));
    }
    Ok(Schema::new(fields))
}

fn infer_object_column(name: &str, values: &[Option<ScalarValue>]) -> Result<DataType> {
    let mut inferred: Option<DataType> = None;
    for value in values.iter().flatten() {
        let datatype = match value {
            ScalarValue::Utf8(_) => DataType::Utf8,
            ScalarValue::Boolean(_) => DataType::Boolean,
            _ => {
                return Err(unable_to_infer(name));
            }
        };
        match &inferred {
            None => inferred = Some(datatype),
            Some(existing) if existing == &datatype => (),
            Some(_) => return Err(unable_to_infer(name)),
        }
    }
    // An empty or all-null column infers as string.
    Ok(inferred.unwrap_or(DataType::Utf8))
}

fn unable_to_infer(name: &str) -> EngineError {
    EngineError::unsupported_type(format!(
        "Unable to infer type of column '{name}'. Try instantiating your table \
         with an explicit schema override for '{name}'"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_list() {
        let source = MemorySource::new().with_table(
            "t",
            DataFrame::from_columns([("a".to_string(), Column::int64s(&[1]))]).unwrap(),
        );
        assert!(source.lookup_table("t").is_ok());
        assert!(source.lookup_table("missing").is_err());
        assert_eq!(source.list_tables(), vec!["t".to_string()]);
    }

    #[test]
    fn infer_typed_and_object_columns() {
        let frame = DataFrame::from_columns([
            ("n".to_string(), Column::int64s(&[1, 2])),
            (
                "s".to_string(),
                Column::Object(vec![Some(ScalarValue::from("a")), None]),
            ),
        ])
        .unwrap();
        let schema = infer_schema(&frame, &HashMap::new()).unwrap();
        assert_eq!(schema.field("n").unwrap().datatype, DataType::Int64);
        assert_eq!(schema.field("s").unwrap().datatype, DataType::Utf8);
    }

    #[test]
    fn mixed_object_column_rejected_with_hint() {
        let frame = DataFrame::from_columns([(
            "m".to_string(),
            Column::Object(vec![
                Some(ScalarValue::from("a")),
                Some(ScalarValue::Int64(1)),
            ]),
        )])
        .unwrap();
        let err = infer_schema(&frame, &HashMap::new()).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::UnsupportedType);
        assert!(err.to_string().contains("'m'"));

        let mut overrides = HashMap::new();
        overrides.insert("m".to_string(), DataType::Utf8);
        assert!(infer_schema(&frame, &overrides).is_ok());
    }
}
