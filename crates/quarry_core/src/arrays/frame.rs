use std::sync::Arc;

use indexmap::IndexMap;
use quarry_error::{EngineError, Result};

use crate::arrays::column::Column;
use crate::arrays::datatype::DataType;

/// A named, typed column position in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub datatype: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        Field {
            name: name.into(),
            datatype,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        Schema {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// A column-oriented table of data.
///
/// Column order is insertion order and user visible.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFrame {
    columns: IndexMap<String, Arc<Column>>,
}

impl DataFrame {
    pub fn empty() -> Self {
        DataFrame {
            columns: IndexMap::new(),
        }
    }

    /// Create a frame from named columns. All columns must share a
    /// length.
    pub fn from_columns(
        columns: impl IntoIterator<Item = (String, Column)>,
    ) -> Result<Self> {
        let mut out = IndexMap::new();
        let mut rows: Option<usize> = None;
        for (name, col) in columns {
            match rows {
                Some(n) if n != col.len() => {
                    return Err(EngineError::shape_mismatch(format!(
                        "column '{name}' has {} rows, expected {n}",
                        col.len()
                    )));
                }
                None => rows = Some(col.len()),
                _ => (),
            }
            if out.insert(name.clone(), Arc::new(col)).is_some() {
                return Err(EngineError::internal(format!("duplicate column '{name}'")));
            }
        }
        Ok(DataFrame { columns: out })
    }

    pub fn num_rows(&self) -> usize {
        self.columns
            .first()
            .map(|(_, col)| col.len())
            .unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Arc<Column>> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &Arc<Column>)> {
        self.columns.iter().map(|(name, col)| (name.as_str(), col))
    }

    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|(name, col)| Field::new(name.clone(), col.datatype())),
        )
    }

    /// Append or replace a column. Length must match existing columns.
    pub fn with_column(mut self, name: impl Into<String>, col: Column) -> Result<Self> {
        let name = name.into();
        if !self.columns.is_empty() && col.len() != self.num_rows() {
            return Err(EngineError::shape_mismatch(format!(
                "column '{name}' has {} rows, expected {}",
                col.len(),
                self.num_rows()
            )));
        }
        self.columns.insert(name, Arc::new(col));
        Ok(self)
    }

    /// Keep rows where `mask` is true, compacting the row index.
    pub fn filter(&self, mask: &[bool]) -> Result<DataFrame> {
        let mut out = IndexMap::new();
        for (name, col) in &self.columns {
            out.insert(name.clone(), Arc::new(col.filter(mask)?));
        }
        Ok(DataFrame { columns: out })
    }

    /// Gather rows by index.
    pub fn take(&self, rows: &[usize]) -> Result<DataFrame> {
        let mut out = IndexMap::new();
        for (name, col) in &self.columns {
            out.insert(name.clone(), Arc::new(col.take(rows)?));
        }
        Ok(DataFrame { columns: out })
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<DataFrame> {
        let mut out = IndexMap::new();
        for (name, col) in &self.columns {
            out.insert(name.clone(), Arc::new(col.slice(offset, len)?));
        }
        Ok(DataFrame { columns: out })
    }

    /// Keep only the named columns, in the order given.
    pub fn project(&self, names: &[&str]) -> Result<DataFrame> {
        let mut out = IndexMap::new();
        for &name in names {
            let col = self
                .columns
                .get(name)
                .ok_or_else(|| EngineError::internal(format!("missing column '{name}'")))?;
            out.insert(name.to_string(), Arc::clone(col));
        }
        Ok(DataFrame { columns: out })
    }

    /// Vertically stack two frames with identical column names and
    /// types.
    pub fn vstack(&self, other: &DataFrame) -> Result<DataFrame> {
        let self_names: Vec<_> = self.column_names().collect();
        let other_names: Vec<_> = other.column_names().collect();
        if self_names != other_names {
            return Err(EngineError::shape_mismatch(format!(
                "cannot stack frames with different columns: {self_names:?} vs {other_names:?}"
            )));
        }
        let mut out = IndexMap::new();
        for (name, col) in &self.columns {
            let other_col = other.column(name).unwrap();
            out.insert(
                name.clone(),
                Arc::new(Column::concat(&[col.as_ref(), other_col.as_ref()])?),
            );
        }
        Ok(DataFrame { columns: out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame() -> DataFrame {
        DataFrame::from_columns([
            ("a".to_string(), Column::int64s(&[1, 2, 3])),
            ("b".to_string(), Column::utf8s(&["x", "y", "z"])),
        ])
        .unwrap()
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let err = DataFrame::from_columns([
            ("a".to_string(), Column::int64s(&[1, 2])),
            ("b".to_string(), Column::int64s(&[1])),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::ShapeMismatch);
    }

    #[test]
    fn filter_compacts_rows() {
        let df = test_frame();
        let filtered = df.filter(&[false, true, true]).unwrap();
        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(
            filtered.column("a").unwrap().as_ref(),
            &Column::int64s(&[2, 3])
        );
    }

    #[test]
    fn schema_reports_declared_order() {
        let df = test_frame();
        let schema = df.schema();
        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(schema.field("a").unwrap().datatype, DataType::Int64);
    }
}
