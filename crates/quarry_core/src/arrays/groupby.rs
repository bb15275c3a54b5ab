use std::sync::Arc;

use hashbrown::HashMap;
use quarry_error::{EngineError, Result};

use crate::arrays::column::Column;
use crate::arrays::frame::DataFrame;
use crate::arrays::ordkey::{KeyValue, row_key};

/// A partition of a row range into groups.
///
/// Groups are numbered in first-appearance order, which keeps broadcast
/// results aligned with the original row order. Key columns are stored
/// group-ordered (one row per group).
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    group_ids: Vec<u32>,
    num_groups: usize,
    keys: Vec<(String, Column)>,
}

impl Grouping {
    /// Partition `num_rows` rows by the composite key of the given
    /// columns. Every key column must have exactly `num_rows` rows.
    pub fn from_keys(keys: Vec<(String, Column)>, num_rows: usize) -> Result<Arc<Grouping>> {
        for (name, col) in &keys {
            if col.len() != num_rows {
                return Err(EngineError::shape_mismatch(format!(
                    "grouping key '{name}' has {} rows, expected {num_rows}",
                    col.len()
                )));
            }
        }

        let key_cols: Vec<&Column> = keys.iter().map(|(_, col)| col).collect();
        let mut seen: HashMap<Vec<KeyValue>, u32> = HashMap::new();
        let mut group_ids = Vec::with_capacity(num_rows);
        let mut first_rows: Vec<usize> = Vec::new();

        for row in 0..num_rows {
            let key = row_key(&key_cols, row)?;
            let next_id = seen.len() as u32;
            let id = *seen.entry(key).or_insert_with(|| {
                first_rows.push(row);
                next_id
            });
            group_ids.push(id);
        }

        let num_groups = first_rows.len();
        let keys = keys
            .into_iter()
            .map(|(name, col)| Ok((name, col.take(&first_rows)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new(Grouping {
            group_ids,
            num_groups,
            keys,
        }))
    }

    pub fn num_rows(&self) -> usize {
        self.group_ids.len()
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn group_ids(&self) -> &[u32] {
        &self.group_ids
    }

    /// Group-ordered key columns, one row per group.
    pub fn key_columns(&self) -> &[(String, Column)] {
        &self.keys
    }

    /// Row indices belonging to each group, in original row order.
    pub fn group_rows(&self) -> Vec<Vec<usize>> {
        let mut rows = vec![Vec::new(); self.num_groups];
        for (row, &id) in self.group_ids.iter().enumerate() {
            rows[id as usize].push(row);
        }
        rows
    }

    /// Broadcast one value per group back across every member row.
    pub fn broadcast(&self, per_group: &Column) -> Result<Column> {
        if per_group.len() != self.num_groups {
            return Err(EngineError::shape_mismatch(format!(
                "expected {} per-group values, got {}",
                self.num_groups,
                per_group.len()
            )));
        }
        let rows: Vec<usize> = self.group_ids.iter().map(|&id| id as usize).collect();
        per_group.take(&rows)
    }
}

/// A columnar sequence plus the grouping it is partitioned by.
#[derive(Debug, Clone)]
pub struct GroupedColumn {
    pub column: Arc<Column>,
    pub grouping: Arc<Grouping>,
}

impl GroupedColumn {
    pub fn new(column: Arc<Column>, grouping: Arc<Grouping>) -> Result<Self> {
        if column.len() != grouping.num_rows() {
            return Err(EngineError::shape_mismatch(format!(
                "column has {} rows, grouping covers {}",
                column.len(),
                grouping.num_rows()
            )));
        }
        Ok(GroupedColumn { column, grouping })
    }

    /// Regroup a transformed column under the same partition.
    pub fn with_column(&self, column: Column) -> Result<GroupedColumn> {
        GroupedColumn::new(Arc::new(column), Arc::clone(&self.grouping))
    }
}

/// A frame plus the grouping it is partitioned by.
#[derive(Debug, Clone)]
pub struct GroupedFrame {
    pub frame: Arc<DataFrame>,
    pub grouping: Arc<Grouping>,
}

impl GroupedFrame {
    pub fn new(frame: Arc<DataFrame>, grouping: Arc<Grouping>) -> Result<Self> {
        if frame.num_rows() != grouping.num_rows() {
            return Err(EngineError::shape_mismatch(format!(
                "frame has {} rows, grouping covers {}",
                frame.num_rows(),
                grouping.num_rows()
            )));
        }
        Ok(GroupedFrame { frame, grouping })
    }

    /// Project one column out of the grouped frame, keeping the
    /// partition.
    pub fn column(&self, name: &str) -> Result<GroupedColumn> {
        let column = self
            .frame
            .column(name)
            .ok_or_else(|| EngineError::internal(format!("missing column '{name}'")))?;
        GroupedColumn::new(Arc::clone(column), Arc::clone(&self.grouping))
    }

    /// Per-group sizes, group-ordered.
    pub fn group_sizes(&self) -> Column {
        let mut sizes = vec![0_i64; self.grouping.num_groups()];
        for &id in self.grouping.group_ids() {
            sizes[id as usize] += 1;
        }
        Column::Int64(sizes.into_iter().map(Some).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_appearance_group_order() {
        let keys = vec![("g".to_string(), Column::int64s(&[2, 1, 2, 3, 1]))];
        let grouping = Grouping::from_keys(keys, 5).unwrap();

        assert_eq!(grouping.num_groups(), 3);
        assert_eq!(grouping.group_ids(), &[0, 1, 0, 2, 1]);
        assert_eq!(
            grouping.key_columns()[0].1,
            Column::int64s(&[2, 1, 3]),
        );
    }

    #[test]
    fn broadcast_restores_row_order() {
        let keys = vec![("g".to_string(), Column::int64s(&[1, 1, 2]))];
        let grouping = Grouping::from_keys(keys, 3).unwrap();

        let per_group = Column::int64s(&[2, 1]);
        let broadcast = grouping.broadcast(&per_group).unwrap();
        assert_eq!(broadcast, Column::int64s(&[2, 2, 1]));
    }

    #[test]
    fn composite_keys() {
        let keys = vec![
            ("a".to_string(), Column::int64s(&[1, 1, 1])),
            ("b".to_string(), Column::utf8s(&["x", "y", "x"])),
        ];
        let grouping = Grouping::from_keys(keys, 3).unwrap();
        assert_eq!(grouping.num_groups(), 2);
        assert_eq!(grouping.group_ids(), &[0, 1, 0]);
    }
}
