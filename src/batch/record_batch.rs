//! Rectangular batches of named, typed columns

use super::{DataType, Value};
use eyre::Result;
use std::collections::HashSet;

/// A named column of cells sharing a declared type
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data_type: DataType,
    values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    /// Build a column whose type is unified from its values
    ///
    /// Values are cast to the unified type, so `[1, 2.5]` becomes a Float
    /// column `[1.0, 2.5]`.
    pub fn from_values(name: impl Into<String>, values: Vec<Value>) -> Self {
        let data_type = values
            .iter()
            .fold(DataType::Null, |acc, v| acc.unify(v.data_type()));
        let values = values.into_iter().map(|v| v.cast(data_type)).collect();
        Self::new(name, data_type, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    pub fn into_parts(self) -> (String, DataType, Vec<Value>) {
        (self.name, self.data_type, self.values)
    }
}

/// An ordered set of equal-length columns with unique names
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    columns: Vec<Column>,
    num_rows: usize,
}

impl RecordBatch {
    /// Create a batch, checking that names are unique and lengths agree
    pub fn try_new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name()) {
                eyre::bail!("Duplicate column name in batch: {}", column.name());
            }
        }

        let num_rows = columns.first().map(Column::len).unwrap_or(0);
        if let Some(column) = columns.iter().find(|c| c.len() != num_rows) {
            eyre::bail!(
                "Column '{}' has {} rows, expected {}",
                column.name(),
                column.len(),
                num_rows
            );
        }

        Ok(Self { columns, num_rows })
    }

    /// A batch with the given column names and types but no rows
    pub fn empty(schema: &[(String, DataType)]) -> Self {
        Self {
            columns: schema
                .iter()
                .map(|(name, dt)| Column::new(name.clone(), *dt, Vec::new()))
                .collect(),
            num_rows: 0,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Cells of row `index`, in column order
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.num_rows {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// Whether row `index` has a null in any column
    pub fn row_has_null(&self, index: usize) -> bool {
        self.columns.iter().any(|c| c.values[index].is_null())
    }

    pub fn null_count(&self) -> usize {
        self.columns.iter().map(Column::null_count).sum()
    }

    pub fn has_nulls(&self) -> bool {
        self.columns.iter().any(|c| c.values.iter().any(Value::is_null))
    }

    /// Keep only the rows for which `keep` returns true, preserving order
    pub fn filter_rows(self, keep: impl Fn(usize) -> bool) -> RecordBatch {
        let mask: Vec<bool> = (0..self.num_rows).map(keep).collect();
        let num_rows = mask.iter().filter(|k| **k).count();
        let columns = self
            .columns
            .into_iter()
            .map(|c| {
                let values = c
                    .values
                    .into_iter()
                    .zip(&mask)
                    .filter_map(|(v, k)| k.then_some(v))
                    .collect();
                Column::new(c.name, c.data_type, values)
            })
            .collect();
        RecordBatch { columns, num_rows }
    }

    /// Replace every column through `f`; `f` must preserve name and length
    pub fn map_columns(self, f: impl Fn(Column) -> Column) -> RecordBatch {
        let num_rows = self.num_rows;
        let columns = self.columns.into_iter().map(f).collect();
        RecordBatch { columns, num_rows }
    }
}
