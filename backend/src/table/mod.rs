//! In-memory typed table.
//!
//! A [`Table`] is a value: every operation in the crate takes `&Table` and
//! returns a new one. Column kinds are stored explicitly on each column
//! ([`ColumnData`]) instead of being sniffed at call sites.

mod column;
mod value;

pub use column::{Column, ColumnData, ColumnKind};
pub use value::{
    format_bool, format_datetime, format_number, is_midnight, is_missing_token, parse_bool,
    parse_datetime, parse_number, Value, MISSING_TOKENS,
};

use std::collections::HashSet;

use crate::error::{OpError, OpResult};

/// `base`, or the first of `base_1`, `base_2`, ... for which `taken` is false.
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{}_{}", base, i))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}

/// Ordered named columns sharing one row count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    n_rows: usize,
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking lengths and name uniqueness.
    pub fn new(columns: Vec<Column>) -> OpResult<Self> {
        let n_rows = columns.first().map_or(0, Column::len);
        Self::with_row_count(n_rows, columns)
    }

    /// Build a table with an explicit row count (kept even with no columns).
    pub fn with_row_count(n_rows: usize, columns: Vec<Column>) -> OpResult<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != n_rows {
                return Err(OpError::LengthMismatch {
                    column: column.name.clone(),
                    expected: n_rows,
                    found: column.len(),
                });
            }
            if !seen.insert(column.name.as_str()) {
                return Err(OpError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self { n_rows, columns })
    }

    /// Assemble columns already known to be consistent (built in this crate
    /// with one entry per row and distinct names).
    pub(crate) fn from_parts(n_rows: usize, columns: Vec<Column>) -> Self {
        debug_assert!(columns.iter().all(|c| c.len() == n_rows));
        Self { n_rows, columns }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Resolve a column reference.
    pub fn column(&self, name: &str) -> OpResult<&Column> {
        self.get(name)
            .ok_or_else(|| OpError::ColumnNotFound(name.to_string()))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.data.value(index)).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    /// Whether any cell in the row is missing.
    pub fn row_has_missing(&self, index: usize) -> bool {
        self.columns.iter().any(|c| c.data.is_missing(index))
    }

    /// Keep the given rows, in order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            n_rows: rows.len(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(rows)))
                .collect(),
        }
    }

    /// Replace the same-named column in place, or append a new one.
    pub fn with_column(&self, column: Column) -> OpResult<Table> {
        let found = column.len();
        if found != self.n_rows {
            return Err(OpError::LengthMismatch {
                column: column.name,
                expected: self.n_rows,
                found,
            });
        }
        let mut columns = self.columns.clone();
        match self.position(&column.name) {
            Some(i) => columns[i] = column,
            None => columns.push(column),
        }
        Ok(Table {
            n_rows: self.n_rows,
            columns,
        })
    }

    /// Drop the named columns; unknown names fail.
    pub fn without_columns(&self, names: &[&str]) -> OpResult<Table> {
        for name in names {
            self.column(name)?;
        }
        Ok(Table {
            n_rows: self.n_rows,
            columns: self
                .columns
                .iter()
                .filter(|c| !names.contains(&c.name.as_str()))
                .cloned()
                .collect(),
        })
    }

    /// Rename every column from `names` (same length as the column list).
    pub fn renamed(&self, names: &[String]) -> OpResult<Table> {
        if names.len() != self.columns.len() {
            return Err(OpError::InvalidParameter(format!(
                "{} names for {} columns",
                names.len(),
                self.columns.len()
            )));
        }
        let columns = self
            .columns
            .iter()
            .zip(names)
            .map(|(c, name)| Column::new(name.clone(), c.data.clone()))
            .collect();
        Table::with_row_count(self.n_rows, columns)
    }

    /// Equality of column names and cell values, ignoring the Text/Category
    /// distinction (which CSV cannot carry).
    pub fn same_content(&self, other: &Table) -> bool {
        self.shape() == other.shape()
            && self.column_names() == other.column_names()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.data.values().eq(b.data.values()))
    }

    /// `{ "columns": [...], "kinds": [...], "rows": [[...], ...] }`
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows()
            .map(|row| serde_json::Value::Array(row.iter().map(Value::to_json).collect()))
            .collect();
        serde_json::json!({
            "columns": self.column_names(),
            "kinds": self.columns.iter().map(|c| c.kind().as_str()).collect::<Vec<_>>(),
            "rows": rows,
        })
    }
}
