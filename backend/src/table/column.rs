//! Typed column storage.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::value::{is_midnight, Value};

/// Declared element kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Number,
    Text,
    /// Finite-label text.
    Category,
    DateTime,
    Boolean,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Number => "number",
            ColumnKind::Text => "text",
            ColumnKind::Category => "category",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column cells, one vector per kind. `None` is the missing marker.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Number(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Category(Vec<Option<String>>),
    DateTime(Vec<Option<NaiveDateTime>>),
    Boolean(Vec<Option<bool>>),
}

impl ColumnData {
    /// Build a number column, folding NaN into missing.
    pub fn numbers<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        ColumnData::Number(
            values
                .into_iter()
                .map(|v| v.filter(|n| !n.is_nan()))
                .collect(),
        )
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Number(_) => ColumnKind::Number,
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Category(_) => ColumnKind::Category,
            ColumnData::DateTime(_) => ColumnKind::DateTime,
            ColumnData::Boolean(_) => ColumnKind::Boolean,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Number(v) => v.len(),
            ColumnData::Text(v) | ColumnData::Category(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Number(v) => v[row].is_none(),
            ColumnData::Text(v) | ColumnData::Category(v) => v[row].is_none(),
            ColumnData::DateTime(v) => v[row].is_none(),
            ColumnData::Boolean(v) => v[row].is_none(),
        }
    }

    pub fn missing_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_missing(i)).count()
    }

    pub fn value(&self, row: usize) -> Value {
        match self {
            ColumnData::Number(v) => v[row].map_or(Value::Missing, Value::Number),
            ColumnData::Text(v) | ColumnData::Category(v) => {
                v[row].clone().map_or(Value::Missing, Value::Text)
            }
            ColumnData::DateTime(v) => v[row].map_or(Value::Missing, Value::DateTime),
            ColumnData::Boolean(v) => v[row].map_or(Value::Missing, Value::Boolean),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).map(move |i| self.value(i))
    }

    pub fn as_numbers(&self) -> Option<&[Option<f64>]> {
        match self {
            ColumnData::Number(v) => Some(v),
            _ => None,
        }
    }

    /// Keep the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> ColumnData {
        fn pick<T: Clone>(v: &[Option<T>], rows: &[usize]) -> Vec<Option<T>> {
            rows.iter().map(|&i| v[i].clone()).collect()
        }
        match self {
            ColumnData::Number(v) => ColumnData::Number(pick(v, rows)),
            ColumnData::Text(v) => ColumnData::Text(pick(v, rows)),
            ColumnData::Category(v) => ColumnData::Category(pick(v, rows)),
            ColumnData::DateTime(v) => ColumnData::DateTime(pick(v, rows)),
            ColumnData::Boolean(v) => ColumnData::Boolean(pick(v, rows)),
        }
    }

    /// Non-missing values with their counts, in order of first appearance.
    pub fn value_counts(&self) -> Vec<(Value, usize)> {
        let mut order: Vec<(Value, usize)> = Vec::new();
        let mut index: HashMap<Value, usize> = HashMap::new();
        for value in self.values().filter(|v| !v.is_missing()) {
            match index.get(&value) {
                Some(&i) => order[i].1 += 1,
                None => {
                    index.insert(value.clone(), order.len());
                    order.push((value, 1));
                }
            }
        }
        order
    }

    /// First-occurring most frequent non-missing value.
    pub fn mode(&self) -> Option<Value> {
        let mut best: Option<(Value, usize)> = None;
        for (value, count) in self.value_counts() {
            if best.as_ref().map_or(true, |(_, c)| count > *c) {
                best = Some((value, count));
            }
        }
        best.map(|(v, _)| v)
    }

    /// Every non-missing date-time falls on midnight.
    pub fn is_date_only(&self) -> bool {
        match self {
            ColumnData::DateTime(v) => v.iter().flatten().all(is_midnight),
            _ => false,
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
