//! Cleaning transformations: type conversion, missing values, duplicates
//! and outliers.
//!
//! Every function borrows the input table and returns a new one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{OpError, OpResult};
use crate::stats::{mean, present_numbers, quantile, sample_std};
use crate::table::{
    format_bool, format_datetime, format_number, parse_bool, parse_datetime, parse_number, Column,
    ColumnData, ColumnKind, Table, Value,
};

/// Whisker multiplier for the IQR rule.
pub const IQR_FACTOR: f64 = 1.5;

/// Default width of the sigma rule.
pub const DEFAULT_SIGMA: f64 = 3.0;

/// Target of [`convert_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Number,
    Text,
    Category,
    Date,
    /// Any other label; converting to it leaves the table unchanged.
    #[serde(other)]
    Unknown,
}

impl From<&str> for TargetKind {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "number" | "numeric" => TargetKind::Number,
            "text" | "string" => TargetKind::Text,
            "category" => TargetKind::Category,
            "date" | "datetime" => TargetKind::Date,
            _ => TargetKind::Unknown,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Number => "number",
            TargetKind::Text => "text",
            TargetKind::Category => "category",
            TargetKind::Date => "date",
            TargetKind::Unknown => "unknown",
        })
    }
}

/// Which dimension [`drop_missing`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    Rows,
    Columns,
}

/// Strategy for [`fill_missing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    Mean,
    Median,
    Mode,
    Constant,
}

impl fmt::Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FillMethod::Mean => "mean",
            FillMethod::Median => "median",
            FillMethod::Mode => "mode",
            FillMethod::Constant => "constant",
        })
    }
}

/// Non-missing cells rendered as text (dates date-only when the whole column is).
pub(crate) fn stringify(data: &ColumnData) -> Vec<Option<String>> {
    match data {
        ColumnData::Number(v) => v.iter().map(|n| n.map(format_number)).collect(),
        ColumnData::Text(v) | ColumnData::Category(v) => v.clone(),
        ColumnData::Boolean(v) => v.iter().map(|b| b.map(|b| format_bool(b).to_string())).collect(),
        ColumnData::DateTime(v) => {
            let date_only = data.is_date_only();
            v.iter().map(|d| d.map(|d| format_datetime(&d, date_only))).collect()
        }
    }
}

/// Parse every cell as a date-time; numbers and booleans become missing.
pub(crate) fn to_datetimes(data: &ColumnData) -> Vec<Option<chrono::NaiveDateTime>> {
    match data {
        ColumnData::DateTime(v) => v.clone(),
        ColumnData::Text(v) | ColumnData::Category(v) => {
            v.iter().map(|s| s.as_deref().and_then(parse_datetime)).collect()
        }
        ColumnData::Number(v) => vec![None; v.len()],
        ColumnData::Boolean(v) => vec![None; v.len()],
    }
}

/// Coerce a column to another kind; unparsable cells become missing.
pub fn convert_type(table: &Table, column: &str, target: TargetKind) -> OpResult<Table> {
    let source = table.column(column)?;
    let data = match target {
        TargetKind::Unknown => return Ok(table.clone()),
        TargetKind::Number => match &source.data {
            ColumnData::Number(v) => ColumnData::Number(v.clone()),
            ColumnData::Text(v) | ColumnData::Category(v) => {
                ColumnData::numbers(v.iter().map(|s| s.as_deref().and_then(parse_number)))
            }
            ColumnData::Boolean(v) => {
                ColumnData::Number(v.iter().map(|b| b.map(|b| if b { 1.0 } else { 0.0 })).collect())
            }
            ColumnData::DateTime(v) => ColumnData::Number(vec![None; v.len()]),
        },
        TargetKind::Text => ColumnData::Text(stringify(&source.data)),
        TargetKind::Category => ColumnData::Category(stringify(&source.data)),
        TargetKind::Date => ColumnData::DateTime(to_datetimes(&source.data)),
    };
    tracing::info!(column, target = %target, "Converted column type");
    table.with_column(Column::new(column, data))
}

/// Remove every row (or column) holding a missing value.
pub fn drop_missing(table: &Table, axis: Axis) -> Table {
    match axis {
        Axis::Rows => {
            let keep: Vec<usize> = (0..table.n_rows())
                .filter(|&i| !table.row_has_missing(i))
                .collect();
            table.take_rows(&keep)
        }
        Axis::Columns => {
            let columns = table
                .columns()
                .iter()
                .filter(|c| c.data.missing_count() == 0)
                .cloned()
                .collect();
            Table::from_parts(table.n_rows(), columns)
        }
    }
}

/// Replace missing cells with `value`, which must match the column's kind.
fn fill_with(column: &str, data: &ColumnData, value: &Value) -> OpResult<ColumnData> {
    fn fill<T: Clone>(v: &[Option<T>], with: &T) -> Vec<Option<T>> {
        v.iter().map(|c| Some(c.clone().unwrap_or_else(|| with.clone()))).collect()
    }
    let filled = match (data, value) {
        (ColumnData::Number(v), Value::Number(n)) => ColumnData::Number(fill(v, n)),
        (ColumnData::Text(v), Value::Text(s)) => ColumnData::Text(fill(v, s)),
        (ColumnData::Category(v), Value::Text(s)) => ColumnData::Category(fill(v, s)),
        (ColumnData::Boolean(v), Value::Boolean(b)) => ColumnData::Boolean(fill(v, b)),
        (ColumnData::DateTime(v), Value::DateTime(d)) => ColumnData::DateTime(fill(v, d)),
        (data, value) => {
            return Err(OpError::type_mismatch(
                column,
                format!("a column accepting {:?}", value),
                data.kind(),
            ))
        }
    };
    Ok(filled)
}

/// Parse a user constant into the column's kind.
fn parse_constant(column: &str, kind: ColumnKind, raw: &str) -> OpResult<Value> {
    let parsed = match kind {
        ColumnKind::Number => parse_number(raw).map(Value::Number),
        ColumnKind::Boolean => parse_bool(raw).map(Value::Boolean),
        ColumnKind::DateTime => parse_datetime(raw).map(Value::DateTime),
        ColumnKind::Text | ColumnKind::Category => Some(Value::Text(raw.to_string())),
    };
    parsed.ok_or_else(|| OpError::type_mismatch(column, format!("constant '{}'", raw), kind))
}

/// Fill missing values of one column.
///
/// `mean`/`median` need a Number column. A column without any value is
/// returned unchanged, as is `constant` without a constant.
pub fn fill_missing(
    table: &Table,
    column: &str,
    method: FillMethod,
    constant: Option<&str>,
) -> OpResult<Table> {
    let source = table.column(column)?;
    let value = match method {
        FillMethod::Mean | FillMethod::Median => {
            let data = source
                .data
                .as_numbers()
                .ok_or_else(|| OpError::type_mismatch(column, "number", source.kind()))?;
            let values = present_numbers(data);
            let stat = if method == FillMethod::Mean {
                mean(&values)
            } else {
                quantile(&values, 0.5)
            };
            stat.filter(|n| !n.is_nan()).map(Value::Number)
        }
        FillMethod::Mode => source.data.mode(),
        FillMethod::Constant => match constant {
            Some(raw) => Some(parse_constant(column, source.kind(), raw)?),
            None => None,
        },
    };

    let Some(value) = value else {
        return Ok(table.clone());
    };
    tracing::info!(column, method = %method, value = ?value, "Filling missing values");
    let data = fill_with(column, &source.data, &value)?;
    table.with_column(Column::new(column, data))
}

/// Drop exact duplicate rows, keeping the first occurrence.
pub fn drop_duplicates(table: &Table) -> Table {
    let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(table.n_rows());
    let keep: Vec<usize> = (0..table.n_rows())
        .filter(|&i| seen.insert(table.row(i)))
        .collect();
    tracing::info!(removed = table.n_rows() - keep.len(), "Dropped duplicate rows");
    table.take_rows(&keep)
}

fn number_column<'a>(table: &'a Table, column: &str) -> OpResult<&'a [Option<f64>]> {
    let source = table.column(column)?;
    source
        .data
        .as_numbers()
        .ok_or_else(|| OpError::type_mismatch(column, "number", source.kind()))
}

/// IQR fences `(q1 - 1.5*iqr, q3 + 1.5*iqr)` over the present values.
pub fn iqr_bounds(values: &[f64]) -> Option<(f64, f64)> {
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - IQR_FACTOR * iqr, q3 + IQR_FACTOR * iqr))
}

/// Clamp a Number column into its IQR fences.
pub fn clip_outliers_iqr(table: &Table, column: &str) -> OpResult<Table> {
    let data = number_column(table, column)?;
    let Some((lower, upper)) = iqr_bounds(&present_numbers(data)) else {
        return Ok(table.clone());
    };
    tracing::info!(column, lower, upper, "IQR clip bounds");

    let clipped = data.iter().map(|v| {
        v.map(|v| {
            if v < lower {
                lower
            } else if v > upper {
                upper
            } else {
                v
            }
        })
    });
    table.with_column(Column::new(column, ColumnData::numbers(clipped)))
}

/// `mean ± sigma * std` (sample std), `None` below two values.
pub fn sigma_bounds(values: &[f64], sigma: f64) -> Option<(f64, f64)> {
    let m = mean(values)?;
    let s = sample_std(values)?;
    Some((m - sigma * s, m + sigma * s))
}

/// Keep rows whose value lies within `mean ± sigma * std`, inclusive.
///
/// Rows with a missing value are dropped. Without a defined standard
/// deviation (fewer than two values) no row qualifies.
pub fn remove_outliers_sigma(table: &Table, column: &str, sigma: f64) -> OpResult<Table> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(OpError::InvalidParameter(format!(
            "sigma must be a non-negative number, got {}",
            sigma
        )));
    }
    let data = number_column(table, column)?;
    let bounds = sigma_bounds(&present_numbers(data), sigma);
    match bounds {
        Some((lower, upper)) => tracing::info!(column, sigma, lower, upper, "Sigma filter bounds"),
        None => tracing::warn!(column, "Standard deviation undefined, no row kept"),
    }

    let keep: Vec<usize> = data
        .iter()
        .enumerate()
        .filter(|(_, v)| match (v, bounds) {
            (Some(v), Some((lower, upper))) => *v >= lower && *v <= upper,
            _ => false,
        })
        .map(|(i, _)| i)
        .collect();
    Ok(table.take_rows(&keep))
}
