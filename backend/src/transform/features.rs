//! Feature derivation: column arithmetic, categorical encodings, scaling
//! and calendar features.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::{OpError, OpResult};
use crate::stats::{mean, population_std, present_numbers};
use crate::table::{format_number, unique_name, Column, ColumnData, ColumnKind, Table};

use super::cleaning::{stringify, to_datetimes};

/// Label used for the missing marker by one-hot and label encoding.
pub const MISSING_LABEL: &str = "nan";

/// Arithmetic for [`combine_columns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    AddConstant,
}

impl CombineOp {
    /// Infix used in the derived column name.
    pub fn infix(&self) -> &'static str {
        match self {
            CombineOp::Add | CombineOp::AddConstant => "plus",
            CombineOp::Subtract => "minus",
            CombineOp::Multiply => "mul",
            CombineOp::Divide => "div",
        }
    }

    /// Python operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            CombineOp::Add | CombineOp::AddConstant => "+",
            CombineOp::Subtract => "-",
            CombineOp::Multiply => "*",
            CombineOp::Divide => "/",
        }
    }

    fn eval(&self, a: f64, b: f64) -> f64 {
        match self {
            CombineOp::Add | CombineOp::AddConstant => a + b,
            CombineOp::Subtract => a - b,
            CombineOp::Multiply => a * b,
            CombineOp::Divide => a / b,
        }
    }
}

impl fmt::Display for CombineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CombineOp::Add => "add",
            CombineOp::Subtract => "subtract",
            CombineOp::Multiply => "multiply",
            CombineOp::Divide => "divide",
            CombineOp::AddConstant => "add_constant",
        })
    }
}

/// Scaling for [`scale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMethod {
    /// `(x - mean) / population std`
    Standard,
    /// `(x - min) / (max - min)`
    MinMax,
}

impl fmt::Display for ScaleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScaleMethod::Standard => "standard",
            ScaleMethod::MinMax => "minmax",
        })
    }
}

fn number_column<'a>(table: &'a Table, column: &str) -> OpResult<&'a [Option<f64>]> {
    let source = table.column(column)?;
    source
        .data
        .as_numbers()
        .ok_or_else(|| OpError::type_mismatch(column, "number", source.kind()))
}

/// Name of the column [`combine_columns`] derives.
pub fn combined_name(a: &str, b: Option<&str>, op: CombineOp, constant: Option<f64>) -> String {
    let rhs = match op {
        CombineOp::AddConstant => constant.map(format_number).unwrap_or_default(),
        _ => b.unwrap_or_default().to_string(),
    };
    format!("{}_{}_{}", a, op.infix(), rhs)
}

/// Derive `{a}_{op}_{b}` (or `{a}_plus_{constant}`) from Number columns.
///
/// The result is appended, or replaces a same-named column in place.
pub fn combine_columns(
    table: &Table,
    a: &str,
    b: Option<&str>,
    op: CombineOp,
    constant: Option<f64>,
) -> OpResult<Table> {
    let left = number_column(table, a)?;
    let values: Vec<Option<f64>> = match op {
        CombineOp::AddConstant => {
            let c = constant.ok_or_else(|| {
                OpError::InvalidParameter("add_constant requires a constant".to_string())
            })?;
            left.iter().map(|x| x.map(|x| x + c)).collect()
        }
        _ => {
            let b = b.ok_or_else(|| {
                OpError::InvalidParameter(format!("{} requires a second column", op))
            })?;
            let right = number_column(table, b)?;
            left.iter()
                .zip(right)
                .map(|(x, y)| Some(op.eval((*x)?, (*y)?)))
                .collect()
        }
    };

    let name = combined_name(a, b, op, constant);
    tracing::info!(column = %name, op = %op, "Derived column");
    // 0/0 and inf-inf come out as NaN, folded into missing
    table.with_column(Column::new(name, ColumnData::numbers(values)))
}

/// Replace a column with one Boolean indicator per distinct value.
///
/// Indicators are named `{column}_{value}` in order of first appearance and
/// appended after the remaining columns; missing values get `{column}_nan`.
/// A name already taken by another column or an earlier indicator gets a
/// `_1`, `_2`, ... suffix.
pub fn one_hot_encode(table: &Table, column: &str) -> OpResult<Table> {
    let source = table.column(column)?;
    let labels = stringify(&source.data);

    let mut distinct: Vec<&str> = Vec::new();
    for label in labels.iter().flatten() {
        if !distinct.contains(&label.as_str()) {
            distinct.push(label);
        }
    }

    let mut columns = table.without_columns(&[column])?.columns().to_vec();
    let mut taken: HashSet<String> = columns.iter().map(|c| c.name.clone()).collect();
    let mut indicator_name = |suffix: &str| {
        let name = unique_name(&format!("{}_{}", column, suffix), |n| taken.contains(n));
        taken.insert(name.clone());
        name
    };

    let mut indicators: Vec<Column> = Vec::with_capacity(distinct.len() + 1);
    for value in &distinct {
        let data = labels
            .iter()
            .map(|l| Some(l.as_deref() == Some(*value)))
            .collect();
        indicators.push(Column::new(indicator_name(value), ColumnData::Boolean(data)));
    }
    if labels.iter().any(Option::is_none) {
        let data = labels.iter().map(|l| Some(l.is_none())).collect();
        indicators.push(Column::new(indicator_name(MISSING_LABEL), ColumnData::Boolean(data)));
    }

    tracing::info!(column, indicators = indicators.len(), "One-hot encoded");
    columns.extend(indicators);
    Table::with_row_count(table.n_rows(), columns)
}

/// Sorted distinct labels of a column with their codes (missing as `nan`).
pub fn label_mapping(table: &Table, column: &str) -> OpResult<Vec<(String, usize)>> {
    let source = table.column(column)?;
    let labels: BTreeSet<String> = stringify(&source.data)
        .into_iter()
        .map(|l| l.unwrap_or_else(|| MISSING_LABEL.to_string()))
        .collect();
    Ok(labels.into_iter().enumerate().map(|(code, l)| (l, code)).collect())
}

/// Replace a column with integer codes of its sorted distinct labels.
///
/// The mapping is recomputed on every call; see [`label_mapping`].
pub fn label_encode(table: &Table, column: &str) -> OpResult<Table> {
    let source = table.column(column)?;
    let mapping = label_mapping(table, column)?;
    let codes = stringify(&source.data)
        .iter()
        .map(|l| {
            let label = l.as_deref().unwrap_or(MISSING_LABEL);
            mapping
                .binary_search_by(|(m, _)| m.as_str().cmp(label))
                .ok()
                .map(|i| mapping[i].1 as f64)
        })
        .collect();

    tracing::info!(column, labels = mapping.len(), "Label encoded");
    table.with_column(Column::new(column, ColumnData::Number(codes)))
}

/// Rescale a Number column in place. A zero denominator yields 0.
pub fn scale(table: &Table, column: &str, method: ScaleMethod) -> OpResult<Table> {
    let data = number_column(table, column)?;
    let values = present_numbers(data);
    if values.is_empty() {
        return Ok(table.clone());
    }

    let (offset, denom) = match method {
        ScaleMethod::Standard => (
            mean(&values).unwrap_or(0.0),
            population_std(&values).unwrap_or(0.0),
        ),
        ScaleMethod::MinMax => {
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (lo, hi - lo)
        }
    };
    tracing::info!(column, method = %method, offset, denom, "Scaling column");

    let scaled = data.iter().map(|v| {
        v.map(|v| if denom == 0.0 { 0.0 } else { (v - offset) / denom })
    });
    table.with_column(Column::new(column, ColumnData::numbers(scaled)))
}

/// Names of the four columns [`extract_date_features`] appends.
pub fn date_feature_names(column: &str) -> [String; 4] {
    ["year", "month", "weekday", "is_holiday"].map(|suffix| format!("{}_{}", column, suffix))
}

/// Append `{c}_year`, `{c}_month`, `{c}_weekday` (0 = Monday) and
/// `{c}_is_holiday` (Saturday or Sunday).
pub fn extract_date_features(table: &Table, column: &str) -> OpResult<Table> {
    let source = table.column(column)?;
    if matches!(source.kind(), ColumnKind::Number | ColumnKind::Boolean) {
        return Err(OpError::type_mismatch(column, "date-like text", source.kind()));
    }
    let dates = to_datetimes(&source.data);

    let [year, month, weekday, holiday] = date_feature_names(column);
    let weekdays: Vec<Option<u32>> = dates
        .iter()
        .map(|d| d.map(|d| d.weekday().num_days_from_monday()))
        .collect();
    let derived = [
        Column::new(
            year,
            ColumnData::Number(dates.iter().map(|d| d.map(|d| d.year() as f64)).collect()),
        ),
        Column::new(
            month,
            ColumnData::Number(dates.iter().map(|d| d.map(|d| d.month() as f64)).collect()),
        ),
        Column::new(
            weekday,
            ColumnData::Number(weekdays.iter().map(|w| w.map(f64::from)).collect()),
        ),
        Column::new(
            holiday,
            ColumnData::Boolean(weekdays.iter().map(|w| w.map(|w| w >= 5)).collect()),
        ),
    ];

    tracing::info!(column, "Extracted date features");
    derived
        .into_iter()
        .try_fold(table.clone(), |acc, column| acc.with_column(column))
}
