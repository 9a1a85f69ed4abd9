//! Read-only descriptive statistics.
//!
//! Every function here returns a fresh [`Table`] so the results can be
//! previewed, exported or served like any other dataset.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OpError;
use crate::table::{unique_name, Column, ColumnData, ColumnKind, Table};

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(sum_sq / (values.len() - ddof) as f64)
}

/// Sample standard deviation (n-1), `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    variance(values, 1).map(f64::sqrt)
}

/// Population standard deviation (n), `None` for an empty slice.
pub fn population_std(values: &[f64]) -> Option<f64> {
    variance(values, 0).map(f64::sqrt)
}

/// Quantile with linear interpolation between the closest ranks.
///
/// `values` need not be sorted. `q` is clamped into `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(quantile_sorted(&sorted, q))
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Present values of a number column.
pub(crate) fn present_numbers(data: &[Option<f64>]) -> Vec<f64> {
    data.iter().flatten().copied().collect()
}

const DESCRIBE_NUMBER_FIELDS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

/// One row per column: `column, count, unique, top, freq, mean, std, min,
/// 25%, 50%, 75%, max`.
///
/// Number columns fill the numeric summary, every other kind fills
/// `unique`/`top`/`freq`. Cells that do not apply are missing.
pub fn describe(table: &Table) -> Table {
    let n = table.n_cols();
    let mut names = Vec::with_capacity(n);
    let mut unique = Vec::with_capacity(n);
    let mut top = Vec::with_capacity(n);
    let mut freq = Vec::with_capacity(n);
    // count, mean, std, min, 25%, 50%, 75%, max
    let mut numeric: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(n); DESCRIBE_NUMBER_FIELDS.len()];

    for column in table.columns() {
        names.push(Some(column.name.clone()));
        let count = (column.len() - column.data.missing_count()) as f64;

        match column.data.as_numbers() {
            Some(data) => {
                let values = present_numbers(data);
                let mut sorted = values.clone();
                sorted.sort_by(f64::total_cmp);
                let q = |p: f64| (!sorted.is_empty()).then(|| quantile_sorted(&sorted, p));
                let row = [
                    Some(count),
                    mean(&values),
                    sample_std(&values),
                    sorted.first().copied(),
                    q(0.25),
                    q(0.5),
                    q(0.75),
                    sorted.last().copied(),
                ];
                for (field, value) in numeric.iter_mut().zip(row) {
                    field.push(value);
                }
                unique.push(None);
                top.push(None);
                freq.push(None);
            }
            None => {
                let counts = column.data.value_counts();
                let mode = column.data.mode();
                let mode_freq = mode
                    .as_ref()
                    .and_then(|m| counts.iter().find(|(v, _)| v == m))
                    .map(|(_, c)| *c as f64);
                numeric[0].push(Some(count));
                for field in numeric.iter_mut().skip(1) {
                    field.push(None);
                }
                unique.push(Some(counts.len() as f64));
                top.push(mode.and_then(|m| m.to_text()));
                freq.push(mode_freq);
            }
        }
    }

    let mut numeric = numeric.into_iter();
    let mut next = || ColumnData::numbers(numeric.next().unwrap_or_default());
    let count = next();
    let mut columns = vec![
        Column::new("column", ColumnData::Text(names)),
        Column::new("count", count),
        Column::new("unique", ColumnData::numbers(unique)),
        Column::new("top", ColumnData::Text(top)),
        Column::new("freq", ColumnData::numbers(freq)),
    ];
    for name in &DESCRIBE_NUMBER_FIELDS[1..] {
        columns.push(Column::new(*name, next()));
    }
    Table::from_parts(n, columns)
}

/// `column, missing, missing_pct` with the percentage in `0..=100`.
pub fn missing_info(table: &Table) -> Table {
    let n_rows = table.n_rows();
    let names = table.columns().iter().map(|c| Some(c.name.clone())).collect();
    let missing: Vec<Option<f64>> = table
        .columns()
        .iter()
        .map(|c| Some(c.data.missing_count() as f64))
        .collect();
    let pct = missing
        .iter()
        .map(|m| {
            m.map(|m| {
                if n_rows == 0 {
                    0.0
                } else {
                    m / n_rows as f64 * 100.0
                }
            })
        })
        .collect();

    Table::from_parts(
        table.n_cols(),
        vec![
            Column::new("column", ColumnData::Text(names)),
            Column::new("missing", ColumnData::Number(missing)),
            Column::new("missing_pct", ColumnData::Number(pct)),
        ],
    )
}

/// Correlation coefficient used by [`correlation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl FromStr for CorrelationMethod {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            other => Err(OpError::InvalidParameter(format!(
                "Unknown correlation method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationMethod::Pearson => f.write_str("pearson"),
            CorrelationMethod::Spearman => f.write_str("spearman"),
        }
    }
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

/// 1-based ranks, ties share their average rank.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = rank;
        }
        i = j + 1;
    }
    ranks
}

fn pair_coefficient(a: &[Option<f64>], b: &[Option<f64>], method: CorrelationMethod) -> Option<f64> {
    let (x, y): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    match method {
        CorrelationMethod::Pearson => pearson(&x, &y),
        CorrelationMethod::Spearman => pearson(&average_ranks(&x), &average_ranks(&y)),
    }
}

/// Pairwise-complete correlation matrix over the Number columns.
///
/// The first column, `column`, labels each row; it becomes `column_1` (and
/// so on) when a Number column already has that name. Entries with fewer
/// than two paired observations or zero variance are missing, the diagonal
/// included.
pub fn correlation(table: &Table, method: CorrelationMethod) -> Table {
    let numeric: Vec<(&str, &[Option<f64>])> = table
        .columns()
        .iter()
        .filter(|c| c.kind() == ColumnKind::Number)
        .filter_map(|c| c.data.as_numbers().map(|d| (c.name.as_str(), d)))
        .collect();

    let n = numeric.len();
    let mut matrix = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = if i == j {
                pair_coefficient(numeric[i].1, numeric[i].1, method).map(|_| 1.0)
            } else {
                pair_coefficient(numeric[i].1, numeric[j].1, method)
            };
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }

    let label = unique_name("column", |name| numeric.iter().any(|(n, _)| *n == name));
    let mut columns = vec![Column::new(
        label,
        ColumnData::Text(numeric.iter().map(|(name, _)| Some(name.to_string())).collect()),
    )];
    for (j, (name, _)) in numeric.iter().enumerate() {
        let data = matrix.iter().map(|row| row[j]).collect::<Vec<_>>();
        columns.push(Column::new(*name, ColumnData::numbers(data)));
    }
    Table::from_parts(n, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn cell(t: &Table, column: &str, row: usize) -> Value {
        t.column(column).unwrap().data.value(row)
    }

    fn number(t: &Table, column: &str, row: usize) -> f64 {
        match cell(t, column, row) {
            Value::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(approx(quantile(&v, 0.25).unwrap(), 1.75));
        assert!(approx(quantile(&v, 0.5).unwrap(), 2.5));
        assert!(approx(quantile(&v, 0.75).unwrap(), 3.25));
        assert_eq!(quantile(&[4.0, 1.0], 0.0), Some(1.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_std_variants() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx(population_std(&v).unwrap(), 2.0));
        assert!(approx(sample_std(&v).unwrap(), (32.0_f64 / 7.0).sqrt()));
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn test_describe_mixed_kinds() {
        let t = Table::new(vec![
            Column::new("age", ColumnData::Number(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), None])),
            Column::new(
                "city",
                ColumnData::Text(vec![
                    Some("Lyon".into()),
                    Some("Paris".into()),
                    Some("Paris".into()),
                    None,
                    Some("Lyon".into()),
                ]),
            ),
        ])
        .unwrap();
        let d = describe(&t);
        assert_eq!(d.shape(), (2, 12));
        assert_eq!(
            d.column_names(),
            vec!["column", "count", "unique", "top", "freq", "mean", "std", "min", "25%", "50%", "75%", "max"]
        );

        assert_eq!(number(&d, "count", 0), 4.0);
        assert!(approx(number(&d, "mean", 0), 2.5));
        assert!(approx(number(&d, "25%", 0), 1.75));
        assert_eq!(number(&d, "max", 0), 4.0);
        assert!(cell(&d, "top", 0).is_missing());

        assert_eq!(number(&d, "unique", 1), 2.0);
        // tie between Lyon and Paris: first occurring wins
        assert_eq!(cell(&d, "top", 1), Value::Text("Lyon".into()));
        assert_eq!(number(&d, "freq", 1), 2.0);
        assert!(cell(&d, "mean", 1).is_missing());
    }

    #[test]
    fn test_missing_info() {
        let t = Table::new(vec![
            Column::new("a", ColumnData::Number(vec![Some(1.0), None, None, Some(2.0)])),
            Column::new("b", ColumnData::Boolean(vec![Some(true); 4])),
        ])
        .unwrap();
        let m = missing_info(&t);
        assert_eq!(m.column_names(), vec!["column", "missing", "missing_pct"]);
        assert_eq!(number(&m, "missing", 0), 2.0);
        assert_eq!(number(&m, "missing_pct", 0), 50.0);
        assert_eq!(number(&m, "missing_pct", 1), 0.0);
    }

    #[test]
    fn test_missing_info_empty_table() {
        let t = Table::new(vec![Column::new("a", ColumnData::Number(vec![]))]).unwrap();
        assert_eq!(number(&missing_info(&t), "missing_pct", 0), 0.0);
    }

    #[test]
    fn test_correlation_pearson() {
        let t = Table::new(vec![
            Column::new("x", ColumnData::Number(vec![Some(1.0), Some(2.0), Some(3.0), None])),
            Column::new("y", ColumnData::Number(vec![Some(2.0), Some(4.0), Some(6.0), Some(1.0)])),
            Column::new("z", ColumnData::Number(vec![Some(3.0), Some(2.0), Some(1.0), Some(0.0)])),
            Column::new("label", ColumnData::Text(vec![None; 4])),
        ])
        .unwrap();
        let c = correlation(&t, CorrelationMethod::Pearson);
        assert_eq!(c.column_names(), vec!["column", "x", "y", "z"]);
        assert_eq!(c.n_rows(), 3);
        assert_eq!(number(&c, "x", 0), 1.0);
        // pairwise complete: row 3 dropped for (x, y)
        assert!(approx(number(&c, "y", 0), 1.0));
        assert!(approx(number(&c, "z", 0), -1.0));
        assert_eq!(number(&c, "x", 1), number(&c, "y", 0));
    }

    #[test]
    fn test_correlation_spearman_monotonic() {
        let t = Table::new(vec![
            Column::new("x", ColumnData::Number(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)])),
            Column::new("y", ColumnData::Number(vec![Some(1.0), Some(8.0), Some(27.0), Some(64.0)])),
        ])
        .unwrap();
        let c = correlation(&t, CorrelationMethod::Spearman);
        assert!(approx(number(&c, "y", 0), 1.0));
        let p = correlation(&t, CorrelationMethod::Pearson);
        assert!(number(&p, "y", 0) < 1.0);
    }

    #[test]
    fn test_correlation_zero_variance_is_missing() {
        let t = Table::new(vec![
            Column::new("x", ColumnData::Number(vec![Some(1.0), Some(2.0)])),
            Column::new("k", ColumnData::Number(vec![Some(5.0), Some(5.0)])),
        ])
        .unwrap();
        let c = correlation(&t, CorrelationMethod::Pearson);
        assert!(cell(&c, "k", 0).is_missing());
        assert!(cell(&c, "k", 1).is_missing());
    }

    #[test]
    fn test_correlation_label_avoids_data_names() {
        let t = Table::new(vec![
            Column::new("column", ColumnData::Number(vec![Some(1.0), Some(2.0), Some(3.0)])),
            Column::new("x", ColumnData::Number(vec![Some(2.0), Some(4.0), Some(7.0)])),
        ])
        .unwrap();
        let c = correlation(&t, CorrelationMethod::Pearson);
        assert_eq!(c.column_names(), vec!["column_1", "column", "x"]);
        assert!(Table::new(c.columns().to_vec()).is_ok());
        assert_eq!(cell(&c, "column_1", 0), Value::Text("column".into()));
    }

    #[test]
    fn test_average_ranks_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("Spearman".parse::<CorrelationMethod>().unwrap(), CorrelationMethod::Spearman);
        assert!("kendall".parse::<CorrelationMethod>().is_err());
    }
}
