//! Operation DSL.
//!
//! Every transformation a user can trigger is one variant of [`Operation`],
//! tagged by `"type"` in JSON. An operation knows how to apply itself to a
//! table and which pandas statement reproduces it.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::codegen::{df_column, python_list, python_number, python_str};
use crate::error::OpResult;
use crate::table::{
    format_bool, format_datetime, is_midnight, parse_bool, parse_datetime, parse_number,
    ColumnKind, Table,
};

use super::cleaning::{self, Axis, FillMethod, TargetKind, DEFAULT_SIGMA, IQR_FACTOR};
use super::features::{self, CombineOp, ScaleMethod};

/// All available transformation operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Coerce a column to another kind
    ConvertType { column: String, to: TargetKind },

    /// Drop rows (or columns) holding a missing value
    DropMissing {
        #[serde(default)]
        axis: Axis,
    },

    /// Fill missing values of one column
    FillMissing {
        column: String,
        method: FillMethod,
        #[serde(default, deserialize_with = "lenient_string")]
        value: Option<String>,
    },

    /// Drop exact duplicate rows
    DropDuplicates,

    /// Clamp a column into its IQR fences
    ClipOutliersIqr { column: String },

    /// Keep rows within `mean ± sigma * std`
    RemoveOutliersSigma {
        column: String,
        #[serde(default = "default_sigma")]
        sigma: f64,
    },

    /// Derive a column from two columns or a column and a constant
    CombineColumns {
        left: String,
        #[serde(default)]
        right: Option<String>,
        op: CombineOp,
        #[serde(default)]
        constant: Option<f64>,
    },

    /// Replace a column with Boolean indicators
    OneHotEncode { column: String },

    /// Replace a column with integer codes
    LabelEncode { column: String },

    /// Standard or min-max scaling
    Scale { column: String, method: ScaleMethod },

    /// Append year, month, weekday and weekend flag
    ExtractDateFeatures { column: String },
}

fn default_sigma() -> f64 {
    DEFAULT_SIGMA
}

/// Accept a constant written as a JSON string, number or boolean.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(format_bool(b).to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar constant, got {}",
            other
        ))),
    }
}

impl Operation {
    /// Apply this operation, returning the new table.
    pub fn apply(&self, table: &Table) -> OpResult<Table> {
        match self {
            Operation::ConvertType { column, to } => cleaning::convert_type(table, column, *to),
            Operation::DropMissing { axis } => Ok(cleaning::drop_missing(table, *axis)),
            Operation::FillMissing {
                column,
                method,
                value,
            } => cleaning::fill_missing(table, column, *method, value.as_deref()),
            Operation::DropDuplicates => Ok(cleaning::drop_duplicates(table)),
            Operation::ClipOutliersIqr { column } => cleaning::clip_outliers_iqr(table, column),
            Operation::RemoveOutliersSigma { column, sigma } => {
                cleaning::remove_outliers_sigma(table, column, *sigma)
            }
            Operation::CombineColumns {
                left,
                right,
                op,
                constant,
            } => features::combine_columns(table, left, right.as_deref(), *op, *constant),
            Operation::OneHotEncode { column } => features::one_hot_encode(table, column),
            Operation::LabelEncode { column } => features::label_encode(table, column),
            Operation::Scale { column, method } => features::scale(table, column, *method),
            Operation::ExtractDateFeatures { column } => {
                features::extract_date_features(table, column)
            }
        }
    }

    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ConvertType { .. } => "convert_type",
            Operation::DropMissing { .. } => "drop_missing",
            Operation::FillMissing { .. } => "fill_missing",
            Operation::DropDuplicates => "drop_duplicates",
            Operation::ClipOutliersIqr { .. } => "clip_outliers_iqr",
            Operation::RemoveOutliersSigma { .. } => "remove_outliers_sigma",
            Operation::CombineColumns { .. } => "combine_columns",
            Operation::OneHotEncode { .. } => "one_hot_encode",
            Operation::LabelEncode { .. } => "label_encode",
            Operation::Scale { .. } => "scale",
            Operation::ExtractDateFeatures { .. } => "extract_date_features",
        }
    }

    /// Column the operation targets, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Operation::ConvertType { column, .. }
            | Operation::FillMissing { column, .. }
            | Operation::ClipOutliersIqr { column }
            | Operation::RemoveOutliersSigma { column, .. }
            | Operation::OneHotEncode { column }
            | Operation::LabelEncode { column }
            | Operation::Scale { column, .. }
            | Operation::ExtractDateFeatures { column } => Some(column),
            Operation::CombineColumns { left, .. } => Some(left),
            Operation::DropMissing { .. } | Operation::DropDuplicates => None,
        }
    }

    /// Pandas statement reproducing this operation.
    ///
    /// `input` is the table the operation is applied to; it decides how
    /// constants are typed and whether a missing indicator is emitted.
    pub fn statement(&self, input: &Table) -> String {
        match self {
            Operation::ConvertType { column, to } => {
                let c = df_column(column);
                match to {
                    TargetKind::Number => format!("{c} = pd.to_numeric({c}, errors='coerce')"),
                    TargetKind::Text => format!("{c} = {c}.astype('string')"),
                    TargetKind::Category => format!("{c} = {c}.astype('category')"),
                    TargetKind::Date => format!("{c} = pd.to_datetime({c}, errors='coerce')"),
                    TargetKind::Unknown => {
                        format!("# convert_type: unknown kind for {}, unchanged", python_str(column))
                    }
                }
            }
            Operation::DropMissing { axis } => {
                let axis = match axis {
                    Axis::Rows => 0,
                    Axis::Columns => 1,
                };
                format!("df = df.dropna(axis={})", axis)
            }
            Operation::FillMissing {
                column,
                method,
                value,
            } => {
                let c = df_column(column);
                let fill = match method {
                    FillMethod::Mean => format!("{c}.mean()"),
                    FillMethod::Median => format!("{c}.median()"),
                    FillMethod::Mode => format!("{c}.value_counts(sort=False).idxmax()"),
                    FillMethod::Constant => match value {
                        Some(raw) => constant_literal(input, column, raw),
                        None => {
                            return format!(
                                "# fill_missing: no constant for {}, unchanged",
                                python_str(column)
                            )
                        }
                    },
                };
                format!("{c} = {c}.fillna({fill})")
            }
            Operation::DropDuplicates => "df = df.drop_duplicates()".to_string(),
            Operation::ClipOutliersIqr { column } => {
                let c = df_column(column);
                let k = python_number(IQR_FACTOR);
                format!(
                    "q1, q3 = {c}.quantile([0.25, 0.75]); iqr = q3 - q1; \
                     {c} = {c}.clip(q1 - {k} * iqr, q3 + {k} * iqr)"
                )
            }
            Operation::RemoveOutliersSigma { column, sigma } => {
                let c = df_column(column);
                let k = python_number(*sigma);
                format!(
                    "m, s = {c}.mean(), {c}.std(); \
                     df = df[({c} >= m - {k} * s) & ({c} <= m + {k} * s)]"
                )
            }
            Operation::CombineColumns {
                left,
                right,
                op,
                constant,
            } => {
                let name = features::combined_name(left, right.as_deref(), *op, *constant);
                let rhs = match op {
                    CombineOp::AddConstant => python_number(constant.unwrap_or_default()),
                    _ => df_column(right.as_deref().unwrap_or_default()),
                };
                format!(
                    "{} = {} {} {}",
                    df_column(&name),
                    df_column(left),
                    op.symbol(),
                    rhs
                )
            }
            Operation::OneHotEncode { column } => {
                let has_missing = input
                    .get(column)
                    .is_some_and(|c| c.data.missing_count() > 0);
                let dummy_na = if has_missing { ", dummy_na=True" } else { "" };
                format!(
                    "df = pd.get_dummies(df, columns={}{})",
                    python_list(&[column]),
                    dummy_na
                )
            }
            Operation::LabelEncode { column } => {
                let c = df_column(column);
                format!("{c} = pd.factorize({c}.astype(str), sort=True)[0]")
            }
            Operation::Scale { column, method } => {
                let c = df_column(column);
                match method {
                    ScaleMethod::Standard => format!(
                        "s = {c}.std(ddof=0); {c} = ({c} - {c}.mean()) / s if s else {c} * 0"
                    ),
                    ScaleMethod::MinMax => format!(
                        "lo, hi = {c}.min(), {c}.max(); \
                         {c} = ({c} - lo) / (hi - lo) if hi > lo else {c} * 0"
                    ),
                }
            }
            Operation::ExtractDateFeatures { column } => {
                let [year, month, weekday, holiday] = features::date_feature_names(column);
                format!(
                    "d = pd.to_datetime({}, errors='coerce'); {} = d.dt.year; {} = d.dt.month; \
                     {} = d.dt.weekday; {} = (d.dt.weekday >= 5).where(d.notna())",
                    df_column(column),
                    df_column(&year),
                    df_column(&month),
                    df_column(&weekday),
                    df_column(&holiday),
                )
            }
        }
    }
}

/// Python literal for a fill constant, typed after the column.
fn constant_literal(input: &Table, column: &str, raw: &str) -> String {
    let kind = input.get(column).map(|c| c.kind());
    match kind {
        Some(ColumnKind::Number) => parse_number(raw).map(python_number),
        Some(ColumnKind::Boolean) => parse_bool(raw).map(|b| format_bool(b).to_string()),
        Some(ColumnKind::DateTime) => parse_datetime(raw)
            .map(|d| format!("pd.Timestamp({})", python_str(&format_datetime(&d, is_midnight(&d))))),
        _ => None,
    }
    .unwrap_or_else(|| python_str(raw))
}

/// Get a description of all available operations for the CLI
pub fn operations_description() -> String {
    r#"Available operations:

| Operation | Description | Parameters |
|-----------|-------------|------------|
| convert_type | Coerce a column to another kind | column, to: number/text/category/date |
| drop_missing | Drop rows or columns holding a missing value | axis: rows/columns (default rows) |
| fill_missing | Fill missing values | column, method: mean/median/mode/constant, value: constant |
| drop_duplicates | Drop exact duplicate rows, keep first | - |
| clip_outliers_iqr | Clamp into [Q1 - 1.5*IQR, Q3 + 1.5*IQR] | column |
| remove_outliers_sigma | Keep rows within mean ± sigma*std | column, sigma (default 3) |
| combine_columns | Derive a column | left, right, op: add/subtract/multiply/divide/add_constant, constant |
| one_hot_encode | One Boolean column per distinct value | column |
| label_encode | Integer codes of sorted labels | column |
| scale | Rescale a numeric column | column, method: standard/minmax |
| extract_date_features | Append year, month, weekday, is_holiday | column |

Example operations in JSON:
[
  {"type": "fill_missing", "column": "age", "method": "mean"},
  {"type": "drop_duplicates"},
  {"type": "combine_columns", "left": "price", "right": "qty", "op": "multiply"},
  {"type": "one_hot_encode", "column": "city"},
  {"type": "extract_date_features", "column": "signup"}
]"#
    .to_string()
}
