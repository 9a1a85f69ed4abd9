//! Dataset ingestion and export.
//!
//! ```text
//! bytes ──▶ FileFormat ──▶ csv::read_csv / parquet::read_parquet ──▶ Table
//! Table ──▶ csv::write_csv (BOM + UTF-8) / parquet::write_parquet ──▶ bytes
//! ```

pub mod csv;
pub mod parquet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ExportResult, LoadError, LoadResult};
use crate::table::Table;

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    /// Pick the format from a file name's extension.
    pub fn from_file_name(name: &str) -> LoadResult<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        extension
            .parse()
            .map_err(|_| LoadError::UnsupportedFormat(name.to_string()))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv",
            FileFormat::Parquet => "application/octet-stream",
        }
    }
}

impl FromStr for FileFormat {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "parquet" => Ok(FileFormat::Parquet),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How to read a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadOptions {
    /// First row holds column names (ignored when `column_names` is set)
    #[serde(default = "default_header")]
    pub header: bool,

    /// Explicit names; the first row is then data
    #[serde(default)]
    pub column_names: Option<Vec<String>>,

    /// Encoding label override for CSV (auto-detected otherwise)
    #[serde(default)]
    pub encoding: Option<String>,

    /// CSV delimiter override (auto-detected otherwise)
    #[serde(default)]
    pub delimiter: Option<u8>,
}

fn default_header() -> bool {
    true
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            header: true,
            column_names: None,
            encoding: None,
            delimiter: None,
        }
    }
}

/// Metadata about a loaded source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub format: FileFormat,
    /// Encoding used to decode a CSV (`None` for Parquet)
    pub encoding: Option<String>,
    /// Delimiter used for a CSV (`None` for Parquet)
    pub delimiter: Option<char>,
}

/// A parsed table with its source metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub table: Table,
    pub info: SourceInfo,
}

/// Parse bytes of the given format.
pub fn load(bytes: &[u8], format: FileFormat, options: &LoadOptions) -> LoadResult<Loaded> {
    match format {
        FileFormat::Csv => {
            let parsed = csv::read_csv(bytes, options)?;
            Ok(Loaded {
                table: parsed.table,
                info: SourceInfo {
                    format,
                    encoding: Some(parsed.encoding),
                    delimiter: Some(parsed.delimiter as char),
                },
            })
        }
        FileFormat::Parquet => {
            let mut table = parquet::read_parquet(bytes)?;
            if let Some(names) = &options.column_names {
                if names.len() != table.n_cols() {
                    return Err(LoadError::ColumnCountMismatch {
                        names: names.len(),
                        columns: table.n_cols(),
                    });
                }
                table = table
                    .renamed(names)
                    .map_err(|e| LoadError::Parse(e.to_string()))?;
            }
            Ok(Loaded {
                table,
                info: SourceInfo {
                    format,
                    encoding: None,
                    delimiter: None,
                },
            })
        }
    }
}

/// Read and parse a file, picking the format from its extension.
pub fn load_file<P: AsRef<Path>>(path: P, options: &LoadOptions) -> LoadResult<Loaded> {
    let path = path.as_ref();
    let format = FileFormat::from_file_name(&path.to_string_lossy())?;
    let bytes = std::fs::read(path)?;
    load(&bytes, format, options)
}

/// Serialize a table.
pub fn export(table: &Table, format: FileFormat) -> ExportResult<Vec<u8>> {
    match format {
        FileFormat::Csv => csv::write_csv(table),
        FileFormat::Parquet => parquet::write_parquet(table),
    }
}

/// First `head` rows, followed by the last `tail` rows when `tail > 0`.
pub fn preview(table: &Table, head: usize, tail: usize) -> Table {
    let n = table.n_rows();
    let mut rows: Vec<usize> = (0..head.min(n)).collect();
    if tail > 0 {
        rows.extend(n.saturating_sub(tail)..n);
    }
    table.take_rows(&rows)
}

/// SHA-256 of the raw bytes, hex-encoded.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{parse_datetime, Column, ColumnData, ColumnKind, Value};

    fn sample() -> Table {
        Table::new(vec![
            Column::new("id", ColumnData::Number(vec![Some(1.0), Some(2.0), Some(3.0)])),
            Column::new(
                "name",
                ColumnData::Text(vec![Some("a, b".into()), None, Some("c".into())]),
            ),
            Column::new(
                "joined",
                ColumnData::DateTime(vec![
                    parse_datetime("2024-01-06"),
                    parse_datetime("2024-01-07"),
                    None,
                ]),
            ),
            Column::new("active", ColumnData::Boolean(vec![Some(true), None, Some(false)])),
            Column::new(
                "tier",
                ColumnData::Category(vec![Some("gold".into()), Some("free".into()), None]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(FileFormat::from_file_name("data.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(
            FileFormat::from_file_name("dir/x.parquet").unwrap(),
            FileFormat::Parquet
        );
        assert!(matches!(
            FileFormat::from_file_name("book.xlsx"),
            Err(LoadError::UnsupportedFormat(_))
        ));
        assert!(FileFormat::from_file_name("noext").is_err());
    }

    #[test]
    fn test_csv_round_trip() {
        let t = sample();
        let bytes = export(&t, FileFormat::Csv).unwrap();
        let back = load(&bytes, FileFormat::Csv, &LoadOptions::default())
            .unwrap()
            .table;
        assert!(back.same_content(&t));
        // CSV carries no category tag
        assert_eq!(back.column("tier").unwrap().kind(), ColumnKind::Text);
    }

    #[test]
    fn test_csv_retypes_text_that_looks_typed() {
        let t = Table::new(vec![
            Column::new("code", ColumnData::Text(vec![Some("12".into()), Some("7".into())])),
            Column::new("flag", ColumnData::Text(vec![Some("true".into()), Some("false".into())])),
            Column::new("note", ColumnData::Text(vec![Some("NA".into()), Some("".into())])),
            Column::new("word", ColumnData::Text(vec![Some("NA".into()), Some("hello".into())])),
        ])
        .unwrap();
        let bytes = export(&t, FileFormat::Csv).unwrap();
        let back = load(&bytes, FileFormat::Csv, &LoadOptions::default())
            .unwrap()
            .table;

        // CSV cells carry no kind, so these are re-inferred on load
        assert_eq!(back.column("code").unwrap().kind(), ColumnKind::Number);
        assert_eq!(back.column("flag").unwrap().kind(), ColumnKind::Boolean);
        assert_eq!(back.column("note").unwrap().data.missing_count(), 2);
        assert_eq!(back.column("word").unwrap().data.value(0), Value::Missing);
        assert_eq!(back.column("word").unwrap().data.value(1), Value::Text("hello".into()));
        assert!(!back.same_content(&t));

        // Parquet keeps the Text kind
        let bytes = export(&t, FileFormat::Parquet).unwrap();
        let back = load(&bytes, FileFormat::Parquet, &LoadOptions::default())
            .unwrap()
            .table;
        assert_eq!(back, t);
    }

    #[test]
    fn test_csv_round_trip_numeric_headers() {
        let options = LoadOptions {
            header: false,
            ..LoadOptions::default()
        };
        let t = load(b"1,x\n2,y", FileFormat::Csv, &options).unwrap().table;
        let bytes = export(&t, FileFormat::Csv).unwrap();
        let back = load(&bytes, FileFormat::Csv, &LoadOptions::default())
            .unwrap()
            .table;
        assert_eq!(back, t);
    }

    #[test]
    fn test_parquet_round_trip() {
        let t = sample();
        let bytes = export(&t, FileFormat::Parquet).unwrap();
        let back = load(&bytes, FileFormat::Parquet, &LoadOptions::default())
            .unwrap()
            .table;
        assert_eq!(back, t);
    }

    #[test]
    fn test_parquet_explicit_names() {
        let bytes = export(&sample(), FileFormat::Parquet).unwrap();
        let options = LoadOptions {
            column_names: Some(vec!["x".into()]),
            ..LoadOptions::default()
        };
        assert!(matches!(
            load(&bytes, FileFormat::Parquet, &options),
            Err(LoadError::ColumnCountMismatch { names: 1, columns: 5 })
        ));
    }

    #[test]
    fn test_load_reports_source_info() {
        let loaded = load(b"a;b\n1;2", FileFormat::Csv, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.info.delimiter, Some(';'));
        assert_eq!(loaded.info.encoding.as_deref(), Some("utf-8"));
    }

    #[test]
    fn test_preview_head_tail() {
        let t = sample();
        assert_eq!(preview(&t, 1, 0).n_rows(), 1);
        let p = preview(&t, 1, 1);
        assert_eq!(p.n_rows(), 2);
        assert_eq!(p.row(1), t.row(2));
        assert_eq!(preview(&t, 10, 0).n_rows(), 3);
    }

    #[test]
    fn test_fingerprint_is_content_addressed() {
        assert_eq!(fingerprint(b"abc"), fingerprint(b"abc"));
        assert_ne!(fingerprint(b"abc"), fingerprint(b"abd"));
        assert_eq!(fingerprint(b"").len(), 64);
    }

    #[test]
    fn test_load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name,age\nAlice,30\n").unwrap();
        let loaded = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.table.shape(), (1, 2));
    }
}
