//! CSV codec with encoding and delimiter auto-detection.
//!
//! Reading decodes the bytes (BOM, explicit label or `chardet` guess), picks
//! a delimiter, applies the header rules and infers one [`ColumnKind`] per
//! column. Writing always produces BOM-prefixed UTF-8 with `,`.

use encoding_rs::{Encoding, UTF_8};
use std::collections::HashSet;

use crate::error::{ExportError, ExportResult, LoadError, LoadResult};
use crate::table::{
    format_bool, format_datetime, format_number, is_missing_token, parse_bool, parse_datetime,
    parse_number, Column, ColumnData, Table,
};

use super::LoadOptions;

/// UTF-8 byte-order mark written in front of every export.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Bytes handed to `chardet` when guessing the encoding.
const DETECT_SAMPLE: usize = 64 * 1024;

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Parsed CSV plus what was detected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvParse {
    pub table: Table,
    /// Name of the encoding used to decode the bytes
    pub encoding: String,
    pub delimiter: u8,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let sample = &bytes[..bytes.len().min(DETECT_SAMPLE)];
    let charset = chardet::detect(sample).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Pick the encoding: BOM first, then the caller's label, then a guess.
fn resolve_encoding(bytes: &[u8], label: Option<&str>) -> LoadResult<&'static Encoding> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return Ok(encoding);
    }
    match label {
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| LoadError::Parse(format!("Unknown encoding '{}'", label))),
        // An unrecognised guess is not the user's fault; fall back to UTF-8
        None => Ok(Encoding::for_label(detect_encoding(bytes).as_bytes()).unwrap_or(UTF_8)),
    }
}

/// Decode bytes to string using the specified encoding label.
pub fn decode_content(bytes: &[u8], encoding: &str) -> LoadResult<String> {
    let encoding = resolve_encoding(bytes, Some(encoding))?;
    decode_with(bytes, encoding)
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> LoadResult<String> {
    // `decode` strips a leading BOM
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(LoadError::Parse(format!(
            "Content is not valid {}",
            used.name()
        )));
    }
    Ok(text.into_owned())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = b',';
    let mut best_count = 0;

    for &sep in &DELIMITERS {
        let count = first_line.matches(sep as char).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV bytes into a typed table.
pub fn read_csv(bytes: &[u8], options: &LoadOptions) -> LoadResult<CsvParse> {
    let encoding = resolve_encoding(bytes, options.encoding.as_deref())?;
    let content = decode_with(bytes, encoding)?;
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&content));

    let table = parse_str(&content, delimiter, options)?;
    Ok(CsvParse {
        table,
        encoding: encoding.name().to_lowercase(),
        delimiter,
    })
}

/// Parse decoded CSV text with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: u8, options: &LoadOptions) -> LoadResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LoadError::Parse(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let Some(first) = rows.first() else {
        return Err(LoadError::Parse("No columns to parse from file".to_string()));
    };
    let width = first.len();

    let (names, data_rows) = match (&options.column_names, options.header) {
        (Some(names), _) => {
            if names.len() != width {
                return Err(LoadError::ColumnCountMismatch {
                    names: names.len(),
                    columns: width,
                });
            }
            (names.clone(), &rows[..])
        }
        (None, true) => (dedupe_headers(first), &rows[1..]),
        (None, false) => ((0..width).map(|i| i.to_string()).collect(), &rows[..]),
    };

    let columns = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let cells: Vec<Option<&str>> = data_rows
                .iter()
                .map(|row| Some(row[i].as_str()).filter(|s| !is_missing_token(s)))
                .collect();
            Column::new(name, infer_column(&cells))
        })
        .collect();

    Table::with_row_count(data_rows.len(), columns).map_err(|e| LoadError::Parse(e.to_string()))
}

/// Mangle repeated header names: `a`, `a.1`, `a.2`.
fn dedupe_headers(headers: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 0;
            while seen.contains(&candidate) {
                n += 1;
                candidate = format!("{}.{}", name, n);
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Narrowest kind every present cell parses as: number, boolean, date-time, text.
fn infer_column(cells: &[Option<&str>]) -> ColumnData {
    let present = || cells.iter().flatten();

    if present().all(|s| parse_number(s).is_some()) {
        return ColumnData::numbers(cells.iter().map(|c| c.and_then(parse_number)));
    }
    if present().all(|s| parse_bool(s).is_some()) {
        return ColumnData::Boolean(cells.iter().map(|c| c.and_then(parse_bool)).collect());
    }
    if present().all(|s| parse_datetime(s).is_some()) {
        return ColumnData::DateTime(cells.iter().map(|c| c.and_then(parse_datetime)).collect());
    }
    ColumnData::Text(cells.iter().map(|c| c.map(str::to_string)).collect())
}

/// Serialize a table as BOM-prefixed UTF-8 CSV with a header row.
pub fn write_csv(table: &Table) -> ExportResult<Vec<u8>> {
    let mut buffer = UTF8_BOM.to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer
            .write_record(table.column_names())
            .map_err(|e| ExportError::Csv(e.to_string()))?;

        let date_only: Vec<bool> = table
            .columns()
            .iter()
            .map(|c| c.data.is_date_only())
            .collect();

        for row in 0..table.n_rows() {
            let fields = table
                .columns()
                .iter()
                .zip(&date_only)
                .map(|(c, &date_only)| format_cell(&c.data, row, date_only));
            writer
                .write_record(fields)
                .map_err(|e| ExportError::Csv(e.to_string()))?;
        }
        writer.flush()?;
    }
    Ok(buffer)
}

fn format_cell(data: &ColumnData, row: usize, date_only: bool) -> String {
    match data {
        ColumnData::Number(v) => v[row].map(format_number),
        ColumnData::Text(v) | ColumnData::Category(v) => v[row].clone(),
        ColumnData::Boolean(v) => v[row].map(|b| format_bool(b).to_string()),
        ColumnData::DateTime(v) => v[row].map(|d| format_datetime(&d, date_only)),
    }
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnKind, Value};

    fn parse(csv: &str) -> Table {
        read_csv(csv.as_bytes(), &LoadOptions::default()).unwrap().table
    }

    #[test]
    fn test_simple_csv() {
        let t = parse("name,age\nAlice,30\nBob,25");
        assert_eq!(t.shape(), (2, 2));
        assert_eq!(t.column("name").unwrap().kind(), ColumnKind::Text);
        assert_eq!(t.column("age").unwrap().kind(), ColumnKind::Number);
        assert_eq!(t.row(1), vec![Value::Text("Bob".into()), Value::Number(25.0)]);
    }

    #[test]
    fn test_kind_inference() {
        let t = parse("n,b,d,t,empty\n1.5,True,2024-01-06,x,\n,false,2024-01-07 10:00,y,\n");
        let kinds: Vec<ColumnKind> = t.columns().iter().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Number,
                ColumnKind::Boolean,
                ColumnKind::DateTime,
                ColumnKind::Text,
                ColumnKind::Number,
            ]
        );
        assert_eq!(t.column("n").unwrap().data.missing_count(), 1);
        assert_eq!(t.column("empty").unwrap().data.missing_count(), 2);
    }

    #[test]
    fn test_missing_tokens() {
        let t = parse("a,b\nNA,x\n3,null");
        assert_eq!(t.column("a").unwrap().data.missing_count(), 1);
        assert_eq!(t.column("b").unwrap().data.missing_count(), 1);
    }

    #[test]
    fn test_quoted_values() {
        let t = parse("name,value\n\"Smith, J\",\"Hello \"\"World\"\"\"");
        assert_eq!(t.row(0)[0], Value::Text("Smith, J".into()));
        assert_eq!(t.row(0)[1], Value::Text("Hello \"World\"".into()));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let t = parse("a,b\n1,2\n\n3,4\n");
        assert_eq!(t.n_rows(), 2);
    }

    #[test]
    fn test_ragged_rows_fail() {
        let err = read_csv(b"a,b\n1,2,3\n", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn test_empty_csv_error() {
        let err = read_csv(b"", &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("No columns"));
    }

    #[test]
    fn test_no_header_synthetic_names() {
        let options = LoadOptions {
            header: false,
            ..LoadOptions::default()
        };
        let t = read_csv(b"1,2\n3,4", &options).unwrap().table;
        assert_eq!(t.column_names(), vec!["0", "1"]);
        assert_eq!(t.n_rows(), 2);
    }

    #[test]
    fn test_explicit_names_keep_first_row() {
        let options = LoadOptions {
            column_names: Some(vec!["x".into(), "y".into()]),
            ..LoadOptions::default()
        };
        let t = read_csv(b"1,2\n3,4", &options).unwrap().table;
        assert_eq!(t.column_names(), vec!["x", "y"]);
        assert_eq!(t.n_rows(), 2);
    }

    #[test]
    fn test_explicit_names_count_mismatch() {
        let options = LoadOptions {
            column_names: Some(vec!["x".into()]),
            ..LoadOptions::default()
        };
        let err = read_csv(b"1,2\n3,4", &options).unwrap_err();
        assert!(matches!(
            err,
            LoadError::ColumnCountMismatch { names: 1, columns: 2 }
        ));
    }

    #[test]
    fn test_duplicate_headers_mangled() {
        let t = parse("a,a,a\n1,2,3");
        assert_eq!(t.column_names(), vec!["a", "a.1", "a.2"]);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), b'\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), b'|');
        assert_eq!(detect_delimiter("single"), b',');
    }

    #[test]
    fn test_semicolon_auto_detected() {
        let parsed = read_csv(b"name;age\nAlice;30", &LoadOptions::default()).unwrap();
        assert_eq!(parsed.delimiter, b';');
        assert_eq!(parsed.table.column_names(), vec!["name", "age"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_encoding_override() {
        let mut bytes = b"city\n".to_vec();
        bytes.extend_from_slice(&[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9]);
        let options = LoadOptions {
            encoding: Some("latin1".into()),
            ..LoadOptions::default()
        };
        let t = read_csv(&bytes, &options).unwrap().table;
        assert_eq!(t.row(0)[0], Value::Text("Société".into()));
    }

    #[test]
    fn test_unknown_encoding_label() {
        let options = LoadOptions {
            encoding: Some("klingon".into()),
            ..LoadOptions::default()
        };
        assert!(matches!(
            read_csv(b"a\n1", &options),
            Err(LoadError::Parse(_))
        ));
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"a,b\n1,2");
        let t = read_csv(&bytes, &LoadOptions::default()).unwrap().table;
        assert_eq!(t.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_write_csv_format() {
        let t = parse("n,flag,when,label\n2024,True,2024-01-06,x\n27.5,,2024-01-07,");
        let bytes = write_csv(&t).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(
            text,
            "n,flag,when,label\n2024,True,2024-01-06,x\n27.5,,2024-01-07,\n"
        );
    }

    #[test]
    fn test_write_single_missing_column_survives_reload() {
        let t = Table::new(vec![Column::new(
            "a",
            ColumnData::Number(vec![Some(1.0), None, Some(3.0)]),
        )])
        .unwrap();
        let bytes = write_csv(&t).unwrap();
        let back = read_csv(&bytes, &LoadOptions::default()).unwrap().table;
        assert_eq!(back, t);
    }
}
