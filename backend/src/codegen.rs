//! Pandas script generation.
//!
//! Each applied operation records one statement; [`generate`] prefixes the
//! import line and joins them. Literals are rendered through the helpers
//! below so column names with quotes survive.

use crate::io::{FileFormat, LoadOptions, SourceInfo};
use crate::table::format_number;

/// First line of every generated script.
pub const SETUP_LINE: &str = "import pandas as pd";

/// `import pandas as pd\n` followed by each statement and `\n`.
pub fn generate(history: &[String]) -> String {
    let mut script = String::with_capacity(
        SETUP_LINE.len() + 1 + history.iter().map(|s| s.len() + 1).sum::<usize>(),
    );
    script.push_str(SETUP_LINE);
    script.push('\n');
    for statement in history {
        script.push_str(statement);
        script.push('\n');
    }
    script
}

/// Single-quoted Python string literal.
pub fn python_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Python float literal (`float('inf')` for infinities).
pub fn python_number(n: f64) -> String {
    if n.is_infinite() {
        return if n > 0.0 {
            "float('inf')".to_string()
        } else {
            "float('-inf')".to_string()
        };
    }
    format_number(n)
}

/// `['a', 'b']`
pub fn python_list<S: AsRef<str>>(items: &[S]) -> String {
    let inner: Vec<String> = items.iter().map(|s| python_str(s.as_ref())).collect();
    format!("[{}]", inner.join(", "))
}

/// `df['name']`
pub fn df_column(name: &str) -> String {
    format!("df[{}]", python_str(name))
}

/// Statements that re-read a source file the way it was loaded.
pub fn load_statements(file_name: &str, info: &SourceInfo, options: &LoadOptions) -> Vec<String> {
    match info.format {
        FileFormat::Csv => {
            let mut args = vec![python_str(file_name)];
            match &options.column_names {
                Some(names) => {
                    args.push("header=None".to_string());
                    args.push(format!("names={}", python_list(names)));
                }
                None if options.header => args.push("header=0".to_string()),
                None => args.push("header=None".to_string()),
            }
            if let Some(delimiter) = info.delimiter.filter(|d| *d != ',') {
                args.push(format!("sep={}", python_str(&delimiter.to_string())));
            }
            if let Some(encoding) = info.encoding.as_deref().filter(|e| *e != "utf-8") {
                args.push(format!("encoding={}", python_str(encoding)));
            }
            vec![format!("df = pd.read_csv({})", args.join(", "))]
        }
        FileFormat::Parquet => {
            let mut statements = vec![format!("df = pd.read_parquet({})", python_str(file_name))];
            if let Some(names) = &options.column_names {
                statements.push(format!("df.columns = {}", python_list(names)));
            }
            statements
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_info(delimiter: char, encoding: &str) -> SourceInfo {
        SourceInfo {
            format: FileFormat::Csv,
            encoding: Some(encoding.to_string()),
            delimiter: Some(delimiter),
        }
    }

    #[test]
    fn test_generate_empty_history() {
        assert_eq!(generate(&[]), "import pandas as pd\n");
    }

    #[test]
    fn test_generate_is_deterministic() {
        let history = vec![
            "df = pd.read_csv('a.csv', header=0)".to_string(),
            "df = df.drop_duplicates()".to_string(),
        ];
        let first = generate(&history);
        assert_eq!(first, generate(&history));
        assert_eq!(
            first,
            "import pandas as pd\ndf = pd.read_csv('a.csv', header=0)\ndf = df.drop_duplicates()\n"
        );
    }

    #[test]
    fn test_python_str_escapes() {
        assert_eq!(python_str("plain"), "'plain'");
        assert_eq!(python_str("it's"), r"'it\'s'");
        assert_eq!(python_str(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_python_number() {
        assert_eq!(python_number(5.0), "5");
        assert_eq!(python_number(0.5), "0.5");
        assert_eq!(python_number(f64::NEG_INFINITY), "float('-inf')");
    }

    #[test]
    fn test_load_statements_csv() {
        let options = LoadOptions::default();
        assert_eq!(
            load_statements("data.csv", &csv_info(',', "utf-8"), &options),
            vec!["df = pd.read_csv('data.csv', header=0)"]
        );

        let options = LoadOptions {
            header: false,
            ..LoadOptions::default()
        };
        assert_eq!(
            load_statements("data.csv", &csv_info(';', "windows-1252"), &options),
            vec!["df = pd.read_csv('data.csv', header=None, sep=';', encoding='windows-1252')"]
        );

        let options = LoadOptions {
            column_names: Some(vec!["x".into(), "y".into()]),
            ..LoadOptions::default()
        };
        assert_eq!(
            load_statements("d.csv", &csv_info(',', "utf-8"), &options),
            vec!["df = pd.read_csv('d.csv', header=None, names=['x', 'y'])"]
        );
    }

    #[test]
    fn test_load_statements_parquet() {
        let info = SourceInfo {
            format: FileFormat::Parquet,
            encoding: None,
            delimiter: None,
        };
        assert_eq!(
            load_statements("d.parquet", &info, &LoadOptions::default()),
            vec!["df = pd.read_parquet('d.parquet')"]
        );
    }
}
