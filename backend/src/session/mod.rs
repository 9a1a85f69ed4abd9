//! Per-user session state.
//!
//! A [`Session`] owns the current table, the name and fingerprint of the
//! file it came from, and the history of pandas statements that reproduce
//! it. Callers (the CLI or the HTTP state) own sessions explicitly; nothing
//! here is global.

use serde::Serialize;
use uuid::Uuid;

use crate::api::logs::{LogEntry, LOG_BROADCASTER};
use crate::cache::{LoadCache, LoadKey};
use crate::codegen;
use crate::error::{LoadResult, SessionError, SessionResult};
use crate::io::{self, FileFormat, LoadOptions, Loaded, SourceInfo};
use crate::stats::{self, CorrelationMethod};
use crate::table::{ColumnKind, Table};
use crate::transform::Operation;

/// What [`Session::load`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// Same file, bytes and options: the current table was kept.
    Unchanged,
    /// Parsed table taken from the cache.
    Cached,
    /// Bytes parsed.
    Parsed,
}

/// Column name with its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

/// Serializable view of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub file_name: Option<String>,
    pub shape: Option<(usize, usize)>,
    pub columns: Vec<ColumnInfo>,
    pub history: Vec<String>,
    pub source: Option<SourceInfo>,
}

/// One user's working state.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    table: Option<Table>,
    file_name: Option<String>,
    history: Vec<String>,
    fingerprint: Option<String>,
    options: LoadOptions,
    source: Option<SourceInfo>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            table: None,
            file_name: None,
            history: Vec::new(),
            fingerprint: None,
            options: LoadOptions::default(),
            source: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn source(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }

    fn log(&self, entry: LogEntry) {
        LOG_BROADCASTER.log(entry.with_session(self.id));
    }

    /// The current table, or [`SessionError::NoTable`].
    pub fn require_table(&self) -> SessionResult<&Table> {
        self.table.as_ref().ok_or(SessionError::NoTable)
    }

    /// Load a file into the session.
    ///
    /// The current table is kept when the file name, content and options
    /// are unchanged. Otherwise the format is resolved from the file name,
    /// the bytes are parsed (or taken from the cache), the table is replaced
    /// and a read statement is recorded. A failed load leaves the session
    /// without a table.
    pub fn load(
        &mut self,
        cache: &LoadCache,
        file_name: &str,
        bytes: &[u8],
        options: &LoadOptions,
    ) -> SessionResult<LoadOutcome> {
        let _span = tracing::info_span!("session", session = %self.id).entered();
        let fingerprint = io::fingerprint(bytes);

        let unchanged = self.table.is_some()
            && self.file_name.as_deref() == Some(file_name)
            && self.fingerprint.as_deref() == Some(fingerprint.as_str())
            && &self.options == options;
        if unchanged {
            tracing::debug!(file_name, "Source unchanged, keeping current table");
            return Ok(LoadOutcome::Unchanged);
        }

        self.file_name = Some(file_name.to_string());
        let (loaded, outcome) = match self.parse(cache, file_name, bytes, &fingerprint, options) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.table = None;
                self.fingerprint = None;
                self.source = None;
                self.log(LogEntry::error(format!("Failed to load {}: {}", file_name, e)));
                return Err(e.into());
            }
        };

        self.history
            .extend(codegen::load_statements(file_name, &loaded.info, options));
        let (rows, cols) = loaded.table.shape();
        self.table = Some(loaded.table);
        self.fingerprint = Some(fingerprint);
        self.options = options.clone();
        self.source = Some(loaded.info);

        self.log(LogEntry::success(format!(
            "Loaded {} ({} rows × {} columns)",
            file_name, rows, cols
        )));
        Ok(outcome)
    }

    fn parse(
        &self,
        cache: &LoadCache,
        file_name: &str,
        bytes: &[u8],
        fingerprint: &str,
        options: &LoadOptions,
    ) -> LoadResult<(Loaded, LoadOutcome)> {
        let format = FileFormat::from_file_name(file_name)?;
        let key = LoadKey::new(fingerprint, format, options, self.id);
        if let Some(loaded) = cache.get(&key) {
            return Ok((loaded, LoadOutcome::Cached));
        }
        let loaded = io::load(bytes, format, options)?;
        cache.insert(key, loaded.clone());
        Ok((loaded, LoadOutcome::Parsed))
    }

    /// Apply an operation to the current table.
    ///
    /// On success the table is replaced and the statement appended; on
    /// failure neither changes.
    pub fn apply(&mut self, operation: &Operation) -> SessionResult<()> {
        let _span = tracing::info_span!("session", session = %self.id).entered();
        let table = self.require_table()?;

        match operation.apply(table) {
            Ok(next) => {
                let statement = operation.statement(table);
                let (before, after) = (table.shape(), next.shape());
                self.history.push(statement);
                self.table = Some(next);
                self.log(LogEntry::success(format!(
                    "{}{}: {}×{} → {}×{}",
                    operation.name(),
                    operation
                        .column()
                        .map(|c| format!(" on '{}'", c))
                        .unwrap_or_default(),
                    before.0,
                    before.1,
                    after.0,
                    after.1
                )));
                Ok(())
            }
            Err(e) => {
                self.log(LogEntry::error(format!("{} failed: {}", operation.name(), e)));
                Err(e.into())
            }
        }
    }

    /// Clear table, file name, history and fingerprint, and evict this
    /// session's cached loads.
    pub fn reset(&mut self, cache: &LoadCache) {
        self.table = None;
        self.file_name = None;
        self.history.clear();
        self.fingerprint = None;
        self.options = LoadOptions::default();
        self.source = None;
        cache.evict_session(self.id);
        self.log(LogEntry::info("Session reset"));
    }

    pub fn shape(&self) -> Option<(usize, usize)> {
        self.table.as_ref().map(Table::shape)
    }

    /// Pandas script reproducing the current table.
    pub fn generated_code(&self) -> String {
        codegen::generate(&self.history)
    }

    pub fn describe(&self) -> SessionResult<Table> {
        Ok(stats::describe(self.require_table()?))
    }

    pub fn missing_info(&self) -> SessionResult<Table> {
        Ok(stats::missing_info(self.require_table()?))
    }

    pub fn correlation(&self, method: CorrelationMethod) -> SessionResult<Table> {
        Ok(stats::correlation(self.require_table()?, method))
    }

    pub fn preview(&self, head: usize, tail: usize) -> SessionResult<Table> {
        Ok(io::preview(self.require_table()?, head, tail))
    }

    pub fn export(&self, format: FileFormat) -> SessionResult<Vec<u8>> {
        Ok(io::export(self.require_table()?, format)?)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            file_name: self.file_name.clone(),
            shape: self.shape(),
            columns: self
                .table
                .iter()
                .flat_map(|t| t.columns())
                .map(|c| ColumnInfo {
                    name: c.name.clone(),
                    kind: c.kind(),
                })
                .collect(),
            history: self.history.clone(),
            source: self.source.clone(),
        }
    }
}
