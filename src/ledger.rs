use std::fs::OpenOptions;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::debug;

use crate::domain::Operation;
use crate::error::AcqError;
use crate::store::ensure_dir;

pub const LEDGER_HEADERS: [&str; 5] = ["datetime", "dataset", "operation", "cause", "error"];
pub const SUMMARY_ROWS: [&str; 2] = ["Download time [s]", "Total files size [MB]"];

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Local>,
    pub dataset: String,
    pub operation: Operation,
    pub cause: String,
    pub error: Option<String>,
}

impl LedgerEntry {
    pub fn new(dataset: &str, operation: Operation, cause: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            dataset: dataset.to_string(),
            operation,
            cause: cause.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: &AcqError) -> Self {
        self.error = Some(error.to_string());
        self
    }

    fn to_record(&self) -> [String; 5] {
        [
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            self.dataset.clone(),
            self.operation.to_string(),
            self.cause.clone(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Append-only CSV event log. Every write opens, appends and closes the file.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: Utf8PathBuf,
}

impl Ledger {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Creates the file with its header row if it does not exist yet.
    pub fn ensure(&self) -> Result<(), AcqError> {
        if self.path.as_std_path().exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        append_csv_row(&self.path, LEDGER_HEADERS)
    }

    pub fn append(&self, entry: &LedgerEntry) -> Result<(), AcqError> {
        self.ensure()?;
        append_csv_row(&self.path, entry.to_record())?;
        debug!(
            dataset = %entry.dataset,
            operation = %entry.operation,
            "ledger entry appended"
        );
        Ok(())
    }
}

/// Appends one record to `path`, opening the file for each write.
pub(crate) fn append_csv_row<I, T>(path: &Utf8Path, row: I) -> Result<(), AcqError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|err| AcqError::Ledger(format!("open {path}: {err}")))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer
        .write_record(row)
        .map_err(|err| AcqError::Ledger(err.to_string()))?;
    writer
        .flush()
        .map_err(|err| AcqError::Ledger(err.to_string()))
}

/// Timing and size of one completed download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionRecord {
    pub dataset: String,
    pub elapsed_secs: f64,
    pub total_bytes: u64,
}

impl AcquisitionRecord {
    pub fn elapsed_rounded(&self) -> f64 {
        round3(self.elapsed_secs)
    }

    pub fn size_mb(&self) -> f64 {
        round3(self.total_bytes as f64 / 1024.0 / 1024.0)
    }
}

/// Run-scoped accumulator threaded through the batch driver.
#[derive(Debug, Clone)]
pub struct RunContext {
    started_at: DateTime<Local>,
    records: Vec<AcquisitionRecord>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            started_at: Local::now(),
            records: Vec::new(),
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Stores `record`, replacing an earlier one for the same dataset in place.
    pub fn record(&mut self, record: AcquisitionRecord) {
        match self
            .records
            .iter_mut()
            .find(|existing| existing.dataset == record.dataset)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn get(&self, dataset: &str) -> Option<&AcquisitionRecord> {
        self.records.iter().find(|record| record.dataset == dataset)
    }

    pub fn records(&self) -> &[AcquisitionRecord] {
        &self.records
    }

    pub fn summary_file_name(&self) -> String {
        format!("{}.csv", self.summary_stem())
    }

    fn summary_stem(&self) -> String {
        format!(
            "acquisition_info_{}",
            self.started_at.format("%Y-%m-%d_%H.%M.%S")
        )
    }

    /// First summary path in `dir` not taken by an earlier run.
    fn unused_summary_path(&self, dir: &Utf8Path) -> Utf8PathBuf {
        let mut path = dir.join(self.summary_file_name());
        let mut attempt = 1;
        while path.as_std_path().exists() {
            path = dir.join(format!("{}_{attempt}.csv", self.summary_stem()));
            attempt += 1;
        }
        path
    }

    /// Writes the metrics table (rows = metrics, columns = datasets) into
    /// `dir`. Returns `None` when nothing was downloaded.
    pub fn write_summary(&self, dir: &Utf8Path) -> Result<Option<Utf8PathBuf>, AcqError> {
        if self.records.is_empty() {
            return Ok(None);
        }
        ensure_dir(dir)?;
        let path = self.unused_summary_path(dir);
        let mut writer = csv::Writer::from_path(path.as_std_path())
            .map_err(|err| AcqError::Ledger(err.to_string()))?;

        let header = std::iter::once(String::new())
            .chain(self.records.iter().map(|record| record.dataset.clone()));
        writer
            .write_record(header)
            .map_err(|err| AcqError::Ledger(err.to_string()))?;

        let elapsed = std::iter::once(SUMMARY_ROWS[0].to_string()).chain(
            self.records
                .iter()
                .map(|record| record.elapsed_rounded().to_string()),
        );
        writer
            .write_record(elapsed)
            .map_err(|err| AcqError::Ledger(err.to_string()))?;

        let sizes = std::iter::once(SUMMARY_ROWS[1].to_string())
            .chain(self.records.iter().map(|record| record.size_mb().to_string()));
        writer
            .write_record(sizes)
            .map_err(|err| AcqError::Ledger(err.to_string()))?;

        writer
            .flush()
            .map_err(|err| AcqError::Ledger(err.to_string()))?;
        Ok(Some(path))
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
