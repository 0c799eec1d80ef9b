use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use flate2::read::GzDecoder;
use regex::Regex;
use tracing::debug;

use crate::error::AcqError;
use crate::ledger::append_csv_row;
use crate::store::ensure_dir;

pub const JOB_LOG_HEADERS: [&str; 7] = [
    "datetime",
    "process_name",
    "status",
    "total_time",
    "maps_time",
    "reduces_time",
    "errors",
];

const FAILED_MARKER: &str = "Status : FAILED";

static MAPS_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Total time spent by all maps in occupied slots \(ms\)=\s*(\d+)")
        .expect("static regex")
});
static REDUCES_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Total time spent by all reduces in occupied slots \(ms\)=\s*(\d+)")
        .expect("static regex")
});
static ERROR_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Error:.*?\n\n").expect("static regex"));

/// Contents of one Hadoop job log.
#[derive(Debug, Clone)]
pub struct JobLog {
    content: String,
}

impl JobLog {
    /// Reads a plain or gzip-compressed (`.gz`) job log.
    pub fn read(path: &Path) -> Result<Self, AcqError> {
        let file = File::open(path).map_err(|_| AcqError::LogRead(path.to_path_buf()))?;
        let mut content = String::new();
        let is_gzip = path.extension().map(|ext| ext == "gz").unwrap_or(false);
        let read = if is_gzip {
            GzDecoder::new(file).read_to_string(&mut content)
        } else {
            let mut file = file;
            file.read_to_string(&mut content)
        };
        read.map_err(|_| AcqError::LogRead(path.to_path_buf()))?;
        Ok(Self::from_content(content))
    }

    /// Line endings are normalized to `\n`.
    pub fn from_content(content: impl Into<String>) -> Self {
        let content = content.into();
        let content = if content.contains('\r') {
            content.replace("\r\n", "\n")
        } else {
            content
        };
        Self { content }
    }

    pub fn is_failed(&self) -> bool {
        self.content.lines().any(|line| line.contains(FAILED_MARKER))
    }

    pub fn maps_time_ms(&self) -> u64 {
        first_counter(&MAPS_TIME, &self.content)
    }

    pub fn reduces_time_ms(&self) -> u64 {
        first_counter(&REDUCES_TIME, &self.content)
    }

    pub fn total_time_ms(&self) -> u64 {
        self.maps_time_ms() + self.reduces_time_ms()
    }

    /// Every `Error:` block through the blank line that ends it, concatenated.
    pub fn errors(&self) -> Option<String> {
        let blocks = ERROR_BLOCK
            .find_iter(&self.content)
            .map(|block| block.as_str())
            .collect::<String>();
        (!blocks.is_empty()).then_some(blocks)
    }
}

fn first_counter(regex: &Regex, content: &str) -> u64 {
    regex
        .captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|value| value.as_str().parse().ok())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobSummary {
    pub timestamp: DateTime<Local>,
    pub process_name: String,
    pub status: JobStatus,
    pub total_time: u64,
    pub maps_time: u64,
    pub reduces_time: u64,
    pub errors: Option<String>,
}

impl JobSummary {
    pub fn from_log(process_name: &str, log: &JobLog) -> Self {
        let maps_time = log.maps_time_ms();
        let reduces_time = log.reduces_time_ms();
        Self {
            timestamp: Local::now(),
            process_name: process_name.to_string(),
            status: if log.is_failed() {
                JobStatus::Failed
            } else {
                JobStatus::Success
            },
            total_time: maps_time + reduces_time,
            maps_time,
            reduces_time,
            errors: log.errors(),
        }
    }

    fn to_record(&self) -> [String; 7] {
        [
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            self.process_name.clone(),
            self.status.as_str().to_string(),
            self.total_time.to_string(),
            self.maps_time.to_string(),
            self.reduces_time.to_string(),
            self.errors.clone().unwrap_or_default(),
        ]
    }
}

/// Append-only CSV of preprocessed job summaries.
#[derive(Debug, Clone)]
pub struct JobLedger {
    path: Utf8PathBuf,
}

impl JobLedger {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Creates the directory and header row when absent. Returns which of
    /// the two had to be created.
    pub fn ensure(&self) -> Result<(bool, bool), AcqError> {
        let mut created_dir = false;
        if let Some(parent) = self.path.parent()
            && !parent.as_str().is_empty()
            && !parent.as_std_path().exists()
        {
            ensure_dir(parent)?;
            created_dir = true;
        }
        if self.path.as_std_path().exists() {
            return Ok((created_dir, false));
        }
        append_csv_row(&self.path, JOB_LOG_HEADERS)?;
        Ok((created_dir, true))
    }

    pub fn append(&self, summary: &JobSummary) -> Result<(), AcqError> {
        self.ensure()?;
        append_csv_row(&self.path, summary.to_record())?;
        debug!(process = %summary.process_name, path = %self.path, "job summary appended");
        Ok(())
    }
}

/// Reads one job log and appends its summary.
pub fn preprocess(
    log_path: &Path,
    process_name: &str,
    ledger: &JobLedger,
) -> Result<JobSummary, AcqError> {
    let log = JobLog::read(log_path)?;
    let summary = JobSummary::from_log(process_name, &log);
    ledger.append(&summary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAILED_LOG: &str = "\
INFO mapreduce.Job: Job job_1 failed with state FAILED
Error: java.lang.RuntimeException: boom
\tat org.example.Mapper.map(Mapper.java:42)

INFO mapreduce.Job: Counters: 12
\t\tTotal time spent by all maps in occupied slots (ms)=1500
\t\tTotal time spent by all reduces in occupied slots (ms)=250
Job Status : FAILED
";

    #[test]
    fn extracts_counters_and_status() {
        let log = JobLog::from_content(FAILED_LOG);
        assert!(log.is_failed());
        assert_eq!(log.maps_time_ms(), 1500);
        assert_eq!(log.reduces_time_ms(), 250);
        assert_eq!(log.total_time_ms(), 1750);
    }

    #[test]
    fn extracts_error_blocks_through_blank_line() {
        let log = JobLog::from_content(FAILED_LOG);
        let errors = log.errors().unwrap();
        assert!(errors.starts_with("Error: java.lang.RuntimeException: boom\n"));
        assert!(errors.ends_with("(Mapper.java:42)\n\n"));
    }

    #[test]
    fn crlf_log_keeps_error_blocks() {
        let log = JobLog::from_content("Error: boom\r\n\tat X\r\n\r\nJob Status : FAILED\r\n");
        assert!(log.is_failed());
        assert_eq!(log.errors().as_deref(), Some("Error: boom\n\tat X\n\n"));
    }

    #[test]
    fn clean_log_has_defaults() {
        let log = JobLog::from_content("INFO mapreduce.Job: completed successfully\n");
        assert!(!log.is_failed());
        assert_eq!(log.total_time_ms(), 0);
        assert!(log.errors().is_none());
    }
}
