use std::fs::{self, File};
use std::io::Write;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use opendata_sync::config::LogPrepConfig;
use opendata_sync::error::AcqError;
use opendata_sync::hadoop::{JobLedger, JobStatus, preprocess};

const SUCCESS_LOG: &str = "\
INFO mapreduce.Job: Job job_7 completed successfully
\t\tTotal time spent by all maps in occupied slots (ms)=4200
\t\tTotal time spent by all reduces in occupied slots (ms)=800
";

fn ledger_in(dir: &tempfile::TempDir) -> JobLedger {
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    JobLedger::new(base.join("hadoop_logs").join("hadoop_logs.csv"))
}

#[test]
fn ensure_reports_what_it_created() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);

    assert_eq!(ledger.ensure().unwrap(), (true, true));
    assert_eq!(ledger.ensure().unwrap(), (false, false));
}

#[test]
fn preprocess_appends_summary_row() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    let log_path = dir.path().join("job.log");
    fs::write(&log_path, SUCCESS_LOG).unwrap();

    let summary = preprocess(&log_path, "wordcount", &ledger).unwrap();
    assert_eq!(summary.status, JobStatus::Success);
    assert_eq!(summary.total_time, 5000);

    let content = fs::read_to_string(ledger.path()).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(
        lines[0],
        "datetime,process_name,status,total_time,maps_time,reduces_time,errors"
    );
    assert!(lines[1].ends_with(",wordcount,SUCCESS,5000,4200,800,"));
}

#[test]
fn reads_gzip_logs() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    let log_path = dir.path().join("job.log.gz");
    let mut encoder = GzEncoder::new(File::create(&log_path).unwrap(), Compression::default());
    encoder
        .write_all(b"Error: out of memory\n\nJob Status : FAILED\n")
        .unwrap();
    encoder.finish().unwrap();

    let summary = preprocess(&log_path, "join", &ledger).unwrap();
    assert_eq!(summary.status, JobStatus::Failed);
    assert_eq!(summary.errors.as_deref(), Some("Error: out of memory\n\n"));
}

#[test]
fn crlf_log_file_keeps_error_text() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    let log_path = dir.path().join("job.log");
    fs::write(
        &log_path,
        "Error: disk full\r\n\tat Writer.flush\r\n\r\nJob Status : FAILED\r\n",
    )
    .unwrap();

    let summary = preprocess(&log_path, "export", &ledger).unwrap();
    assert_eq!(summary.status, JobStatus::Failed);
    assert_eq!(
        summary.errors.as_deref(),
        Some("Error: disk full\n\tat Writer.flush\n\n")
    );
}

#[test]
fn repeated_runs_keep_single_header() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    let log_path = dir.path().join("job.log");
    fs::write(&log_path, SUCCESS_LOG).unwrap();

    preprocess(&log_path, "first", &ledger).unwrap();
    preprocess(&log_path, "second", &ledger).unwrap();

    let content = fs::read_to_string(ledger.path()).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert_eq!(
        content
            .lines()
            .filter(|line| line.starts_with("datetime,"))
            .count(),
        1
    );
}

#[test]
fn missing_log_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    let result = preprocess(&dir.path().join("absent.log"), "ghost", &ledger);
    assert_matches!(result, Err(AcqError::LogRead(_)));
}

#[test]
fn log_location_from_environment() {
    let config = LogPrepConfig::resolve(|key| match key {
        "HADOOP_LOGS_FILE_LOCATION" => Some("/var/log/jobs".to_string()),
        "HADOOP_LOGS_FILE_NAME" => Some("jobs.csv".to_string()),
        _ => None,
    });
    assert_eq!(config.log_file.as_str(), "/var/log/jobs/jobs.csv");
}
