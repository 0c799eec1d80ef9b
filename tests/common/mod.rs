#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::{self, File};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};

use opendata_sync::app::{ProgressEvent, ProgressSink};
use opendata_sync::domain::{CatalogSpec, DatasetDescriptor, SourceKind};
use opendata_sync::error::AcqError;
use opendata_sync::ledger::Ledger;
use opendata_sync::source::{RemoteSource, SourceResolver};
use opendata_sync::store::Store;

pub struct Workspace {
    pub _temp: tempfile::TempDir,
    pub store: Store,
    pub ledger: Ledger,
    pub summary_dir: Utf8PathBuf,
}

pub fn workspace() -> Workspace {
    let temp = tempfile::tempdir().unwrap();
    let base = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new(base.join("data"));
    store.ensure_root().unwrap();
    Workspace {
        _temp: temp,
        store,
        ledger: Ledger::new(base.join("logs").join("acquisition_log.csv")),
        summary_dir: base.join("data_logs"),
    }
}

pub fn catalog_descriptor(name: &str, file: &str) -> DatasetDescriptor {
    DatasetDescriptor::new(
        name,
        vec![file.to_string()],
        SourceKind::Catalog(CatalogSpec {
            domain: "data.example.org".to_string(),
            dataset_id: "abcd-1234".to_string(),
            url: format!("https://data.example.org/{file}"),
        }),
    )
    .unwrap()
}

pub fn archive_descriptor(name: &str, files: &[&str]) -> DatasetDescriptor {
    DatasetDescriptor::new(
        name,
        files.iter().map(|file| file.to_string()).collect(),
        SourceKind::Archive("owner/bundle".parse().unwrap()),
    )
    .unwrap()
}

pub fn epoch(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

pub fn utc(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
}

pub fn write_with_mtime(store: &Store, file: &str, content: &[u8], mtime: SystemTime) {
    let path = store.file_path(file);
    fs::write(&path, content).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

pub fn ledger_lines(ledger: &Ledger) -> Vec<String> {
    fs::read_to_string(ledger.path())
        .unwrap_or_default()
        .lines()
        .map(|line| line.to_string())
        .collect()
}

/// Remote dataset that materializes `produces` in the store on download.
pub struct MockSource {
    pub store: Store,
    pub produces: Vec<(String, Vec<u8>)>,
    pub remote: Result<DateTime<Utc>, String>,
    pub download_error: Option<String>,
    pub downloads: Mutex<Vec<Option<Vec<String>>>>,
    pub metadata_calls: Mutex<usize>,
}

impl MockSource {
    pub fn new(store: &Store, files: &[&str], remote_secs: i64) -> Self {
        Self {
            store: store.clone(),
            produces: files
                .iter()
                .map(|file| (file.to_string(), format!("data for {file}").into_bytes()))
                .collect(),
            remote: Ok(utc(remote_secs)),
            download_error: None,
            downloads: Mutex::new(Vec::new()),
            metadata_calls: Mutex::new(0),
        }
    }

    pub fn failing_download(mut self, message: &str) -> Self {
        self.download_error = Some(message.to_string());
        self
    }

    pub fn failing_metadata(mut self, message: &str) -> Self {
        self.remote = Err(message.to_string());
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

impl RemoteSource for MockSource {
    fn download(&self, targets: Option<&[String]>) -> Result<bool, AcqError> {
        self.downloads
            .lock()
            .unwrap()
            .push(targets.map(|files| files.to_vec()));
        if let Some(message) = &self.download_error {
            return Err(AcqError::Download(message.clone()));
        }
        for (file, content) in &self.produces {
            fs::write(self.store.file_path(file), content).unwrap();
        }
        Ok(true)
    }

    fn last_modified(&self) -> Result<DateTime<Utc>, AcqError> {
        *self.metadata_calls.lock().unwrap() += 1;
        self.remote
            .clone()
            .map_err(AcqError::Metadata)
    }
}

pub struct SourceRef<'a>(pub &'a MockSource);

impl RemoteSource for SourceRef<'_> {
    fn download(&self, targets: Option<&[String]>) -> Result<bool, AcqError> {
        self.0.download(targets)
    }

    fn last_modified(&self) -> Result<DateTime<Utc>, AcqError> {
        self.0.last_modified()
    }
}

#[derive(Default)]
pub struct MockProviders {
    pub sources: HashMap<String, MockSource>,
}

impl MockProviders {
    pub fn with(mut self, name: &str, source: MockSource) -> Self {
        self.sources.insert(name.to_string(), source);
        self
    }

    pub fn source(&self, name: &str) -> &MockSource {
        &self.sources[name]
    }

    pub fn total_downloads(&self) -> usize {
        self.sources.values().map(MockSource::download_count).sum()
    }
}

impl SourceResolver for MockProviders {
    fn resolve<'a>(&'a self, descriptor: &'a DatasetDescriptor) -> Box<dyn RemoteSource + 'a> {
        Box::new(SourceRef(&self.sources[descriptor.name()]))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}
