use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{DatasetDescriptor, Operation, file_list};
use crate::error::AcqError;
use crate::ledger::{AcquisitionRecord, Ledger, LedgerEntry, RunContext};
use crate::source::RemoteSource;
use crate::store::Store;

/// Result of checking one dataset against its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "files", rename_all = "lowercase")]
pub enum Assessment {
    Current,
    /// Declared files absent from the storage root.
    Incomplete(Vec<String>),
    /// Files whose local mtime precedes the remote last-modified signal.
    Outdated(Vec<String>),
}

/// A download the manager is about to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Init,
    FillMissing(Vec<String>),
    Refresh(Vec<String>),
}

impl Action {
    pub fn operation(&self) -> Operation {
        match self {
            Action::Init => Operation::Init,
            Action::FillMissing(_) => Operation::Download,
            Action::Refresh(_) => Operation::Update,
        }
    }

    pub fn cause(&self) -> String {
        match self {
            Action::Init => "Init dataset".to_string(),
            Action::FillMissing(files) => format!("Missing files: {}", file_list(files)),
            Action::Refresh(files) => format!("Outdated files: {}", file_list(files)),
        }
    }

    /// Subset passed to the adapter; refreshes and inits fetch everything.
    fn targets(&self) -> Option<&[String]> {
        match self {
            Action::FillMissing(files) => Some(files),
            Action::Init | Action::Refresh(_) => None,
        }
    }
}

impl Assessment {
    pub fn action(&self) -> Option<Action> {
        match self {
            Assessment::Current => None,
            Assessment::Incomplete(files) => Some(Action::FillMissing(files.clone())),
            Assessment::Outdated(files) => Some(Action::Refresh(files.clone())),
        }
    }
}

pub const FRESHNESS_FAILURE_CAUSE: &str = "Freshness check failed";

/// Drives one descriptor from observed state to the needed download.
///
/// Adapter errors are never swallowed: they are written to the ledger with
/// the error column populated and then returned to the caller.
pub struct ConsistencyManager<'a> {
    descriptor: &'a DatasetDescriptor,
    source: &'a dyn RemoteSource,
    store: &'a Store,
    ledger: &'a Ledger,
}

impl<'a> ConsistencyManager<'a> {
    pub fn new(
        descriptor: &'a DatasetDescriptor,
        source: &'a dyn RemoteSource,
        store: &'a Store,
        ledger: &'a Ledger,
    ) -> Self {
        Self {
            descriptor,
            source,
            store,
            ledger,
        }
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        self.descriptor
    }

    pub fn missing_files(&self) -> Vec<String> {
        self.store
            .missing(self.descriptor.files())
            .into_iter()
            .cloned()
            .collect()
    }

    /// Compares every declared file against one fresh remote timestamp.
    /// Callers must have established completeness first.
    pub fn outdated_files(&self) -> Result<Vec<String>, AcqError> {
        let remote = self.source.last_modified()?;
        let mut outdated = Vec::new();
        for file in self.descriptor.files() {
            let local = self.store.modified_time(file)?;
            if local < remote {
                outdated.push(file.clone());
            }
        }
        debug!(
            dataset = self.descriptor.name(),
            remote = %remote,
            outdated = outdated.len(),
            "freshness checked"
        );
        Ok(outdated)
    }

    /// Completeness first; freshness only when every file is present.
    pub fn assess(&self) -> Result<Assessment, AcqError> {
        let missing = self.missing_files();
        if !missing.is_empty() {
            return Ok(Assessment::Incomplete(missing));
        }
        let outdated = self.outdated_files()?;
        if outdated.is_empty() {
            Ok(Assessment::Current)
        } else {
            Ok(Assessment::Outdated(outdated))
        }
    }

    /// Like [`assess`](Self::assess), but a failed check is written to the
    /// ledger before the error is returned.
    pub fn assess_or_record(&self) -> Result<Assessment, AcqError> {
        self.assess().or_else(|err| {
            self.ledger.append(
                &LedgerEntry::new(
                    self.descriptor.name(),
                    Operation::Update,
                    FRESHNESS_FAILURE_CAUSE,
                )
                .with_error(&err),
            )?;
            Err(err)
        })
    }

    /// Assesses the dataset and runs the download it calls for, if any.
    pub fn reconcile(&self, ctx: &mut RunContext) -> Result<Assessment, AcqError> {
        let assessment = self.assess_or_record()?;
        match assessment.action() {
            Some(action) => {
                self.acquire(&action, ctx)?;
            }
            None => info!(dataset = self.descriptor.name(), "dataset up to date"),
        }
        Ok(assessment)
    }

    /// Times the download, measures the declared files and records both.
    pub fn acquire(
        &self,
        action: &Action,
        ctx: &mut RunContext,
    ) -> Result<AcquisitionRecord, AcqError> {
        let entry = LedgerEntry::new(self.descriptor.name(), action.operation(), action.cause());
        match self.download_and_measure(action) {
            Ok(record) => {
                ctx.record(record.clone());
                self.ledger.append(&entry)?;
                Ok(record)
            }
            Err(err) => {
                self.ledger.append(&entry.with_error(&err))?;
                Err(err)
            }
        }
    }

    fn download_and_measure(&self, action: &Action) -> Result<AcquisitionRecord, AcqError> {
        info!(
            dataset = self.descriptor.name(),
            operation = %action.operation(),
            cause = %action.cause(),
            "downloading"
        );
        let start = Instant::now();
        self.source.download(action.targets())?;
        let elapsed_secs = start.elapsed().as_secs_f64();
        let total_bytes = self.store.total_size_bytes(self.descriptor.files())?;
        Ok(AcquisitionRecord {
            dataset: self.descriptor.name().to_string(),
            elapsed_secs,
            total_bytes,
        })
    }
}
