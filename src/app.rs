use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::domain::{DatasetDescriptor, FailurePolicy, Mode, file_list};
use crate::error::AcqError;
use crate::ledger::{Ledger, RunContext};
use crate::manager::{Action, Assessment, ConsistencyManager};
use crate::source::SourceResolver;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    Current,
    Downloaded,
    Updated,
    Initialized,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub status: DatasetStatus,
    pub files: Vec<String>,
    pub elapsed_secs: Option<f64>,
    pub size_mb: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: Mode,
    pub items: Vec<DatasetReport>,
}

impl RunReport {
    pub fn downloads(&self) -> usize {
        self.items
            .iter()
            .filter(|item| {
                matches!(
                    item.status,
                    DatasetStatus::Downloaded | DatasetStatus::Updated | DatasetStatus::Initialized
                )
            })
            .count()
    }

    pub fn failures(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status == DatasetStatus::Failed)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    Info,
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub level: ProgressLevel,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    fn info(message: String) -> Self {
        Self {
            message,
            level: ProgressLevel::Info,
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Batch driver: applies the consistency manager across every descriptor,
/// one dataset at a time, in list order.
pub struct App<R: SourceResolver> {
    store: Store,
    ledger: Ledger,
    resolver: R,
}

impl<R: SourceResolver> App<R> {
    pub fn new(store: Store, ledger: Ledger, resolver: R) -> Self {
        Self {
            store,
            ledger,
            resolver,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Sets up the storage root and ledger file.
    pub fn prepare(&self) -> Result<(), AcqError> {
        self.store.ensure_root()?;
        self.ledger.ensure()
    }

    pub fn run(
        &self,
        datasets: &[DatasetDescriptor],
        mode: Mode,
        policy: FailurePolicy,
        ctx: &mut RunContext,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, AcqError> {
        self.prepare()?;
        let mut items = Vec::with_capacity(datasets.len());

        for descriptor in datasets {
            let result = match mode {
                Mode::Force => self.force_one(descriptor, ctx, sink),
                Mode::Reconcile => self.reconcile_one(descriptor, ctx, sink),
            };
            match result {
                Ok(item) => items.push(item),
                Err(err) => {
                    warn!(dataset = descriptor.name(), error = %err, "dataset failed");
                    sink.event(ProgressEvent {
                        message: format!("Dataset '{}' failed: {err}", descriptor.name()),
                        level: ProgressLevel::Failure,
                        elapsed: None,
                    });
                    if policy == FailurePolicy::Abort {
                        return Err(err);
                    }
                    items.push(DatasetReport {
                        dataset: descriptor.name().to_string(),
                        status: DatasetStatus::Failed,
                        files: descriptor.files().to_vec(),
                        elapsed_secs: None,
                        size_mb: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(RunReport { mode, items })
    }

    fn force_one(
        &self,
        descriptor: &DatasetDescriptor,
        ctx: &mut RunContext,
        sink: &dyn ProgressSink,
    ) -> Result<DatasetReport, AcqError> {
        let source = self.resolver.resolve(descriptor);
        let manager =
            ConsistencyManager::new(descriptor, source.as_ref(), &self.store, &self.ledger);
        sink.event(ProgressEvent::info(format!(
            "Downloading '{}'...",
            descriptor.name()
        )));
        manager.acquire(&Action::Init, ctx)?;
        Ok(self.completed(descriptor, DatasetStatus::Initialized, ctx, sink))
    }

    fn reconcile_one(
        &self,
        descriptor: &DatasetDescriptor,
        ctx: &mut RunContext,
        sink: &dyn ProgressSink,
    ) -> Result<DatasetReport, AcqError> {
        let source = self.resolver.resolve(descriptor);
        let manager =
            ConsistencyManager::new(descriptor, source.as_ref(), &self.store, &self.ledger);

        let assessment = manager.assess_or_record()?;
        match &assessment {
            Assessment::Current => {
                sink.event(ProgressEvent::info(format!(
                    "Dataset '{}' up to date.",
                    descriptor.name()
                )));
                Ok(DatasetReport {
                    dataset: descriptor.name().to_string(),
                    status: DatasetStatus::Current,
                    files: Vec::new(),
                    elapsed_secs: None,
                    size_mb: None,
                    error: None,
                })
            }
            Assessment::Incomplete(missing) => {
                sink.event(ProgressEvent::info(format!(
                    "Dataset '{}' inconsistent. Missing files: {}",
                    descriptor.name(),
                    file_list(missing)
                )));
                manager.acquire(&Action::FillMissing(missing.clone()), ctx)?;
                let mut report = self.completed(descriptor, DatasetStatus::Downloaded, ctx, sink);
                report.files = missing.clone();
                Ok(report)
            }
            Assessment::Outdated(outdated) => {
                sink.event(ProgressEvent::info(format!(
                    "Dataset '{}' outdated. Outdated files: {}",
                    descriptor.name(),
                    file_list(outdated)
                )));
                manager.acquire(&Action::Refresh(outdated.clone()), ctx)?;
                let mut report = self.completed(descriptor, DatasetStatus::Updated, ctx, sink);
                report.files = outdated.clone();
                Ok(report)
            }
        }
    }

    fn completed(
        &self,
        descriptor: &DatasetDescriptor,
        status: DatasetStatus,
        ctx: &RunContext,
        sink: &dyn ProgressSink,
    ) -> DatasetReport {
        let record = ctx.get(descriptor.name());
        let elapsed_secs = record.map(|record| record.elapsed_rounded());
        let size_mb = record.map(|record| record.size_mb());
        sink.event(ProgressEvent {
            message: format!(
                "Done downloading '{}'. Total time = {}s, total size = {}MB",
                descriptor.name(),
                elapsed_secs.unwrap_or_default(),
                size_mb.unwrap_or_default()
            ),
            level: ProgressLevel::Success,
            elapsed: record.map(|record| Duration::from_secs_f64(record.elapsed_secs)),
        });
        DatasetReport {
            dataset: descriptor.name().to_string(),
            status,
            files: descriptor.files().to_vec(),
            elapsed_secs,
            size_mb,
            error: None,
        }
    }
}
