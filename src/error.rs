use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AcqError {
    #[error("invalid dataset configuration: {0}")]
    Configuration(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("download returned status {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error("provider authentication failed: {0}")]
    Authentication(String),

    #[error("archive extraction failed: {0}")]
    Extraction(String),

    #[error("metadata request failed: {0}")]
    Metadata(String),

    #[error("metadata request returned status {status}: {message}")]
    MetadataStatus { status: u16, message: String },

    #[error("file not found in storage root: {0}")]
    NotFound(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("ledger write failed: {0}")]
    Ledger(String),

    #[error("failed to read job log {0}")]
    LogRead(PathBuf),
}

impl AcqError {
    /// Transport, authentication and extraction failures of a download.
    pub fn is_download_error(&self) -> bool {
        matches!(
            self,
            AcqError::Download(_)
                | AcqError::DownloadStatus { .. }
                | AcqError::Authentication(_)
                | AcqError::Extraction(_)
        )
    }

    pub fn is_metadata_error(&self) -> bool {
        matches!(self, AcqError::Metadata(_) | AcqError::MetadataStatus { .. })
    }
}
