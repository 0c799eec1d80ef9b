use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use tempfile::{Builder, NamedTempFile};

use crate::error::AcqError;

/// Read-only view of dataset files under the storage root, plus the few
/// writes adapters need to place downloaded files.
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn file_path(&self, file: &str) -> Utf8PathBuf {
        self.root.join(file)
    }

    pub fn ensure_root(&self) -> Result<(), AcqError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| AcqError::Filesystem(err.to_string()))
    }

    pub fn exists(&self, file: &str) -> bool {
        self.file_path(file).as_std_path().is_file()
    }

    pub fn modified_time(&self, file: &str) -> Result<DateTime<Utc>, AcqError> {
        let metadata = self.metadata(file)?;
        let modified = metadata
            .modified()
            .map_err(|err| AcqError::Filesystem(err.to_string()))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    pub fn size_bytes(&self, file: &str) -> Result<u64, AcqError> {
        Ok(self.metadata(file)?.len())
    }

    /// Declared files that are absent, in declaration order.
    pub fn missing<'a>(&self, files: &'a [String]) -> Vec<&'a String> {
        files.iter().filter(|file| !self.exists(file)).collect()
    }

    pub fn total_size_bytes(&self, files: &[String]) -> Result<u64, AcqError> {
        files
            .iter()
            .map(|file| self.size_bytes(file))
            .sum::<Result<u64, AcqError>>()
    }

    /// Temp file inside the storage root, so persisting it is a same-volume rename.
    pub fn staging_file(&self, prefix: &str) -> Result<NamedTempFile, AcqError> {
        self.ensure_root()?;
        Builder::new()
            .prefix(prefix)
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| AcqError::Filesystem(err.to_string()))
    }

    pub fn persist(&self, staged: NamedTempFile, file: &str) -> Result<Utf8PathBuf, AcqError> {
        let dest = self.file_path(file);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| AcqError::Filesystem(err.to_string()))?;
        }
        staged
            .persist(dest.as_std_path())
            .map_err(|err| AcqError::Filesystem(err.to_string()))?;
        Ok(dest)
    }

    /// Removes `file` if present; missing files are not an error.
    pub fn remove_if_exists(&self, file: &str) -> Result<bool, AcqError> {
        match fs::remove_file(self.file_path(file).as_std_path()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(AcqError::Filesystem(err.to_string())),
        }
    }

    fn metadata(&self, file: &str) -> Result<fs::Metadata, AcqError> {
        let path = self.file_path(file);
        match fs::metadata(path.as_std_path()) {
            Ok(metadata) if metadata.is_file() => Ok(metadata),
            Ok(_) => Err(AcqError::NotFound(path.to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(AcqError::NotFound(path.to_string()))
            }
            Err(err) => Err(AcqError::Filesystem(err.to_string())),
        }
    }
}

/// Creates `dir` and any missing parents.
pub fn ensure_dir(dir: &Utf8Path) -> Result<(), AcqError> {
    fs::create_dir_all(dir.as_std_path()).map_err(|err| AcqError::Filesystem(err.to_string()))
}
