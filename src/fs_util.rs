use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::AcqError;

/// Extracts every member of `zip_path` into `target_dir`, returning the
/// relative paths of the extracted files.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<Vec<String>, AcqError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        AcqError::Extraction(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| AcqError::Extraction(err.to_string()))?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| AcqError::Extraction(err.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(AcqError::Extraction(
                "zip entry path traversal detected".to_string(),
            ));
        };
        let entry_path = target_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&entry_path).map_err(|err| AcqError::Extraction(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| AcqError::Extraction(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| AcqError::Extraction(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| AcqError::Extraction(err.to_string()))?;
        extracted.push(relative.to_string_lossy().into_owned());
    }
    debug!(archive = %zip_path.display(), members = extracted.len(), "extracted archive");
    Ok(extracted)
}

/// Extracts the archive, then removes it whether or not extraction succeeded.
pub fn unpack_and_remove(zip_path: &Path, target_dir: &Path) -> Result<Vec<String>, AcqError> {
    let result = extract_zip(zip_path, target_dir);
    if let Err(err) = remove_artifact(zip_path) {
        warn!(archive = %zip_path.display(), error = %err, "failed to remove transient archive");
    }
    result
}

pub fn remove_artifact(path: &Path) -> Result<(), AcqError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AcqError::Filesystem(err.to_string())),
    }
}
