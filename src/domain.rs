use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AcqError;

/// `owner/dataset` handle of an archive-provider dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveSlug(String);

impl ArchiveSlug {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn owner(&self) -> &str {
        self.0.split_once('/').map(|(owner, _)| owner).unwrap_or("")
    }

    /// Last path segment; the provider names the bundle after it.
    pub fn dataset(&self) -> &str {
        self.0
            .split_once('/')
            .map(|(_, dataset)| dataset)
            .unwrap_or("")
    }
}

impl fmt::Display for ArchiveSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ArchiveSlug {
    type Err = AcqError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = normalized
            .split_once('/')
            .map(|(owner, dataset)| {
                let segment_ok = |s: &str| {
                    !s.is_empty()
                        && s.chars()
                            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
                };
                segment_ok(owner) && segment_ok(dataset)
            })
            .unwrap_or(false);
        if !is_valid {
            return Err(AcqError::Configuration(format!(
                "invalid archive slug: {value}"
            )));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSpec {
    pub domain: String,
    pub dataset_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Catalog(CatalogSpec),
    Archive(ArchiveSlug),
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Catalog(_) => "catalog",
            SourceKind::Archive(_) => "archive",
        }
    }
}

/// A named group of files fetched and checked together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    name: String,
    files: Vec<String>,
    source: SourceKind,
}

impl DatasetDescriptor {
    pub fn new(
        name: impl Into<String>,
        files: Vec<String>,
        source: SourceKind,
    ) -> Result<Self, AcqError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AcqError::Configuration(
                "dataset name must not be empty".to_string(),
            ));
        }
        if files.is_empty() {
            return Err(AcqError::Configuration(format!(
                "dataset '{name}' declares no files"
            )));
        }
        if let Some(bad) = files.iter().find(|file| file.trim().is_empty()) {
            return Err(AcqError::Configuration(format!(
                "dataset '{name}' declares an empty file name: {bad:?}"
            )));
        }
        if matches!(source, SourceKind::Catalog(_)) && files.len() != 1 {
            return Err(AcqError::Configuration(format!(
                "catalog dataset '{name}' must declare exactly one file, got {}",
                files.len()
            )));
        }
        Ok(Self {
            name,
            files,
            source,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn primary_file(&self) -> &str {
        &self.files[0]
    }

    pub fn source(&self) -> &SourceKind {
        &self.source
    }
}

/// Batch Driver entry mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Download every dataset unconditionally.
    #[value(name = "init", alias = "force")]
    Force,
    /// Fill gaps, then refresh datasets the provider reports as newer.
    #[default]
    Reconcile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Continue,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Init,
    Download,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Init => write!(f, "INIT"),
            Operation::Download => write!(f, "DOWNLOAD"),
            Operation::Update => write!(f, "UPDATE"),
        }
    }
}

/// Renders file names the way ledger causes cite them: `[a.csv, b.csv]`.
pub fn file_list(files: &[String]) -> String {
    format!("[{}]", files.join(", "))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn catalog() -> SourceKind {
        SourceKind::Catalog(CatalogSpec {
            domain: "data.lacity.org".to_string(),
            dataset_id: "63jg-8b9z".to_string(),
            url: "https://data.lacity.org/api/views/63jg-8b9z/rows.csv".to_string(),
        })
    }

    #[test]
    fn parse_archive_slug_valid() {
        let slug: ArchiveSlug = "selfishgene/historical-hourly-weather-data".parse().unwrap();
        assert_eq!(slug.owner(), "selfishgene");
        assert_eq!(slug.dataset(), "historical-hourly-weather-data");
    }

    #[test]
    fn parse_archive_slug_invalid() {
        for value in ["weather", "/weather", "owner/", "a/b/c", "own er/x"] {
            let err = value.parse::<ArchiveSlug>().unwrap_err();
            assert_matches!(err, AcqError::Configuration(_));
        }
    }

    #[test]
    fn descriptor_requires_files() {
        let err = DatasetDescriptor::new("crimes", Vec::new(), catalog()).unwrap_err();
        assert_matches!(err, AcqError::Configuration(_));
    }

    #[test]
    fn catalog_descriptor_serves_one_file() {
        let err = DatasetDescriptor::new(
            "crimes",
            vec!["crimes.csv".to_string(), "extra.csv".to_string()],
            catalog(),
        )
        .unwrap_err();
        assert_matches!(err, AcqError::Configuration(_));
    }

    #[test]
    fn descriptor_exposes_primary_file() {
        let descriptor = DatasetDescriptor::new(
            "weather",
            vec!["pressure.csv".to_string(), "humidity.csv".to_string()],
            SourceKind::Archive("a/b".parse().unwrap()),
        )
        .unwrap();
        assert_eq!(descriptor.primary_file(), "pressure.csv");
        assert_eq!(descriptor.source().label(), "archive");
    }

    #[test]
    fn mode_parses_init_alias() {
        assert_eq!(Mode::from_str("init", false).unwrap(), Mode::Force);
        assert_eq!(Mode::from_str("force", false).unwrap(), Mode::Force);
        assert_eq!(Mode::default(), Mode::Reconcile);
        assert!(Mode::from_str("refresh", false).is_err());
    }

    #[test]
    fn file_list_format() {
        let files = vec!["a.csv".to_string(), "b.csv".to_string()];
        assert_eq!(file_list(&files), "[a.csv, b.csv]");
    }
}
