use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{CatalogSpec, DatasetDescriptor, FailurePolicy, SourceKind};
use crate::error::AcqError;

pub const DEFAULT_CONFIG_FILE: &str = "acq.json";
pub const STORAGE_ROOT_ENV: &str = "DATA_ACK_FILES_LOCATION";
pub const HADOOP_LOGS_LOCATION_ENV: &str = "HADOOP_LOGS_FILE_LOCATION";
pub const HADOOP_LOGS_NAME_ENV: &str = "HADOOP_LOGS_FILE_NAME";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage_root: Option<String>,
    #[serde(default)]
    pub summary_dir: Option<String>,
    #[serde(default)]
    pub ledger_path: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
    #[serde(default)]
    pub datasets: Option<Vec<DatasetEntry>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DatasetEntry {
    Catalog {
        name: String,
        files: Vec<String>,
        domain: String,
        id: String,
        url: String,
    },
    Archive {
        name: String,
        files: Vec<String>,
        slug: String,
    },
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub storage_root: Utf8PathBuf,
    pub summary_dir: Utf8PathBuf,
    pub ledger_path: Utf8PathBuf,
    pub timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
    pub datasets: Vec<DatasetDescriptor>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `acq.json` when it exists, falling back to built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, AcqError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| AcqError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| AcqError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, |key| std::env::var(key).ok())
    }

    pub fn resolve_config<F>(config: Config, env: F) -> Result<ResolvedConfig, AcqError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_root = env(STORAGE_ROOT_ENV)
            .filter(|value| !value.trim().is_empty())
            .or(config.storage_root)
            .unwrap_or_else(|| "./data/".to_string());

        let entries = config.datasets.unwrap_or_else(default_datasets);
        let mut seen = HashSet::new();
        let datasets = entries
            .into_iter()
            .map(|entry| {
                let descriptor = entry.into_descriptor()?;
                if !seen.insert(descriptor.name().to_string()) {
                    return Err(AcqError::Configuration(format!(
                        "duplicate dataset name: {}",
                        descriptor.name()
                    )));
                }
                Ok(descriptor)
            })
            .collect::<Result<Vec<_>, AcqError>>()?;

        Ok(ResolvedConfig {
            storage_root: Utf8PathBuf::from(storage_root),
            summary_dir: Utf8PathBuf::from(
                config.summary_dir.unwrap_or_else(|| "./data_logs/".to_string()),
            ),
            ledger_path: Utf8PathBuf::from(
                config
                    .ledger_path
                    .unwrap_or_else(|| "./logs/acquisition_log.csv".to_string()),
            ),
            timeout: config.timeout_secs.map(Duration::from_secs),
            failure_policy: config.failure_policy.unwrap_or_default(),
            datasets,
        })
    }
}

impl DatasetEntry {
    pub fn into_descriptor(self) -> Result<DatasetDescriptor, AcqError> {
        match self {
            DatasetEntry::Catalog {
                name,
                files,
                domain,
                id,
                url,
            } => DatasetDescriptor::new(
                name,
                files,
                SourceKind::Catalog(CatalogSpec {
                    domain,
                    dataset_id: id,
                    url,
                }),
            ),
            DatasetEntry::Archive { name, files, slug } => {
                DatasetDescriptor::new(name, files, SourceKind::Archive(slug.parse()?))
            }
        }
    }
}

pub fn default_datasets() -> Vec<DatasetEntry> {
    vec![
        DatasetEntry::Catalog {
            name: "crimes_dataset".to_string(),
            files: vec!["crimes_data.csv".to_string()],
            domain: "data.lacity.org".to_string(),
            id: "63jg-8b9z".to_string(),
            url: "https://data.lacity.org/api/views/63jg-8b9z/rows.csv?accessType=DOWNLOAD"
                .to_string(),
        },
        DatasetEntry::Catalog {
            name: "collisions_dataset".to_string(),
            files: vec!["collisions_data.xml".to_string()],
            domain: "data.lacity.org".to_string(),
            id: "d5tf-ez2w".to_string(),
            url: "https://data.lacity.org/api/views/d5tf-ez2w/rows.xml?accessType=DOWNLOAD"
                .to_string(),
        },
        DatasetEntry::Archive {
            name: "weather_dataset".to_string(),
            files: [
                "pressure.csv",
                "temperature.csv",
                "weather_description.csv",
                "wind_direction.csv",
                "wind_speed.csv",
                "humidity.csv",
                "city_attributes.csv",
            ]
            .iter()
            .map(|file| file.to_string())
            .collect(),
            slug: "selfishgene/historical-hourly-weather-data".to_string(),
        },
    ]
}

/// Destination of the preprocessed Hadoop job log.
#[derive(Debug, Clone)]
pub struct LogPrepConfig {
    pub log_dir: Utf8PathBuf,
    pub log_file: Utf8PathBuf,
}

impl LogPrepConfig {
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    pub fn resolve<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_dir = Utf8PathBuf::from(
            env(HADOOP_LOGS_LOCATION_ENV).unwrap_or_else(|| "./hadoop_logs/".to_string()),
        );
        let name = env(HADOOP_LOGS_NAME_ENV).unwrap_or_else(|| "hadoop_logs.csv".to_string());
        let log_file = log_dir.join(name);
        Self { log_dir, log_file }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_config_file() {
        let resolved = ConfigLoader::resolve_config(Config::default(), no_env).unwrap();
        assert_eq!(resolved.storage_root, Utf8PathBuf::from("./data/"));
        assert_eq!(resolved.failure_policy, FailurePolicy::Continue);
        assert!(resolved.timeout.is_none());
        assert_eq!(resolved.datasets.len(), 3);
        assert_eq!(resolved.datasets[2].files().len(), 7);
    }

    #[test]
    fn env_overrides_storage_root() {
        let config = Config {
            storage_root: Some("/srv/from-config".to_string()),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config, |key| {
            (key == STORAGE_ROOT_ENV).then(|| "/srv/from-env".to_string())
        })
        .unwrap();
        assert_eq!(resolved.storage_root, Utf8PathBuf::from("/srv/from-env"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let entry = DatasetEntry::Archive {
            name: "weather".to_string(),
            files: vec!["a.csv".to_string()],
            slug: "owner/weather".to_string(),
        };
        let config = Config {
            datasets: Some(vec![entry.clone(), entry]),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config, no_env).unwrap_err();
        assert_matches!(err, AcqError::Configuration(_));
    }

    #[test]
    fn logprep_defaults() {
        let config = LogPrepConfig::resolve(no_env);
        assert_eq!(config.log_file, Utf8PathBuf::from("./hadoop_logs/hadoop_logs.csv"));
    }
}
