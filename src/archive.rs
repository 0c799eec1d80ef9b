use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use directories::BaseDirs;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::ArchiveSlug;
use crate::error::AcqError;

/// Archive dataset provider: whole-bundle downloads and a "last updated" view.
pub trait ArchiveClient: Send + Sync {
    fn download_bundle(
        &self,
        slug: &ArchiveSlug,
        destination: &mut dyn Write,
    ) -> Result<u64, AcqError>;
    fn last_updated(&self, slug: &ArchiveSlug) -> Result<DateTime<Utc>, AcqError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchiveCredentials {
    pub username: String,
    pub key: String,
}

impl ArchiveCredentials {
    /// `KAGGLE_USERNAME`/`KAGGLE_KEY`, then `kaggle.json` in
    /// `$KAGGLE_CONFIG_DIR` or `~/.kaggle`.
    pub fn discover() -> Option<Self> {
        let env = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
        };
        if let (Some(username), Some(key)) = (env("KAGGLE_USERNAME"), env("KAGGLE_KEY")) {
            return Some(Self { username, key });
        }

        let config_dir = env("KAGGLE_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().join(".kaggle")))?;
        let content = fs::read_to_string(config_dir.join("kaggle.json")).ok()?;
        Self::from_json(&content).ok()
    }

    pub fn from_json(content: &str) -> Result<Self, AcqError> {
        serde_json::from_str(content)
            .map_err(|err| AcqError::Authentication(format!("invalid kaggle.json: {err}")))
    }
}

#[derive(Clone)]
pub struct KaggleHttpClient {
    client: Client,
    base_url: String,
    credentials: Option<ArchiveCredentials>,
}

impl KaggleHttpClient {
    pub fn new(timeout: Option<Duration>) -> Result<Self, AcqError> {
        Self::with_credentials(timeout, ArchiveCredentials::discover())
    }

    pub fn with_credentials(
        timeout: Option<Duration>,
        credentials: Option<ArchiveCredentials>,
    ) -> Result<Self, AcqError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("opendata-sync/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AcqError::Configuration(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| AcqError::Download(err.to_string()))?;
        Ok(Self {
            client,
            base_url: "https://www.kaggle.com/api/v1".to_string(),
            credentials,
        })
    }

    fn authorized(&self, url: &str) -> Result<RequestBuilder, AcqError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            AcqError::Authentication(
                "no Kaggle credentials (set KAGGLE_USERNAME/KAGGLE_KEY or provide kaggle.json)"
                    .to_string(),
            )
        })?;
        Ok(self
            .client
            .get(url)
            .basic_auth(&credentials.username, Some(&credentials.key)))
    }

    fn check_auth(response: &Response) -> Result<(), AcqError> {
        if matches!(response.status().as_u16(), 401 | 403) {
            return Err(AcqError::Authentication(format!(
                "provider rejected credentials with status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

impl ArchiveClient for KaggleHttpClient {
    fn download_bundle(
        &self,
        slug: &ArchiveSlug,
        destination: &mut dyn Write,
    ) -> Result<u64, AcqError> {
        let url = format!("{}/datasets/download/{}", self.base_url, slug.as_str());
        let mut response = self
            .authorized(&url)?
            .send()
            .map_err(|err| AcqError::Download(err.to_string()))?;
        Self::check_auth(&response)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "archive download failed".to_string());
            return Err(AcqError::DownloadStatus { status, message });
        }
        let written = std::io::copy(&mut response, destination)
            .map_err(|err| AcqError::Download(err.to_string()))?;
        debug!(slug = %slug, bytes = written, "archive bundle downloaded");
        Ok(written)
    }

    fn last_updated(&self, slug: &ArchiveSlug) -> Result<DateTime<Utc>, AcqError> {
        let url = format!("{}/datasets/view/{}", self.base_url, slug.as_str());
        let response = self
            .authorized(&url)
            .map_err(|err| AcqError::Metadata(err.to_string()))?
            .send()
            .map_err(|err| AcqError::Metadata(err.to_string()))?;
        let status = response.status().as_u16();
        if status == 404 {
            return Err(AcqError::Metadata(format!("unknown archive dataset {slug}")));
        }
        if !response.status().is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "archive metadata request failed".to_string());
            return Err(AcqError::MetadataStatus { status, message });
        }
        let raw_json: Value = response
            .json()
            .map_err(|err| AcqError::Metadata(err.to_string()))?;
        let value = raw_json
            .get("lastUpdated")
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                AcqError::Metadata(format!("no lastUpdated field for archive dataset {slug}"))
            })?;
        parse_last_updated(value)
    }
}

/// Accepts RFC 3339 or a naive ISO timestamp, the latter read as UTC.
pub fn parse_last_updated(value: &str) -> Result<DateTime<Utc>, AcqError> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|err| AcqError::Metadata(format!("unparseable lastUpdated {value:?}: {err}")))
}
