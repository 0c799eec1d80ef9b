use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::error::AcqError;

/// Open-data catalog provider: single-file exports plus per-view metadata.
pub trait CatalogClient: Send + Sync {
    /// Streams `url` into `destination`.
    fn fetch(&self, url: &str, destination: &mut dyn Write) -> Result<u64, AcqError>;
    fn last_modified(&self, domain: &str, dataset_id: &str) -> Result<DateTime<Utc>, AcqError>;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
}

impl CatalogHttpClient {
    pub fn new(timeout: Option<Duration>) -> Result<Self, AcqError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("opendata-sync/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AcqError::Configuration(err.to_string()))?,
        );
        if let Ok(token) = std::env::var("SOCRATA_APP_TOKEN") {
            if !token.trim().is_empty() {
                headers.insert(
                    "X-App-Token",
                    HeaderValue::from_str(token.trim())
                        .map_err(|err| AcqError::Configuration(err.to_string()))?,
                );
            }
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| AcqError::Download(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn metadata_url(domain: &str, dataset_id: &str) -> String {
        format!("https://{domain}/api/views/{dataset_id}.json")
    }
}

impl CatalogClient for CatalogHttpClient {
    fn fetch(&self, url: &str, destination: &mut dyn Write) -> Result<u64, AcqError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| AcqError::Download(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "catalog download failed".to_string());
            return Err(AcqError::DownloadStatus { status, message });
        }
        let written = std::io::copy(&mut response, destination)
            .map_err(|err| AcqError::Download(err.to_string()))?;
        debug!(url, bytes = written, "catalog export downloaded");
        Ok(written)
    }

    fn last_modified(&self, domain: &str, dataset_id: &str) -> Result<DateTime<Utc>, AcqError> {
        let url = Self::metadata_url(domain, dataset_id);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| AcqError::Metadata(err.to_string()))?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(AcqError::Metadata(format!(
                "unknown catalog dataset {dataset_id} on {domain}"
            )));
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "catalog metadata request failed".to_string());
            return Err(AcqError::MetadataStatus {
                status: status.as_u16(),
                message,
            });
        }
        let raw_json: Value = response
            .json()
            .map_err(|err| AcqError::Metadata(err.to_string()))?;
        parse_view_last_modified(&raw_json)
    }
}

/// Reads `viewLastModified` (unix seconds) from a catalog view document.
pub fn parse_view_last_modified(raw_json: &Value) -> Result<DateTime<Utc>, AcqError> {
    let seconds = raw_json
        .get("viewLastModified")
        .and_then(|value| value.as_i64())
        .ok_or_else(|| {
            AcqError::Metadata("catalog metadata has no viewLastModified field".to_string())
        })?;
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| AcqError::Metadata(format!("timestamp out of range: {seconds}")))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_last_modified_seconds() {
        let doc = json!({ "id": "63jg-8b9z", "viewLastModified": 1_700_000_000 });
        let ts = parse_view_last_modified(&doc).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_last_modified_is_metadata_error() {
        let err = parse_view_last_modified(&json!({ "id": "x" })).unwrap_err();
        assert_matches!(err, AcqError::Metadata(_));
    }

    #[test]
    fn metadata_url_layout() {
        assert_eq!(
            CatalogHttpClient::metadata_url("data.lacity.org", "d5tf-ez2w"),
            "https://data.lacity.org/api/views/d5tf-ez2w.json"
        );
    }
}
