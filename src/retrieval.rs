use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::debug;

use crate::domain::{Iri, ObjectId};
use crate::error::PortalError;

/// Status reported for transport failures that never reached the data server.
pub const BAD_GATEWAY: u16 = 502;

/// Upstream failure for a CSV fetch, passed to callers as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (status {status})")]
pub struct FetchFailure {
    pub status: u16,
    pub message: String,
}

impl FetchFailure {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn into_portal_error(self, pid: &ObjectId) -> PortalError {
        PortalError::CsvStatus {
            pid: pid.to_string(),
            status: self.status,
            message: self.message,
        }
    }
}

pub trait CsvFetcher: Send + Sync {
    fn fetch_csv(&self, pid: &ObjectId) -> Result<Vec<u8>, FetchFailure>;
}

#[derive(Clone)]
pub struct CsvHttpClient {
    client: Client,
    data_endpoint: Iri,
}

impl CsvHttpClient {
    pub fn new(data_endpoint: Iri, timeout: Duration) -> Result<Self, PortalError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cp-retriever/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PortalError::CsvHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| PortalError::CsvHttp(err.to_string()))?;
        Ok(Self {
            client,
            data_endpoint,
        })
    }

    pub fn csv_url(&self, pid: &ObjectId) -> String {
        format!(
            "{}/csv/{}",
            self.data_endpoint.as_str().trim_end_matches('/'),
            pid.as_str()
        )
    }
}

impl CsvFetcher for CsvHttpClient {
    fn fetch_csv(&self, pid: &ObjectId) -> Result<Vec<u8>, FetchFailure> {
        let url = self.csv_url(pid);
        debug!(%url, "fetching CSV");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| FetchFailure::new(BAD_GATEWAY, err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "CSV request failed".to_string());
            return Err(FetchFailure::new(status, message));
        }
        let bytes = response
            .bytes()
            .map_err(|err| FetchFailure::new(BAD_GATEWAY, err.to_string()))?;
        Ok(bytes.to_vec())
    }
}
