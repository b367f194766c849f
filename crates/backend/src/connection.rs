//! Connections to remote data backends.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{BackendError, BackendResult};
use crate::query::QueryParams;
use crate::record::BinaryRecord;

/// Default number of connections per pool.
pub const DEFAULT_CLIENTS: usize = 4;

/// Default per-query timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// A handle to one remote backend instance.
///
/// Exclusive use is guaranteed by the pool that owns the connection, not by
/// the connection itself.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Name of the backend this connection talks to.
    fn backend(&self) -> &str;

    /// Query returning an ordered sequence of text lines.
    async fn text_query(&self, params: &QueryParams) -> BackendResult<Vec<String>>;

    /// Query returning one decoded record, or `None` when the backend has no
    /// data for the request.
    async fn binary_query(&self, params: &QueryParams) -> BackendResult<Option<BinaryRecord>>;
}

/// Address and timeout of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl ConnectionConfig {
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// Backend connection speaking HTTP.
///
/// Text queries read a `text/plain` body split into lines. Binary queries
/// read a JSON-encoded [`BinaryRecord`]; `204 No Content` or a JSON `null`
/// means no data.
pub struct HttpConnection {
    backend: String,
    url: String,
    client: Client,
}

impl HttpConnection {
    pub fn new(backend: impl Into<String>, config: &ConnectionConfig) -> BackendResult<Self> {
        let backend = backend.into();
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| BackendError::Connection {
                backend: backend.clone(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            url: format!("{}/query", config.base_url()),
            backend,
            client,
        })
    }

    async fn send(&self, params: &QueryParams) -> BackendResult<Option<reqwest::Response>> {
        let response = self
            .client
            .get(&self.url)
            .query(params.pairs())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Query {
                backend: self.backend.clone(),
                status: status.as_u16(),
                message,
            });
        }
        Ok(Some(response))
    }

    fn transport_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                backend: self.backend.clone(),
            }
        } else {
            BackendError::Connection {
                backend: self.backend.clone(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl BackendConnection for HttpConnection {
    fn backend(&self) -> &str {
        &self.backend
    }

    #[instrument(skip(self, params), fields(backend = %self.backend, action = %params.action()))]
    async fn text_query(&self, params: &QueryParams) -> BackendResult<Vec<String>> {
        let Some(response) = self.send(params).await? else {
            return Ok(Vec::new());
        };
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let lines: Vec<String> = body.lines().map(str::to_string).collect();
        debug!(lines = lines.len(), "Text query complete");
        Ok(lines)
    }

    #[instrument(skip(self, params), fields(backend = %self.backend, action = %params.action()))]
    async fn binary_query(&self, params: &QueryParams) -> BackendResult<Option<BinaryRecord>> {
        let Some(response) = self.send(params).await? else {
            return Ok(None);
        };
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let record: Option<BinaryRecord> = serde_json::from_slice(&body)
            .map_err(|e| BackendError::decode(&self.backend, e.to_string()))?;
        debug!(
            size = body.len(),
            record = ?record.as_ref().map(BinaryRecord::type_name),
            "Binary query complete"
        );
        Ok(record)
    }
}
