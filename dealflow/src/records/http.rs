//! HTTP record service client.
//!
//! Speaks the JSON envelope used by the hosted record store: every response
//! carries `success` and `message`; reads return `data`, batch writes return
//! one entry per record in `results`.

use super::{FetchQuery, Record, RecordId, RecordResult, RecordService, RemoteError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP record client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRecordConfig {
    /// Base URL of the record API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Project identifier sent with every request.
    #[serde(default)]
    pub project_id: String,
    /// Public API key sent with every request.
    #[serde(default)]
    pub public_key: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_timeout() -> f64 {
    15.0
}

impl Default for HttpRecordConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            project_id: String::new(),
            public_key: String::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl HttpRecordConfig {
    /// Environment variable holding the base URL.
    pub const URL_VAR: &'static str = "DEALFLOW_RECORDS_URL";
    /// Environment variable holding the project identifier.
    pub const PROJECT_VAR: &'static str = "DEALFLOW_PROJECT_ID";
    /// Environment variable holding the public key.
    pub const KEY_VAR: &'static str = "DEALFLOW_PUBLIC_KEY";

    /// Creates a configuration for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Reads the configuration from the environment, keeping defaults for unset variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(Self::URL_VAR) {
            config.base_url = url;
        }
        if let Ok(project) = std::env::var(Self::PROJECT_VAR) {
            config.project_id = project;
        }
        if let Ok(key) = std::env::var(Self::KEY_VAR) {
            config.public_key = key;
        }
        config
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, project_id: impl Into<String>, public_key: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self.public_key = public_key.into();
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Gets timeout as Duration.
    ///
    /// Zero, negative, non-finite or out-of-range values use the 15 second default.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(default_timeout()))
    }

    fn records_url(&self, entity: &str) -> String {
        format!("{}/{entity}/records", self.base_url.trim_end_matches('/'))
    }

    fn query_url(&self, entity: &str) -> String {
        format!("{}/query", self.records_url(entity))
    }

    fn record_url(&self, entity: &str, id: RecordId) -> String {
        format!("{}/{id}", self.records_url(entity))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    results: Option<Vec<RecordResult>>,
}

impl<T> Envelope<T> {
    fn check(self) -> Result<Self, RemoteError> {
        if self.success {
            Ok(self)
        } else {
            Err(RemoteError::Rejected(
                self.message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ))
        }
    }

    fn into_results(self, expected: usize) -> Result<Vec<RecordResult>, RemoteError> {
        let results = self.check()?.results.unwrap_or_default();
        if results.len() == expected {
            Ok(results)
        } else {
            Err(RemoteError::Transport(format!(
                "expected {expected} results, got {}",
                results.len()
            )))
        }
    }
}

#[derive(Serialize)]
struct RecordsBody<'a> {
    records: &'a [Record],
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    #[serde(rename = "RecordIds")]
    record_ids: &'a [RecordId],
}

/// A [`RecordService`] backed by the hosted record API.
#[derive(Debug, Clone)]
pub struct HttpRecordService {
    client: reqwest::Client,
    config: HttpRecordConfig,
}

impl HttpRecordService {
    /// Creates a client.
    pub fn new(config: HttpRecordConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpRecordConfig {
        &self.config
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("x-project-id", &self.config.project_id)
            .bearer_auth(&self.config.public_key)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Envelope<T>, RemoteError> {
        let response = self.authorize(request).send().await.map_err(classify)?;
        let status = response.status();
        debug!(status = %status, "Record API response");

        if let Some(err) = status_error(status) {
            return Err(err);
        }

        let body = response.text().await.map_err(classify)?;
        serde_json::from_str::<Envelope<T>>(&body).map_err(|e| {
            warn!(status = %status, error = %e, "Unparseable record API response");
            RemoteError::Transport(format!("invalid response ({status}): {e}"))
        })
    }
}

/// 5xx answers mean the service is down. Other statuses still carry an envelope.
fn status_error(status: reqwest::StatusCode) -> Option<RemoteError> {
    status
        .is_server_error()
        .then(|| RemoteError::Unavailable(format!("server returned {status}")))
}

fn classify(err: reqwest::Error) -> RemoteError {
    if err.is_connect() || err.is_timeout() {
        RemoteError::Unavailable(err.to_string())
    } else {
        RemoteError::Transport(err.to_string())
    }
}

#[async_trait]
impl RecordService for HttpRecordService {
    async fn fetch_all(&self, entity: &str, query: &FetchQuery) -> Result<Vec<Record>, RemoteError> {
        let url = self.config.query_url(entity);
        let envelope: Envelope<Vec<Record>> = self.send(self.client.post(url).json(query)).await?;
        Ok(envelope.check()?.data.unwrap_or_default())
    }

    async fn fetch_by_id(
        &self,
        entity: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<Record>, RemoteError> {
        let url = self.config.record_url(entity, id);
        let request = self.client.get(url).query(&[("fields", fields.join(","))]);
        let envelope: Envelope<Record> = self.send(request).await?;
        Ok(envelope.check()?.data)
    }

    async fn create_records(
        &self,
        entity: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordResult>, RemoteError> {
        let request = self
            .client
            .post(self.config.records_url(entity))
            .json(&RecordsBody { records: &records });
        self.send::<serde_json::Value>(request)
            .await?
            .into_results(records.len())
    }

    async fn update_records(
        &self,
        entity: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordResult>, RemoteError> {
        let request = self
            .client
            .patch(self.config.records_url(entity))
            .json(&RecordsBody { records: &records });
        self.send::<serde_json::Value>(request)
            .await?
            .into_results(records.len())
    }

    async fn delete_records(
        &self,
        entity: &str,
        ids: Vec<RecordId>,
    ) -> Result<Vec<RecordResult>, RemoteError> {
        let request = self
            .client
            .delete(self.config.records_url(entity))
            .json(&DeleteBody { record_ids: &ids });
        self.send::<serde_json::Value>(request)
            .await?
            .into_results(ids.len())
    }
}
