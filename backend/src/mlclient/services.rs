use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{PredictionResponse, PredictionSummary};

use crate::mlclient::job::{JobState, TrainingJobSpec};
use crate::mlclient::predict::{PredictRequest, PredictResponse};
use crate::mlclient::version::{VersionSpec, VersionState};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conditional write rejected: version mismatch")]
    VersionMismatch,
    #[error("Corrupt data: {0}")]
    Corrupt(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status code: {0}")]
    Status(u16),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TrainingApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Could not obtain an access token: {0}")]
    Auth(String),
    #[error("Request rejected with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Every prediction created or updated after `since`.
    async fn all_predictions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PredictionSummary>, SourceError>;

    /// Refreshes full details for `summaries` and returns all of their responses.
    async fn all_prediction_responses(
        &self,
        summaries: &[PredictionSummary],
    ) -> Result<(Vec<PredictionSummary>, Vec<PredictionResponse>), SourceError>;

    async fn retrieve_prediction_list_page(
        &self,
        page: u32,
    ) -> Result<Vec<PredictionSummary>, SourceError>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Fails with `StoreError::NotFound` when nothing is stored at `path`.
    async fn load(&self, path: &str) -> Result<Vec<u8>, StoreError>;
    async fn save(&self, path: &str, content: &[u8]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionedValue {
    pub value: serde_json::Value,
    pub version: u64,
}

/// Versions start at 1; an absent item counts as version 0.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, kind: &str, key: &str) -> Result<Option<VersionedValue>, StoreError>;

    /// Writes `value` and returns its new version. With `expected_version` set, the write
    /// only lands if the stored version still matches, else `StoreError::VersionMismatch`.
    async fn put(
        &self,
        kind: &str,
        key: &str,
        value: serde_json::Value,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait TrainingApi: Send + Sync {
    async fn submit_job(&self, spec: &TrainingJobSpec) -> Result<(), TrainingApiError>;
    async fn get_job_state(&self, job_id: &str) -> Result<JobState, TrainingApiError>;
    async fn create_version(&self, spec: &VersionSpec) -> Result<(), TrainingApiError>;
    async fn get_version_state(&self, version: &str) -> Result<VersionState, TrainingApiError>;
    async fn set_default_version(&self, version: &str) -> Result<(), TrainingApiError>;
    async fn predict(
        &self,
        request: &PredictRequest,
    ) -> Result<PredictResponse, TrainingApiError>;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
