use crate::mlclient::records::RecordError;
use crate::mlclient::services::{SourceError, StoreError, TrainingApiError};

#[derive(Debug, thiserror::Error)]
pub enum RetrainError {
    #[error("Prediction source error: {0}")]
    Source(#[from] SourceError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Invalid data format: {0}")]
    DataFormat(String),
    #[error("Training job submission failed: {0}")]
    Submission(TrainingApiError),
    #[error("Training job {job_id} ended in state {state}")]
    JobFailed { job_id: String, state: String },
    #[error("Model version publish failed: {0}")]
    Publish(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<RecordError> for RetrainError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Csv(e) => RetrainError::Storage(StoreError::Corrupt(e.to_string())),
            RecordError::Format(msg) => RetrainError::DataFormat(msg),
        }
    }
}
