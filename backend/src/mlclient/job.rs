use std::fmt;
use std::time::Duration;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::config::TrainerConfig;
use crate::mlclient::error::RetrainError;
use crate::mlclient::poll::PollPolicy;
use crate::mlclient::services::{Sleeper, TrainingApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Preparing,
    Running,
    Succeeded,
    Failed,
    Cancelling,
    Cancelled,
    #[serde(other)]
    StateUnspecified,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "QUEUED",
            JobState::Preparing => "PREPARING",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
            JobState::Cancelling => "CANCELLING",
            JobState::Cancelled => "CANCELLED",
            JobState::StateUnspecified => "STATE_UNSPECIFIED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJobSpec {
    pub job_id: String,
    pub training_input: TrainingInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingInput {
    pub job_dir: String,
    pub python_module: String,
    pub python_version: String,
    pub runtime_version: String,
    pub args: Vec<String>,
    pub package_uris: Vec<String>,
}

pub fn job_id(new_model: i64) -> String {
    format!("predictor_{}", new_model)
}

impl TrainingJobSpec {
    /// Trains generation `new_model` from its freshly written datasets, warm-started
    /// from the model exported by generation `old_model`.
    pub fn new(config: &TrainerConfig, old_model: i64, new_model: i64) -> Self {
        Self {
            job_id: job_id(new_model),
            training_input: TrainingInput {
                job_dir: format!("gs://{}/{}/", config.model_path, new_model),
                python_module: config.python_module.clone(),
                python_version: config.python_version.clone(),
                runtime_version: config.runtime_version.clone(),
                args: vec![
                    "--train-file".to_string(),
                    format!("gs://{}/{}/", config.data_path, new_model),
                    "--num-epochs".to_string(),
                    config.num_epochs.to_string(),
                    "--prev-model-dir".to_string(),
                    format!("gs://{}/{}/model/", config.model_path, old_model),
                ],
                package_uris: vec![config.train_package.clone()],
            },
        }
    }
}

pub async fn submit_train_job(
    api: &dyn TrainingApi,
    spec: &TrainingJobSpec,
) -> Result<(), RetrainError> {
    info!("Submitting training job {}", spec.job_id);
    api.submit_job(spec).await.map_err(|e| {
        error!("Training job {} was rejected: {}", spec.job_id, e);
        RetrainError::Submission(e)
    })
}

pub async fn wait_for_train_job(
    api: &dyn TrainingApi,
    sleeper: &dyn Sleeper,
    policy: &PollPolicy,
    job_id: &str,
) -> Result<(), RetrainError> {
    let mut waited = Duration::ZERO;
    loop {
        let state = api
            .get_job_state(job_id)
            .await
            .map_err(RetrainError::Submission)?;

        match state {
            JobState::Succeeded => {
                info!("Training job {} succeeded after {:?}", job_id, waited);
                return Ok(());
            }
            JobState::Failed | JobState::Cancelled => {
                error!("Training job {} ended in state {}", job_id, state);
                return Err(RetrainError::JobFailed {
                    job_id: job_id.to_string(),
                    state: state.to_string(),
                });
            }
            _ => debug!("Training job {} is {}", job_id, state),
        }

        if !policy.pause(sleeper, &mut waited).await {
            error!("Gave up on training job {} after {:?}", job_id, waited);
            return Err(RetrainError::JobFailed {
                job_id: job_id.to_string(),
                state: format!("TIMED_OUT (last seen {})", state),
            });
        }
    }
}
