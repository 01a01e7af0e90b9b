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
pub enum VersionState {
    Creating,
    Updating,
    Ready,
    Failed,
    #[serde(other)]
    Unknown,
}

impl VersionState {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionState::Creating => "CREATING",
            VersionState::Updating => "UPDATING",
            VersionState::Ready => "READY",
            VersionState::Failed => "FAILED",
            VersionState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSpec {
    pub name: String,
    pub deployment_uri: String,
    pub runtime_version: String,
}

pub fn version_name(model: i64) -> String {
    format!("v{}", model)
}

impl VersionSpec {
    pub fn new(config: &TrainerConfig, model: i64) -> Self {
        Self {
            name: version_name(model),
            deployment_uri: format!("gs://{}/{}/saved_model/", config.model_path, model),
            runtime_version: config.runtime_version.clone(),
        }
    }
}

/// Creates the version, waits for it to become ready, then makes it the serving default.
pub async fn publish_version(
    api: &dyn TrainingApi,
    sleeper: &dyn Sleeper,
    policy: &PollPolicy,
    spec: &VersionSpec,
) -> Result<(), RetrainError> {
    info!("Creating model version {}", spec.name);
    api.create_version(spec)
        .await
        .map_err(|e| publish_error(&spec.name, "create", e))?;

    wait_for_version_ready(api, sleeper, policy, &spec.name).await?;

    info!("Setting {} as the default model version", spec.name);
    api.set_default_version(&spec.name)
        .await
        .map_err(|e| publish_error(&spec.name, "set default", e))
}

pub async fn wait_for_version_ready(
    api: &dyn TrainingApi,
    sleeper: &dyn Sleeper,
    policy: &PollPolicy,
    version: &str,
) -> Result<(), RetrainError> {
    let mut waited = Duration::ZERO;
    loop {
        let state = api
            .get_version_state(version)
            .await
            .map_err(|e| publish_error(version, "poll", e))?;

        match state {
            VersionState::Ready => {
                info!("Model version {} is ready", version);
                return Ok(());
            }
            VersionState::Failed => {
                error!("Model version {} failed to deploy", version);
                return Err(RetrainError::Publish(format!(
                    "version {} ended in state {}",
                    version, state
                )));
            }
            _ => debug!("Model version {} is {}", version, state),
        }

        if !policy.pause(sleeper, &mut waited).await {
            error!("Gave up on model version {} after {:?}", version, waited);
            return Err(RetrainError::Publish(format!(
                "version {} still {} after {:?}",
                version, state, waited
            )));
        }
    }
}

fn publish_error(version: &str, step: &str, err: impl fmt::Display) -> RetrainError {
    error!("Failed to {} model version {}: {}", step, version, err);
    RetrainError::Publish(format!("{} {}: {}", step, version, err))
}
