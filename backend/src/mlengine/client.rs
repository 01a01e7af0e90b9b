//! REST client for the managed training and model-serving API.

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::mlclient::job::{JobState, TrainingJobSpec};
use crate::mlclient::predict::{PredictRequest, PredictResponse};
use crate::mlclient::services::{TrainingApi, TrainingApiError};
use crate::mlclient::version::{VersionSpec, VersionState};
use crate::mlengine::auth::TokenProvider;

#[derive(Clone)]
pub struct MlEngineClient {
    client: reqwest::Client,
    base_url: String,
    project: String,
    model: String,
    tokens: TokenProvider,
}

#[derive(Deserialize)]
struct StateBody<S> {
    state: Option<S>,
}

impl MlEngineClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        project: String,
        model: String,
        tokens: TokenProvider,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project,
            model,
            tokens,
        }
    }

    fn project_url(&self) -> String {
        format!("{}/v1/projects/{}", self.base_url, self.project)
    }

    fn version_url(&self, version: &str) -> String {
        format!("{}/models/{}/versions/{}", self.project_url(), self.model, version)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TrainingApiError> {
        let retry = request.try_clone();
        let mut response = self.authorized(request).await?;
        // Tokens can expire mid-run; fetch a fresh one and try once more.
        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(retry) = retry {
                if self.tokens.invalidate().await {
                    warn!("Access token rejected, retrying with a fresh one");
                    response = self.authorized(retry).await?;
                }
            }
        }
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!("Training API answered {}: {}", status, body);
        Err(TrainingApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TrainingApiError> {
        let token = self.tokens.get_token().await?;
        Ok(request.bearer_auth(token).send().await?)
    }

    async fn state<S: DeserializeOwned>(&self, url: &str) -> Result<Option<S>, TrainingApiError> {
        debug!("GET {}", url);
        let body: StateBody<S> = self
            .send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| TrainingApiError::Malformed(e.to_string()))?;
        Ok(body.state)
    }
}

#[async_trait]
impl TrainingApi for MlEngineClient {
    async fn submit_job(&self, spec: &TrainingJobSpec) -> Result<(), TrainingApiError> {
        let url = format!("{}/jobs", self.project_url());
        self.send(self.client.post(&url).json(spec)).await?;
        Ok(())
    }

    async fn get_job_state(&self, job_id: &str) -> Result<JobState, TrainingApiError> {
        let url = format!("{}/jobs/{}", self.project_url(), job_id);
        Ok(self
            .state(&url)
            .await?
            .unwrap_or(JobState::StateUnspecified))
    }

    async fn create_version(&self, spec: &VersionSpec) -> Result<(), TrainingApiError> {
        let url = format!("{}/models/{}/versions", self.project_url(), self.model);
        self.send(self.client.post(&url).json(spec)).await?;
        Ok(())
    }

    async fn get_version_state(&self, version: &str) -> Result<VersionState, TrainingApiError> {
        Ok(self
            .state(&self.version_url(version))
            .await?
            .unwrap_or(VersionState::Unknown))
    }

    async fn set_default_version(&self, version: &str) -> Result<(), TrainingApiError> {
        let url = format!("{}:setDefault", self.version_url(version));
        self.send(self.client.post(&url).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn predict(
        &self,
        request: &PredictRequest,
    ) -> Result<PredictResponse, TrainingApiError> {
        let url = format!("{}/models/{}:predict", self.project_url(), self.model);
        self.send(self.client.post(&url).json(request))
            .await?
            .json()
            .await
            .map_err(|e| TrainingApiError::Malformed(e.to_string()))
    }
}
