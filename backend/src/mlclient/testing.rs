//! In-memory fakes of the capability traits, shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use shared::{Outcome, PredictionResponse, PredictionSummary};

use crate::mlclient::job::{JobState, TrainingJobSpec};
use crate::mlclient::predict::{ModelOutput, PredictRequest, PredictResponse};
use crate::mlclient::services::{
    FileStore, PersistentStore, PredictionSource, Sleeper, SourceError, StoreError,
    TrainingApi, TrainingApiError, VersionedValue,
};
use crate::mlclient::version::{VersionSpec, VersionState};

/// Ordered record of every call made against the fakes sharing it.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn summary(id: i64, outcome: Outcome, created: i64, deadline: i64) -> PredictionSummary {
    PredictionSummary {
        id,
        created: at(created),
        deadline: at(deadline),
        outcome,
        ..Default::default()
    }
}

pub fn response(prediction: i64, time: i64, confidence: f64, user: &str) -> PredictionResponse {
    PredictionResponse {
        prediction,
        time: at(time),
        confidence,
        user: user.to_string(),
        comment: String::new(),
    }
}

#[derive(Default)]
pub struct MemoryFileStore {
    log: EventLog,
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing_path: Mutex<Option<String>>,
}

impl MemoryFileStore {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.as_bytes().to_vec());
        self
    }

    pub fn fail_saving(self, path: &str) -> Self {
        *self.failing_path.lock().unwrap() = Some(path.to_string());
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn load(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.log.push(format!("load {}", path));
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn save(&self, path: &str, content: &[u8]) -> Result<(), StoreError> {
        self.log.push(format!("save {}", path));
        if self.failing_path.lock().unwrap().as_deref() == Some(path) {
            return Err(StoreError::Backend(format!("refusing to write {}", path)));
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPersistentStore {
    log: EventLog,
    items: Mutex<HashMap<(String, String), VersionedValue>>,
    // Written just before the next put lands, as a concurrent writer would.
    racing_write: Mutex<Option<serde_json::Value>>,
}

impl MemoryPersistentStore {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn with_item(self, kind: &str, key: &str, value: serde_json::Value) -> Self {
        self.items.lock().unwrap().insert(
            (kind.to_string(), key.to_string()),
            VersionedValue { value, version: 1 },
        );
        self
    }

    pub fn race_next_put(&self, value: serde_json::Value) {
        *self.racing_write.lock().unwrap() = Some(value);
    }

    pub fn item(&self, kind: &str, key: &str) -> Option<VersionedValue> {
        self.items
            .lock()
            .unwrap()
            .get(&(kind.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl PersistentStore for MemoryPersistentStore {
    async fn get(&self, kind: &str, key: &str) -> Result<Option<VersionedValue>, StoreError> {
        self.log.push(format!("get {}/{}", kind, key));
        Ok(self.item(kind, key))
    }

    async fn put(
        &self,
        kind: &str,
        key: &str,
        value: serde_json::Value,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        self.log.push(format!("put {}/{}", kind, key));
        let mut items = self.items.lock().unwrap();
        let item_key = (kind.to_string(), key.to_string());

        if let Some(racing) = self.racing_write.lock().unwrap().take() {
            let version = items.get(&item_key).map_or(0, |v| v.version) + 1;
            items.insert(
                item_key.clone(),
                VersionedValue {
                    value: racing,
                    version,
                },
            );
        }

        let current = items.get(&item_key).map_or(0, |v| v.version);
        if let Some(expected) = expected_version {
            if expected != current {
                return Err(StoreError::VersionMismatch);
            }
        }
        items.insert(
            item_key,
            VersionedValue {
                value,
                version: current + 1,
            },
        );
        Ok(current + 1)
    }
}

#[derive(Default)]
pub struct FakePredictionSource {
    log: EventLog,
    pub updated: Vec<PredictionSummary>,
    pub details: Vec<PredictionSummary>,
    pub responses: Vec<PredictionResponse>,
    pub first_page: Vec<PredictionSummary>,
    pub fail: bool,
    requested: Mutex<Vec<Vec<i64>>>,
}

impl FakePredictionSource {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn requested(&self) -> Vec<Vec<i64>> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PredictionSource for FakePredictionSource {
    async fn all_predictions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PredictionSummary>, SourceError> {
        self.log.push(format!("since {}", since.timestamp()));
        if self.fail {
            return Err(SourceError::Status(503));
        }
        Ok(self.updated.clone())
    }

    async fn all_prediction_responses(
        &self,
        summaries: &[PredictionSummary],
    ) -> Result<(Vec<PredictionSummary>, Vec<PredictionResponse>), SourceError> {
        self.log.push("responses");
        self.requested
            .lock()
            .unwrap()
            .push(summaries.iter().map(|s| s.id).collect());
        if self.fail {
            return Err(SourceError::Status(503));
        }
        let details = self
            .details
            .iter()
            .filter(|d| summaries.iter().any(|s| s.id == d.id))
            .cloned()
            .collect();
        Ok((details, self.responses.clone()))
    }

    async fn retrieve_prediction_list_page(
        &self,
        page: u32,
    ) -> Result<Vec<PredictionSummary>, SourceError> {
        self.log.push(format!("page {}", page));
        if self.fail {
            return Err(SourceError::Status(503));
        }
        Ok(self.first_page.clone())
    }
}

#[derive(Default)]
pub struct ScriptedTrainingApi {
    log: EventLog,
    job_states: Mutex<VecDeque<JobState>>,
    version_states: Mutex<VecDeque<VersionState>>,
    predictions: Mutex<VecDeque<PredictResponse>>,
    rejecting: Mutex<Option<&'static str>>,
    pub predict_requests: Mutex<Vec<PredictRequest>>,
    pub jobs: Mutex<Vec<TrainingJobSpec>>,
    pub versions: Mutex<Vec<VersionSpec>>,
}

impl ScriptedTrainingApi {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn with_job_states(self, states: &[JobState]) -> Self {
        self.job_states.lock().unwrap().extend(states.iter().copied());
        self
    }

    pub fn with_version_states(self, states: &[VersionState]) -> Self {
        self.version_states
            .lock()
            .unwrap()
            .extend(states.iter().copied());
        self
    }

    /// Queues one predict response per entry, each holding those probabilities.
    pub fn with_predictions(self, outputs: &[&[f64]]) -> Self {
        self.predictions
            .lock()
            .unwrap()
            .extend(outputs.iter().map(|income| PredictResponse {
                predictions: vec![ModelOutput {
                    income: income.to_vec(),
                }],
            }));
        self
    }

    /// Makes the named call fail with a 400.
    pub fn rejecting(self, call: &'static str) -> Self {
        *self.rejecting.lock().unwrap() = Some(call);
        self
    }

    fn record(&self, call: &'static str, arg: &str) -> Result<(), TrainingApiError> {
        self.log.push(format!("{} {}", call, arg));
        if *self.rejecting.lock().unwrap() == Some(call) {
            return Err(TrainingApiError::Status {
                status: 400,
                body: format!("{} rejected", call),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TrainingApi for ScriptedTrainingApi {
    async fn submit_job(&self, spec: &TrainingJobSpec) -> Result<(), TrainingApiError> {
        self.record("submit_job", &spec.job_id)?;
        self.jobs.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn get_job_state(&self, job_id: &str) -> Result<JobState, TrainingApiError> {
        self.record("get_job_state", job_id)?;
        self.job_states
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TrainingApiError::Malformed("no scripted job state left".into()))
    }

    async fn create_version(&self, spec: &VersionSpec) -> Result<(), TrainingApiError> {
        self.record("create_version", &spec.name)?;
        self.versions.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn get_version_state(&self, version: &str) -> Result<VersionState, TrainingApiError> {
        self.record("get_version_state", version)?;
        self.version_states
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TrainingApiError::Malformed("no scripted version state left".into()))
    }

    async fn set_default_version(&self, version: &str) -> Result<(), TrainingApiError> {
        self.record("set_default_version", version)
    }

    async fn predict(
        &self,
        request: &PredictRequest,
    ) -> Result<PredictResponse, TrainingApiError> {
        let inputs: usize = request.instances.iter().map(|i| i.input.len()).sum();
        self.record("predict", &format!("{} inputs", inputs))?;
        self.predict_requests.lock().unwrap().push(request.clone());
        self.predictions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TrainingApiError::Malformed("no scripted prediction left".into()))
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    log: EventLog,
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.log.push(format!("sleep {}ms", duration.as_millis()));
        self.slept.lock().unwrap().push(duration);
    }
}
