use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::TrainerConfig;
use crate::mlclient::error::RetrainError;
use crate::mlclient::job::{self, TrainingJobSpec};
use crate::mlclient::partition::{self, DatasetInputs};
use crate::mlclient::reconcile;
use crate::mlclient::services::{
    FileStore, PersistentStore, PredictionSource, Sleeper, TrainingApi,
};
use crate::mlclient::status::StatusStore;
use crate::mlclient::version::{self, VersionSpec};

pub struct Trainer {
    config: TrainerConfig,
    status: StatusStore,
    file_store: Arc<dyn FileStore>,
    prediction_source: Arc<dyn PredictionSource>,
    training_api: Arc<dyn TrainingApi>,
    sleeper: Arc<dyn Sleeper>,
}

impl Trainer {
    pub fn new(
        config: TrainerConfig,
        persistent_store: Arc<dyn PersistentStore>,
        file_store: Arc<dyn FileStore>,
        prediction_source: Arc<dyn PredictionSource>,
        training_api: Arc<dyn TrainingApi>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            config,
            status: StatusStore::new(persistent_store),
            file_store,
            prediction_source,
            training_api,
            sleeper,
        }
    }

    /// Datasets and the remote job are namespaced by the `now` generation, so a failed run
    /// leaves only orphaned files behind; the latest-model pointer moves only once the
    /// new version is serving.
    pub async fn retrain(&self, now: DateTime<Utc>) -> Result<(), RetrainError> {
        let new_model = now.timestamp();
        let old_model = self.status.latest_model().await?;
        info!("Retraining model {} from {}", new_model, old_model);

        let mut outstanding = reconcile::retrieve_new_and_outstanding(
            self.file_store.as_ref(),
            self.prediction_source.as_ref(),
            old_model,
            now,
        )
        .await?;

        let resolved = reconcile::resolve_outcomes(
            self.prediction_source.as_ref(),
            &outstanding.potentially_resolved,
            &mut outstanding.unresolved,
        )
        .await?;

        // Seeded by generation so rerunning a generation reproduces its split.
        let mut rng = StdRng::seed_from_u64(new_model as u64);
        partition::write_datasets(
            self.file_store.as_ref(),
            &mut rng,
            new_model,
            DatasetInputs {
                resolved: &resolved.summaries,
                responses: &resolved.responses,
                unresolved: &outstanding.unresolved,
                unresolved_records: outstanding.unresolved_records,
            },
        )
        .await?;

        let job_spec = TrainingJobSpec::new(&self.config, old_model, new_model);
        job::submit_train_job(self.training_api.as_ref(), &job_spec).await?;
        job::wait_for_train_job(
            self.training_api.as_ref(),
            self.sleeper.as_ref(),
            &self.config.poll,
            &job_spec.job_id,
        )
        .await?;

        version::publish_version(
            self.training_api.as_ref(),
            self.sleeper.as_ref(),
            &self.config.poll,
            &VersionSpec::new(&self.config, new_model),
        )
        .await?;

        self.status.commit(old_model, new_model).await?;
        info!("Model {} is now live", new_model);
        Ok(())
    }
}
