use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::mlclient::error::RetrainError;
use crate::mlclient::services::{PersistentStore, StoreError};

const STATUS_KIND: &str = "TrainerStatus";
const STATUS_KEY: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerStatus {
    /// Generation currently serving, as the Unix time its retrain started.
    pub latest_model: i64,
}

#[derive(Clone)]
pub struct StatusStore {
    store: Arc<dyn PersistentStore>,
}

impl StatusStore {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    async fn read(&self) -> Result<(TrainerStatus, u64), RetrainError> {
        let item = self
            .store
            .get(STATUS_KIND, STATUS_KEY)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", STATUS_KIND, STATUS_KEY)))?;
        let status: TrainerStatus =
            serde_json::from_value(item.value).map_err(StoreError::from)?;
        Ok((status, item.version))
    }

    pub async fn latest_model(&self) -> Result<i64, RetrainError> {
        Ok(self.read().await?.0.latest_model)
    }

    /// Moves the latest model from `old_model` to `new_model`, failing with
    /// `RetrainError::Conflict` if another run got there first.
    pub async fn commit(&self, old_model: i64, new_model: i64) -> Result<(), RetrainError> {
        let (status, version) = self.read().await?;
        if status.latest_model != old_model {
            warn!(
                "Latest model is {} but this run started from {}; not committing {}",
                status.latest_model, old_model, new_model
            );
            return Err(conflict());
        }

        let value = serde_json::to_value(TrainerStatus {
            latest_model: new_model,
        })
        .map_err(StoreError::from)?;

        match self
            .store
            .put(STATUS_KIND, STATUS_KEY, value, Some(version))
            .await
        {
            Ok(_) => {
                info!("Latest model advanced from {} to {}", old_model, new_model);
                Ok(())
            }
            Err(StoreError::VersionMismatch) => {
                warn!("Lost the race to commit model {}", new_model);
                Err(conflict())
            }
            Err(e) => Err(RetrainError::Storage(e)),
        }
    }
}

fn conflict() -> RetrainError {
    RetrainError::Conflict("concurrent latest model update".to_string())
}
