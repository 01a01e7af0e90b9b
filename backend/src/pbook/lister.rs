use std::sync::Arc;

use log::info;
use shared::{ExamplePrediction, PredictionSummary};

use crate::mlclient::services::{PersistentStore, PredictionSource, SourceError, StoreError};

const EXAMPLES_KIND: &str = "ExamplePredictions";
const EXAMPLES_KEY: &str = "examples";

#[derive(Debug, thiserror::Error)]
pub enum ListerError {
    #[error("Prediction source error: {0}")]
    Source(#[from] SourceError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Clone)]
pub struct ExampleLister {
    source: Arc<dyn PredictionSource>,
    store: Arc<dyn PersistentStore>,
}

impl ExampleLister {
    pub fn new(source: Arc<dyn PredictionSource>, store: Arc<dyn PersistentStore>) -> Self {
        Self { source, store }
    }

    pub async fn update_examples(&self) -> Result<Vec<ExamplePrediction>, ListerError> {
        let open: Vec<PredictionSummary> = self
            .source
            .retrieve_prediction_list_page(1)
            .await?
            .into_iter()
            .filter(|s| !s.outcome.is_resolved())
            .collect();

        let (summaries, responses) = self.source.all_prediction_responses(&open).await?;
        // Anything decided since the page was read is no longer an open example.
        let examples: Vec<ExamplePrediction> = summaries
            .into_iter()
            .filter(|s| !s.outcome.is_resolved())
            .map(|summary| ExamplePrediction::from_responses(summary, &responses))
            .collect();

        let value = serde_json::to_value(&examples).map_err(StoreError::from)?;
        self.store
            .put(EXAMPLES_KIND, EXAMPLES_KEY, value, None)
            .await?;
        info!("Stored {} example predictions", examples.len());
        Ok(examples)
    }

    pub async fn get_examples(&self) -> Result<Vec<ExamplePrediction>, ListerError> {
        match self.store.get(EXAMPLES_KIND, EXAMPLES_KEY).await? {
            Some(item) => Ok(serde_json::from_value(item.value).map_err(StoreError::from)?),
            None => Ok(Vec::new()),
        }
    }
}
