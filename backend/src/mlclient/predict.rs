use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use shared::{ExamplePrediction, ExamplePredictionResult};

use crate::mlclient::services::{TrainingApi, TrainingApiError};

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Probability assignment out of range: {0}")]
    OutOfRange(f64),
    #[error("No probability assignments given")]
    NoAssignments,
    #[error("Predict call failed: {0}")]
    Api(#[from] TrainingApiError),
    #[error("Malformed predict response: {0}")]
    Malformed(String),
}

impl PredictError {
    /// Whether the caller's input, rather than the model, is at fault.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, PredictError::OutOfRange(_) | PredictError::NoAssignments)
    }
}

/// Body of the model's predict call: one instance holding a column of assignments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<PredictInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictInstance {
    pub input: Vec<[f64; 1]>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<ModelOutput>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ModelOutput {
    #[serde(default)]
    pub income: Vec<f64>,
}

impl PredictRequest {
    pub fn from_assignments(assignments: &[f64]) -> Result<Self, PredictError> {
        if assignments.is_empty() {
            return Err(PredictError::NoAssignments);
        }
        let mut input = Vec::with_capacity(assignments.len());
        for &p in assignments {
            // NaN fails the range check too.
            if !(0.0..=1.0).contains(&p) {
                return Err(PredictError::OutOfRange(p));
            }
            input.push([p]);
        }
        Ok(Self {
            instances: vec![PredictInstance { input }],
        })
    }
}

impl PredictResponse {
    pub fn probability(&self) -> Result<f64, PredictError> {
        match self.predictions.as_slice() {
            [output] if output.income.len() == 1 => Ok(output.income[0]),
            _ => Err(PredictError::Malformed(
                "expected exactly one probability".to_string(),
            )),
        }
    }
}

#[derive(Clone)]
pub struct Predictor {
    api: Arc<dyn TrainingApi>,
}

impl Predictor {
    pub fn new(api: Arc<dyn TrainingApi>) -> Self {
        Self { api }
    }

    pub async fn predict(&self, assignments: &[f64]) -> Result<f64, PredictError> {
        debug!("Predicting from inputs: {:?}", assignments);
        let request = PredictRequest::from_assignments(assignments)?;

        info!("Making predict call with {} inputs", assignments.len());
        let response = self.api.predict(&request).await?;
        response.probability().map_err(|e| {
            warn!("Got a malformed predict response: {:?}", response);
            e
        })
    }

    pub async fn predict_examples(
        &self,
        examples: Vec<ExamplePrediction>,
    ) -> Vec<ExamplePredictionResult> {
        let mut results = Vec::with_capacity(examples.len());
        for example in examples {
            let (result, error) = match self.predict(&example.assignments).await {
                Ok(p) => (Some(p), None),
                Err(e) => {
                    warn!("No prediction for example {}: {}", example.summary.id, e);
                    (None, Some(e.to_string()))
                }
            };
            results.push(ExamplePredictionResult {
                example,
                result,
                error,
            });
        }
        results
    }
}
