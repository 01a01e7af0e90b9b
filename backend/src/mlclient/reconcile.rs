use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, info};
use shared::{PredictionResponse, PredictionSummary};

use crate::mlclient::error::RetrainError;
use crate::mlclient::partition::dataset_path;
use crate::mlclient::records::{self, Record};
use crate::mlclient::services::{FileStore, PredictionSource};

/// Predictions still in play at the start of a run.
#[derive(Debug, Default)]
pub struct Outstanding {
    /// Need their details and responses refreshed; identifiers are unique.
    pub potentially_resolved: Vec<PredictionSummary>,
    pub unresolved: Vec<PredictionSummary>,
    /// Rows from the previous unresolved dataset, carried forward as they were.
    pub unresolved_records: Vec<Record>,
}

#[derive(Debug, Default)]
pub struct Resolved {
    pub summaries: Vec<PredictionSummary>,
    pub responses: Vec<PredictionResponse>,
}

pub async fn retrieve_new_and_outstanding(
    file_store: &dyn FileStore,
    source: &dyn PredictionSource,
    previous_model: i64,
    now: DateTime<Utc>,
) -> Result<Outstanding, RetrainError> {
    let unresolved_path = dataset_path(previous_model, "summarydata-unresolved.csv");
    info!("Loading previously unresolved predictions from {}", unresolved_path);
    let previous_file = file_store.load(&unresolved_path).await?;

    let since = DateTime::<Utc>::from_timestamp(previous_model, 0).ok_or_else(|| {
        RetrainError::DataFormat(format!("model id {} is not a valid time", previous_model))
    })?;
    let updated = source.all_predictions_since(since).await?;
    info!("Got {} predictions updated since {}", updated.len(), since);

    let previous_records = records::read_csv(&previous_file)?;

    let mut outstanding = Outstanding::default();
    let mut queued = HashSet::new();
    let mut fresh_pending = HashSet::new();
    for prediction in updated {
        if prediction.outcome.is_resolved() {
            if queued.insert(prediction.id) {
                outstanding.potentially_resolved.push(prediction);
            }
        } else if fresh_pending.insert(prediction.id) {
            outstanding.unresolved.push(prediction);
        }
    }

    for record in previous_records {
        let deadline_unix = records::record_deadline(&record)?;
        let id = records::record_id(&record)?;
        let outcome = records::record_outcome(&record)?;
        let deadline = DateTime::<Utc>::from_timestamp(deadline_unix, 0).ok_or_else(|| {
            RetrainError::DataFormat(format!(
                "deadline {} of {} is out of range",
                deadline_unix, id
            ))
        })?;

        // Already queued, or superseded by a fresh pending summary.
        if queued.contains(&id) || fresh_pending.contains(&id) {
            continue;
        }
        if now > deadline || outcome.is_resolved() {
            debug!("Prediction {} is due, rechecking", id);
            queued.insert(id);
            outstanding.potentially_resolved.push(PredictionSummary::stub(id));
        } else {
            outstanding.unresolved_records.push(record);
        }
    }

    info!(
        "{} potentially resolved, {} unresolved, {} carried forward",
        outstanding.potentially_resolved.len(),
        outstanding.unresolved.len(),
        outstanding.unresolved_records.len()
    );
    Ok(outstanding)
}

/// Refreshes `potentially_resolved` from the source. Those still undecided are appended
/// to `unresolved`; the rest come back with every response the source holds for them.
pub async fn resolve_outcomes(
    source: &dyn PredictionSource,
    potentially_resolved: &[PredictionSummary],
    unresolved: &mut Vec<PredictionSummary>,
) -> Result<Resolved, RetrainError> {
    info!(
        "Retrieving details and responses for {} predictions",
        potentially_resolved.len()
    );
    let (summaries, responses) = source.all_prediction_responses(potentially_resolved).await?;

    let mut resolved = Resolved {
        summaries: Vec::new(),
        responses,
    };
    for summary in summaries {
        if summary.outcome.is_resolved() {
            resolved.summaries.push(summary);
        } else {
            unresolved.push(summary);
        }
    }
    info!(
        "{} predictions resolved with {} responses",
        resolved.summaries.len(),
        resolved.responses.len()
    );
    Ok(resolved)
}
