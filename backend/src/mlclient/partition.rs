use std::collections::HashSet;

use log::info;
use rand::Rng;
use rand::seq::SliceRandom;
use shared::{PredictionResponse, PredictionSummary};

use crate::mlclient::error::RetrainError;
use crate::mlclient::records::{self, Record};
use crate::mlclient::services::FileStore;

/// Share of resolved predictions held out for each of validation and test.
const HOLDOUT_FRACTION: f64 = 0.2;

pub fn dataset_path(model: i64, file_name: &str) -> String {
    format!("{}/{}", model, file_name)
}

#[derive(Debug, Default, PartialEq)]
pub struct Partition {
    pub train: Vec<PredictionSummary>,
    pub cv: Vec<PredictionSummary>,
    pub test: Vec<PredictionSummary>,
}

/// Shuffles a copy of `summaries` with `rng` and cuts it into train, validation and
/// test groups. Each group comes back ordered by id.
pub fn divide_summaries<R: Rng + ?Sized>(
    rng: &mut R,
    summaries: &[PredictionSummary],
) -> Partition {
    let cv_size = (summaries.len() as f64 * HOLDOUT_FRACTION) as usize;
    let test_size = cv_size;
    let train_size = summaries.len() - cv_size - test_size;

    let mut shuffled = summaries.to_vec();
    shuffled.shuffle(rng);

    let mut test = shuffled.split_off(train_size + cv_size);
    let mut cv = shuffled.split_off(train_size);
    let mut train = shuffled;
    for group in [&mut train, &mut cv, &mut test] {
        group.sort_by_key(|s| s.id);
    }

    Partition { train, cv, test }
}

/// Responses belonging to `resolved`, in the order the source returned them.
pub fn response_dataset(
    resolved: &[PredictionSummary],
    responses: &[PredictionResponse],
) -> Result<Vec<u8>, RetrainError> {
    let resolved_ids: HashSet<i64> = resolved.iter().map(|s| s.id).collect();
    let rows: Vec<Record> = responses
        .iter()
        .filter(|r| resolved_ids.contains(&r.prediction))
        .map(records::response_record)
        .collect();
    Ok(records::write_csv(&rows)?)
}

/// Carried rows plus rows for `unresolved`, ordered by id.
pub fn unresolved_dataset(
    carried: Vec<Record>,
    unresolved: &[PredictionSummary],
) -> Result<Vec<u8>, RetrainError> {
    let mut keyed = Vec::with_capacity(carried.len() + unresolved.len());
    for record in carried.into_iter().chain(records::summary_records(unresolved)) {
        keyed.push((records::record_id(&record)?, record));
    }
    keyed.sort_by_key(|(id, _)| *id);

    let rows: Vec<Record> = keyed.into_iter().map(|(_, record)| record).collect();
    Ok(records::write_csv(&rows)?)
}

pub struct DatasetInputs<'a> {
    pub resolved: &'a [PredictionSummary],
    pub responses: &'a [PredictionResponse],
    pub unresolved: &'a [PredictionSummary],
    pub unresolved_records: Vec<Record>,
}

/// Writes the response, unresolved, train, cv and test datasets for `new_model`, in that
/// order. Stops at the first failed write.
pub async fn write_datasets<R: Rng + ?Sized>(
    file_store: &dyn FileStore,
    rng: &mut R,
    new_model: i64,
    inputs: DatasetInputs<'_>,
) -> Result<Partition, RetrainError> {
    let responses = response_dataset(inputs.resolved, inputs.responses)?;
    save(file_store, new_model, "responsedata.csv", &responses).await?;

    let unresolved = unresolved_dataset(inputs.unresolved_records, inputs.unresolved)?;
    save(file_store, new_model, "summarydata-unresolved.csv", &unresolved).await?;

    let partition = divide_summaries(rng, inputs.resolved);
    info!(
        "Split {} resolved predictions into {} train, {} cv, {} test",
        inputs.resolved.len(),
        partition.train.len(),
        partition.cv.len(),
        partition.test.len()
    );
    for (name, group) in [
        ("summarydata-train.csv", &partition.train),
        ("summarydata-cv.csv", &partition.cv),
        ("summarydata-test.csv", &partition.test),
    ] {
        let content = records::write_csv(&records::summary_records(group))?;
        save(file_store, new_model, name, &content).await?;
    }

    Ok(partition)
}

async fn save(
    file_store: &dyn FileStore,
    model: i64,
    file_name: &str,
    content: &[u8],
) -> Result<(), RetrainError> {
    let path = dataset_path(model, file_name);
    file_store.save(&path, content).await?;
    info!("Wrote {} bytes to {}", content.len(), path);
    Ok(())
}
