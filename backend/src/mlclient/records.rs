//! Flat CSV rows for the datasets handed to the training job.
//!
//! Summary rows have eight columns: id, created, deadline, mean confidence,
//! wager count, outcome code, creator, title. Response rows have five:
//! prediction id, time, confidence, user, comment. Timestamps are Unix seconds.

use shared::{Outcome, PredictionResponse, PredictionSummary};

pub type Record = Vec<String>;

const ID_COLUMN: usize = 0;
const DEADLINE_COLUMN: usize = 2;
const OUTCOME_COLUMN: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Format(String),
}

pub fn summary_record(summary: &PredictionSummary) -> Record {
    vec![
        summary.id.to_string(),
        summary.created.timestamp().to_string(),
        summary.deadline.timestamp().to_string(),
        format_float(summary.mean_confidence),
        summary.wager_count.to_string(),
        summary.outcome.code().to_string(),
        summary.creator.clone(),
        summary.title.clone(),
    ]
}

pub fn summary_records(summaries: &[PredictionSummary]) -> Vec<Record> {
    summaries.iter().map(summary_record).collect()
}

pub fn response_record(response: &PredictionResponse) -> Record {
    vec![
        response.prediction.to_string(),
        response.time.timestamp().to_string(),
        format_float(response.confidence),
        response.user.clone(),
        response.comment.clone(),
    ]
}

/// Shortest representation that parses back to the same value, never in exponent form.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

pub fn record_id(record: &[String]) -> Result<i64, RecordError> {
    parse_column(record, ID_COLUMN, "id")
}

pub fn record_deadline(record: &[String]) -> Result<i64, RecordError> {
    parse_column(record, DEADLINE_COLUMN, "deadline")
}

pub fn record_outcome(record: &[String]) -> Result<Outcome, RecordError> {
    let code = parse_column(record, OUTCOME_COLUMN, "outcome")?;
    Outcome::from_code(code)
        .ok_or_else(|| RecordError::Format(format!("unknown outcome code {}", code)))
}

fn parse_column(record: &[String], column: usize, name: &str) -> Result<i64, RecordError> {
    let field = record.get(column).ok_or_else(|| {
        RecordError::Format(format!(
            "record has {} columns, missing {} column",
            record.len(),
            name
        ))
    })?;
    field
        .trim()
        .parse::<i64>()
        .map_err(|e| RecordError::Format(format!("invalid {} {:?}: {}", name, field, e)))
}

pub fn write_csv(records: &[Record]) -> Result<Vec<u8>, RecordError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    writer
        .into_inner()
        .map_err(|e| RecordError::Format(format!("failed to finish CSV output: {}", e)))
}

pub fn read_csv(content: &[u8]) -> Result<Vec<Record>, RecordError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(content);
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(row.iter().map(str::to_string).collect());
    }
    Ok(records)
}
