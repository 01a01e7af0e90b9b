use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "RIGHT")]
    Right,
    #[serde(rename = "WRONG")]
    Wrong,
}

impl Outcome {
    /// Numeric code used in the CSV datasets.
    pub fn code(self) -> i64 {
        match self {
            Outcome::Unknown => 0,
            Outcome::Right => 1,
            Outcome::Wrong => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Outcome::Unknown),
            1 => Some(Outcome::Right),
            2 => Some(Outcome::Wrong),
            _ => None,
        }
    }

    pub fn is_resolved(self) -> bool {
        self != Outcome::Unknown
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PredictionSummary {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub creator: String,
    #[serde(with = "chrono::serde::ts_seconds", default)]
    pub created: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds", default)]
    pub deadline: DateTime<Utc>,
    #[serde(with = "nan_as_null", default)]
    pub mean_confidence: f64,
    #[serde(default)]
    pub wager_count: i64,
    #[serde(default)]
    pub outcome: Outcome,
}

impl PredictionSummary {
    /// A summary carrying only its identifier, used to request a refresh from the source.
    pub fn stub(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub prediction: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
    /// NaN when the responder only commented.
    #[serde(with = "nan_as_null", default = "nan")]
    pub confidence: f64,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExamplePrediction {
    pub summary: PredictionSummary,
    pub assignments: Vec<f64>,
}

impl ExamplePrediction {
    pub fn from_responses(summary: PredictionSummary, responses: &[PredictionResponse]) -> Self {
        let assignments = responses
            .iter()
            .filter(|r| r.prediction == summary.id && !r.confidence.is_nan())
            .map(|r| r.confidence)
            .collect();
        Self {
            summary,
            assignments,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExamplePredictionResult {
    pub example: ExamplePrediction,
    pub result: Option<f64>,
    pub error: Option<String>,
}

fn nan() -> f64 {
    f64::NAN
}

// JSON has no NaN, so unknown floats travel as null.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
