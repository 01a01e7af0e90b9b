use std::path::PathBuf;
use std::time::Duration;

use crate::mlclient::poll::PollPolicy;
use crate::mlengine::auth::DEFAULT_TOKEN_URL;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(String),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Bucket path holding job output and trained models, without the `gs://` prefix.
    pub model_path: String,
    pub data_path: String,
    pub train_package: String,
    pub python_module: String,
    pub python_version: String,
    pub runtime_version: String,
    pub num_epochs: u32,
    pub poll: PollPolicy,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            data_path: String::new(),
            train_package: String::new(),
            python_module: "trainer.train".to_string(),
            python_version: "3.5".to_string(),
            runtime_version: "1.12".to_string(),
            num_epochs: 1,
            poll: PollPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileStoreConfig {
    S3 { bucket: String },
    Local { root: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MlAuthConfig {
    Static(String),
    /// Short-lived tokens from the instance metadata server.
    Metadata { token_url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: String,
    pub trainer: TrainerConfig,
    pub file_store: FileStoreConfig,
    pub status_table: String,
    pub ml_api_base_url: String,
    pub ml_project: String,
    pub ml_model: String,
    pub ml_auth: MlAuthConfig,
    pub prediction_source_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required =
            |name: &str| lookup(name).ok_or_else(|| ConfigError::Missing(name.to_string()));

        let mut trainer = TrainerConfig {
            model_path: required("MODEL_PATH")?,
            data_path: required("DATA_PATH")?,
            train_package: required("TRAIN_PACKAGE")?,
            ..TrainerConfig::default()
        };
        if let Some(v) = lookup("RUNTIME_VERSION") {
            trainer.runtime_version = v;
        }
        if let Some(v) = lookup("PYTHON_VERSION") {
            trainer.python_version = v;
        }
        if let Some(v) = lookup("NUM_EPOCHS") {
            trainer.num_epochs = parse_number("NUM_EPOCHS", &v)?;
        }
        if let Some(v) = lookup("POLL_INTERVAL_MS") {
            trainer.poll.interval = Duration::from_millis(parse_number("POLL_INTERVAL_MS", &v)?);
        }
        if let Some(v) = lookup("POLL_TIMEOUT_SECS") {
            let secs = parse_number("POLL_TIMEOUT_SECS", &v)?;
            trainer.poll.timeout = Some(Duration::from_secs(secs));
        }

        // A local directory takes precedence, for running without AWS.
        let file_store = match lookup("FILE_STORE_DIR") {
            Some(root) => FileStoreConfig::Local { root: PathBuf::from(root) },
            None => FileStoreConfig::S3 {
                bucket: required("S3_BUCKET_NAME")?,
            },
        };

        // A fixed token wins; otherwise tokens are fetched and refreshed as they expire.
        let ml_auth = match lookup("ML_ACCESS_TOKEN") {
            Some(token) => MlAuthConfig::Static(token),
            None => MlAuthConfig::Metadata {
                token_url: parse_url(
                    "ML_TOKEN_URL",
                    lookup("ML_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
                )?,
            },
        };

        Ok(Self {
            port: lookup("PORT").unwrap_or_else(|| "8081".to_string()),
            trainer,
            file_store,
            status_table: required("DYNAMODB_STATUS_TABLE")?,
            ml_api_base_url: parse_url(
                "ML_API_BASE_URL",
                lookup("ML_API_BASE_URL")
                    .unwrap_or_else(|| "https://ml.googleapis.com".to_string()),
            )?,
            ml_project: required("ML_PROJECT")?,
            ml_model: lookup("ML_MODEL").unwrap_or_else(|| "Predictor".to_string()),
            ml_auth,
            prediction_source_url: parse_url(
                "PREDICTION_SOURCE_URL",
                required("PREDICTION_SOURCE_URL")?,
            )?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_url(name: &str, value: String) -> Result<String, ConfigError> {
    match url::Url::parse(&value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(value),
        _ => Err(ConfigError::Invalid {
            name: name.to_string(),
            value,
        }),
    }
}
