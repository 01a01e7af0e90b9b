//! Access tokens for the training API.
//!
//! Either a fixed token from the environment, or short-lived tokens fetched
//! from the instance metadata server and cached until shortly before expiry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::mlclient::services::TrainingApiError;

pub const DEFAULT_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Clone)]
pub enum TokenProvider {
    Static(String),
    Metadata(MetadataTokenProvider),
}

impl TokenProvider {
    pub async fn get_token(&self) -> Result<String, TrainingApiError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Metadata(provider) => provider.get_token().await,
        }
    }

    /// Forgets any cached token. Returns false when there is nothing to refresh.
    pub async fn invalidate(&self) -> bool {
        match self {
            Self::Static(_) => false,
            Self::Metadata(provider) => {
                *provider.cached_token.write().await = None;
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataTokenProvider {
    client: reqwest::Client,
    token_url: String,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl MetadataTokenProvider {
    pub fn new(client: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    async fn get_token(&self) -> Result<String, TrainingApiError> {
        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                // 60s before expiry plus 30s of clock skew
                if cached.expires_at > Utc::now() + Duration::seconds(90) {
                    return Ok(cached.token.clone());
                }
            }
        }

        debug!("Fetching access token from {}", self.token_url);
        let response = self
            .client
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrainingApiError::Auth(format!(
                "token request failed: HTTP {} - {}",
                status, body
            )));
        }
        let fetched: TokenResponse = response
            .json()
            .await
            .map_err(|e| TrainingApiError::Auth(format!("unreadable token response: {}", e)))?;

        *self.cached_token.write().await = Some(CachedToken {
            token: fetched.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(fetched.expires_in),
        });
        Ok(fetched.access_token)
    }
}
