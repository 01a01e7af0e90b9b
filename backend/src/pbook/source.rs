//! HTTP client for the prediction extractor service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::{PredictionResponse, PredictionSummary};

use crate::mlclient::services::{PredictionSource, SourceError};

#[derive(Clone)]
pub struct HttpPredictionSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    ids: &'a [i64],
}

#[derive(Deserialize)]
struct ResponsesBody {
    summaries: Vec<PredictionSummary>,
    #[serde(default)]
    responses: Vec<PredictionResponse>,
}

#[derive(Deserialize)]
struct PageBody {
    summaries: Vec<PredictionSummary>,
}

impl HttpPredictionSource {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SourceError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            error!("Prediction source answered {}", status);
            return Err(SourceError::Status(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PredictionSource for HttpPredictionSource {
    async fn all_predictions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PredictionSummary>, SourceError> {
        let url = format!("{}/predictions", self.base_url);
        debug!("GET {} since {}", url, since.timestamp());
        self.read_json(
            self.client
                .get(&url)
                .query(&[("since", since.timestamp())]),
        )
        .await
    }

    async fn all_prediction_responses(
        &self,
        summaries: &[PredictionSummary],
    ) -> Result<(Vec<PredictionSummary>, Vec<PredictionResponse>), SourceError> {
        if summaries.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let ids: Vec<i64> = summaries.iter().map(|s| s.id).collect();
        let url = format!("{}/predictions/responses", self.base_url);
        debug!("POST {} for {} predictions", url, ids.len());

        let body: ResponsesBody = self
            .read_json(self.client.post(&url).json(&ResponsesRequest { ids: &ids }))
            .await?;
        Ok((body.summaries, body.responses))
    }

    async fn retrieve_prediction_list_page(
        &self,
        page: u32,
    ) -> Result<Vec<PredictionSummary>, SourceError> {
        let url = format!("{}/predictions/page/{}", self.base_url, page);
        let body: PageBody = self.read_json(self.client.get(&url)).await?;
        Ok(body.summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use shared::Outcome;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> HttpPredictionSource {
        HttpPredictionSource::new(reqwest::Client::new(), &format!("{}/", server.uri()))
    }

    #[tokio::test]
    async fn fetches_predictions_since_a_unix_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/predictions"))
            .and(query_param("since", "123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 7, "created": 200, "deadline": 3000, "outcome": "UNKNOWN" },
                { "id": 14, "outcome": "RIGHT", "mean_confidence": null }
            ])))
            .mount(&server)
            .await;

        let found = source(&server)
            .all_predictions_since(Utc.timestamp_opt(123, 0).unwrap())
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].deadline.timestamp(), 3000);
        assert_eq!(found[1].outcome, Outcome::Right);
        assert!(found[1].mean_confidence.is_nan());
    }

    #[tokio::test]
    async fn posts_ids_and_reads_details_with_responses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predictions/responses"))
            .and(body_json(json!({ "ids": [2, 5] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "summaries": [{ "id": 2, "title": "foo", "outcome": "RIGHT" }],
                "responses": [
                    {
                        "prediction": 2, "time": 8, "confidence": 0.1,
                        "user": "Responder1", "comment": "bluh"
                    },
                    { "prediction": 2, "time": 9, "confidence": null, "user": "Responder2" }
                ]
            })))
            .mount(&server)
            .await;

        let (summaries, responses) = source(&server)
            .all_prediction_responses(&[PredictionSummary::stub(2), PredictionSummary::stub(5)])
            .await
            .unwrap();

        assert_eq!(summaries[0].title, "foo");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].comment, "bluh");
        assert!(responses[1].confidence.is_nan());
    }

    #[tokio::test]
    async fn no_ids_means_no_request() {
        let server = MockServer::start().await;
        let (summaries, responses) = source(&server)
            .all_prediction_responses(&[])
            .await
            .unwrap();
        assert!(summaries.is_empty() && responses.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_status_and_bad_body_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/predictions/page/1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/predictions/page/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = source(&server);
        assert!(matches!(
            client.retrieve_prediction_list_page(1).await,
            Err(SourceError::Status(503))
        ));
        assert!(matches!(
            client.retrieve_prediction_list_page(2).await,
            Err(SourceError::Malformed(_))
        ));
    }
}
