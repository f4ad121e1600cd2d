//! HTTP client for the judge API, including the fixed-interval polling
//! loop clients use to wait for a verdict.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::engine::models::{CreateSubmissionRequest, Submission};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("no verdict after {0:?}")]
    GaveUp(Duration),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct JudgeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl JudgeClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub async fn create(
        &self,
        problem_id: &str,
        language: &str,
        code: &str,
    ) -> Result<Submission, ClientError> {
        let body = CreateSubmissionRequest {
            problem_id: Some(problem_id.to_string()),
            language: Some(language.to_string()),
            code: Some(code.to_string()),
        };
        let response = self
            .http
            .post(format!("{}/v1/submissions", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Submission, ClientError> {
        let response = self
            .http
            .get(format!("{}/v1/submissions/{id}", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn list(&self) -> Result<Vec<Submission>, ClientError> {
        let response = self
            .http
            .get(format!("{}/v1/submissions", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        decode(response).await
    }

    /// Re-fetches the submission every `interval` until it reaches a
    /// terminal status. Stopping early has no effect on the judgment.
    pub async fn poll_until_terminal(
        &self,
        id: Uuid,
        interval: Duration,
        give_up_after: Option<Duration>,
    ) -> Result<Submission, ClientError> {
        let started = tokio::time::Instant::now();
        loop {
            let submission = self.get(id).await?;
            if submission.status.is_terminal() {
                return Ok(submission);
            }
            tracing::debug!(submission_id = %id, status = %submission.status, "verdict pending");
            if let Some(limit) = give_up_after {
                if started.elapsed() >= limit {
                    return Err(ClientError::GaveUp(limit));
                }
            }
            tokio::time::sleep(interval).await;
        }
    }
}

async fn decode<T>(response: reqwest::Response) -> Result<T, ClientError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    Err(ClientError::Api { status, message })
}
