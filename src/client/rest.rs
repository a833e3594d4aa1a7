use super::{ClientError, Credentials};
use crate::constants::{REST_DEFAULT_TIMEOUT, REST_MAX_RETRIES};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// `{data, error, code}` envelope of every API response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub code: String,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            error: String::new(),
            code: "successful".into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Default::default()
        }
    }

    /// Deserializes `data`, a non-empty `error` is a failure even on HTTP 200
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        if !self.error.is_empty() {
            return Err(ClientError::Api(self.error));
        }
        Ok(serde_json::from_value(self.data)?)
    }
}

#[async_trait]
pub trait HttpApiClient: Send + Sync {
    async fn get(&self, path: &str, credentials: &Credentials) -> Result<ApiResponse, ClientError>;

    async fn post(
        &self,
        path: &str,
        body: &Value,
        credentials: &Credentials,
    ) -> Result<ApiResponse, ClientError>;
}

/// Chain API client, retries transient failures with exponential backoff
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl RestClient {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let url: String = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(REST_DEFAULT_TIMEOUT))
            .build()
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            max_retries: REST_MAX_RETRIES,
        })
    }

    async fn call(
        &self,
        path: &str,
        body: Option<&Value>,
        credentials: &Credentials,
    ) -> Result<ApiResponse, ClientError> {
        let url = format!("{}{path}", self.url);
        let mut last = String::new();

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(1u64 << (attempt - 1).min(6));
                warn!(url = %url, attempt, backoff_secs = backoff.as_secs(), error = %last, "retrying request");
                tokio::time::sleep(backoff).await;
            }

            let request = match body {
                Some(body) => self.client.post(&url).json(body),
                None => self.client.get(&url),
            };
            let response = match credentials.apply(request).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                    last = e.to_string();
                    continue;
                }
                Err(source) => return Err(ClientError::Transport { url, source }),
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
                last = status.to_string();
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|source| ClientError::Transport {
                    url: url.clone(),
                    source,
                })?;
            debug!(url = %url, status = status.as_u16(), bytes = text.len(), "api response");

            if !status.is_success() {
                // error envelopes carry the reason
                if let Ok(envelope) = serde_json::from_str::<ApiResponse>(&text) {
                    if !envelope.error.is_empty() {
                        return Ok(envelope);
                    }
                }
                return Err(ClientError::Status {
                    url,
                    status: status.as_u16(),
                    body: text,
                });
            }

            return Ok(serde_json::from_str(&text)?);
        }

        Err(ClientError::RetriesExhausted {
            url,
            attempts: self.max_retries,
            last,
        })
    }
}

#[async_trait]
impl HttpApiClient for RestClient {
    async fn get(&self, path: &str, credentials: &Credentials) -> Result<ApiResponse, ClientError> {
        self.call(path, None, credentials).await
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        credentials: &Credentials,
    ) -> Result<ApiResponse, ClientError> {
        self.call(path, Some(body), credentials).await
    }
}
