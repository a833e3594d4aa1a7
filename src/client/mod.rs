//! Outbound collaborators: chain API, search engine, object storage

pub mod elastic;
pub mod rest;
pub mod storage;
pub mod vm;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("{url} still failing after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },
    #[error("api error: {0}")]
    Api(String),
    #[error("{func}: {code}: {message}")]
    VmReturnCode {
        func: String,
        code: String,
        message: String,
    },
    #[error("cannot decode response: {0}")]
    Decode(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("bulk request failed: {0}")]
    Bulk(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Basic auth credentials, empty means no auth header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn should_use_basic_auth(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.should_use_basic_auth() {
            request.basic_auth(&self.username, Some(&self.password))
        } else {
            request
        }
    }
}
