//! Object storage holding per-epoch balance and stake dumps

use super::ClientError;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::{io::ErrorKind, path::PathBuf};
use tracing::debug;

#[async_trait]
pub trait ObjectStorageClient: Send + Sync {
    /// Missing files are reported as [`ClientError::NotFound`]
    async fn get_file(&self, name: &str) -> Result<Vec<u8>, ClientError>;
}

/// Bucket exposed over HTTP as `<url>/<bucket>/<name>`
pub struct HttpObjectStorage {
    client: reqwest::Client,
    url: String,
    bucket: String,
}

impl HttpObjectStorage {
    pub fn new(url: impl Into<String>, bucket: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStorageClient for HttpObjectStorage {
    async fn get_file(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        let url = format!("{}/{}/{name}", self.url, self.bucket);
        debug!(url = %url, "fetching object");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(name.into()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}

/// Dumps synced to a local directory
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStorageClient for DirectoryStorage {
    async fn get_file(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ClientError::NotFound(name.into())),
            Err(e) => Err(e.into()),
        }
    }
}
