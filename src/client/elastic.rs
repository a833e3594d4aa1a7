//! Search engine access
//!
//! [`SearchIndexClient`] is what the pipeline needs from a cluster,
//! [`IndexCloneClient`] adds the clone path. [`ElasticClient`] implements
//! both over the REST API.

use super::{ClientError, Credentials};
use crate::constants::{
    BULK_ERRORS_REPORTED, SCROLL_FIRST_KEEP_ALIVE, SCROLL_NEXT_KEEP_ALIVE, SCROLL_PAGE_SIZE,
};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Method, StatusCode};
use serde::{de::IgnoredAny, Deserialize};
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::{debug, error, warn};

/// Called once per scroll page with the raw response body
#[async_trait]
pub trait ScrollPageHandler: Send {
    async fn handle_page(&mut self, page: &[u8]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    async fn create_index_with_mapping(&self, index: &str, mapping: &[u8]) -> Result<(), ClientError>;

    async fn index_exists(&self, index: &str) -> Result<bool, ClientError>;

    /// `buffer` holds newline delimited action/document pairs
    async fn bulk_upsert(&self, buffer: &[u8], index: &str) -> Result<(), ClientError>;

    async fn multi_get(&self, ids: &[String], index: &str) -> Result<Vec<u8>, ClientError>;

    async fn put_single_document(&self, index: &str, doc_id: &str, body: &Value) -> Result<(), ClientError>;

    /// Stores a lifecycle policy. A policy already stored under `name` is
    /// not an error.
    async fn put_policy(&self, name: &str, policy: &[u8]) -> Result<(), ClientError>;

    /// Streams every document matching `query`. The cursor is released on
    /// exit whatever the outcome.
    async fn scroll_all_documents(
        &self,
        index: &str,
        query: &Value,
        handler: &mut dyn ScrollPageHandler,
    ) -> anyhow::Result<()>;
}

/// Result of a clone attempt. `cloned` with an error means the target exists
/// but the source could not be made writable again.
#[derive(Debug, Default)]
pub struct CloneOutcome {
    pub cloned: bool,
    pub error: Option<ClientError>,
}

#[async_trait]
pub trait IndexCloneClient: Send + Sync {
    async fn clone_index(&self, index: &str, target: &str) -> CloneOutcome;

    async fn unset_read_only(&self, index: &str) -> Result<(), ClientError>;

    async fn wait_yellow_status(&self) -> Result<(), ClientError>;
}

//////////
// wire //
//////////

/// Action line preceding each document of a bulk body
pub fn bulk_action_line(id: &str) -> String {
    let mut line = json!({ "index": { "_id": id } }).to_string();
    line.push('\n');
    line
}

/// Conflict reported by the cluster when the policy is stored already
fn is_policy_already_stored(status: StatusCode, body: &str) -> bool {
    status == StatusCode::CONFLICT && body.contains("document already exists")
}

pub fn match_all_query() -> Value {
    json!({ "query": { "match_all": {} } })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkItem {
    #[serde(default)]
    pub index: Option<BulkItemResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkItemResult {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<BulkItemError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkItemError {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
}

impl BulkResponse {
    /// Describes up to [`BULK_ERRORS_REPORTED`] failed items
    pub fn failures(&self) -> Option<String> {
        if !self.errors {
            return None;
        }

        let failures: Vec<String> = self
            .items
            .iter()
            .filter_map(|item| item.index.as_ref())
            .filter(|result| result.status >= 300)
            .take(BULK_ERRORS_REPORTED)
            .map(|result| {
                let err = result.error.clone().unwrap_or_default();
                format!(
                    "{{ status code: {}, error type: {}, reason: {} }}",
                    result.status, err.kind, err.reason
                )
            })
            .collect();
        Some(failures.join("\n"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrollPage<T> {
    #[serde(default, rename = "_scroll_id")]
    pub scroll_id: String,
    pub hits: Hits<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hits<T> {
    #[serde(default = "Vec::new")]
    pub hits: Vec<Hit<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hit<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiGetResponse<T> {
    #[serde(default = "Vec::new")]
    pub docs: Vec<MultiGetDoc<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiGetDoc<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub found: bool,
    #[serde(rename = "_source")]
    pub source: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ScrollHeader {
    #[serde(default, rename = "_scroll_id")]
    scroll_id: String,
    #[serde(default)]
    hits: HitsHeader,
}

#[derive(Debug, Default, Deserialize)]
struct HitsHeader {
    #[serde(default)]
    hits: Vec<IgnoredAny>,
}

////////////
// client //
////////////

pub struct ElasticClient {
    client: reqwest::Client,
    url: String,
    credentials: Credentials,
    scroll_count: AtomicU64,
}

impl ElasticClient {
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Result<Self, ClientError> {
        let url: String = url.into();
        let client = reqwest::Client::builder()
            .build()
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            credentials,
            scroll_count: AtomicU64::new(0),
        })
    }

    fn request(&self, method: Method, path: &str) -> (String, reqwest::RequestBuilder) {
        let url = format!("{}{path}", self.url);
        let request = self.credentials.apply(self.client.request(method, &url));
        (url, request)
    }

    async fn send(
        &self,
        url: String,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), ClientError> {
        let response = request.send().await.map_err(|source| ClientError::Transport {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport { url, source })?;

        Ok((status, body.to_vec()))
    }

    /// Sends and fails on non-success statuses
    async fn send_ok(
        &self,
        url: String,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<u8>, ClientError> {
        let (status, body) = self.send(url.clone(), request).await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }

    fn keep_alive(&self, base: Duration) -> String {
        // distinct keep alive per request
        let count = self.scroll_count.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}ms", base.as_millis() as u64 + count)
    }

    async fn next_scroll_page(&self, scroll_id: &str) -> Result<Vec<u8>, ClientError> {
        let body = json!({
            "scroll": self.keep_alive(SCROLL_NEXT_KEEP_ALIVE),
            "scroll_id": scroll_id,
        });
        let (url, request) = self.request(Method::POST, "/_search/scroll");
        self.send_ok(url, request.json(&body)).await
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), ClientError> {
        let (url, request) = self.request(Method::DELETE, "/_search/scroll");
        let (status, body) = self
            .send(url.clone(), request.json(&json!({ "scroll_id": scroll_id })))
            .await?;
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(())
    }

    async fn iterate_scroll(
        &self,
        scroll_id: &str,
        handler: &mut dyn ScrollPageHandler,
    ) -> anyhow::Result<()> {
        loop {
            let page = self.next_scroll_page(scroll_id).await?;
            let header: ScrollHeader = serde_json::from_slice(&page)?;
            if header.hits.hits.is_empty() {
                return Ok(());
            }
            handler.handle_page(&page).await?;
        }
    }

    /// Hands the first page and every following one to `handler`, then
    /// releases the cursor. An empty first page ends the scroll.
    async fn drain_scroll(&self, first: &[u8], handler: &mut dyn ScrollPageHandler) -> anyhow::Result<()> {
        let header: ScrollHeader = serde_json::from_slice(first)?;

        let result = if header.hits.hits.is_empty() {
            Ok(())
        } else {
            match handler.handle_page(first).await {
                Ok(()) if header.scroll_id.is_empty() => return Ok(()),
                Ok(()) => self.iterate_scroll(&header.scroll_id, handler).await,
                Err(e) => Err(e),
            }
        };

        if !header.scroll_id.is_empty() {
            if let Err(e) = self.clear_scroll(&header.scroll_id).await {
                warn!(error = %e, "cannot clear scroll");
            }
        }
        result
    }

    async fn put_write_block(&self, index: &str, blocked: bool) -> Result<(), ClientError> {
        let body = json!({ "index": { "blocks": { "write": blocked } } });
        let (url, request) = self.request(Method::PUT, &format!("/{index}/_settings"));
        self.send_ok(url, request.json(&body)).await.map(|_| ())
    }
}

#[async_trait]
impl SearchIndexClient for ElasticClient {
    async fn create_index_with_mapping(&self, index: &str, mapping: &[u8]) -> Result<(), ClientError> {
        debug!(index, "creating index");
        let (url, request) = self.request(Method::PUT, &format!("/{index}"));
        let request = request
            .header(CONTENT_TYPE, "application/json")
            .body(mapping.to_vec());
        self.send_ok(url, request).await.map(|_| ())
    }

    async fn index_exists(&self, index: &str) -> Result<bool, ClientError> {
        let (url, request) = self.request(Method::HEAD, &format!("/{index}"));
        let (status, _) = self.send(url.clone(), request).await?;
        match status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(ClientError::Status {
                url,
                status: other.as_u16(),
                body: String::new(),
            }),
        }
    }

    async fn bulk_upsert(&self, buffer: &[u8], index: &str) -> Result<(), ClientError> {
        let (url, request) = self.request(Method::POST, &format!("/{index}/_bulk"));
        let request = request
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(buffer.to_vec());
        let body = self.send_ok(url, request).await?;

        let response: BulkResponse = serde_json::from_slice(&body)?;
        if let Some(failures) = response.failures() {
            error!(index, failures = %failures, "bulk request has failed items");
            return Err(ClientError::Bulk(failures));
        }
        Ok(())
    }

    async fn multi_get(&self, ids: &[String], index: &str) -> Result<Vec<u8>, ClientError> {
        let docs: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "_id": id, "_source": true }))
            .collect();
        let (url, request) = self.request(Method::POST, &format!("/{index}/_mget"));
        self.send_ok(url, request.json(&json!({ "docs": docs }))).await
    }

    async fn put_single_document(&self, index: &str, doc_id: &str, body: &Value) -> Result<(), ClientError> {
        let (url, request) = self.request(Method::PUT, &format!("/{index}/_doc/{doc_id}"));
        self.send_ok(url, request.json(body)).await.map(|_| ())
    }

    async fn put_policy(&self, name: &str, policy: &[u8]) -> Result<(), ClientError> {
        let (url, request) = self.request(Method::PUT, &format!("/_ilm/policy/{name}"));
        let request = request
            .header(CONTENT_TYPE, "application/json")
            .body(policy.to_vec());
        let (status, body) = self.send(url.clone(), request).await?;
        let body = String::from_utf8_lossy(&body).into_owned();
        if status.is_success() || is_policy_already_stored(status, &body) {
            return Ok(());
        }
        Err(ClientError::Status {
            url,
            status: status.as_u16(),
            body,
        })
    }

    async fn scroll_all_documents(
        &self,
        index: &str,
        query: &Value,
        handler: &mut dyn ScrollPageHandler,
    ) -> anyhow::Result<()> {
        let path = format!(
            "/{index}/_search?scroll={}&size={SCROLL_PAGE_SIZE}",
            self.keep_alive(SCROLL_FIRST_KEEP_ALIVE)
        );
        let (url, request) = self.request(Method::POST, &path);
        let first = self.send_ok(url, request.json(query)).await?;
        self.drain_scroll(&first, handler).await
    }
}

#[async_trait]
impl IndexCloneClient for ElasticClient {
    async fn clone_index(&self, index: &str, target: &str) -> CloneOutcome {
        if let Err(e) = self.put_write_block(index, true).await {
            return CloneOutcome {
                cloned: false,
                error: Some(e),
            };
        }

        let (url, request) = self.request(
            Method::POST,
            &format!("/{index}/_clone/{target}?wait_for_active_shards=1"),
        );
        let cloned = self.send_ok(url, request).await;
        let unset = self.put_write_block(index, false).await;

        match (cloned, unset) {
            (Ok(_), Ok(())) => CloneOutcome {
                cloned: true,
                error: None,
            },
            (Ok(_), Err(e)) => CloneOutcome {
                cloned: true,
                error: Some(e),
            },
            (Err(e), Ok(())) => CloneOutcome {
                cloned: false,
                error: Some(e),
            },
            (Err(e), Err(unset)) => CloneOutcome {
                cloned: false,
                error: Some(ClientError::Api(format!(
                    "error clone: {e}, error unsetReadOnly: {unset}"
                ))),
            },
        }
    }

    async fn unset_read_only(&self, index: &str) -> Result<(), ClientError> {
        self.put_write_block(index, false).await
    }

    async fn wait_yellow_status(&self) -> Result<(), ClientError> {
        let (url, request) = self.request(Method::GET, "/_cluster/health?wait_for_status=yellow");
        self.send_ok(url, request).await.map(|_| ())
    }
}
