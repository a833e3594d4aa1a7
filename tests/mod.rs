mod config;
mod ledger;
mod pipeline;

pub mod helpers {
    //! Client doubles wired through the public traits

    use accounts_manager::client::{
        elastic::{ScrollPageHandler, SearchIndexClient},
        rest::{ApiResponse, HttpApiClient},
        ClientError, Credentials,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::{
        collections::{BTreeMap, HashMap},
        path::PathBuf,
        sync::Mutex,
    };

    pub fn data_file(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
    }

    pub fn read_json(name: &str) -> anyhow::Result<Value> {
        Ok(serde_json::from_slice(&std::fs::read(data_file(name))?)?)
    }

    /// Answers GETs from a path table, rejects VM queries
    #[derive(Default)]
    pub struct StaticApi {
        pub gets: HashMap<String, Value>,
    }

    impl StaticApi {
        pub fn with(mut self, path: &str, data: Value) -> Self {
            self.gets.insert(path.into(), data);
            self
        }
    }

    #[async_trait]
    impl HttpApiClient for StaticApi {
        async fn get(&self, path: &str, _: &Credentials) -> Result<ApiResponse, ClientError> {
            self.gets
                .get(path)
                .cloned()
                .map(ApiResponse::ok)
                .ok_or_else(|| ClientError::NotFound(path.into()))
        }

        async fn post(&self, path: &str, _: &Value, _: &Credentials) -> Result<ApiResponse, ClientError> {
            Ok(ApiResponse::failed(format!("unexpected post to {path}")))
        }
    }

    /// Search cluster kept in memory, one page per scroll
    #[derive(Default)]
    pub struct MemoryCluster {
        pub indices: Mutex<HashMap<String, BTreeMap<String, Value>>>,
        pub policies: Mutex<HashMap<String, Value>>,
    }

    impl MemoryCluster {
        pub fn with_index(index: &str, docs: impl IntoIterator<Item = (String, Value)>) -> Self {
            let cluster = Self::default();
            cluster
                .indices
                .lock()
                .unwrap()
                .insert(index.into(), docs.into_iter().collect());
            cluster
        }

        pub fn doc(&self, index: &str, id: &str) -> Option<Value> {
            self.indices.lock().unwrap().get(index)?.get(id).cloned()
        }

        pub fn count(&self, index: &str) -> usize {
            self.indices.lock().unwrap().get(index).map_or(0, BTreeMap::len)
        }
    }

    #[async_trait]
    impl SearchIndexClient for MemoryCluster {
        async fn create_index_with_mapping(&self, index: &str, _: &[u8]) -> Result<(), ClientError> {
            let mut indices = self.indices.lock().unwrap();
            if indices.contains_key(index) {
                return Err(ClientError::Status {
                    url: format!("/{index}"),
                    status: 400,
                    body: "resource_already_exists_exception".into(),
                });
            }
            indices.insert(index.into(), BTreeMap::new());
            Ok(())
        }

        async fn index_exists(&self, index: &str) -> Result<bool, ClientError> {
            Ok(self.indices.lock().unwrap().contains_key(index))
        }

        async fn bulk_upsert(&self, buffer: &[u8], index: &str) -> Result<(), ClientError> {
            let body = String::from_utf8_lossy(buffer).to_string();
            let lines: Vec<&str> = body.lines().collect();
            let mut indices = self.indices.lock().unwrap();
            let docs = indices.entry(index.into()).or_default();
            for pair in lines.chunks(2) {
                let action: Value = serde_json::from_str(pair[0])?;
                let id = action["index"]["_id"].as_str().unwrap_or_default().to_string();
                docs.insert(id, serde_json::from_str(pair[1])?);
            }
            Ok(())
        }

        async fn multi_get(&self, ids: &[String], index: &str) -> Result<Vec<u8>, ClientError> {
            let indices = self.indices.lock().unwrap();
            let docs: Vec<Value> = ids
                .iter()
                .map(|id| match indices.get(index).and_then(|docs| docs.get(id)) {
                    Some(source) => json!({ "_id": id, "found": true, "_source": source }),
                    None => json!({ "_id": id, "found": false }),
                })
                .collect();
            Ok(serde_json::to_vec(&json!({ "docs": docs }))?)
        }

        async fn put_single_document(&self, index: &str, doc_id: &str, body: &Value) -> Result<(), ClientError> {
            self.indices
                .lock()
                .unwrap()
                .entry(index.into())
                .or_default()
                .insert(doc_id.into(), body.clone());
            Ok(())
        }

        async fn put_policy(&self, name: &str, policy: &[u8]) -> Result<(), ClientError> {
            self.policies
                .lock()
                .unwrap()
                .insert(name.into(), serde_json::from_slice(policy)?);
            Ok(())
        }

        async fn scroll_all_documents(
            &self,
            index: &str,
            _: &Value,
            handler: &mut dyn ScrollPageHandler,
        ) -> anyhow::Result<()> {
            let hits: Vec<Value> = self
                .indices
                .lock()
                .unwrap()
                .get(index)
                .map(|docs| {
                    docs.iter()
                        .map(|(id, source)| json!({ "_id": id, "_source": source }))
                        .collect()
                })
                .unwrap_or_default();
            if hits.is_empty() {
                return Ok(());
            }

            let page = json!({ "_scroll_id": "scroll", "hits": { "hits": hits } });
            handler.handle_page(&serde_json::to_vec(&page)?).await
        }
    }
}
