//! Writing and reading account documents

use crate::{
    account::{AccountInfo, AccountsMap},
    client::elastic::{bulk_action_line, MultiGetResponse, SearchIndexClient},
    constants::{BULK_BUFFER_THRESHOLD, MULTI_GET_CHUNK},
};
use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct AccountsIndexer {
    client: Arc<dyn SearchIndexClient>,
}

impl AccountsIndexer {
    pub fn new(client: Arc<dyn SearchIndexClient>) -> Self {
        Self { client }
    }

    /// Upserts every account, keyed by address
    pub async fn index_accounts(&self, accounts: &AccountsMap, index: &str) -> anyhow::Result<()> {
        let buffers = serialize_accounts(accounts)?;
        debug!(index, accounts = accounts.len(), buffers = buffers.len(), "bulk upsert");

        for buffer in buffers {
            self.client
                .bulk_upsert(&buffer, index)
                .await
                .with_context(|| format!("cannot index accounts into {index}"))?;
        }
        Ok(())
    }

    /// Fetches the documents of `addresses`. A chunk that cannot be fetched
    /// is skipped with a warning.
    pub async fn get_accounts(&self, addresses: &[String], index: &str) -> AccountsMap {
        let mut accounts = AccountsMap::new();
        for chunk in addresses.chunks(MULTI_GET_CHUNK) {
            match self.get_chunk(chunk, index).await {
                Ok(found) => accounts.extend(found),
                Err(e) => warn!(index, error = %format!("{e:#}"), "cannot get accounts"),
            }
        }
        accounts
    }

    async fn get_chunk(&self, ids: &[String], index: &str) -> anyhow::Result<AccountsMap> {
        let body = self.client.multi_get(ids, index).await?;
        let response: MultiGetResponse<AccountInfo> = serde_json::from_slice(&body)?;

        Ok(response
            .docs
            .into_iter()
            .filter(|doc| doc.found)
            .filter_map(|doc| doc.source.map(|source| (doc.id, source)))
            .collect())
    }
}

/// Bulk bodies of at most [`BULK_BUFFER_THRESHOLD`] bytes each, unless a
/// single document is larger
pub fn serialize_accounts(accounts: &AccountsMap) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut addresses: Vec<&String> = accounts.keys().collect();
    addresses.sort();

    let mut buffers = vec![];
    let mut buffer = Vec::new();
    for address in addresses {
        let mut entry = bulk_action_line(address).into_bytes();
        serde_json::to_writer(&mut entry, &accounts[address])?;
        entry.push(b'\n');

        if !buffer.is_empty() && buffer.len() + entry.len() > BULK_BUFFER_THRESHOLD {
            buffers.push(std::mem::take(&mut buffer));
        }
        buffer.extend(entry);
    }

    if !buffer.is_empty() {
        buffers.push(buffer);
    }
    Ok(buffers)
}
