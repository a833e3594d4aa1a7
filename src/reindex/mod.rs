//! Streaming the accounts index into a new dated index

pub mod cloner;
pub mod indexer;
pub mod templates;

use crate::{
    account::{
        merge::{merge_page, rest_only_accounts},
        AccountInfo, AccountsMap, AccountsSnapshot,
    },
    client::elastic::{match_all_query, ScrollPage, ScrollPageHandler, SearchIndexClient},
    config::ConfigError,
    constants::{ACCOUNTS_INDEX, ACCOUNTS_POLICY_NAME, ENERGY_SNAPSHOT_PREFIX, VALUES_INDEX},
};
use anyhow::Context;
use async_trait::async_trait;
use indexer::AccountsIndexer;
use serde_json::json;
use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::Arc,
    time::Instant,
};
use templates::{read_index_policy, read_index_template};
use tracing::{info, instrument, warn};

/// Id of the checkpoint document of `epoch` in the values index
pub fn extra_information_id(epoch: u32) -> String {
    format!("{ENERGY_SNAPSHOT_PREFIX}-{epoch}")
}

pub struct Reindexer {
    source: Arc<dyn SearchIndexClient>,
    destinations: Vec<Arc<dyn SearchIndexClient>>,
    indices_path: PathBuf,
}

impl Reindexer {
    pub fn new(
        source: Arc<dyn SearchIndexClient>,
        destinations: Vec<Arc<dyn SearchIndexClient>>,
        indices_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let indices_path = indices_path.into();
        if destinations.is_empty() {
            return Err(ConfigError::EmptyDestinations);
        }
        if indices_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("indices path"));
        }

        Ok(Self {
            source,
            destinations,
            indices_path,
        })
    }

    /// Creates `index` from the accounts template on every destination and
    /// stores the accounts lifecycle policy there
    pub async fn create_destination_index(&self, index: &str) -> anyhow::Result<()> {
        let template = read_index_template(&self.indices_path, ACCOUNTS_INDEX).await?;
        let policy = read_index_policy(&self.indices_path, ACCOUNTS_INDEX).await?;
        for destination in &self.destinations {
            destination
                .create_index_with_mapping(index, &template)
                .await
                .with_context(|| format!("cannot create index {index}"))?;
            destination
                .put_policy(ACCOUNTS_POLICY_NAME, &policy)
                .await
                .with_context(|| format!("cannot put policy {ACCOUNTS_POLICY_NAME}"))?;
        }
        Ok(())
    }

    /// Bulk writes `accounts` to `index` on every destination
    pub async fn index_accounts(&self, accounts: &AccountsMap, index: &str) -> anyhow::Result<()> {
        for destination in &self.destinations {
            AccountsIndexer::new(Arc::clone(destination))
                .index_accounts(accounts, index)
                .await?;
        }
        Ok(())
    }

    /// Copies every document of `source_index` into a freshly created
    /// `destination_index`, merged with the stake snapshot. Staked addresses
    /// without a source document are written after the scroll, then the block
    /// checkpoint of the snapshot is recorded.
    #[instrument(skip(self, snapshot))]
    pub async fn reindex_accounts(
        &self,
        source_index: &str,
        destination_index: &str,
        snapshot: &AccountsSnapshot,
    ) -> anyhow::Result<()> {
        let started = Instant::now();
        info!("create a new index with mapping");
        self.create_destination_index(destination_index).await?;

        let mut saver = PageSaver {
            reindexer: self,
            rest: &snapshot.accounts,
            index: destination_index,
            pages: 0,
            written: HashSet::new(),
        };
        self.source
            .scroll_all_documents(source_index, &match_all_query(), &mut saver)
            .await?;

        let rest_only = rest_only_accounts(&snapshot.accounts, &saver.written);
        if !rest_only.is_empty() {
            info!(num = rest_only.len(), "indexing staked accounts missing from the source");
            self.index_accounts(&rest_only, destination_index).await?;
        }
        info!(
            pages = saver.pages,
            duration_secs = started.elapsed().as_secs_f64(),
            "reindexed accounts"
        );

        self.index_extra_information(snapshot).await
    }

    /// Stores the block hash of the snapshot in the values index, creating
    /// that index where it is missing
    pub async fn index_extra_information(&self, snapshot: &AccountsSnapshot) -> anyhow::Result<()> {
        let Some(block_info) = &snapshot.block_info else {
            warn!(epoch = snapshot.epoch, "no block info, skipping extra information");
            return Ok(());
        };

        let id = extra_information_id(snapshot.epoch);
        let body = json!({ "key": id, "value": block_info.hash });
        let mut template = None;
        for destination in &self.destinations {
            if !destination.index_exists(VALUES_INDEX).await? {
                if template.is_none() {
                    template = Some(read_index_template(&self.indices_path, VALUES_INDEX).await?);
                }
                let mapping = template.as_deref().unwrap_or_default();
                destination.create_index_with_mapping(VALUES_INDEX, mapping).await?;
            }
            destination
                .put_single_document(VALUES_INDEX, &id, &body)
                .await
                .with_context(|| format!("cannot index {id}"))?;
        }

        info!(id = %id, hash = %block_info.hash, "indexed extra information");
        Ok(())
    }
}

/// Merges each scroll page with the stake snapshot and writes it out
struct PageSaver<'a> {
    reindexer: &'a Reindexer,
    rest: &'a AccountsMap,
    index: &'a str,
    pages: usize,
    written: HashSet<String>,
}

#[async_trait]
impl ScrollPageHandler for PageSaver<'_> {
    async fn handle_page(&mut self, page: &[u8]) -> anyhow::Result<()> {
        self.pages += 1;
        info!(bulk = self.pages, "indexing accounts");

        let page: ScrollPage<AccountInfo> = serde_json::from_slice(page).context("accounts page")?;
        let docs: HashMap<String, AccountInfo> = page
            .hits
            .hits
            .into_iter()
            .map(|hit| (hit.id, hit.source))
            .collect();

        let merged = merge_page(docs, self.rest);
        self.reindexer.index_accounts(&merged, self.index).await?;
        self.written.extend(merged.into_keys());
        Ok(())
    }
}
