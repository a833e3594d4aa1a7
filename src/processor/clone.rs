use super::{accounts_index_name, AccountsProcessor, DataProcessor};
use crate::{
    account::merge::merge_elastic_and_rest,
    constants::ACCOUNTS_INDEX,
    reindex::{cloner::Cloner, indexer::AccountsIndexer},
};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{info, instrument};

/// Clones the live accounts index into `accounts_<epoch>` and overwrites the
/// accounts that have stake
pub struct ClonerDataProcessor {
    accounts_processor: AccountsProcessor,
    accounts_indexer: AccountsIndexer,
    cloner: Cloner,
}

impl ClonerDataProcessor {
    pub fn new(accounts_processor: AccountsProcessor, accounts_indexer: AccountsIndexer, cloner: Cloner) -> Self {
        Self {
            accounts_processor,
            accounts_indexer,
            cloner,
        }
    }
}

#[async_trait]
impl DataProcessor for ClonerDataProcessor {
    #[instrument(skip_all)]
    async fn process_accounts_data(&self) -> anyhow::Result<()> {
        let epoch = self.accounts_processor.get_current_epoch().await?;
        let snapshot = self.accounts_processor.get_all_accounts_with_stake(epoch).await?;

        let started = Instant::now();
        let accounts_es = self
            .accounts_indexer
            .get_accounts(&snapshot.addresses, ACCOUNTS_INDEX)
            .await;
        info!(
            num = accounts_es.len(),
            duration_secs = started.elapsed().as_secs_f64(),
            "fetched accounts from elasticsearch"
        );
        let prepared = merge_elastic_and_rest(accounts_es, &snapshot.accounts);

        let started = Instant::now();
        let new_index = accounts_index_name(epoch);
        self.cloner.clone_index(ACCOUNTS_INDEX, &new_index).await?;
        info!(duration_secs = started.elapsed().as_secs_f64(), "cloned accounts index");

        let started = Instant::now();
        info!(total = prepared.len(), "accounts to index");
        self.accounts_indexer.index_accounts(&prepared, &new_index).await?;
        info!(duration_secs = started.elapsed().as_secs_f64(), "indexed modified accounts");
        Ok(())
    }
}
