use super::{accounts_index_name, AccountsProcessor, DataProcessor};
use crate::{constants::ACCOUNTS_INDEX, reindex::Reindexer};
use async_trait::async_trait;
use tracing::{info, instrument};

/// Streams the live accounts index into `accounts_<epoch>`
pub struct ReindexerDataProcessor {
    accounts_processor: AccountsProcessor,
    reindexer: Reindexer,
}

impl ReindexerDataProcessor {
    pub fn new(accounts_processor: AccountsProcessor, reindexer: Reindexer) -> Self {
        Self {
            accounts_processor,
            reindexer,
        }
    }
}

#[async_trait]
impl DataProcessor for ReindexerDataProcessor {
    #[instrument(skip_all)]
    async fn process_accounts_data(&self) -> anyhow::Result<()> {
        let epoch = self.accounts_processor.get_current_epoch().await?;
        let snapshot = self.accounts_processor.get_all_accounts_with_stake(epoch).await?;
        let new_index = accounts_index_name(epoch);

        info!(new_index = %new_index, accounts = snapshot.accounts.len(), "reindexing accounts");
        self.reindexer
            .reindex_accounts(ACCOUNTS_INDEX, &new_index, &snapshot)
            .await
    }
}
