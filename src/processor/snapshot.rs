use super::{accounts_index_name, get_current_epoch, DataProcessor};
use crate::{
    client::{rest::HttpApiClient, Credentials},
    reindex::Reindexer,
    snapshot::SnapshotBalances,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

/// Writes `accounts_<epoch>` from the object storage dumps of that epoch
pub struct SnapshotDataProcessor {
    api: Arc<dyn HttpApiClient>,
    credentials: Credentials,
    balances: SnapshotBalances,
    reindexer: Reindexer,
    epoch: Option<u32>,
}

impl SnapshotDataProcessor {
    /// Without `epoch` the current one is used
    pub fn new(
        api: Arc<dyn HttpApiClient>,
        credentials: Credentials,
        balances: SnapshotBalances,
        reindexer: Reindexer,
        epoch: Option<u32>,
    ) -> Self {
        Self {
            api,
            credentials,
            balances,
            reindexer,
            epoch,
        }
    }
}

#[async_trait]
impl DataProcessor for SnapshotDataProcessor {
    #[instrument(skip_all)]
    async fn process_accounts_data(&self) -> anyhow::Result<()> {
        let epoch = match self.epoch {
            Some(epoch) => epoch,
            None => get_current_epoch(self.api.as_ref(), &self.credentials).await?,
        };
        let snapshot = self.balances.get_balances_for_epoch(epoch).await?;
        let new_index = accounts_index_name(epoch);

        info!(new_index = %new_index, accounts = snapshot.accounts.len(), "indexing snapshot");
        self.reindexer.create_destination_index(&new_index).await?;
        self.reindexer.index_accounts(&snapshot.accounts, &new_index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::address::PubkeyConverter,
        client::{elastic::SearchIndexClient, storage::DirectoryStorage},
        getter::test_utils::StubApi,
        reindex::test_utils::MemoryElastic,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    const ALICE: &str = "erd1qyu5wthldzr8wx5c9ucg8kjagg0jfs53s8nr3zpz3hypefsdd8ssycr6th";

    fn write(dir: &Path, name: &str, body: serde_json::Value) -> anyhow::Result<()> {
        Ok(std::fs::write(dir.join(name), serde_json::to_vec(&body)?)?)
    }

    #[tokio::test]
    async fn indexes_configured_epoch() -> anyhow::Result<()> {
        let dumps = tempfile::tempdir()?;
        write(dumps.path(), "egld_balance_0_100", json!({ ALICE: { "nonce": 4, "balance": "2000000000000000000" } }))?;
        for shard in ["1", "2", "4294967295"] {
            write(dumps.path(), &format!("egld_balance_{shard}_100"), json!({}))?;
        }
        write(dumps.path(), "direct_stake_4294967295_100", json!({
            "list": [{ "address": ALICE, "staked": "1000000000000000000", "topUp": "0" }],
        }))?;
        write(dumps.path(), "legacy_delegation_state_2_100", json!({ "pairs": {} }))?;

        let indices = tempfile::tempdir()?;
        std::fs::write(indices.path().join("accounts.json"), b"{}")?;
        std::fs::write(indices.path().join("accounts-policy.json"), b"{}")?;
        let destination = Arc::new(MemoryElastic::default());
        let destinations: Vec<Arc<dyn SearchIndexClient>> = vec![destination.clone()];
        let processor = SnapshotDataProcessor::new(
            Arc::new(StubApi::default()),
            Credentials::none(),
            SnapshotBalances::new(Arc::new(DirectoryStorage::new(dumps.path())), PubkeyConverter::default()),
            Reindexer::new(destination.clone(), destinations, indices.path())?,
            Some(100),
        );

        processor.process_accounts_data().await?;

        assert_eq!(destination.count("accounts_100"), 1);
        let alice = destination.doc("accounts_100", ALICE).unwrap();
        assert_eq!(alice["nonce"], 4);
        assert_eq!(alice["validatorsActive"], "1000000000000000000");
        assert_eq!(alice["totalBalanceWithStake"], "3000000000000000000");
        assert_eq!(alice["totalBalanceWithStakeNum"], 3.0);
        Ok(())
    }
}
