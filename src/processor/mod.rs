//! Run types and the shared steps they are built from

pub mod clone;
pub mod factory;
pub mod reindex;
pub mod snapshot;

use crate::{
    account::{
        merge::{AccountsMerger, StakeSource},
        AccountsSnapshot,
    },
    client::{rest::HttpApiClient, Credentials},
    constants::{ACCOUNTS_INDEX, PATH_NETWORK_STATUS_META},
    getter::AccountsSource,
};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::{sync::Arc, time::Instant};
use tracing::{info, instrument};

pub use factory::create_data_processor;

/// One complete run
#[async_trait]
pub trait DataProcessor: Send + Sync {
    async fn process_accounts_data(&self) -> anyhow::Result<()>;
}

/// Name of the dated accounts index of `epoch`
pub fn accounts_index_name(epoch: u32) -> String {
    format!("{ACCOUNTS_INDEX}_{epoch}")
}

#[derive(Debug, Deserialize)]
struct NetworkStatusData {
    status: NetworkStatus,
}

#[derive(Debug, Deserialize)]
struct NetworkStatus {
    erd_epoch_number: u32,
}

/// Epoch reported by the metachain
pub async fn get_current_epoch(
    api: &dyn HttpApiClient,
    credentials: &Credentials,
) -> anyhow::Result<u32> {
    let data: NetworkStatusData = api
        .get(PATH_NETWORK_STATUS_META, credentials)
        .await?
        .into_data()
        .context("cannot get network status")?;

    info!(epoch = data.status.erd_epoch_number, "current epoch");
    Ok(data.status.erd_epoch_number)
}

/// Current epoch and the merged stake view of every source
pub struct AccountsProcessor {
    api: Arc<dyn HttpApiClient>,
    credentials: Credentials,
    source: Arc<dyn AccountsSource>,
}

impl AccountsProcessor {
    pub fn new(
        api: Arc<dyn HttpApiClient>,
        credentials: Credentials,
        source: Arc<dyn AccountsSource>,
    ) -> Self {
        Self {
            api,
            credentials,
            source,
        }
    }

    pub async fn get_current_epoch(&self) -> anyhow::Result<u32> {
        get_current_epoch(self.api.as_ref(), &self.credentials).await
    }

    /// Fetches every source, any failure aborts the whole snapshot
    #[instrument(skip(self))]
    pub async fn get_all_accounts_with_stake(&self, epoch: u32) -> anyhow::Result<AccountsSnapshot> {
        let started = Instant::now();

        let legacy = self.source.get_legacy_delegators_accounts().await?;
        let validators = self.source.get_validators_accounts().await?;
        let delegators = self.source.get_delegators_accounts().await?;
        let lkmex = self.source.get_lkmex_stake_accounts().await?;
        let (energy, block_info) = self.source.get_accounts_with_energy(epoch).await?;

        let mut merger = AccountsMerger::new();
        for (source, accounts) in StakeSource::MERGE_ORDER
            .into_iter()
            .zip([legacy, validators, delegators, lkmex, energy])
        {
            merger.merge(source, accounts);
        }
        let (accounts, addresses) = merger.finish();

        info!(
            num = accounts.len(),
            duration_secs = started.elapsed().as_secs_f64(),
            "accounts with stake"
        );
        Ok(AccountsSnapshot {
            accounts,
            addresses,
            epoch,
            block_info,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::{test_utils::*, *};
    use crate::{account::StakeInfo, getter::test_utils::StubApi};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn processor(source: StubSource) -> AccountsProcessor {
        let api = StubApi::default().with_get(
            PATH_NETWORK_STATUS_META,
            json!({ "status": { "erd_epoch_number": 1250, "erd_nonce": 17000000 } }),
        );
        AccountsProcessor::new(Arc::new(api), Credentials::none(), Arc::new(source))
    }

    #[test]
    fn index_name() {
        assert_eq!(accounts_index_name(1250), "accounts_1250");
    }

    #[tokio::test]
    async fn current_epoch() -> anyhow::Result<()> {
        assert_eq!(processor(StubSource::default()).get_current_epoch().await?, 1250);
        Ok(())
    }

    #[tokio::test]
    async fn merges_all_sources() -> anyhow::Result<()> {
        let one = "1000000000000000000";
        let source = StubSource {
            legacy: staked("erd1a", |s| {
                (s.delegation_legacy_active, s.delegation_legacy_active_num) = StakeInfo::pair(one);
            }),
            validators: staked("erd1a", |s| {
                (s.validators_active, s.validators_active_num) = StakeInfo::pair(one);
            }),
            delegators: staked("erd1b", |s| {
                (s.delegation, s.delegation_num) = StakeInfo::pair(one);
            }),
            energy: staked("erd1a", |s| {
                (s.energy, s.energy_num) = StakeInfo::pair(one);
            }),
            block_info: Some(Default::default()),
            ..Default::default()
        };

        let snapshot = processor(source).get_all_accounts_with_stake(1250).await?;

        assert_eq!(snapshot.epoch, 1250);
        assert_eq!(snapshot.addresses.len(), 2);
        assert!(snapshot.block_info.is_some());
        let a = &snapshot.accounts["erd1a"].stake;
        assert_eq!(a.total_stake, "2000000000000000000");
        assert_eq!(a.total_stake_num, 2.0);
        assert_eq!(a.energy_num, 1.0);
        assert_eq!(snapshot.accounts["erd1b"].stake.total_stake_num, 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn source_failure_aborts() {
        let source = StubSource {
            fail_delegators: true,
            ..Default::default()
        };

        assert!(processor(source).get_all_accounts_with_stake(1).await.is_err());
    }
}
