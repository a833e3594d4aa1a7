//! Accounts rebuilt from per-epoch dumps in object storage
//!
//! Dumps are named `<prefix>_<shard>_<epoch>`. Balances come from one file
//! per shard, stake from metachain dumps and the legacy delegation storage.

use crate::{
    account::{
        address::{compute_shard_id, PubkeyConverter},
        merge::{AccountsMerger, StakeSource},
        AccountInfo, AccountsSnapshot,
    },
    balance::{sum_balances, to_float},
    client::{storage::ObjectStorageClient, ClientError},
    constants::{
        DELEGATED_INFO_FILE_PREFIX, DIRECT_STAKE_FILE_PREFIX, EGLD_BALANCE_FILE_PREFIX,
        LEGACY_DELEGATION_SHARD_ID, LEGACY_DELEGATION_STATE_FILE_PREFIX, METACHAIN_SHARD_ID,
        NUM_SHARDS, STAKING_PROVIDERS_ACTIVATION_EPOCH,
    },
    getter::{delegators::DelegatorStakeList, validators::DirectStakedList},
    ledger::{legacy_delegation::LegacyDelegationState, StorageDump},
};
use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, instrument, warn};

pub fn snapshot_file_name(prefix: &str, shard_id: u32, epoch: u32) -> String {
    format!("{prefix}_{shard_id}_{epoch}")
}

/// Balance entry of an `egld_balance` dump
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EgldBalance {
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub balance: String,
}

pub struct SnapshotBalances {
    storage: Arc<dyn ObjectStorageClient>,
    converter: PubkeyConverter,
}

impl SnapshotBalances {
    pub fn new(storage: Arc<dyn ObjectStorageClient>, converter: PubkeyConverter) -> Self {
        Self { storage, converter }
    }

    async fn read<T: DeserializeOwned>(&self, prefix: &str, shard_id: u32, epoch: u32) -> anyhow::Result<T> {
        let name = snapshot_file_name(prefix, shard_id, epoch);
        let bytes = self.storage.get_file(&name).await?;
        serde_json::from_slice(&bytes).with_context(|| format!("cannot decode {name}"))
    }

    /// Balances of every shard, the metachain last
    async fn balances(&self, epoch: u32) -> anyhow::Result<HashMap<String, EgldBalance>> {
        let mut balances = HashMap::new();
        for shard_id in (0..NUM_SHARDS).chain([METACHAIN_SHARD_ID]) {
            let shard: HashMap<String, EgldBalance> =
                self.read(EGLD_BALANCE_FILE_PREFIX, shard_id, epoch).await?;
            balances.extend(shard);
        }
        info!(num = balances.len(), "accounts with balance");
        Ok(balances)
    }

    /// Every account of `epoch` with balance and stake
    #[instrument(skip(self))]
    pub async fn get_balances_for_epoch(&self, epoch: u32) -> anyhow::Result<AccountsSnapshot> {
        let balances = self.balances(epoch).await?;

        let validators: DirectStakedList = self
            .read(DIRECT_STAKE_FILE_PREFIX, METACHAIN_SHARD_ID, epoch)
            .await?;

        let delegators = match self
            .read::<DelegatorStakeList>(DELEGATED_INFO_FILE_PREFIX, METACHAIN_SHARD_ID, epoch)
            .await
        {
            Ok(list) => list.into_accounts(),
            Err(e) if is_not_found(&e) && epoch < STAKING_PROVIDERS_ACTIVATION_EPOCH => {
                warn!(epoch, "no delegated info before staking providers");
                Default::default()
            }
            Err(e) => return Err(e),
        };

        let legacy: StorageDump = self
            .read(LEGACY_DELEGATION_STATE_FILE_PREFIX, LEGACY_DELEGATION_SHARD_ID, epoch)
            .await?;
        let legacy = LegacyDelegationState::from_pairs(&legacy.pairs, &self.converter).into_accounts();

        let mut merger = AccountsMerger::new();
        merger.merge(StakeSource::LegacyDelegation, legacy);
        merger.merge(StakeSource::Validators, validators.into_accounts());
        merger.merge(StakeSource::Delegators, delegators);
        let (mut accounts, mut addresses) = merger.finish();

        for (address, egld) in balances {
            let pubkey = match self.converter.decode(&address) {
                Ok(pubkey) => pubkey,
                Err(e) => {
                    warn!(error = %e, address = %address, "cannot decode address, skipping balance");
                    continue;
                }
            };
            let account = accounts.entry(address.clone()).or_insert_with(|| {
                addresses.push(address.clone());
                AccountInfo::default()
            });

            let (total, total_num) = if account.stake.total_stake.is_empty() {
                (egld.balance.clone(), to_float(&egld.balance))
            } else {
                sum_balances(&[egld.balance.as_str(), account.stake.total_stake.as_str()])
            };
            account.address = address;
            account.nonce = egld.nonce;
            account.balance_num = to_float(&egld.balance);
            account.balance = egld.balance;
            account.total_balance_with_stake = total;
            account.total_balance_with_stake_num = total_num;
            account.shard_id = compute_shard_id(&pubkey, NUM_SHARDS);
        }

        info!(num = accounts.len(), "accounts from snapshot");
        Ok(AccountsSnapshot {
            accounts,
            addresses,
            epoch,
            block_info: None,
        })
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<ClientError>(), Some(ClientError::NotFound(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::DirectoryStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    const ALICE: &str = "erd1qyu5wthldzr8wx5c9ucg8kjagg0jfs53s8nr3zpz3hypefsdd8ssycr6th";
    const BOB: &str = "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx";
    const ACTIVE_LEGACY: &str = "erd13wanstz0wmjv0ashn2760cl2a2l5y6gwz2lay270347ujshm9unsvt73fn";

    fn write(dir: &Path, name: &str, value: serde_json::Value) -> anyhow::Result<()> {
        std::fs::write(dir.join(name), serde_json::to_vec(&value)?)?;
        Ok(())
    }

    fn write_dumps(dir: &Path, epoch: u32, with_delegated_info: bool) -> anyhow::Result<()> {
        write(dir, &format!("egld_balance_0_{epoch}"), json!({
            ALICE: { "nonce": 12, "balance": "1500000000000000000", "tokens": [] },
        }))?;
        write(dir, &format!("egld_balance_1_{epoch}"), json!({
            BOB: { "nonce": 1, "balance": "2000000000000000000" },
        }))?;
        write(dir, &format!("egld_balance_2_{epoch}"), json!({}))?;
        write(dir, &format!("egld_balance_4294967295_{epoch}"), json!({}))?;
        write(dir, &format!("direct_stake_4294967295_{epoch}"), json!({
            "list": [{ "address": ALICE, "staked": "2500000000000000000000", "topUp": "0" }],
        }))?;
        if with_delegated_info {
            write(dir, &format!("delegated_info_4294967295_{epoch}"), json!({
                "list": [{ "delegatorAddress": BOB, "total": "3000000000000000000" }],
            }))?;
        }
        std::fs::copy(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/legacy_delegation_state_2_500"),
            dir.join(format!("legacy_delegation_state_2_{epoch}")),
        )?;
        Ok(())
    }

    #[test]
    fn file_names() {
        assert_eq!(snapshot_file_name("egld_balance", METACHAIN_SHARD_ID, 500), "egld_balance_4294967295_500");
    }

    #[tokio::test]
    async fn builds_accounts_for_epoch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_dumps(dir.path(), 500, true)?;
        let balances = SnapshotBalances::new(Arc::new(DirectoryStorage::new(dir.path())), PubkeyConverter::default());

        let snapshot = balances.get_balances_for_epoch(500).await?;

        let alice = &snapshot.accounts[ALICE];
        assert_eq!(alice.address, ALICE);
        assert_eq!(alice.nonce, 12);
        assert_eq!(alice.balance_num, 1.5);
        assert_eq!(alice.stake.total_stake_num, 2500.0);
        assert_eq!(alice.total_balance_with_stake, "2501500000000000000000");
        assert_eq!(alice.total_balance_with_stake_num, 2501.5);
        assert_eq!(alice.shard_id, 1);

        let bob = &snapshot.accounts[BOB];
        assert_eq!(bob.stake.delegation_num, 3.0);
        assert_eq!(bob.total_balance_with_stake_num, 5.0);

        // staked without balance keeps its stake only
        let legacy = &snapshot.accounts[ACTIVE_LEGACY];
        assert_eq!(legacy.stake.delegation_legacy_active, "323053985724926356758");
        assert_eq!(legacy.balance, "");
        assert!(snapshot.addresses.contains(&ALICE.to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_balance_address_is_skipped() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_dumps(dir.path(), 500, true)?;
        write(dir.path(), "egld_balance_2_500", json!({
            "erd1notanaddress": { "nonce": 1, "balance": "5" },
        }))?;
        let balances = SnapshotBalances::new(Arc::new(DirectoryStorage::new(dir.path())), PubkeyConverter::default());

        let snapshot = balances.get_balances_for_epoch(500).await?;

        assert!(!snapshot.accounts.contains_key("erd1notanaddress"));
        assert!(!snapshot.addresses.contains(&"erd1notanaddress".to_string()));
        assert_eq!(snapshot.accounts[ALICE].nonce, 12);
        Ok(())
    }

    #[tokio::test]
    async fn delegated_info_optional_before_staking_providers() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_dumps(dir.path(), 200, false)?;
        write_dumps(dir.path(), 300, false)?;
        let balances = SnapshotBalances::new(Arc::new(DirectoryStorage::new(dir.path())), PubkeyConverter::default());

        let snapshot = balances.get_balances_for_epoch(200).await?;
        assert_eq!(snapshot.accounts[BOB].stake.delegation, "");

        let err = balances.get_balances_for_epoch(300).await.unwrap_err();
        assert!(is_not_found(&err));
        Ok(())
    }
}
