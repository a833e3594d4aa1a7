//! Account documents as stored in the `accounts` indices

pub mod address;
pub mod merge;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Accounts keyed by bech32 address
pub type AccountsMap = HashMap<String, AccountInfo>;

/// One account document: on-chain balance plus the stake view of the run.
///
/// Fields this crate does not know about are preserved in `extra` so
/// reindexing never drops data written by other producers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub nonce: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub balance: String,
    #[serde(default)]
    pub balance_num: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub total_balance_with_stake: String,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub total_balance_with_stake_num: f64,
    #[serde(default, rename = "shardID")]
    pub shard_id: u32,
    #[serde(flatten)]
    pub stake: StakeInfo,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Stake related values, every string has a float companion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StakeInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub delegation_legacy_waiting: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub delegation_legacy_waiting_num: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub delegation_legacy_active: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub delegation_legacy_active_num: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub validators_active: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub validators_active_num: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub validators_top_up: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub validators_top_up_num: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub delegation: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub delegation_num: f64,
    #[serde(rename = "lkMexStake", skip_serializing_if = "String::is_empty")]
    pub lkmex_stake: String,
    #[serde(rename = "lkMexStakeNum", skip_serializing_if = "is_zero_f64")]
    pub lkmex_stake_num: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub energy: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub energy_num: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_details: Option<EnergyDetails>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub un_delegate_legacy: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub un_delegate_legacy_num: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub un_delegate_validator: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub un_delegate_validator_num: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub un_delegate_delegation: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub un_delegate_delegation_num: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub total_stake: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub total_stake_num: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub total_un_delegate: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub total_un_delegate_num: f64,
}

/// Raw energy entry as stored by the energy contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyDetails {
    /// Signed, the decayed amount may go below zero
    pub amount: String,
    pub last_update_epoch: u32,
    pub total_locked_tokens: String,
}

/// Block the energy storage was read at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub root_hash: String,
}

/// Everything one run computed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountsSnapshot {
    pub accounts: AccountsMap,
    /// Every address touched by any source, in first-seen order
    pub addresses: Vec<String>,
    pub epoch: u32,
    pub block_info: Option<BlockInfo>,
}

impl StakeInfo {
    /// Sets a `(value, float)` pair from a base-unit string
    pub fn pair(value: impl Into<String>) -> (String, f64) {
        crate::balance::with_float(value.into())
    }
}

fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserializes_index_document() -> anyhow::Result<()> {
        let doc = json!({
            "address": "erd1test",
            "nonce": 7,
            "balance": "1000000000000000000",
            "balanceNum": 1.0,
            "shardID": 1,
            "delegation": "5",
            "timestamp": 1690000000,
            "developerRewards": "0"
        });

        let account: AccountInfo = serde_json::from_value(doc)?;
        assert_eq!(account.address, "erd1test");
        assert_eq!(account.nonce, 7);
        assert_eq!(account.balance_num, 1.0);
        assert_eq!(account.shard_id, 1);
        assert_eq!(account.stake.delegation, "5");
        assert_eq!(account.extra.get("timestamp"), Some(&json!(1690000000)));
        assert_eq!(account.extra.get("developerRewards"), Some(&json!("0")));
        assert!(account.extra.get("delegation").is_none());
        Ok(())
    }

    #[test]
    fn omits_empty_stake_fields() -> anyhow::Result<()> {
        let mut account = AccountInfo {
            address: "erd1test".into(),
            balance: "10".into(),
            ..Default::default()
        };
        (account.stake.energy, account.stake.energy_num) = StakeInfo::pair("2000000000000000000");

        let value = serde_json::to_value(&account)?;
        assert_eq!(
            value,
            json!({
                "address": "erd1test",
                "balance": "10",
                "balanceNum": 0.0,
                "shardID": 0,
                "energy": "2000000000000000000",
                "energyNum": 2.0
            })
        );
        Ok(())
    }
}
