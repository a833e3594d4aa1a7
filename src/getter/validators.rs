//! Direct staking on the validators system contract

use super::{fan_out::fan_out, AccountsGetter};
use crate::{
    account::{AccountInfo, AccountsMap, StakeInfo},
    client::{
        rest::HttpApiClient,
        vm::{query_vm, VmQuery},
        Credentials,
    },
    constants::{FN_UNSTAKED_TOKENS_LIST, PATH_VALIDATORS_STAKE},
};
use num::{BigUint, Zero};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Item of `/network/direct-staked-info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectStakedInfo {
    pub address: String,
    #[serde(default)]
    pub staked: String,
    #[serde(default)]
    pub top_up: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectStakedList {
    #[serde(default)]
    pub list: Vec<DirectStakedInfo>,
}

impl DirectStakedList {
    pub fn into_accounts(self) -> AccountsMap {
        self.list
            .into_iter()
            .map(|info| {
                let mut account = AccountInfo::default();
                (account.stake.validators_active, account.stake.validators_active_num) =
                    StakeInfo::pair(info.staked);
                (account.stake.validators_top_up, account.stake.validators_top_up_num) =
                    StakeInfo::pair(info.top_up);
                (info.address, account)
            })
            .collect()
    }
}

impl AccountsGetter {
    pub(super) async fn validators_accounts(&self) -> anyhow::Result<AccountsMap> {
        let list: DirectStakedList = self
            .api
            .get(PATH_VALIDATORS_STAKE, &self.credentials)
            .await?
            .into_data()?;

        let mut accounts = list.into_accounts();
        info!(num = accounts.len(), "validators accounts");

        let contract = self.general.validators_contract.clone();
        if contract.is_empty() {
            return Ok(accounts);
        }

        let api = Arc::clone(&self.api);
        let credentials = self.credentials.clone();
        let converter = self.converter.clone();
        let undelegated = fan_out(accounts.keys().cloned().collect::<Vec<_>>(), self.max_parallel, move |address| {
            let api = Arc::clone(&api);
            let contract = contract.clone();
            let credentials = credentials.clone();
            let pubkey = converter.decode(&address);
            async move { unstaked_tokens(api.as_ref(), &contract, &credentials, &pubkey?).await }
        })
        .await?;

        for (address, value) in undelegated {
            if let Some(account) = accounts.get_mut(&address) {
                (account.stake.un_delegate_validator, account.stake.un_delegate_validator_num) =
                    StakeInfo::pair(value.to_string());
            }
        }

        Ok(accounts)
    }
}

/// `getUnStakedTokensList` answers `[value, nonce, value, nonce, ...]`
async fn unstaked_tokens(
    api: &dyn HttpApiClient,
    contract: &str,
    credentials: &Credentials,
    pubkey: &[u8],
) -> anyhow::Result<BigUint> {
    let query = VmQuery::new(contract, FN_UNSTAKED_TOKENS_LIST).with_arg(pubkey);
    let return_data = query_vm(api, &query, credentials).await?;

    Ok(return_data
        .iter()
        .step_by(2)
        .fold(BigUint::zero(), |total, value| total + BigUint::from_bytes_be(value)))
}
