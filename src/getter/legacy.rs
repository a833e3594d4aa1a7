//! Legacy delegation contract

use super::{fan_out::fan_out, AccountsGetter};
use crate::{
    account::{AccountsMap, StakeInfo},
    balance::to_float,
    client::{
        rest::HttpApiClient,
        vm::{query_vm, VmQuery},
        Credentials,
    },
    config::LegacyDelegationSource,
    constants::{path_account_keys, FN_FULL_ACTIVE_LIST, FN_FULL_WAITING_LIST, FN_USER_STAKE_BY_TYPE},
    ledger::{legacy_delegation::LegacyDelegationState, StorageDump},
};
use num::{BigUint, Zero};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};

/// Pending withdrawals below this many tokens are ignored
const MIN_UNDELEGATED: f64 = 0.001;

impl AccountsGetter {
    pub(super) async fn legacy_delegators_accounts(&self) -> anyhow::Result<AccountsMap> {
        let contract = &self.general.delegation_legacy_contract_address;
        if contract.is_empty() {
            debug!("no legacy delegation contract configured");
            return Ok(AccountsMap::new());
        }

        match self.general.legacy_delegation_source {
            LegacyDelegationSource::VmQuery => self.legacy_from_vm_queries(contract).await,
            LegacyDelegationSource::Storage => self.legacy_from_storage(contract).await,
        }
    }

    async fn legacy_from_vm_queries(&self, contract: &str) -> anyhow::Result<AccountsMap> {
        let active = self.query(&VmQuery::new(contract, FN_FULL_ACTIVE_LIST)).await?;
        let active = self.address_amount_list(&active, 2)?;
        let waiting = self.query(&VmQuery::new(contract, FN_FULL_WAITING_LIST)).await?;
        let waiting = self.address_amount_list(&waiting, 3)?;

        let mut accounts = AccountsMap::new();
        for (address, amount) in accumulate(active) {
            let stake = &mut accounts.entry(address).or_default().stake;
            (stake.delegation_legacy_active, stake.delegation_legacy_active_num) =
                StakeInfo::pair(amount.to_string());
        }
        for (address, amount) in accumulate(waiting) {
            let stake = &mut accounts.entry(address).or_default().stake;
            (stake.delegation_legacy_waiting, stake.delegation_legacy_waiting_num) =
                StakeInfo::pair(amount.to_string());
        }
        info!(num = accounts.len(), "legacy delegators accounts");

        let api = Arc::clone(&self.api);
        let contract = contract.to_string();
        let credentials = self.credentials.clone();
        let converter = self.converter.clone();
        let undelegated = fan_out(accounts.keys().cloned().collect::<Vec<_>>(), self.max_parallel, move |address| {
            let api = Arc::clone(&api);
            let contract = contract.clone();
            let credentials = credentials.clone();
            let pubkey = converter.decode(&address);
            async move { user_undelegated_value(api.as_ref(), &contract, &credentials, &pubkey?).await }
        })
        .await?;

        for (address, value) in undelegated {
            if let Some(account) = accounts.get_mut(&address) {
                (account.stake.un_delegate_legacy, account.stake.un_delegate_legacy_num) =
                    StakeInfo::pair(value.to_string());
            }
        }

        Ok(accounts)
    }

    async fn legacy_from_storage(&self, contract: &str) -> anyhow::Result<AccountsMap> {
        let dump: StorageDump = self
            .api
            .get(&path_account_keys(contract), &self.credentials)
            .await?
            .into_data()?;

        let accounts = LegacyDelegationState::from_pairs(&dump.pairs, &self.converter).into_accounts();
        info!(num = accounts.len(), "legacy delegators accounts");
        Ok(accounts)
    }
}

/// Sums repeated addresses
fn accumulate(list: Vec<(String, BigUint)>) -> HashMap<String, BigUint> {
    let mut totals: HashMap<String, BigUint> = HashMap::new();
    for (address, amount) in list {
        *totals.entry(address).or_insert_with(BigUint::zero) += amount;
    }
    totals
}

/// Unstaked plus deferred payment of one user, entries 3 and 4 of
/// `getUserStakeByType`
async fn user_undelegated_value(
    api: &dyn HttpApiClient,
    contract: &str,
    credentials: &Credentials,
    pubkey: &[u8],
) -> anyhow::Result<BigUint> {
    let query = VmQuery::new(contract, FN_USER_STAKE_BY_TYPE).with_arg(pubkey);
    let return_data = query_vm(api, &query, credentials).await?;
    if return_data.len() < 5 {
        return Ok(BigUint::zero());
    }

    let value = BigUint::from_bytes_be(&return_data[3]) + BigUint::from_bytes_be(&return_data[4]);
    if to_float(&value.to_string()) < MIN_UNDELEGATED {
        return Ok(BigUint::zero());
    }
    Ok(value)
}
