//! Locked MEX staking contract

use super::AccountsGetter;
use crate::{
    account::{AccountsMap, StakeInfo},
    client::vm::VmQuery,
    constants::FN_LKMEX_SNAPSHOT,
};
use tracing::{debug, info};

impl AccountsGetter {
    pub(super) async fn lkmex_stake_accounts(&self) -> anyhow::Result<AccountsMap> {
        let contract = &self.general.lkmex_staking_contract_address;
        if contract.is_empty() {
            debug!("no lkmex staking contract configured");
            return Ok(AccountsMap::new());
        }

        let return_data = self.query(&VmQuery::new(contract, FN_LKMEX_SNAPSHOT)).await?;

        let mut accounts = AccountsMap::new();
        for (address, staked) in self.address_amount_list(&return_data, 2)? {
            let stake = &mut accounts.entry(address).or_default().stake;
            (stake.lkmex_stake, stake.lkmex_stake_num) = StakeInfo::pair(staked.to_string());
        }

        info!(num = accounts.len(), "staked lkmex accounts");
        Ok(accounts)
    }
}
