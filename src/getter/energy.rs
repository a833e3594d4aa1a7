//! Energy factory contract

use super::AccountsGetter;
use crate::{
    account::{AccountsMap, BlockInfo},
    constants::path_account_keys,
    ledger::{energy::extract_accounts_with_energy, StorageDump},
};
use anyhow::Context;
use tracing::debug;

impl AccountsGetter {
    pub(super) async fn accounts_with_energy(
        &self,
        current_epoch: u32,
    ) -> anyhow::Result<(AccountsMap, Option<BlockInfo>)> {
        let contract = &self.general.energy_contract_address;
        if contract.is_empty() {
            debug!("no energy contract configured");
            return Ok((AccountsMap::new(), None));
        }

        let dump: StorageDump = self
            .api
            .get(&path_account_keys(contract), &self.credentials)
            .await?
            .into_data()
            .context("cannot get accounts with energy")?;

        let accounts = extract_accounts_with_energy(&dump.pairs, current_epoch, &self.converter);
        Ok((accounts, dump.block_info))
    }
}
