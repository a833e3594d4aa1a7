//! Fetching partial stake views from the chain API and the search engine
//!
//! Each fetcher returns only the fields its source is authoritative for.
//! [`crate::account::merge`] combines them.

pub mod delegators;
pub mod energy;
pub mod fan_out;
pub mod legacy;
pub mod lkmex;
pub mod validators;

use crate::{
    account::{address::PubkeyConverter, AccountsMap, BlockInfo},
    client::{
        elastic::SearchIndexClient,
        rest::HttpApiClient,
        vm::{query_vm, VmQuery},
        Credentials,
    },
    config::GeneralConfig,
};
use anyhow::Context;
use async_trait::async_trait;
use num::BigUint;
use std::{sync::Arc, time::Instant};
use tracing::info;

/// The five primary stake views
#[async_trait]
pub trait AccountsSource: Send + Sync {
    async fn get_legacy_delegators_accounts(&self) -> anyhow::Result<AccountsMap>;

    async fn get_validators_accounts(&self) -> anyhow::Result<AccountsMap>;

    async fn get_delegators_accounts(&self) -> anyhow::Result<AccountsMap>;

    async fn get_lkmex_stake_accounts(&self) -> anyhow::Result<AccountsMap>;

    /// Also returns the block the energy storage was read at
    async fn get_accounts_with_energy(
        &self,
        current_epoch: u32,
    ) -> anyhow::Result<(AccountsMap, Option<BlockInfo>)>;
}

pub struct AccountsGetter {
    api: Arc<dyn HttpApiClient>,
    elastic: Arc<dyn SearchIndexClient>,
    credentials: Credentials,
    general: GeneralConfig,
    converter: PubkeyConverter,
    max_parallel: usize,
}

impl AccountsGetter {
    pub fn new(
        api: Arc<dyn HttpApiClient>,
        elastic: Arc<dyn SearchIndexClient>,
        credentials: Credentials,
        general: GeneralConfig,
        converter: PubkeyConverter,
    ) -> Self {
        Self {
            api,
            elastic,
            credentials,
            general,
            converter,
            max_parallel: crate::constants::MAX_PARALLEL_REQUESTS,
        }
    }

    /// Limit of concurrent per-address lookups
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    async fn query(&self, query: &VmQuery) -> anyhow::Result<Vec<Vec<u8>>> {
        query_vm(self.api.as_ref(), query, &self.credentials)
            .await
            .with_context(|| format!("{} on {}", query.func_name, query.sc_address))
    }

    /// Decodes `[address, amount, ...]` return data with the given stride
    fn address_amount_list(
        &self,
        return_data: &[Vec<u8>],
        step: usize,
    ) -> anyhow::Result<Vec<(String, BigUint)>> {
        return_data
            .chunks(step)
            .filter(|chunk| chunk.len() >= 2)
            .map(|chunk| {
                let address = self.converter.encode(&chunk[0])?;
                Ok((address, BigUint::from_bytes_be(&chunk[1])))
            })
            .collect()
    }
}

#[async_trait]
impl AccountsSource for AccountsGetter {
    async fn get_legacy_delegators_accounts(&self) -> anyhow::Result<AccountsMap> {
        let started = Instant::now();
        let accounts = self.legacy_delegators_accounts().await?;
        info!(
            duration_secs = started.elapsed().as_secs_f64(),
            "fetched accounts from legacy delegation contract"
        );
        Ok(accounts)
    }

    async fn get_validators_accounts(&self) -> anyhow::Result<AccountsMap> {
        let started = Instant::now();
        let accounts = self.validators_accounts().await?;
        info!(
            duration_secs = started.elapsed().as_secs_f64(),
            "fetched accounts from validators contract"
        );
        Ok(accounts)
    }

    async fn get_delegators_accounts(&self) -> anyhow::Result<AccountsMap> {
        let started = Instant::now();
        let accounts = self.delegators_accounts().await?;
        info!(
            duration_secs = started.elapsed().as_secs_f64(),
            "fetched accounts from delegation manager contracts"
        );
        Ok(accounts)
    }

    async fn get_lkmex_stake_accounts(&self) -> anyhow::Result<AccountsMap> {
        let started = Instant::now();
        let accounts = self.lkmex_stake_accounts().await?;
        info!(
            duration_secs = started.elapsed().as_secs_f64(),
            "fetched accounts from lkmex staking contract"
        );
        Ok(accounts)
    }

    async fn get_accounts_with_energy(
        &self,
        current_epoch: u32,
    ) -> anyhow::Result<(AccountsMap, Option<BlockInfo>)> {
        let started = Instant::now();
        let result = self.accounts_with_energy(current_epoch).await?;
        info!(
            duration_secs = started.elapsed().as_secs_f64(),
            "fetched accounts from energy contract"
        );
        Ok(result)
    }
}
