//! Staking providers

use super::AccountsGetter;
use crate::{
    account::{AccountInfo, AccountsMap, StakeInfo},
    balance::parse,
    client::elastic::ScrollPageHandler,
    constants::{DELEGATORS_INDEX, PATH_DELEGATORS_STAKE},
};
use anyhow::Context;
use async_trait::async_trait;
use num::{BigInt, Zero};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Item of `/network/delegated-info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatorStake {
    pub delegator_address: String,
    #[serde(default)]
    pub total: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DelegatorStakeList {
    #[serde(default)]
    pub list: Vec<DelegatorStake>,
}

impl DelegatorStakeList {
    pub fn into_accounts(self) -> AccountsMap {
        self.list
            .into_iter()
            .map(|info| {
                let mut account = AccountInfo::default();
                (account.stake.delegation, account.stake.delegation_num) = StakeInfo::pair(info.total);
                (info.delegator_address, account)
            })
            .collect()
    }
}

/// Delegator documents with pending withdrawals
pub fn undelegate_info_query() -> Value {
    json!({
        "query": {
            "bool": {
                "must": [
                    { "exists": { "field": "unDelegateInfo" } }
                ]
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct DelegatorsPage {
    hits: DelegatorHits,
}

#[derive(Debug, Default, Deserialize)]
struct DelegatorHits {
    #[serde(default)]
    hits: Vec<DelegatorHit>,
}

#[derive(Debug, Deserialize)]
struct DelegatorHit {
    #[serde(rename = "_source")]
    source: DelegatorDoc,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelegatorDoc {
    #[serde(default)]
    address: String,
    #[serde(default, rename = "unDelegateInfo")]
    un_delegate_info: Vec<UnDelegateEntry>,
}

#[derive(Debug, Deserialize)]
struct UnDelegateEntry {
    #[serde(default)]
    value: String,
}

/// Adds the pending withdrawals of each page to the delegators already known
struct UnDelegateInfoCollector<'a> {
    accounts: &'a mut AccountsMap,
}

#[async_trait]
impl ScrollPageHandler for UnDelegateInfoCollector<'_> {
    async fn handle_page(&mut self, page: &[u8]) -> anyhow::Result<()> {
        let page: DelegatorsPage = serde_json::from_slice(page).context("delegators page")?;
        for hit in page.hits.hits {
            let Some(account) = self.accounts.get_mut(&hit.source.address) else {
                continue;
            };

            let mut undelegated = BigInt::zero();
            for entry in &hit.source.un_delegate_info {
                match parse(&entry.value) {
                    Some(value) => undelegated += value,
                    None => warn!(address = %hit.source.address, value = %entry.value, "cannot parse undelegated value"),
                }
            }
            add_undelegated(&mut account.stake, undelegated);
        }
        Ok(())
    }
}

/// One delegator has a document per staking provider, values add up
fn add_undelegated(stake: &mut StakeInfo, value: BigInt) {
    let total = if stake.un_delegate_delegation.is_empty() {
        value
    } else {
        match parse(&stake.un_delegate_delegation) {
            Some(current) => current + value,
            None => {
                warn!(value = %stake.un_delegate_delegation, "cannot parse undelegated value");
                return;
            }
        }
    };
    (stake.un_delegate_delegation, stake.un_delegate_delegation_num) = StakeInfo::pair(total.to_string());
}

impl AccountsGetter {
    pub(super) async fn delegators_accounts(&self) -> anyhow::Result<AccountsMap> {
        let list: DelegatorStakeList = self
            .api
            .get(PATH_DELEGATORS_STAKE, &self.credentials)
            .await?
            .into_data()
            .context("cannot get delegators accounts")?;

        let mut accounts = list.into_accounts();
        info!(num = accounts.len(), "delegators accounts");

        let mut collector = UnDelegateInfoCollector {
            accounts: &mut accounts,
        };
        self.elastic
            .scroll_all_documents(DELEGATORS_INDEX, &undelegate_info_query(), &mut collector)
            .await?;

        Ok(accounts)
    }
}
