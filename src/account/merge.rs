//! Combining partial stake views into one record per address

use super::{AccountInfo, AccountsMap, StakeInfo};
use crate::balance::sum_balances;
use std::collections::{hash_map::Entry, HashMap, HashSet};

/// Upstream views of stake, declared in merge order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StakeSource {
    LegacyDelegation,
    Validators,
    Delegators,
    LkMex,
    Energy,
}

impl StakeSource {
    pub const MERGE_ORDER: [StakeSource; 5] = [
        StakeSource::LegacyDelegation,
        StakeSource::Validators,
        StakeSource::Delegators,
        StakeSource::LkMex,
        StakeSource::Energy,
    ];

    /// Copies the fields this source is authoritative for
    pub fn copy_owned_fields(&self, from: &StakeInfo, to: &mut StakeInfo) {
        match self {
            StakeSource::LegacyDelegation => {
                to.delegation_legacy_active = from.delegation_legacy_active.clone();
                to.delegation_legacy_active_num = from.delegation_legacy_active_num;
                to.delegation_legacy_waiting = from.delegation_legacy_waiting.clone();
                to.delegation_legacy_waiting_num = from.delegation_legacy_waiting_num;
                to.un_delegate_legacy = from.un_delegate_legacy.clone();
                to.un_delegate_legacy_num = from.un_delegate_legacy_num;
            }
            StakeSource::Validators => {
                to.validators_active = from.validators_active.clone();
                to.validators_active_num = from.validators_active_num;
                to.validators_top_up = from.validators_top_up.clone();
                to.validators_top_up_num = from.validators_top_up_num;
                to.un_delegate_validator = from.un_delegate_validator.clone();
                to.un_delegate_validator_num = from.un_delegate_validator_num;
            }
            StakeSource::Delegators => {
                to.delegation = from.delegation.clone();
                to.delegation_num = from.delegation_num;
                to.un_delegate_delegation = from.un_delegate_delegation.clone();
                to.un_delegate_delegation_num = from.un_delegate_delegation_num;
            }
            StakeSource::LkMex => {
                to.lkmex_stake = from.lkmex_stake.clone();
                to.lkmex_stake_num = from.lkmex_stake_num;
            }
            StakeSource::Energy => {
                to.energy = from.energy.clone();
                to.energy_num = from.energy_num;
                to.energy_details = from.energy_details.clone();
            }
        }
    }
}

/// Accumulates source maps. The first source mentioning an address creates
/// its record, later sources only set the fields they own.
#[derive(Debug, Default)]
pub struct AccountsMerger {
    accounts: AccountsMap,
    addresses: Vec<String>,
}

impl AccountsMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, source: StakeSource, incoming: AccountsMap) {
        for (address, account) in incoming {
            match self.accounts.entry(address) {
                Entry::Vacant(entry) => {
                    self.addresses.push(entry.key().clone());
                    entry.insert(account);
                }
                Entry::Occupied(mut entry) => {
                    source.copy_owned_fields(&account.stake, &mut entry.get_mut().stake);
                }
            }
        }
    }

    /// Computes totals for every record and hands out the result
    pub fn finish(mut self) -> (AccountsMap, Vec<String>) {
        compute_totals(&mut self.accounts);
        (self.accounts, self.addresses)
    }
}

/// Merges source maps in the given order, then computes totals
pub fn merge_accounts(
    sources: impl IntoIterator<Item = (StakeSource, AccountsMap)>,
) -> (AccountsMap, Vec<String>) {
    let mut merger = AccountsMerger::new();
    for (source, accounts) in sources {
        merger.merge(source, accounts);
    }
    merger.finish()
}

/// `TotalStake` and `TotalUnDelegate` for every account
pub fn compute_totals(accounts: &mut AccountsMap) {
    for account in accounts.values_mut() {
        compute_stake_totals(&mut account.stake);
    }
}

pub fn compute_stake_totals(stake: &mut StakeInfo) {
    (stake.total_stake, stake.total_stake_num) = sum_balances(&[
        stake.delegation_legacy_waiting.as_str(),
        stake.delegation_legacy_active.as_str(),
        stake.validators_active.as_str(),
        stake.validators_top_up.as_str(),
        stake.delegation.as_str(),
    ]);
    (stake.total_un_delegate, stake.total_un_delegate_num) = sum_balances(&[
        stake.un_delegate_legacy.as_str(),
        stake.un_delegate_validator.as_str(),
        stake.un_delegate_delegation.as_str(),
    ]);
}

/// Combines an indexed document with the rest snapshot record of the same
/// address: stake is replaced wholesale, balance kept verbatim.
pub fn merge_with_rest(mut doc: AccountInfo, rest: Option<&AccountInfo>) -> AccountInfo {
    let (total, total_num) = match rest {
        Some(rest) => {
            doc.stake = rest.stake.clone();
            sum_balances(&[doc.balance.as_str(), rest.stake.total_stake.as_str()])
        }
        None => sum_balances(&[doc.balance.as_str()]),
    };

    doc.total_balance_with_stake = total;
    doc.total_balance_with_stake_num = total_num;
    doc
}

/// Merges indexed documents with the rest snapshot. Rest addresses missing
/// from the index get a fresh record holding only stake.
pub fn merge_elastic_and_rest(accounts_es: AccountsMap, accounts_rest: &AccountsMap) -> AccountsMap {
    let seen: HashSet<String> = accounts_es.keys().cloned().collect();
    let mut merged = merge_page(accounts_es, accounts_rest);
    merged.extend(rest_only_accounts(accounts_rest, &seen));
    merged
}

/// Merges one scroll page with the rest snapshot, only the page documents
pub fn merge_page(page: HashMap<String, AccountInfo>, accounts_rest: &AccountsMap) -> AccountsMap {
    page.into_iter()
        .map(|(id, doc)| {
            let rest = accounts_rest.get(&id);
            (id, merge_with_rest(doc, rest))
        })
        .collect()
}

/// Rest accounts whose address is not in `seen`, as records holding only
/// stake
pub fn rest_only_accounts(accounts_rest: &AccountsMap, seen: &HashSet<String>) -> AccountsMap {
    accounts_rest
        .iter()
        .filter(|(address, _)| !seen.contains(*address))
        .map(|(address, rest)| {
            let doc = AccountInfo {
                address: address.clone(),
                ..Default::default()
            };
            (address.clone(), merge_with_rest(doc, Some(rest)))
        })
        .collect()
}
