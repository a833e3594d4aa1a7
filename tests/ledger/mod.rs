use crate::helpers::read_json;
use accounts_manager::{
    account::address::PubkeyConverter,
    ledger::{energy::extract_accounts_with_energy, legacy_delegation::LegacyDelegationState, StorageDump},
};
use pretty_assertions::assert_eq;

#[test]
fn legacy_delegation_state_dump() -> anyhow::Result<()> {
    let dump: StorageDump = serde_json::from_value(read_json("legacy_delegation_state_2_500")?)?;

    let accounts = LegacyDelegationState::from_pairs(&dump.pairs, &PubkeyConverter::default()).into_accounts();

    let active = &accounts["erd13wanstz0wmjv0ashn2760cl2a2l5y6gwz2lay270347ujshm9unsvt73fn"];
    assert_eq!(active.stake.delegation_legacy_active, "323053985724926356758");

    let unstaked = &accounts["erd1q5h0tjdkgl4pkn57qnljjgsamzvx548t5s02636wnynmtqmevv2q52lxdw"];
    assert_eq!(unstaked.stake.un_delegate_legacy, "35000000000000000000");
    Ok(())
}

#[test]
fn energy_storage_dump() -> anyhow::Result<()> {
    let dump: StorageDump = serde_json::from_value(read_json("energy_storage.json")?["data"].clone())?;

    let accounts = extract_accounts_with_energy(&dump.pairs, 2047, &PubkeyConverter::default());

    // the malformed entry is skipped
    assert_eq!(accounts.len(), 4);
    let account = &accounts["erd1yhhzgv5ql3h8gppy5286grre23vfgw68tnth7dmcl8ywpd9puluqlcvvw9"];
    assert_eq!(account.stake.energy, "12625000000000000000000000");
    assert_eq!(dump.block_info.map(|info| info.nonce), Some(16012345));
    Ok(())
}
