use crate::helpers::{read_json, MemoryCluster, StaticApi};
use accounts_manager::{
    account::address::PubkeyConverter,
    client::{elastic::SearchIndexClient, Credentials},
    config::{GeneralConfig, LegacyDelegationSource},
    constants::{
        path_account_keys, ACCOUNTS_INDEX, PATH_DELEGATORS_STAKE, PATH_NETWORK_STATUS_META, PATH_VALIDATORS_STAKE,
        VALUES_INDEX,
    },
    getter::AccountsGetter,
    processor::{reindex::ReindexerDataProcessor, AccountsProcessor, DataProcessor},
    reindex::Reindexer,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

const LEGACY_CONTRACT: &str = "erd1qqqqqqqqqqqqqpgqxwakt2g7u9atsnr03gqcgmhcv38pt7mkd94q6shuwt";
const ENERGY_CONTRACT: &str = "erd1qqqqqqqqqqqqqpgq0tajepcazernwt74820t8ef7t28vjfgukp2sw239f3";

const LEGACY_STAKER: &str = "erd13wanstz0wmjv0ashn2760cl2a2l5y6gwz2lay270347ujshm9unsvt73fn";
const ENERGY_HOLDER: &str = "erd1yhhzgv5ql3h8gppy5286grre23vfgw68tnth7dmcl8ywpd9puluqlcvvw9";
const VALIDATOR: &str = "erd1qyu5wthldzr8wx5c9ucg8kjagg0jfs53s8nr3zpz3hypefsdd8ssycr6th";
const HOLDER: &str = "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx";
const UNSTAKED_LEGACY: &str = "erd1q5h0tjdkgl4pkn57qnljjgsamzvx548t5s02636wnynmtqmevv2q52lxdw";

fn api() -> anyhow::Result<StaticApi> {
    Ok(StaticApi::default()
        .with(PATH_NETWORK_STATUS_META, json!({ "status": { "erd_epoch_number": 2047 } }))
        .with(
            PATH_VALIDATORS_STAKE,
            json!({ "list": [{ "address": VALIDATOR, "staked": "2500000000000000000000", "topUp": "100000000000000000000" }] }),
        )
        .with(PATH_DELEGATORS_STAKE, json!({ "list": [] }))
        .with(&path_account_keys(LEGACY_CONTRACT), read_json("legacy_delegation_state_2_500")?)
        .with(&path_account_keys(ENERGY_CONTRACT), read_json("energy_storage.json")?["data"].clone()))
}

fn account_doc(address: &str, balance: &str) -> (String, Value) {
    (address.to_string(), json!({ "address": address, "balance": balance, "nonce": 1 }))
}

fn processor(
    api: StaticApi,
    source: Arc<MemoryCluster>,
    destination: Arc<MemoryCluster>,
    indices: &std::path::Path,
) -> anyhow::Result<ReindexerDataProcessor> {
    let api = Arc::new(api);
    let getter = AccountsGetter::new(
        api.clone(),
        source.clone(),
        Credentials::none(),
        GeneralConfig {
            delegation_legacy_contract_address: LEGACY_CONTRACT.into(),
            energy_contract_address: ENERGY_CONTRACT.into(),
            legacy_delegation_source: LegacyDelegationSource::Storage,
            ..Default::default()
        },
        PubkeyConverter::default(),
    );
    let destinations: Vec<Arc<dyn SearchIndexClient>> = vec![destination];

    Ok(ReindexerDataProcessor::new(
        AccountsProcessor::new(api, Credentials::none(), Arc::new(getter)),
        Reindexer::new(source, destinations, indices)?,
    ))
}

fn indices_dir() -> anyhow::Result<tempfile::TempDir> {
    let dir = tempfile::TempDir::with_prefix("indices")?;
    std::fs::write(dir.path().join("accounts.json"), br#"{"mappings":{"properties":{}}}"#)?;
    std::fs::write(dir.path().join("values.json"), br#"{"mappings":{}}"#)?;
    std::fs::write(dir.path().join("accounts-policy.json"), br#"{"policy":{"phases":{}}}"#)?;
    Ok(dir)
}

#[tokio::test]
async fn reindex_run_builds_dated_index() -> anyhow::Result<()> {
    let indices = indices_dir()?;
    let source = Arc::new(MemoryCluster::with_index(
        ACCOUNTS_INDEX,
        [
            account_doc(LEGACY_STAKER, "1000000000000000000"),
            account_doc(ENERGY_HOLDER, "0"),
            account_doc(VALIDATOR, "5000000000000000000"),
            account_doc(HOLDER, "42"),
        ],
    ));
    let destination = Arc::new(MemoryCluster::default());

    processor(api()?, source.clone(), destination.clone(), indices.path())?
        .process_accounts_data()
        .await?;

    // the four indexed documents plus stakers the live index does not know
    assert!(destination.count("accounts_2047") > 4);

    let staker = destination.doc("accounts_2047", LEGACY_STAKER).unwrap();
    assert_eq!(staker["delegationLegacyActive"], "323053985724926356758");
    assert_eq!(staker["balance"], "1000000000000000000");

    let validator = destination.doc("accounts_2047", VALIDATOR).unwrap();
    assert_eq!(validator["validatorsActive"], "2500000000000000000000");
    assert_eq!(validator["validatorsTopUp"], "100000000000000000000");
    assert_eq!(validator["totalStake"], "2600000000000000000000");
    assert_eq!(validator["totalBalanceWithStake"], "2605000000000000000000");

    let energy = destination.doc("accounts_2047", ENERGY_HOLDER).unwrap();
    assert_eq!(energy["energy"], "12625000000000000000000000");

    let holder = destination.doc("accounts_2047", HOLDER).unwrap();
    assert_eq!(holder["totalBalanceWithStake"], "42");
    assert_eq!(holder.get("totalStake"), None);

    let unstaked = destination.doc("accounts_2047", UNSTAKED_LEGACY).unwrap();
    assert_eq!(unstaked["address"], UNSTAKED_LEGACY);
    assert_eq!(unstaked["unDelegateLegacy"], "35000000000000000000");
    assert_eq!(unstaked.get("balance"), None);

    assert_eq!(
        destination.doc(VALUES_INDEX, "energy-snapshot-2047"),
        Some(json!({ "key": "energy-snapshot-2047", "value": "6d1a0b9b5c7d3e2f" }))
    );
    // the live index is left alone
    assert_eq!(source.count("accounts_2047"), 0);
    Ok(())
}

#[tokio::test]
async fn failing_source_publishes_nothing() -> anyhow::Result<()> {
    let indices = indices_dir()?;
    let source = Arc::new(MemoryCluster::with_index(ACCOUNTS_INDEX, [account_doc(HOLDER, "42")]));
    let destination = Arc::new(MemoryCluster::default());
    let mut api = api()?;
    api.gets.remove(PATH_DELEGATORS_STAKE);

    let result = processor(api, source, destination.clone(), indices.path())?
        .process_accounts_data()
        .await;

    assert!(result.is_err());
    assert!(!destination.index_exists("accounts_2047").await?);
    assert!(!destination.index_exists(VALUES_INDEX).await?);
    Ok(())
}
