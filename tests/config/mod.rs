use accounts_manager::config::{Config, LegacyDelegationSource, ProcessorKind};
use std::path::PathBuf;

#[test]
fn shipped_config_is_valid_for_every_kind() -> anyhow::Result<()> {
    let config = Config::load(&PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/config.yaml"))?;

    assert_eq!(config.general.legacy_delegation_source, LegacyDelegationSource::VmQuery);
    assert_eq!(config.address_pubkey_converter.hrp, "erd");
    for kind in [ProcessorKind::Reindex, ProcessorKind::Clone, ProcessorKind::Snapshot] {
        config.validate(kind)?;
    }
    Ok(())
}

#[test]
fn shipped_index_templates_are_json() -> anyhow::Result<()> {
    let indices = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/indices");
    for name in ["accounts.json", "values.json"] {
        let template: serde_json::Value = serde_json::from_slice(&std::fs::read(indices.join(name))?)?;
        assert!(template["mappings"]["properties"].is_object(), "{name}");
    }

    let policy: serde_json::Value = serde_json::from_slice(&std::fs::read(indices.join("accounts-policy.json"))?)?;
    assert!(policy["policy"]["phases"].is_object());
    Ok(())
}
