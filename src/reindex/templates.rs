use anyhow::Context;
use std::path::Path;

/// Reads the mapping of `index` from `<dir>/<index>.json`
pub async fn read_index_template(dir: &Path, index: &str) -> anyhow::Result<Vec<u8>> {
    let path = dir.join(format!("{index}.json"));
    tokio::fs::read(&path)
        .await
        .with_context(|| format!("cannot read index template {}", path.display()))
}

/// Reads the lifecycle policy of `index` from `<dir>/<index>-policy.json`
pub async fn read_index_policy(dir: &Path, index: &str) -> anyhow::Result<Vec<u8>> {
    let path = dir.join(format!("{index}-policy.json"));
    tokio::fs::read(&path)
        .await
        .with_context(|| format!("cannot read index policy {}", path.display()))
}
