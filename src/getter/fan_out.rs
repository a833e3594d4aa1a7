//! Bounded per-address lookups

use futures::future::join_all;
use num::{BigUint, Zero};
use std::{collections::HashMap, future::Future, sync::Arc};
use tokio::sync::{Mutex, Semaphore};

/// Runs `lookup` for every address, at most `max_parallel` at a time.
///
/// Every task is awaited before returning. If any lookup failed the first
/// recorded error is returned and the successful values are dropped. Zero
/// values are not kept.
pub async fn fan_out<F, Fut>(
    addresses: impl IntoIterator<Item = String>,
    max_parallel: usize,
    lookup: F,
) -> anyhow::Result<HashMap<String, BigUint>>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<BigUint>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let lookup = Arc::new(lookup);
    let values = Arc::new(Mutex::new(HashMap::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let mut handles = vec![];

    for address in addresses {
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        let lookup = Arc::clone(&lookup);
        let values = Arc::clone(&values);
        let errors = Arc::clone(&errors);

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            match lookup(address.clone()).await {
                Ok(value) if value.is_zero() => (),
                Ok(value) => {
                    values.lock().await.insert(address, value);
                }
                Err(e) => {
                    errors
                        .lock()
                        .await
                        .push(e.context(format!("lookup for {address} failed")));
                }
            }
        }));
    }

    for result in join_all(handles).await {
        result?;
    }

    let mut errors = std::mem::take(&mut *errors.lock().await);
    if !errors.is_empty() {
        return Err(errors.swap_remove(0));
    }

    let values = std::mem::take(&mut *values.lock().await);
    Ok(values)
}
