//! Duplicating an index with retries
//!
//! A clone makes the source index read-only for its duration. When the
//! clone succeeded but the source could not be made writable again, the
//! unset is retried until it works. Other failures are retried a bounded
//! number of times, except a target that already exists.

use crate::{
    client::{elastic::IndexCloneClient, ClientError},
    constants::{CLONE_BACKOFF_MAX, CLONE_BACKOFF_START, CLONE_MAX_TRIES},
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ClonerError {
    /// The target index is already there, retrying cannot help
    #[error("cannot clone index, {index} already exists")]
    AlreadyExists { index: String },
    #[error("cannot clone index after {tries} tries: {source}")]
    TooManyTries {
        tries: u32,
        #[source]
        source: ClientError,
    },
}

/// Whether a clone failure means the target index exists already.
///
/// The search engine only reports this in the error body.
pub fn is_already_exists_error(message: &str, new_index: &str) -> bool {
    message.contains("resource_already_exists_exception") && message.contains(new_index)
}

/// Starts at `start`, grows by a fifth per step up to `max`
#[derive(Debug, Clone)]
struct Backoff {
    start: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(start: Duration, max: Duration) -> Self {
        Self {
            start,
            max,
            current: Duration::ZERO,
        }
    }

    fn next(&mut self) -> Duration {
        self.current = if self.current.is_zero() {
            self.start
        } else {
            (self.current + self.current / 5).min(self.max)
        };
        self.current
    }
}

pub struct Cloner {
    client: Arc<dyn IndexCloneClient>,
    backoff_start: Duration,
    backoff_max: Duration,
    max_tries: u32,
}

impl Cloner {
    pub fn new(client: Arc<dyn IndexCloneClient>) -> Self {
        Self {
            client,
            backoff_start: CLONE_BACKOFF_START,
            backoff_max: CLONE_BACKOFF_MAX,
            max_tries: CLONE_MAX_TRIES,
        }
    }

    pub fn with_backoff(mut self, start: Duration, max: Duration) -> Self {
        self.backoff_start = start;
        self.backoff_max = max;
        self
    }

    /// Clones `index` into `new_index`, then waits for the cluster and
    /// makes the new index writable
    pub async fn clone_index(&self, index: &str, new_index: &str) -> anyhow::Result<()> {
        let mut backoff = Backoff::new(self.backoff_start, self.backoff_max);
        let mut tries = 0;

        loop {
            let outcome = self.client.clone_index(index, new_index).await;
            let Some(error) = outcome.error else {
                break;
            };

            if outcome.cloned {
                warn!(index, error = %error, "index cloned but still read-only");
                while let Err(e) = self.client.unset_read_only(index).await {
                    let wait = backoff.next();
                    warn!(index, error = %e, backoff_secs = wait.as_secs_f64(), "cannot unset read-only");
                    tokio::time::sleep(wait).await;
                }
                break;
            }

            tries += 1;
            if tries == self.max_tries {
                return Err(ClonerError::TooManyTries {
                    tries,
                    source: error,
                }
                .into());
            }
            if is_already_exists_error(&error.to_string(), new_index) {
                return Err(ClonerError::AlreadyExists {
                    index: new_index.into(),
                }
                .into());
            }

            let wait = backoff.next();
            warn!(index, tries, error = %error, backoff_secs = wait.as_secs_f64(), "cannot clone index");
            tokio::time::sleep(wait).await;
        }

        info!(index, new_index, "index cloned");
        self.client.wait_yellow_status().await?;
        self.client.unset_read_only(new_index).await?;
        Ok(())
    }
}
