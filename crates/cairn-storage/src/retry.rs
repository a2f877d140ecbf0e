use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Backoff parameters for retried backend construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    6
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    120_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Retry a closure on transient [`StorageError`]s with exponential backoff
/// + jitter.
///
/// Only used for backend construction: provider clients may validate
/// credentials over the network, and those calls can fail transiently.
/// Everything past construction propagates errors to the caller.
pub fn retry_transient<T>(
    config: &RetryConfig,
    op_name: &str,
    f: impl Fn() -> Result<T>,
) -> Result<T> {
    let mut delay_ms = config.retry_delay_ms;
    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let jitter = rand::random::<u64>() % delay_ms.max(1);
            std::thread::sleep(Duration::from_millis(delay_ms + jitter));
            delay_ms = (delay_ms * 2).min(config.retry_max_delay_ms);
        }
        match f() {
            Ok(val) => return Ok(val),
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                tracing::warn!(
                    "{op_name}: transient error (attempt {}/{}), retrying: {e}",
                    attempt + 1,
                    config.max_retries,
                );
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| StorageError::Config(format!("{op_name}: retries exhausted"))))
}
