//! Exponential-backoff retry for LLM transport calls: the final
//! attempt's error propagates to the caller.

use std::future::Future;
use std::time::Duration;

const BASE_BACKOFF_MS: u64 = 200;

pub async fn retry_with_backoff<F, Fut, T>(max_retries: u32, mut f: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= max_retries {
                    return Err(e);
                }
                let backoff = BASE_BACKOFF_MS * 2u64.pow(attempt);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(3, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    anyhow::bail!("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn final_failure_propagates() {
        let result: anyhow::Result<()> = retry_with_backoff(1, || async { anyhow::bail!("down") }).await;
        assert!(result.is_err());
    }
}
