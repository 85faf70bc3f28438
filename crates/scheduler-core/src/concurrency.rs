//! Deadline and retry-with-backoff helpers shared by the Lifecycle Manager
//! (spec.md §5/§7): every public operation runs under a deadline, and writes
//! on the completion path retry a bounded number of times before surfacing
//! `ConflictAborted`.

use crate::domain::CoreError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Default deadline for DB-bound operations (spec.md §5).
pub const DB_DEADLINE: Duration = Duration::from_secs(10);
/// Deadline for the session completion pipeline (spec.md §5).
pub const COMPLETION_DEADLINE: Duration = Duration::from_secs(30);

const MAX_RETRY_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Runs `fut` under `deadline`, mapping an elapsed timeout to `TimedOut`
/// rather than letting the underlying store operation run unbounded.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::TimedOut(deadline).into()),
    }
}

/// Retries `operation` up to `MAX_RETRY_ATTEMPTS` times with exponential
/// backoff starting at `INITIAL_BACKOFF`, surfacing `ConflictAborted` once
/// exhausted (spec.md §7). Intended for writes on the completion path that
/// can race with a concurrent writer for the same entity.
pub async fn retry_with_backoff<T, F, Fut>(reason: &str, mut operation: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut last_err = None;
    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_err = Some(err);
                if attempt < MAX_RETRY_ATTEMPTS {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
    Err(CoreError::ConflictAborted {
        attempts: MAX_RETRY_ATTEMPTS,
        reason: format!("{reason}: {}", last_err.expect("loop runs at least once")),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn with_deadline_surfaces_timed_out_on_elapsed() {
        let result: anyhow::Result<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err().downcast::<CoreError>().unwrap();
        assert!(matches!(err, CoreError::TimedOut(_)));
    }

    #[tokio::test]
    async fn retry_with_backoff_returns_first_success() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff("test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_with_backoff_surfaces_conflict_aborted_after_exhaustion() {
        let result: anyhow::Result<()> =
            retry_with_backoff("test", || async { Err(anyhow::anyhow!("write conflict")) }).await;

        let err = result.unwrap_err().downcast::<CoreError>().unwrap();
        assert!(matches!(err, CoreError::ConflictAborted { attempts: 3, .. }));
    }
}
