use std::{fmt::Display, future::Future};

use tracing::warn;

/// Runs `operation` and, if it fails, runs it exactly one more time. Writes at shutdown must not
/// hang the host, so there is no backoff and no further attempt.
pub async fn retry_once<T, E, F, Fut>(name: &str, mut operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match operation().await {
        Ok(v) => Ok(v),
        Err(e) => {
            warn!("{name} failed, retrying once: {e}");
            operation().await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::retry_once;

    #[tokio::test]
    async fn test_retry_once_recovers() {
        let calls = AtomicUsize::new(0);
        let result: Result<usize, String> = retry_once("test", || async {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err("transient".to_string()),
                n => Ok(n),
            }
        })
        .await;
        assert_eq!(result, Ok(1));
    }

    #[tokio::test]
    async fn test_retry_once_gives_up_after_second_failure() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = retry_once("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("down".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
