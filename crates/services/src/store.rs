use std::future::Future;
use std::time::Duration;

use storage::repository::StorageError;

use crate::error::StoreError;

/// Limits applied to every call into the progress/content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    pub timeout: Duration,
    /// Read-modify-write attempts before giving up on a contended record.
    pub write_attempts: u32,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            write_attempts: 3,
        }
    }
}

/// Run a store call under `policy.timeout`.
pub(crate) async fn guarded<T, F>(policy: StorePolicy, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(policy.timeout, call).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => {
            tracing::warn!(timeout = ?policy.timeout, "store call timed out");
            Err(StoreError::Timeout(policy.timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out_as_retryable() {
        let policy = StorePolicy {
            timeout: Duration::from_millis(50),
            write_attempts: 1,
        };
        let err = guarded(policy, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, StorageError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn storage_errors_pass_through() {
        let err = guarded(StorePolicy::default(), async {
            Err::<(), _>(StorageError::NotFound)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Storage(StorageError::NotFound)));
        assert!(!err.is_retryable());
    }
}
