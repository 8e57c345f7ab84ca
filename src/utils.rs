//! Utility functions for the ladder coordinator

use crate::error::{LadderError, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Run a player store operation with an upper bound on its duration.
///
/// Store failures are wrapped as `LadderError::Store` unless they already
/// are a `LadderError`; an elapsed timeout becomes `LadderError::StoreTimeout`.
pub async fn with_store_timeout<T, F>(operation: &str, timeout: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            if e.downcast_ref::<LadderError>().is_some() {
                Err(e)
            } else {
                Err(LadderError::store(operation, e).into())
            }
        }
        Err(_) => Err(LadderError::StoreTimeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_match_id();
        let id2 = generate_match_id();
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn test_store_timeout_elapses() {
        let result: Result<()> = with_store_timeout("find", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let error = result.unwrap_err();
        let ladder_error = error.downcast_ref::<LadderError>().unwrap();
        assert!(matches!(ladder_error, LadderError::StoreTimeout { .. }));
    }

    #[tokio::test]
    async fn test_store_failure_is_wrapped() {
        let result: Result<()> = with_store_timeout("insert", Duration::from_secs(1), async {
            Err(anyhow::anyhow!("constraint failed"))
        })
        .await;

        let error = result.unwrap_err();
        assert!(error.downcast_ref::<LadderError>().unwrap().is_store_error());
    }

    #[tokio::test]
    async fn test_store_success_passes_through() {
        let value = with_store_timeout("count", Duration::from_secs(1), async { Ok(7usize) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
