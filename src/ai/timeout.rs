//! Timeout Configuration
//!
//! Structured LLM calls are bounded individually; a whole QA run is bounded
//! separately since it fans out into one call per chapter. Streamed calls
//! bound the wait for each increment instead of the whole response.
//!
//! ```ignore
//! use crate::ai::timeout::{TimeoutConfig, with_timeout};
//!
//! let config = TimeoutConfig::default();
//! let result = with_timeout(config.llm_request, async { /* LLM call */ }, "LLM request").await?;
//! ```

use std::future::Future;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};

use crate::constants::network;
use crate::types::{BookError, Result};

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Single structured LLM request (default: 5 minutes)
    pub llm_request: Duration,
    /// Whole multi-call analysis run (default: 15 minutes)
    pub analysis_run: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::from_request_secs(network::DEFAULT_TIMEOUT_SECS)
    }
}

impl TimeoutConfig {
    /// Derive both bounds from the per-request timeout
    pub fn from_request_secs(secs: u64) -> Self {
        let llm_request = Duration::from_secs(secs);
        Self {
            llm_request,
            analysis_run: llm_request * network::ANALYSIS_RUN_MULTIPLIER,
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns `BookError::Timeout` if the operation doesn't complete in time.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(BookError::timeout(operation_name, timeout)),
    }
}

/// Bound the gap between consecutive items of `source`.
///
/// A stalled source yields one `BookError::Timeout` and then ends.
pub fn with_idle_timeout<T: Send + 'static>(
    source: BoxStream<'static, Result<T>>,
    idle: Duration,
    operation_name: &str,
) -> BoxStream<'static, Result<T>> {
    let operation_name = operation_name.to_string();
    futures::stream::unfold(Some(source), move |state| {
        let operation_name = operation_name.clone();
        async move {
            let mut source = state?;
            match tokio::time::timeout(idle, source.next()).await {
                Ok(Some(item)) => Some((item, Some(source))),
                Ok(None) => None,
                Err(_) => Some((Err(BookError::timeout(operation_name, idle)), None)),
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_defaults() {
        let config = TimeoutConfig::default();
        assert_eq!(config.llm_request.as_secs(), 300);
        assert_eq!(config.analysis_run.as_secs(), 900);
    }

    #[test]
    fn test_from_request_secs() {
        let config = TimeoutConfig::from_request_secs(10);
        assert_eq!(config.llm_request, Duration::from_secs(10));
        assert!(config.analysis_run > config.llm_request);
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, BookError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, BookError>(42)
            },
            "slow operation",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, BookError::Timeout { .. }));
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_ends_stalled_stream() {
        let source = futures::stream::iter(vec![Ok::<_, BookError>("first".to_string())])
            .chain(futures::stream::pending())
            .boxed();
        let items: Vec<_> = with_idle_timeout(source, Duration::from_secs(30), "draft stream")
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "first");
        assert!(matches!(items[1], Err(BookError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_resets_per_item() {
        let source = futures::stream::iter(0..3)
            .then(|i| async move {
                tokio::time::sleep(Duration::from_secs(20)).await;
                Ok::<_, BookError>(i)
            })
            .boxed();
        let items: Vec<_> = with_idle_timeout(source, Duration::from_secs(30), "slow stream")
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| item.is_ok()));
    }
}
