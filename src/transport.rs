//! # Transport boundary
//!
//! Posting is external; the core supplies already-composed, already-gated
//! text. `RetryingPoster` adds the single-retry-with-jitter policy for
//! transient failures; everything else surfaces to the caller and the batch
//! moves on.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::compose::media::MediaPreview;

/// Transport-level failure classes. Only the transient ones are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    RateLimited,
    Network(String),
    Timeout,
    Http(u16),
    Other(String),
}

impl TransportError {
    /// Rate limit, network and timeout (plus HTTP 429) earn one retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::RateLimited
                | TransportError::Network(_)
                | TransportError::Timeout
                | TransportError::Http(429)
        )
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::RateLimited => write!(f, "rate limited"),
            TransportError::Network(e) => write!(f, "network error: {e}"),
            TransportError::Timeout => write!(f, "timeout"),
            TransportError::Http(code) => write!(f, "http {code}"),
            TransportError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Posting collaborator. Returns an opaque message id.
#[async_trait::async_trait]
pub trait Poster: Send + Sync {
    async fn post(
        &self,
        text: &str,
        media: Option<&MediaPreview>,
    ) -> Result<String, TransportError>;
    async fn post_reply(
        &self,
        text: &str,
        in_reply_to: &str,
    ) -> Result<String, TransportError>;
}

/// Wraps any poster with a single retry (plus jitter) on transient errors.
pub struct RetryingPoster<P> {
    inner: P,
    base_delay: Duration,
}

impl<P: Poster> RetryingPoster<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            base_delay: Duration::from_millis(800),
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    async fn backoff(&self) {
        let jitter_ms = rand::rng().random_range(0..400u64);
        tokio::time::sleep(self.base_delay + Duration::from_millis(jitter_ms)).await;
    }
}

#[async_trait::async_trait]
impl<P: Poster> Poster for RetryingPoster<P> {
    async fn post(
        &self,
        text: &str,
        media: Option<&MediaPreview>,
    ) -> Result<String, TransportError> {
        match self.inner.post(text, media).await {
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "transient post error, retrying once");
                self.backoff().await;
                self.inner.post(text, media).await
            }
            other => other,
        }
    }

    async fn post_reply(
        &self,
        text: &str,
        in_reply_to: &str,
    ) -> Result<String, TransportError> {
        match self.inner.post_reply(text, in_reply_to).await {
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "transient reply error, retrying once");
                self.backoff().await;
                self.inner.post_reply(text, in_reply_to).await
            }
            other => other,
        }
    }
}

/// Logs instead of posting; useful for dry runs and the default binary.
pub struct LogPoster;

#[async_trait::async_trait]
impl Poster for LogPoster {
    async fn post(
        &self,
        text: &str,
        _media: Option<&MediaPreview>,
    ) -> Result<String, TransportError> {
        tracing::info!(len = text.chars().count(), "dry-run post: {text}");
        Ok(format!("dry-{}", crate::ingest::types::item_id(text)))
    }

    async fn post_reply(
        &self,
        text: &str,
        in_reply_to: &str,
    ) -> Result<String, TransportError> {
        tracing::info!(in_reply_to, "dry-run reply: {text}");
        Ok(format!("dry-{}", crate::ingest::types::item_id(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyPoster {
        calls: Arc<AtomicU32>,
        fail_first_with: TransportError,
    }

    #[async_trait::async_trait]
    impl Poster for FlakyPoster {
        async fn post(
            &self,
            _text: &str,
            _media: Option<&MediaPreview>,
        ) -> Result<String, TransportError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(self.fail_first_with.clone())
            } else {
                Ok("id-1".into())
            }
        }

        async fn post_reply(
            &self,
            _text: &str,
            _in_reply_to: &str,
        ) -> Result<String, TransportError> {
            Ok("id-2".into())
        }
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let poster = RetryingPoster::new(FlakyPoster {
            calls: calls.clone(),
            fail_first_with: TransportError::RateLimited,
        })
        .with_base_delay(Duration::from_millis(1));
        let id = poster.post("hello", None).await.unwrap();
        assert_eq!(id, "id-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let poster = RetryingPoster::new(FlakyPoster {
            calls: calls.clone(),
            fail_first_with: TransportError::Http(403),
        })
        .with_base_delay(Duration::from_millis(1));
        assert!(poster.post("hello", None).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transient_classification() {
        assert!(TransportError::RateLimited.is_transient());
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::Http(429).is_transient());
        assert!(!TransportError::Http(500).is_transient());
        assert!(!TransportError::Other("boom".into()).is_transient());
    }
}
