//! Mock HTTP transport for beacon tests.

use crate::beacon::{HttpTransport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tokio::time::Instant;
use url::Url;

/// One recorded GET attempt
#[derive(Debug, Clone)]
pub struct Attempt {
    /// When the attempt was issued (tokio clock, so paused-time tests see
    /// deterministic values)
    pub at: Instant,

    /// The URL that was requested
    pub url: Url,
}

/// Mock implementation of the `HttpTransport` trait.
///
/// Responses are served from a script queue; once the queue drains, every
/// further attempt succeeds with HTTP 200. All attempts are journaled with
/// their request time for retry-timing assertions.
pub struct MockTransport {
    responses: RwLock<VecDeque<Result<u16, TransportError>>>,
    attempts: RwLock<Vec<Attempt>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(VecDeque::new()),
            attempts: RwLock::new(Vec::new()),
        }
    }

    /// Queue the outcomes the next attempts should observe, in order
    pub async fn script_responses<I>(&self, outcomes: I)
    where
        I: IntoIterator<Item = Result<u16, TransportError>>,
    {
        self.responses.write().await.extend(outcomes);
    }

    /// Every recorded attempt, oldest first
    pub async fn attempts(&self) -> Vec<Attempt> {
        self.attempts.read().await.clone()
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }

    /// Attempts whose URL path ends with `suffix`
    pub async fn attempts_to(&self, suffix: &str) -> usize {
        self.attempts
            .read()
            .await
            .iter()
            .filter(|attempt| attempt.url.path().ends_with(suffix))
            .count()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &Url) -> Result<u16, TransportError> {
        self.attempts.write().await.push(Attempt {
            at: Instant::now(),
            url: url.clone(),
        });
        self.responses.write().await.pop_front().unwrap_or(Ok(200))
    }
}
