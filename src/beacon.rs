//! Fire-and-forget tracking beacon delivery.
//!
//! Each beacon is an independent HTTP GET with bounded retry and exponential
//! backoff, spawned off the control timeline. Outcomes are logged, never
//! surfaced: telemetry must not interrupt playback.

use crate::error::{AdError, Result};
use crate::fetch::request_id;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use url::Url;

/// Transport-level failure (connection refused, timeout, DNS, ...)
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The async GET surface the dispatcher needs from an HTTP client
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET and report the response status code
    async fn get(&self, url: &Url) -> std::result::Result<u16, TransportError>;
}

/// Dispatcher tuning knobs
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Total attempts per beacon, retries included
    pub max_attempts: u32,

    /// User-Agent header attached to every beacon request
    pub user_agent: String,

    /// Timeout for a single request attempt
    pub request_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Real transport backed by reqwest
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &DispatcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AdError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> std::result::Result<u16, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// Dispatches tracking beacons without blocking or failing the caller
#[derive(Clone)]
pub struct BeaconDispatcher {
    transport: Arc<dyn HttpTransport>,
    max_attempts: u32,
    cancel_tx: broadcast::Sender<()>,
}

impl BeaconDispatcher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &DispatcherConfig) -> Self {
        let (cancel_tx, _) = broadcast::channel(1);
        Self {
            transport,
            max_attempts: config.max_attempts.max(1),
            cancel_tx,
        }
    }

    /// Fire a beacon. Returns immediately; delivery, retries, and logging
    /// happen on a spawned task.
    pub fn dispatch(&self, url: &Url, event: &str) {
        let transport = Arc::clone(&self.transport);
        let url = url.clone();
        let event = event.to_string();
        let max_attempts = self.max_attempts;
        let cancel_rx = self.cancel_tx.subscribe();

        tokio::spawn(async move {
            deliver(transport, url, event, max_attempts, cancel_rx).await;
        });
    }

    /// Deliver a beacon inline, awaiting the outcome. Same retry policy as
    /// `dispatch`; used where the caller wants to wait (e.g. the CLI).
    pub async fn deliver(&self, url: &Url, event: &str) {
        let cancel_rx = self.cancel_tx.subscribe();
        deliver(
            Arc::clone(&self.transport),
            url.clone(),
            event.to_string(),
            self.max_attempts,
            cancel_rx,
        )
        .await;
    }

    /// Abort all in-flight attempts and suppress pending retries. Silent by
    /// design: nothing is surfaced to tasks that were cancelled.
    pub fn cancel_all(&self) {
        let _ = self.cancel_tx.send(());
    }
}

async fn deliver(
    transport: Arc<dyn HttpTransport>,
    url: Url,
    event: String,
    max_attempts: u32,
    mut cancel_rx: broadcast::Receiver<()>,
) {
    let req_id = request_id();

    for attempt in 1..=max_attempts {
        let outcome = tokio::select! {
            outcome = transport.get(&url) => outcome,
            _ = cancel_rx.recv() => {
                log::debug!("[{req_id}] {event} beacon cancelled in flight");
                return;
            }
        };

        match outcome {
            Ok(status) if (200..300).contains(&status) => {
                log::debug!("[{req_id}] {event} beacon delivered (HTTP {status}, attempt {attempt})");
                return;
            }
            Ok(status) if retryable_status(status) => {
                log::warn!("[{req_id}] {event} beacon got HTTP {status} (attempt {attempt})");
            }
            Ok(status) => {
                log::warn!("[{req_id}] {event} beacon failed permanently with HTTP {status}");
                return;
            }
            Err(e) => {
                log::warn!("[{req_id}] {event} beacon transport failure (attempt {attempt}): {e}");
            }
        }

        if attempt == max_attempts {
            log::warn!("[{req_id}] {event} beacon gave up after {max_attempts} attempts");
            return;
        }

        let delay = Duration::from_secs(1u64 << (attempt - 1));
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_rx.recv() => {
                log::debug!("[{req_id}] {event} beacon retry cancelled");
                return;
            }
        }
    }
}

/// Network-level failures and 5xx/408/429 responses are worth retrying;
/// other status codes fail permanently after one attempt.
fn retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}
