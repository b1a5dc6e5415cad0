//! Mock verification session for orchestrator tests.

use crate::verification::VerificationSession;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// One recorded verification call
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationCall {
    StartSession,
    StopSession,
    Loaded,
    ImpressionOccurred,
    Start { duration_ms: i64, volume: f32 },
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,
    Pause,
    Resume,
    VolumeChange(f32),
    BufferStart,
    BufferFinish,
    ClickInteraction,
}

/// Mock implementation of the `VerificationSession` trait; journals every
/// call in arrival order.
pub struct MockVerification {
    calls: RwLock<Vec<VerificationCall>>,
}

impl MockVerification {
    pub fn new() -> Self {
        Self {
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Every recorded call, oldest first
    pub async fn calls(&self) -> Vec<VerificationCall> {
        self.calls.read().await.clone()
    }

    pub async fn count(&self, call: &VerificationCall) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|recorded| *recorded == call)
            .count()
    }

    async fn record(&self, call: VerificationCall) {
        self.calls.write().await.push(call);
    }
}

impl Default for MockVerification {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerificationSession for MockVerification {
    async fn start_session(&self) {
        self.record(VerificationCall::StartSession).await;
    }

    async fn stop_session(&self) {
        self.record(VerificationCall::StopSession).await;
    }

    async fn loaded(&self) {
        self.record(VerificationCall::Loaded).await;
    }

    async fn impression_occurred(&self) {
        self.record(VerificationCall::ImpressionOccurred).await;
    }

    async fn start(&self, duration_ms: i64, volume: f32) {
        self.record(VerificationCall::Start {
            duration_ms,
            volume,
        })
        .await;
    }

    async fn first_quartile(&self) {
        self.record(VerificationCall::FirstQuartile).await;
    }

    async fn midpoint(&self) {
        self.record(VerificationCall::Midpoint).await;
    }

    async fn third_quartile(&self) {
        self.record(VerificationCall::ThirdQuartile).await;
    }

    async fn complete(&self) {
        self.record(VerificationCall::Complete).await;
    }

    async fn pause(&self) {
        self.record(VerificationCall::Pause).await;
    }

    async fn resume(&self) {
        self.record(VerificationCall::Resume).await;
    }

    async fn volume_change(&self, volume: f32) {
        self.record(VerificationCall::VolumeChange(volume)).await;
    }

    async fn buffer_start(&self) {
        self.record(VerificationCall::BufferStart).await;
    }

    async fn buffer_finish(&self) {
        self.record(VerificationCall::BufferFinish).await;
    }

    async fn click_interaction(&self) {
        self.record(VerificationCall::ClickInteraction).await;
    }
}
