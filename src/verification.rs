//! Ad verification session gateway.
//!
//! Mirrors the event surface of an Open Measurement style SDK: session
//! lifecycle, ad lifecycle, and media events. The real SDK binding lives
//! outside this crate; a logging stub stands in when none is attached.

use async_trait::async_trait;

/// Lifecycle and media events consumed by an ad verification session
#[async_trait]
pub trait VerificationSession: Send + Sync {
    async fn start_session(&self);

    async fn stop_session(&self);

    /// Creative loaded and ready to show
    async fn loaded(&self);

    async fn impression_occurred(&self);

    /// Playback started. Duration is reported in milliseconds — a preserved
    /// legacy contract; downstream measurement expects it that way.
    async fn start(&self, duration_ms: i64, volume: f32);

    async fn first_quartile(&self);

    async fn midpoint(&self);

    async fn third_quartile(&self);

    async fn complete(&self);

    async fn pause(&self);

    async fn resume(&self);

    async fn volume_change(&self, volume: f32);

    async fn buffer_start(&self);

    async fn buffer_finish(&self);

    async fn click_interaction(&self);
}

/// Logging stub selected when no verification SDK is attached
pub struct LoggingVerification;

#[async_trait]
impl VerificationSession for LoggingVerification {
    async fn start_session(&self) {
        log::debug!("verification: start session");
    }

    async fn stop_session(&self) {
        log::debug!("verification: stop session");
    }

    async fn loaded(&self) {
        log::debug!("verification: loaded");
    }

    async fn impression_occurred(&self) {
        log::debug!("verification: impression occurred");
    }

    async fn start(&self, duration_ms: i64, volume: f32) {
        log::debug!("verification: start (duration {duration_ms}ms, volume {volume})");
    }

    async fn first_quartile(&self) {
        log::debug!("verification: first quartile");
    }

    async fn midpoint(&self) {
        log::debug!("verification: midpoint");
    }

    async fn third_quartile(&self) {
        log::debug!("verification: third quartile");
    }

    async fn complete(&self) {
        log::debug!("verification: complete");
    }

    async fn pause(&self) {
        log::debug!("verification: pause");
    }

    async fn resume(&self) {
        log::debug!("verification: resume");
    }

    async fn volume_change(&self, volume: f32) {
        log::debug!("verification: volume change to {volume}");
    }

    async fn buffer_start(&self) {
        log::debug!("verification: buffer start");
    }

    async fn buffer_finish(&self) {
        log::debug!("verification: buffer finish");
    }

    async fn click_interaction(&self) {
        log::debug!("verification: click interaction");
    }
}
