//! Media playback engine gateway.
//!
//! The engine itself (decode, render, ABR) lives outside this crate. This
//! module defines the command/query surface the ad session needs from it,
//! the notices it forwards back, and a no-op stub for running without one.

use async_trait::async_trait;
use url::Url;

/// Notification from the playback engine, forwarded into the control loop
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotice {
    /// The engine finished preparing and can render
    Ready,

    /// The engine stalled waiting for data
    Buffering,

    /// Natural end of stream
    Ended,

    /// The engine looped back to the start on its own. A looping engine may
    /// suppress the natural end-of-stream signal and send only this.
    LoopTransition,

    /// Engine-side volume change (0.0 muted, 1.0 full)
    VolumeChanged(f32),

    /// Unrecoverable playback failure
    Fatal(String),
}

/// Commands and queries the ad session issues to the playback engine
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Load a media URI, optionally with a subtitle sidecar. The subtitle
    /// URI is passed through verbatim; no language negotiation happens here.
    async fn load(&self, uri: &Url, subtitle_uri: Option<&Url>);

    async fn play(&self);

    async fn pause(&self);

    async fn seek_to(&self, position_ms: i64);

    /// Set output volume; the ad session only ever uses 0.0 and 1.0
    async fn set_volume(&self, level: f32);

    /// Current playback position in milliseconds
    async fn position_ms(&self) -> i64;

    /// Media duration in milliseconds, or <= 0 while unresolved
    async fn duration_ms(&self) -> i64;
}

/// No-op player selected when no engine is wired up; logs every command
pub struct NullPlayer;

#[async_trait]
impl MediaPlayer for NullPlayer {
    async fn load(&self, uri: &Url, subtitle_uri: Option<&Url>) {
        log::debug!("NullPlayer: load {uri} (subtitles: {subtitle_uri:?})");
    }

    async fn play(&self) {
        log::debug!("NullPlayer: play");
    }

    async fn pause(&self) {
        log::debug!("NullPlayer: pause");
    }

    async fn seek_to(&self, position_ms: i64) {
        log::debug!("NullPlayer: seek to {position_ms}ms");
    }

    async fn set_volume(&self, level: f32) {
        log::debug!("NullPlayer: set volume {level}");
    }

    async fn position_ms(&self) -> i64 {
        0
    }

    async fn duration_ms(&self) -> i64 {
        0
    }
}

/// Click-through hand-off: opens the advertiser landing page
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &Url);
}

/// Drops click-throughs, logging them
pub struct NullOpener;

impl LinkOpener for NullOpener {
    fn open(&self, url: &Url) {
        log::info!("NullOpener: discarding click-through {url}");
    }
}
