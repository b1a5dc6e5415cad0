use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Represents a parsed ad creative — the immutable document model built once
/// per VAST parse and shared read-only by every other component
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct AdCreative {
    /// Media renditions in document order
    pub media_renditions: Vec<MediaRendition>,

    /// The raw duration label (e.g. "00:00:15"), kept verbatim
    pub duration_label: Option<String>,

    /// Impression tracking URLs (duplicates preserved; each one fires)
    pub impression_urls: Vec<Url>,

    /// Error tracking URLs
    pub error_urls: Vec<Url>,

    /// Click tracking URLs
    pub click_tracking_urls: Vec<Url>,

    /// Tracking event URLs keyed by event name ("start", "firstQuartile",
    /// "midpoint", "thirdQuartile", "complete", "pause", "resume", "mute",
    /// "unmute", ...); repeated event names keep the last occurrence
    pub tracking_events: HashMap<String, Url>,

    /// The click-through destination URL
    pub click_through_url: Option<Url>,

    /// Closed caption file for the creative
    pub closed_caption_url: Option<Url>,

    /// Ad verification resource, if the document carries one
    pub verification: Option<VerificationResource>,
}

impl AdCreative {
    /// An ad creative with every field empty or absent. This is what the
    /// parser degrades to on malformed input.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up the tracking URL for an event name
    pub fn tracking_url(&self, event: &str) -> Option<&Url> {
        self.tracking_events.get(event)
    }

    /// The rendition playback should load: the first one in document order
    pub fn primary_rendition(&self) -> Option<&MediaRendition> {
        self.media_renditions.first()
    }
}

/// Represents a single media file within the creative
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct MediaRendition {
    /// The media file URL
    pub url: Url,

    /// The media file width
    pub width: Option<u32>,

    /// The media file height
    pub height: Option<u32>,

    /// The media file MIME type
    pub mime_type: Option<String>,

    /// Caption file specific to this rendition
    pub caption_url: Option<Url>,
}

/// Represents an ad verification script resource
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VerificationResource {
    /// The verification vendor key
    pub vendor_key: Option<String>,

    /// The verification script URL
    pub script_url: Url,

    /// Opaque parameters handed to the verification script
    pub parameters: Option<String>,

    /// Verification-specific tracking event URLs
    pub tracking_events: HashMap<String, Url>,
}

/// Playback progress bucket. Ordinal comparison is the sole mechanism for
/// "has this already fired" checks — never equality — because a single
/// progress poll may skip buckets on a fast-loading short video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quartile {
    Unknown,
    Start,
    First,
    Second,
    Third,
    Complete,
}

impl Quartile {
    /// The tracking beacon event name for this bucket, if one exists
    pub fn beacon_event(self) -> Option<&'static str> {
        match self {
            Quartile::Unknown => None,
            Quartile::Start => Some("start"),
            Quartile::First => Some("firstQuartile"),
            Quartile::Second => Some("midpoint"),
            Quartile::Third => Some("thirdQuartile"),
            Quartile::Complete => Some("complete"),
        }
    }
}

impl std::fmt::Display for Quartile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quartile::Unknown => write!(f, "unknown"),
            Quartile::Start => write!(f, "start"),
            Quartile::First => write!(f, "first"),
            Quartile::Second => write!(f, "second"),
            Quartile::Third => write!(f, "third"),
            Quartile::Complete => write!(f, "complete"),
        }
    }
}

/// Per-load mutable session state, owned exclusively by the orchestrator.
/// Created on `load()`, reset only by a new `load()` (never by a
/// loop-restart), discarded on `release()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSessionState {
    /// Highest quartile whose event has fired
    pub highest_quartile: Quartile,

    /// Whether the once-per-load loaded/impression sequence has fired
    pub loaded_fired: bool,

    /// Whether the completion event has fired
    pub complete_fired: bool,

    /// Whether the user has toggled playback into pause
    pub user_paused: bool,

    /// Whether the player is currently muted
    pub muted: bool,
}

impl PlaybackSessionState {
    pub fn new() -> Self {
        Self {
            highest_quartile: Quartile::Unknown,
            loaded_fired: false,
            complete_fired: false,
            user_paused: false,
            muted: false,
        }
    }
}

impl Default for PlaybackSessionState {
    fn default() -> Self {
        Self::new()
    }
}
