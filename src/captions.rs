//! Caption cue storage and position lookup.
//!
//! Parses a WebVTT-style cue list and answers "which caption is active at
//! position t" in O(log n). Malformed cue blocks are dropped silently; a
//! gap between cues yields no caption.

/// A single timed caption. Start is inclusive, end is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionCue {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// Time-ascending cue list with binary-search lookup by position
#[derive(Debug, Default)]
pub struct CaptionTrack {
    cues: Vec<CaptionCue>,
}

impl CaptionTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the loaded cues with the ones parsed from `vtt_text`.
    ///
    /// Cue blocks are separated by blank lines; the first line of a block
    /// must be a `start --> end` timing line. Blocks with an unparsable
    /// timing line or `end < start` are dropped. The resulting cues are
    /// sorted ascending by start time.
    pub fn load(&mut self, vtt_text: &str) {
        let normalized = vtt_text.replace("\r\n", "\n").replace('\r', "\n");
        let mut cues = Vec::new();

        for block in normalized.split("\n\n") {
            let mut lines = block.lines().filter(|line| !line.trim().is_empty());
            let Some(timing_line) = lines.next() else {
                continue;
            };
            let Some((start_ms, end_ms)) = parse_timing_line(timing_line) else {
                log::debug!("Dropping caption block with timing line {timing_line:?}");
                continue;
            };
            if end_ms < start_ms {
                log::debug!("Dropping caption cue ending before it starts: {timing_line:?}");
                continue;
            }
            let text = lines.collect::<Vec<_>>().join("\n");
            cues.push(CaptionCue {
                start_ms,
                end_ms,
                text,
            });
        }

        cues.sort_by_key(|cue| cue.start_ms);
        self.cues = cues;
    }

    /// The caption text active at `position_ms`, if any: the last cue whose
    /// start is at or before the position, provided the position is still
    /// inside the cue (end exclusive).
    pub fn text_at(&self, position_ms: u64) -> Option<&str> {
        let idx = self.cues.partition_point(|cue| cue.start_ms <= position_ms);
        if idx == 0 {
            return None;
        }
        let cue = &self.cues[idx - 1];
        (position_ms < cue.end_ms).then_some(cue.text.as_str())
    }

    pub fn clear(&mut self) {
        self.cues.clear();
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}

/// Parse a `start --> end` timing line into millisecond bounds
fn parse_timing_line(line: &str) -> Option<(u64, u64)> {
    let (start, rest) = line.split_once("-->")?;
    // Drop cue settings after the end timestamp ("00:05.000 line:0" etc.)
    let end = rest.trim().split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// Parse `HH:MM:SS(.mmm)` or `MM:SS(.mmm)`; comma decimal separators are
/// normalized to dots
fn parse_timestamp(raw: &str) -> Option<u64> {
    let normalized = raw.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (0, m.parse::<u64>().ok()?, s.parse::<f64>().ok()?),
        [h, m, s] => (
            h.parse::<u64>().ok()?,
            m.parse::<u64>().ok()?,
            s.parse::<f64>().ok()?,
        ),
        _ => return None,
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    Some(hours * 3_600_000 + minutes * 60_000 + (seconds * 1000.0).round() as u64)
}
