use crate::models::Quartile;

/// Epsilon applied to every bucket comparison so exact boundary fractions
/// don't flap between buckets on floating-point noise
const EPSILON: f64 = 1e-6;

/// Classify a playback position into a progress bucket.
///
/// Pure and stateless. Returns `Unknown` when no duration is resolvable.
/// Never returns `Complete` — completion is asserted by the orchestrator on
/// an end-of-stream or loop-transition notice, not derived from position.
pub fn classify(position_ms: i64, duration_ms: i64) -> Quartile {
    if duration_ms <= 0 {
        return Quartile::Unknown;
    }

    let fraction = position_ms as f64 / duration_ms as f64;
    if less_than(fraction, 0.01) {
        return Quartile::Unknown;
    }
    if less_than(fraction, 0.25) {
        return Quartile::Start;
    }
    if less_than(fraction, 0.50) {
        return Quartile::First;
    }
    if less_than(fraction, 0.75) {
        return Quartile::Second;
    }

    // Fractions past 1.0 still classify as Third: a player can report a
    // position slightly beyond the duration right before the end-of-stream
    // signal lands, and a lost Third is worse than an early one.
    Quartile::Third
}

fn less_than(a: f64, b: f64) -> bool {
    b - a > EPSILON
}
