//! Key range segmentation.

use super::types::Segment;

/// Split `[from, to)` into contiguous segments of at most `step` keys.
///
/// The caller guarantees `step > 0`. An empty or inverted range yields no
/// segments.
pub fn segments(from: i64, to: i64, step: i64) -> Vec<Segment> {
    debug_assert!(step > 0, "segment step must be positive");

    let mut segments = Vec::new();
    let mut current = from;

    while current < to {
        let next = current.saturating_add(step).min(to);
        segments.push(Segment::new(current, next));
        current = next;
    }

    segments
}

/// Number of segments [`segments`] would produce, without allocating.
pub fn segment_count(from: i64, to: i64, step: i64) -> usize {
    if from >= to {
        return 0;
    }
    let span = (to as i128) - (from as i128);
    let step = step as i128;
    ((span + step - 1) / step) as usize
}
