// Segment Merger
// Thresholds scored windows and merges adjacent runs into sponsor segments

use crate::models::{ScoredWindow, SponsorSegment};
use tracing::debug;

/// Merge scored windows (sorted by start time) into the final sponsor
/// segment list.
///
/// Windows at or above `threshold` become candidates (stable order, so
/// identical start times keep input order). A candidate extends the current
/// run when it starts within `gap_tolerance_seconds` of the run end; with
/// the default tolerance of 0 only touching or overlapping windows merge.
/// A run keeps the max probability among its windows (strongest evidence,
/// not an average) and the union of their signals. Runs shorter than
/// `min_segment_seconds` are dropped as noise.
pub fn merge_windows(
    scored: &[ScoredWindow],
    threshold: f64,
    gap_tolerance_seconds: f64,
    min_segment_seconds: f64,
) -> Vec<SponsorSegment> {
    let mut segments: Vec<SponsorSegment> = Vec::new();

    for sw in scored.iter().filter(|sw| sw.probability >= threshold) {
        match segments.last_mut() {
            Some(run) if sw.window.start_time <= run.end_time + gap_tolerance_seconds => {
                run.end_time = run.end_time.max(sw.window.end_time);
                run.probability = run.probability.max(sw.probability);
                run.supporting_signals
                    .extend(sw.matched_signals.iter().cloned());
            }
            _ => {
                segments.push(SponsorSegment {
                    start_time: sw.window.start_time,
                    end_time: sw.window.end_time,
                    probability: sw.probability,
                    supporting_signals: sw.matched_signals.clone(),
                });
            }
        }
    }

    let before = segments.len();
    segments.retain(|s| s.duration() >= min_segment_seconds);
    if segments.len() < before {
        debug!(
            "[MERGER] dropped {} sub-minimum segments (< {}s)",
            before - segments.len(),
            min_segment_seconds
        );
    }

    segments
}
