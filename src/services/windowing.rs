// Transcript Windowing
// Groups caption entries into overlapping time windows for classification

use crate::models::{TranscriptEntry, Window};

/// Smallest step the iterator will take, in seconds. Keeps a misconfigured
/// overlap (>= window size) from producing an unbounded window sequence.
const MIN_STEP_SECONDS: f64 = 0.5;

/// Lazy, restartable window sequence over a transcript.
///
/// Consecutive windows overlap by `overlap_seconds` so a sponsor mention cut
/// exactly at a boundary still lands whole inside at least one window. Every
/// timestamp in `[first.start, last.start + last.duration)` is covered by at
/// least one window, except timestamps inside caption gaps (a window with no
/// contributing entries carries no text and is not emitted).
pub struct Windows<'a> {
    entries: &'a [TranscriptEntry],
    window_size: f64,
    step: f64,
    cursor: f64,
    total_end: f64,
    done: bool,
}

impl<'a> Windows<'a> {
    pub fn new(entries: &'a [TranscriptEntry], window_size_seconds: f64, overlap_seconds: f64) -> Self {
        let window_size = window_size_seconds.max(MIN_STEP_SECONDS);
        let step = (window_size - overlap_seconds.max(0.0)).max(MIN_STEP_SECONDS);
        let (cursor, total_end) = match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => (first.start, last.end()),
            _ => (0.0, 0.0),
        };
        Self {
            entries,
            window_size,
            step,
            cursor,
            total_end,
            done: entries.is_empty(),
        }
    }

    fn window_at(&self, window_start: f64, window_end: f64) -> Option<Window> {
        let mut texts: Vec<&str> = Vec::new();
        let mut source_entries = Vec::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.start >= window_end {
                break;
            }
            if entry.end() > window_start {
                texts.push(entry.text.as_str());
                source_entries.push(idx);
            }
        }
        if source_entries.is_empty() {
            return None;
        }
        Some(Window {
            text: texts.join(" "),
            start_time: window_start,
            end_time: window_end,
            source_entries,
        })
    }
}

impl Iterator for Windows<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        while !self.done {
            let window_start = self.cursor;
            let window_end = (window_start + self.window_size).min(self.total_end);

            if window_end >= self.total_end {
                self.done = true;
            } else {
                self.cursor += self.step;
            }

            if window_end <= window_start {
                return None;
            }
            if let Some(window) = self.window_at(window_start, window_end) {
                return Some(window);
            }
            // Caption gap: nothing to classify in this span, keep scanning.
        }
        None
    }
}

/// Build the full window list for a transcript.
///
/// Shorter-than-one-window transcripts yield exactly one window spanning the
/// whole transcript; an empty transcript yields an empty list, not an error.
pub fn build_windows(
    entries: &[TranscriptEntry],
    window_size_seconds: f64,
    overlap_seconds: f64,
) -> Vec<Window> {
    Windows::new(entries, window_size_seconds, overlap_seconds).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, start: f64, duration: f64) -> TranscriptEntry {
        TranscriptEntry {
            text: text.to_string(),
            start,
            duration,
        }
    }

    fn uniform_transcript(count: usize, each_secs: f64) -> Vec<TranscriptEntry> {
        (0..count)
            .map(|i| entry(&format!("line {}", i), i as f64 * each_secs, each_secs))
            .collect()
    }

    #[test]
    fn test_empty_transcript_yields_no_windows() {
        assert!(build_windows(&[], 30.0, 10.0).is_empty());
    }

    #[test]
    fn test_short_transcript_yields_single_window() {
        let entries = vec![entry("hello", 100.0, 4.0), entry("world", 104.0, 3.0)];
        let windows = build_windows(&entries, 30.0, 10.0);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_time, 100.0);
        assert_eq!(windows[0].end_time, 107.0);
        assert_eq!(windows[0].text, "hello world");
        assert_eq!(windows[0].source_entries, vec![0, 1]);
    }

    #[test]
    fn test_windows_cover_full_span_without_gaps() {
        let entries = uniform_transcript(40, 5.0); // 200s total
        let windows = build_windows(&entries, 30.0, 10.0);
        assert!(!windows.is_empty());

        assert_eq!(windows[0].start_time, 0.0);
        assert_eq!(windows.last().unwrap().end_time, 200.0);
        for pair in windows.windows(2) {
            // Next window starts before the previous one ends: no uncovered gap.
            assert!(pair[1].start_time < pair[0].end_time);
        }
    }

    #[test]
    fn test_consecutive_windows_overlap_by_configured_amount() {
        let entries = uniform_transcript(40, 5.0);
        let windows = build_windows(&entries, 30.0, 10.0);
        for pair in windows.windows(2) {
            let overlap = pair[0].end_time - pair[1].start_time;
            assert!(overlap >= 10.0 - 1e-9, "overlap was {}", overlap);
        }
    }

    #[test]
    fn test_window_invariant_start_before_end() {
        let entries = uniform_transcript(13, 7.0);
        for window in build_windows(&entries, 30.0, 10.0) {
            assert!(window.start_time < window.end_time);
            assert!(!window.source_entries.is_empty());
        }
    }

    #[test]
    fn test_caption_gap_windows_are_skipped() {
        let entries = vec![entry("intro", 0.0, 10.0), entry("outro", 300.0, 10.0)];
        let windows = build_windows(&entries, 30.0, 0.0);
        for window in &windows {
            assert!(!window.text.is_empty());
        }
        assert!(windows.iter().any(|w| w.text == "intro"));
        assert!(windows.iter().any(|w| w.text.contains("outro")));
    }

    #[test]
    fn test_degenerate_overlap_still_terminates() {
        let entries = uniform_transcript(20, 5.0);
        // Overlap >= window size would step backwards without the guard.
        let windows = build_windows(&entries, 10.0, 10.0);
        assert!(!windows.is_empty());
        assert!(windows.len() < 1000);
    }

    #[test]
    fn test_restartable_iteration() {
        let entries = uniform_transcript(10, 5.0);
        let first: Vec<_> = Windows::new(&entries, 20.0, 5.0).collect();
        let second: Vec<_> = Windows::new(&entries, 20.0, 5.0).collect();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].text, second[0].text);
    }
}
