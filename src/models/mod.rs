// Sponsorskip Data Models
// Shared types for the transcript -> windows -> segments pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============ Transcript ============

/// One caption line as delivered by the transcript service.
/// Entries are ordered by `start` ascending and non-overlapping by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub text: String,
    /// Seconds from the beginning of the video.
    pub start: f64,
    /// Seconds this entry stays on screen.
    pub duration: f64,
}

impl TranscriptEntry {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

// ============ Windows ============

/// A bounded time-span slice of transcript text, the unit of classification.
/// Windows may overlap each other; `start_time < end_time` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    /// Concatenation of the contributing entries' text.
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Indices into the source transcript, ascending.
    pub source_entries: Vec<usize>,
}

/// A window plus the probability a classifier assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredWindow {
    #[serde(flatten)]
    pub window: Window,
    /// Sponsor probability in [0, 1].
    pub probability: f64,
    /// Matched phrases or model-reported cues, for audit logging.
    #[serde(default)]
    pub matched_signals: BTreeSet<String>,
}

// ============ Segments ============

/// A merged, thresholded time range predicted to contain promotional content.
/// Across a result list segments are sorted and non-overlapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorSegment {
    pub start_time: f64,
    pub end_time: f64,
    /// Max probability among the merged windows (strongest evidence wins).
    pub probability: f64,
    #[serde(default)]
    pub supporting_signals: BTreeSet<String>,
}

impl SponsorSegment {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

// ============ Detection Configuration ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default = "default_window_size")]
    pub window_size_seconds: f64,
    #[serde(default = "default_overlap")]
    pub overlap_seconds: f64,
    /// Candidates whose gap to the current run exceeds this are not merged.
    #[serde(default)]
    pub gap_tolerance_seconds: f64,
    /// Runs shorter than this are discarded as noise.
    #[serde(default = "default_min_segment")]
    pub min_segment_seconds: f64,
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    /// Wall-clock budget for the external classification call.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_seconds: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_size_seconds: 30.0,
            overlap_seconds: 10.0,
            gap_tolerance_seconds: 0.0,
            min_segment_seconds: 1.0,
            default_threshold: 0.3,
            provider_timeout_seconds: 60,
        }
    }
}

// ============ Keyword Table ============

/// Sponsor-indicative phrase table for the heuristic classifier.
/// Data, not code: loadable from JSON so tuning never touches merge logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordTable {
    pub phrases: Vec<String>,
    /// Divisor for the match count; 3.0 means 2-3 matches clear the 0.3 threshold.
    #[serde(default = "default_normalization")]
    pub normalization: f64,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            phrases: [
                "sponsor",
                "sponsored",
                "sponsorship",
                "promotion",
                "promo code",
                "use code",
                "coupon",
                "discount",
                "% off",
                "percent off",
                "check out",
                "link in description",
                "link below",
                "limited time",
                "special offer",
                "free trial",
                "today's video is brought to you by",
                "brought to you by",
                "thanks to",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            normalization: 3.0,
        }
    }
}

// ============ Detection Outcome ============

/// Which classifier produced the per-window scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierPath {
    Llm,
    Heuristic,
}

impl std::fmt::Display for ClassifierPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Llm => write!(f, "llm"),
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOutcome {
    pub segments: Vec<SponsorSegment>,
    pub classifier_path: ClassifierPath,
    pub windows_scored: usize,
    pub threshold: f64,
    pub request_id: String,
}

// ============ Default Value Functions ============

fn default_window_size() -> f64 { 30.0 }
fn default_overlap() -> f64 { 10.0 }
fn default_min_segment() -> f64 { 1.0 }
fn default_threshold() -> f64 { 0.3 }
fn default_provider_timeout() -> u64 { 60 }
fn default_normalization() -> f64 { 3.0 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_config_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.default_threshold, 0.3);
        assert!(config.min_segment_seconds > 0.0);
        assert!(config.overlap_seconds < config.window_size_seconds);
    }

    #[test]
    fn test_keyword_table_roundtrip() {
        let table = KeywordTable::default();
        let json = serde_json::to_string(&table).unwrap();
        let parsed: KeywordTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.phrases, table.phrases);
        assert_eq!(parsed.normalization, 3.0);
    }

    #[test]
    fn test_keyword_table_normalization_default() {
        let parsed: KeywordTable = serde_json::from_str(r#"{"phrases":["sponsor"]}"#).unwrap();
        assert_eq!(parsed.normalization, 3.0);
    }
}
