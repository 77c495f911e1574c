// Detection Orchestrator
// Composes windowing -> classifier (LLM, else heuristic) -> merger into one
// call producing the final sponsor segment list.

use crate::models::{
    ClassifierPath, DetectionConfig, DetectionOutcome, KeywordTable, TranscriptEntry,
};
use crate::services::providers::{get_api_key, ProviderClient};
use crate::services::transcript::{TranscriptClient, TranscriptError};
use crate::services::windowing::build_windows;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::heuristic;
use super::llm_classifier::classify_windows;
use super::merger::merge_windows;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("invalid threshold {0}: expected a value in (0, 1]")]
    InvalidThreshold(f64),
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

/// Per-attempt client timeout: half the overall provider budget, so a
/// retry after a timed-out first attempt still fits inside the outer
/// deadline.
fn attempt_timeout(budget: Duration) -> Duration {
    (budget / 2).max(Duration::from_secs(1))
}

/// Reject thresholds outside (0, 1] before any work begins.
fn validate_threshold(threshold: f64) -> Result<(), DetectError> {
    if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
        return Err(DetectError::InvalidThreshold(threshold));
    }
    Ok(())
}

/// Heuristic-only detection - sync version.
/// Deterministic: identical inputs always produce identical output.
pub fn detect_segments(
    transcript: &[TranscriptEntry],
    threshold: f64,
    config: &DetectionConfig,
    table: &KeywordTable,
) -> Result<DetectionOutcome, DetectError> {
    validate_threshold(threshold)?;

    let windows = build_windows(
        transcript,
        config.window_size_seconds,
        config.overlap_seconds,
    );
    let scored = heuristic::score_windows(&windows, table);
    let segments = merge_windows(
        &scored,
        threshold,
        config.gap_tolerance_seconds,
        config.min_segment_seconds,
    );

    Ok(outcome(segments, ClassifierPath::Heuristic, scored.len(), threshold))
}

/// Full detection: try the external classifier, fall back to the heuristic
/// on any provider failure - async version.
///
/// The caller never observes a provider failure directly; the fallback is
/// recorded in the outcome's `classifier_path` for audit logging. Safe to
/// call concurrently: no shared mutable state between invocations.
pub async fn detect_segments_with_llm(
    transcript: &[TranscriptEntry],
    threshold: f64,
    config: &DetectionConfig,
    table: &KeywordTable,
) -> Result<DetectionOutcome, DetectError> {
    validate_threshold(threshold)?;

    let windows = build_windows(
        transcript,
        config.window_size_seconds,
        config.overlap_seconds,
    );
    info!(
        "[DETECT] {} entries -> {} windows, threshold {}",
        transcript.len(),
        windows.len(),
        threshold
    );

    let api_key = get_api_key();
    let provider_budget = Duration::from_secs(config.provider_timeout_seconds.max(1));
    let client = ProviderClient::with_timeout(attempt_timeout(provider_budget));

    let llm_attempt = tokio::time::timeout(
        provider_budget,
        classify_windows(&client, api_key.as_deref(), &windows),
    )
    .await;

    let (scored, path) = match llm_attempt {
        Ok(Ok(scored)) => {
            info!("[DETECT] external classifier scored {} windows", scored.len());
            (scored, ClassifierPath::Llm)
        }
        Ok(Err(e)) => {
            warn!("[DETECT] external classifier failed, using heuristic: {}", e);
            (heuristic::score_windows(&windows, table), ClassifierPath::Heuristic)
        }
        Err(_) => {
            warn!(
                "[DETECT] external classifier timeout ({}s), using heuristic",
                config.provider_timeout_seconds
            );
            (heuristic::score_windows(&windows, table), ClassifierPath::Heuristic)
        }
    };

    let segments = merge_windows(
        &scored,
        threshold,
        config.gap_tolerance_seconds,
        config.min_segment_seconds,
    );
    info!(
        "[DETECT] {} sponsor segments via {} path",
        segments.len(),
        path
    );

    Ok(outcome(segments, path, scored.len(), threshold))
}

/// Fetch a video's transcript and detect sponsor segments in it.
/// `TranscriptError::NotFound` is the only transcript failure surfaced as
/// "no sponsors determinable"; every classifier failure degrades to the
/// heuristic inside `detect_segments_with_llm`.
pub async fn detect_video(
    transcripts: &TranscriptClient,
    video_id: &str,
    threshold: f64,
    config: &DetectionConfig,
    table: &KeywordTable,
) -> Result<DetectionOutcome, DetectError> {
    validate_threshold(threshold)?;
    let transcript = transcripts.fetch_transcript(video_id).await?;
    detect_segments_with_llm(&transcript, threshold, config, table).await
}

fn outcome(
    segments: Vec<crate::models::SponsorSegment>,
    classifier_path: ClassifierPath,
    windows_scored: usize,
    threshold: f64,
) -> DetectionOutcome {
    DetectionOutcome {
        segments,
        classifier_path,
        windows_scored,
        threshold,
        request_id: Uuid::new_v4().to_string(),
    }
}
