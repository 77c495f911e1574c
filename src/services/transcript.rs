// Transcript Source
// Thin client for the external transcript-retrieval service, plus a file
// loader for offline analysis.

use crate::models::TranscriptEntry;
use reqwest::Client;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const DEFAULT_TRANSCRIPT_URL: &str = "http://127.0.0.1:8571/transcript";
const TRANSCRIPT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("no transcript available for video {0}")]
    NotFound(String),
    #[error("transcript service unavailable: {0}")]
    Unavailable(String),
}

pub struct TranscriptClient {
    client: Client,
    base_url: String,
}

impl Default for TranscriptClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(TRANSCRIPT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        let base_url = env::var("SPONSORSKIP_TRANSCRIPT_URL")
            .unwrap_or_else(|_| DEFAULT_TRANSCRIPT_URL.to_string());
        Self { client, base_url }
    }

    /// Fetch the ordered caption list for a video.
    /// The service answers with a JSON array of {text, start, duration}.
    pub async fn fetch_transcript(
        &self,
        video_id: &str,
    ) -> Result<Vec<TranscriptEntry>, TranscriptError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("v", video_id)])
            .send()
            .await
            .map_err(|e| TranscriptError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(TranscriptError::NotFound(video_id.to_string()));
        }
        if !status.is_success() {
            return Err(TranscriptError::Unavailable(format!(
                "transcript service returned {}",
                status
            )));
        }

        let entries: Vec<TranscriptEntry> = response
            .json()
            .await
            .map_err(|e| TranscriptError::Unavailable(e.to_string()))?;

        info!(
            "[TRANSCRIPT] fetched {} entries for video {}",
            entries.len(),
            video_id
        );
        Ok(normalize_entries(entries))
    }
}

/// Load a transcript from a local JSON file (same array-of-entries shape
/// the transcript service returns).
pub fn load_transcript_file(path: &Path) -> Result<Vec<TranscriptEntry>, TranscriptError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| TranscriptError::Unavailable(format!("read {}: {}", path.display(), e)))?;
    let entries: Vec<TranscriptEntry> = serde_json::from_str(&content)
        .map_err(|e| TranscriptError::Unavailable(format!("parse {}: {}", path.display(), e)))?;
    Ok(normalize_entries(entries))
}

/// The pipeline assumes entries ordered by start ascending; the service does
/// not guarantee order, so sort before handing them on.
fn normalize_entries(mut entries: Vec<TranscriptEntry>) -> Vec<TranscriptEntry> {
    entries.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_sorted_by_start() {
        let entries = vec![
            TranscriptEntry {
                text: "b".to_string(),
                start: 10.0,
                duration: 2.0,
            },
            TranscriptEntry {
                text: "a".to_string(),
                start: 0.0,
                duration: 2.0,
            },
        ];
        let sorted = normalize_entries(entries);
        assert_eq!(sorted[0].text, "a");
        assert_eq!(sorted[1].text, "b");
    }

    #[test]
    fn test_entry_json_shape() {
        let json = r#"[{"text": "use code SAVE10", "start": 100.0, "duration": 30.0}]"#;
        let entries: Vec<TranscriptEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0].end(), 130.0);
    }
}
