// LLM Sponsor Classifier
// Maps the remote provider's answer onto per-window probabilities.
// All-or-nothing: either every window receives an external score, or the
// whole attempt fails and the caller falls back to the heuristic.

use crate::models::{ScoredWindow, Window};
use crate::services::providers::{ProviderClient, ProviderError};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

const MAX_RESPONSE_TOKENS: i32 = 4000;
/// Initial attempt plus at most one retry on transient failures.
const MAX_ATTEMPTS: usize = 2;

const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"You are an expert at identifying sponsored content in video transcripts.

You are given numbered transcript windows with timestamps. Identify the windows that contain sponsored content: explicit sponsor or partnership mentions, product promotions or endorsements, discount codes or special offers, calls to action to visit specific websites.

Return ONLY a JSON array of findings. Each finding has:
- "window_index": the number of the window (preferred), OR "start_time" and "end_time" in seconds for a sponsored range
- "probability": confidence between 0 and 1
- "signals": short list of the cues you relied on (optional)

Windows you do not mention are treated as not sponsored. Return an empty array if nothing is sponsored. Return only JSON, no other text."#;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("classification provider is not configured")]
    Unconfigured,
    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// One finding reported by the provider: either a window index or a time range.
#[derive(Debug, Deserialize)]
struct ReportedSpan {
    #[serde(default)]
    window_index: Option<usize>,
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    end_time: Option<f64>,
    #[serde(default)]
    probability: Option<f64>,
    #[serde(default)]
    signals: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReportedSpanList {
    #[serde(default)]
    segments: Vec<ReportedSpan>,
}

/// Classify the full window sequence through the remote provider.
///
/// Fails (never panics) on missing credentials, network errors, non-success
/// status, or a response that cannot be mapped onto the windows. The caller
/// substitutes the heuristic for the same window sequence on any failure.
pub async fn classify_windows(
    client: &ProviderClient,
    api_key: Option<&str>,
    windows: &[Window],
) -> Result<Vec<ScoredWindow>, ClassifyError> {
    let api_key = api_key.ok_or(ClassifyError::Unconfigured)?;
    if windows.is_empty() {
        return Ok(Vec::new());
    }

    let user_prompt = build_user_prompt(windows);

    let mut last_err: Option<ProviderError> = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match client
            .call_chat(api_key, CLASSIFICATION_SYSTEM_PROMPT, &user_prompt, MAX_RESPONSE_TOKENS)
            .await
        {
            Ok(chat_result) => {
                info!(
                    "[LLM_CLASSIFIER] provider ok model={} attempt={} latency_ms={}",
                    client.model(),
                    attempt,
                    chat_result.latency_ms
                );
                let spans = parse_response(&chat_result.content)?;
                return apply_spans(windows, &spans);
            }
            Err(e) => {
                let transient = e.is_transient();
                warn!(
                    "[LLM_CLASSIFIER] provider error attempt={} transient={} : {}",
                    attempt, transient, e
                );
                if !transient {
                    return Err(e.into());
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err
        .map(ClassifyError::from)
        .unwrap_or(ClassifyError::Unconfigured))
}

/// Serialize windows into the provider's expected request shape.
fn build_user_prompt(windows: &[Window]) -> String {
    let mut prompt = String::from(
        "Identify sponsored content in the following transcript windows:\n\n",
    );
    for (idx, window) in windows.iter().enumerate() {
        prompt.push_str(&format!(
            "[window {} | {:.1}s - {:.1}s]: {}\n",
            idx, window.start_time, window.end_time, window.text
        ));
    }
    prompt
}

/// Parse the provider answer into reported spans.
/// Accepts a bare JSON array or a {"segments": [...]} object, with or
/// without markdown code fences around the JSON.
fn parse_response(content: &str) -> Result<Vec<ReportedSpan>, ClassifyError> {
    let json_text = extract_json(content)
        .ok_or_else(|| ClassifyError::MalformedResponse("no JSON in response".to_string()))?;

    if json_text.starts_with('[') {
        serde_json::from_str::<Vec<ReportedSpan>>(&json_text)
            .map_err(|e| ClassifyError::MalformedResponse(e.to_string()))
    } else {
        serde_json::from_str::<ReportedSpanList>(&json_text)
            .map(|list| list.segments)
            .map_err(|e| ClassifyError::MalformedResponse(e.to_string()))
    }
}

/// Extract the JSON payload from the response content.
fn extract_json(content: &str) -> Option<String> {
    let mut text = content.trim();

    // Strip markdown code fences the model sometimes wraps JSON in.
    if let Some(rest) = text.split_once("```json").map(|(_, r)| r) {
        text = rest.split("```").next().unwrap_or(rest).trim();
    } else if let Some(rest) = text.split_once("```").map(|(_, r)| r) {
        text = rest.split("```").next().unwrap_or(rest).trim();
    }

    let array = text
        .find('[')
        .and_then(|s| text.rfind(']').filter(|e| *e > s).map(|e| &text[s..=e]));
    let object = text
        .find('{')
        .and_then(|s| text.rfind('}').filter(|e| *e > s).map(|e| &text[s..=e]));

    match (array, object) {
        // Prefer the outermost structure.
        (Some(a), Some(o)) => {
            if text.find('[') < text.find('{') {
                Some(a.to_string())
            } else {
                Some(o.to_string())
            }
        }
        (Some(a), None) => Some(a.to_string()),
        (None, Some(o)) => Some(o.to_string()),
        (None, None) => None,
    }
}

/// Map reported spans onto the window sequence. Every window gets a score;
/// windows the provider did not mention score 0.0. A span with neither a
/// valid window index nor a usable time range makes the response malformed.
fn apply_spans(
    windows: &[Window],
    spans: &[ReportedSpan],
) -> Result<Vec<ScoredWindow>, ClassifyError> {
    let mut scored: Vec<ScoredWindow> = windows
        .iter()
        .map(|w| ScoredWindow {
            window: w.clone(),
            probability: 0.0,
            matched_signals: Default::default(),
        })
        .collect();

    for span in spans {
        let probability = span.probability.unwrap_or(1.0).clamp(0.0, 1.0);

        if let Some(idx) = span.window_index {
            let target = scored.get_mut(idx).ok_or_else(|| {
                ClassifyError::MalformedResponse(format!(
                    "window_index {} out of range ({} windows)",
                    idx,
                    windows.len()
                ))
            })?;
            if probability > target.probability {
                target.probability = probability;
            }
            target.matched_signals.extend(span.signals.iter().cloned());
            continue;
        }

        match (span.start_time, span.end_time) {
            (Some(start), Some(end)) if end > start => {
                // Any window intersecting the reported range gets its confidence.
                for sw in scored.iter_mut() {
                    if sw.window.start_time < end && sw.window.end_time > start {
                        if probability > sw.probability {
                            sw.probability = probability;
                        }
                        sw.matched_signals.extend(span.signals.iter().cloned());
                    }
                }
            }
            _ => {
                return Err(ClassifyError::MalformedResponse(
                    "span has neither window_index nor a valid time range".to_string(),
                ));
            }
        }
    }

    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: f64, end: f64, text: &str) -> Window {
        Window {
            text: text.to_string(),
            start_time: start,
            end_time: end,
            source_entries: vec![],
        }
    }

    fn three_windows() -> Vec<Window> {
        vec![
            window(0.0, 30.0, "intro"),
            window(20.0, 50.0, "use code save10"),
            window(40.0, 70.0, "outro"),
        ]
    }

    #[test]
    fn test_parse_bare_array() {
        let spans = parse_response(r#"[{"window_index": 1, "probability": 0.9}]"#).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].window_index, Some(1));
    }

    #[test]
    fn test_parse_segments_object() {
        let spans =
            parse_response(r#"{"segments": [{"window_index": 0, "probability": 0.5}]}"#).unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "Here you go:\n```json\n[{\"window_index\": 2, \"probability\": 0.8}]\n```";
        let spans = parse_response(content).unwrap();
        assert_eq!(spans[0].window_index, Some(2));
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(
            parse_response("I could not find any sponsors, sorry."),
            Err(ClassifyError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response("[{not json"),
            Err(ClassifyError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_apply_window_index_spans() {
        let windows = three_windows();
        let spans = vec![ReportedSpan {
            window_index: Some(1),
            start_time: None,
            end_time: None,
            probability: Some(0.9),
            signals: vec!["discount code".to_string()],
        }];
        let scored = apply_spans(&windows, &spans).unwrap();
        assert_eq!(scored.len(), 3);
        assert_eq!(scored[0].probability, 0.0);
        assert_eq!(scored[1].probability, 0.9);
        assert_eq!(scored[2].probability, 0.0);
        assert!(scored[1].matched_signals.contains("discount code"));
    }

    #[test]
    fn test_apply_time_range_span_hits_intersecting_windows() {
        let windows = three_windows();
        let spans = vec![ReportedSpan {
            window_index: None,
            start_time: Some(25.0),
            end_time: Some(45.0),
            probability: None,
            signals: vec![],
        }];
        let scored = apply_spans(&windows, &spans).unwrap();
        // Range [25,45] intersects all three overlapping windows.
        assert_eq!(scored[0].probability, 1.0);
        assert_eq!(scored[1].probability, 1.0);
        assert_eq!(scored[2].probability, 1.0);
    }

    #[test]
    fn test_apply_out_of_range_index_is_malformed() {
        let windows = three_windows();
        let spans = vec![ReportedSpan {
            window_index: Some(7),
            start_time: None,
            end_time: None,
            probability: Some(0.9),
            signals: vec![],
        }];
        assert!(matches!(
            apply_spans(&windows, &spans),
            Err(ClassifyError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_apply_empty_spans_scores_every_window_zero() {
        let windows = three_windows();
        let scored = apply_spans(&windows, &[]).unwrap();
        assert_eq!(scored.len(), 3);
        assert!(scored.iter().all(|s| s.probability == 0.0));
    }

    #[tokio::test]
    async fn test_missing_api_key_short_circuits() {
        let client = ProviderClient::new();
        let result = classify_windows(&client, None, &three_windows()).await;
        assert!(matches!(result, Err(ClassifyError::Unconfigured)));
    }
}
