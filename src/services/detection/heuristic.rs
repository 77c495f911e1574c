// Heuristic Sponsor Classifier
// Deterministic keyword-density scoring, the fallback of last resort.
// Must never fail for any input string.

use crate::models::{KeywordTable, ScoredWindow, Window};
use regex::Regex;
use std::collections::BTreeSet;

/// Normalize window text for phrase matching: lowercase and collapse
/// whitespace runs so phrases split across caption lines still match.
fn normalize(text: &str) -> String {
    let ws_re = Regex::new(r"\s+").unwrap();
    ws_re.replace_all(&text.to_lowercase(), " ").trim().to_string()
}

/// Score a single text against the phrase table.
/// Returns the probability and the literal phrases that matched.
pub fn score_text(text: &str, table: &KeywordTable) -> (f64, BTreeSet<String>) {
    if text.is_empty() || table.phrases.is_empty() {
        return (0.0, BTreeSet::new());
    }

    let normalized = normalize(text);
    let matched: BTreeSet<String> = table
        .phrases
        .iter()
        .filter(|phrase| {
            let p = phrase.to_lowercase();
            !p.is_empty() && normalized.contains(&p)
        })
        .cloned()
        .collect();

    let normalization = if table.normalization > 0.0 {
        table.normalization
    } else {
        1.0
    };
    let probability = (matched.len() as f64 / normalization).min(1.0);
    (probability, matched)
}

/// Score one window.
pub fn score_window(window: &Window, table: &KeywordTable) -> ScoredWindow {
    let (probability, matched_signals) = score_text(&window.text, table);
    ScoredWindow {
        window: window.clone(),
        probability,
        matched_signals,
    }
}

/// Score every window in order. Deterministic and total: always returns one
/// `ScoredWindow` per input window.
pub fn score_windows(windows: &[Window], table: &KeywordTable) -> Vec<ScoredWindow> {
    windows.iter().map(|w| score_window(w, table)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(text: &str) -> Window {
        Window {
            text: text.to_string(),
            start_time: 0.0,
            end_time: 10.0,
            source_entries: vec![0],
        }
    }

    #[test]
    fn test_empty_string_scores_zero() {
        let (prob, signals) = score_text("", &KeywordTable::default());
        assert_eq!(prob, 0.0);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_sponsor_free_text_scores_zero() {
        let (prob, signals) = score_text(
            "today we are going to look at the history of the roman empire",
            &KeywordTable::default(),
        );
        assert_eq!(prob, 0.0);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_two_matches_clear_default_threshold() {
        let (prob, signals) =
            score_text("use code SAVE10 for 20% off", &KeywordTable::default());
        assert!(prob >= 0.3, "probability was {}", prob);
        assert!(signals.contains("use code"));
        assert!(signals.contains("% off"));
    }

    #[test]
    fn test_probability_capped_at_one() {
        let text = "this sponsored sponsor sponsorship promo code use code discount \
                    coupon check out link in description special offer limited time";
        let (prob, _) = score_text(text, &KeywordTable::default());
        assert_eq!(prob, 1.0);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let (prob, signals) = score_text("USE CODE save10 NOW", &KeywordTable::default());
        assert!(prob > 0.0);
        assert!(signals.contains("use code"));
    }

    #[test]
    fn test_phrase_split_across_whitespace_run_matches() {
        let (_, signals) = score_text("use   code\nSAVE10", &KeywordTable::default());
        assert!(signals.contains("use code"));
    }

    #[test]
    fn test_very_long_input_does_not_fail() {
        let long = "nothing promotional here ".repeat(20_000);
        let (prob, _) = score_text(&long, &KeywordTable::default());
        assert_eq!(prob, 0.0);
    }

    #[test]
    fn test_custom_table_normalization() {
        let table = KeywordTable {
            phrases: vec!["sponsor".to_string()],
            normalization: 1.0,
        };
        let (prob, _) = score_text("our sponsor today", &table);
        assert_eq!(prob, 1.0);
    }

    #[test]
    fn test_score_windows_one_per_input() {
        let windows = vec![window("use code SAVE10"), window("regular content")];
        let scored = score_windows(&windows, &KeywordTable::default());
        assert_eq!(scored.len(), 2);
        assert!(scored[0].probability > 0.0);
        assert_eq!(scored[1].probability, 0.0);
    }
}
