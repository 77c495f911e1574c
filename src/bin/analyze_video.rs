use anyhow::{bail, Context, Result};
use sponsorskip::models::{DetectionConfig, KeywordTable};
use sponsorskip::services::config_store::ConfigStore;
use sponsorskip::services::detection::{detect_segments, detect_segments_with_llm, score_windows};
use sponsorskip::services::transcript::{load_transcript_file, TranscriptClient};
use sponsorskip::services::windowing::build_windows;

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn load_config_and_table() -> (DetectionConfig, KeywordTable) {
    let Some(config_dir) = ConfigStore::default_config_dir() else {
        return (DetectionConfig::default(), KeywordTable::default());
    };
    let store = ConfigStore::new(config_dir);
    let detection = store.load().map(|c| c.detection).unwrap_or_default();
    let table = store.load_keyword_table().unwrap_or_default();
    (detection, table)
}

#[tokio::main]
async fn main() -> Result<()> {
    sponsorskip::init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  analyze_video <transcript.json> [--threshold <t>] [--llm] [--out <json_path>]\n  analyze_video --video <id> [--threshold <t>] [--llm] [--out <json_path>]\n\nNotes:\n  - Without --llm the deterministic keyword heuristic is used.\n  - With --llm the external classifier is tried first and the heuristic\n    is the fallback on any provider failure."
        );
        return Ok(());
    }

    let (config, table) = load_config_and_table();
    let threshold: f64 = parse_arg_value(&args, "--threshold")
        .and_then(|s| s.parse().ok())
        .unwrap_or(config.default_threshold);
    let enable_llm = has_flag(&args, "--llm");
    let out_path = parse_arg_value(&args, "--out");

    let transcript = if let Some(video_id) = parse_arg_value(&args, "--video") {
        let client = TranscriptClient::new();
        client
            .fetch_transcript(&video_id)
            .await
            .with_context(|| format!("fetch transcript for video {}", video_id))?
    } else {
        let path = std::path::PathBuf::from(&args[1]);
        if !path.exists() {
            bail!("transcript file not found: {}", path.display());
        }
        load_transcript_file(&path).context("load transcript file")?
    };

    println!("Transcript entries: {}", transcript.len());
    println!("Threshold: {}", threshold);
    println!("External classifier: {}", if enable_llm { "on" } else { "off" });
    println!();

    // Heuristic preview: windows with any keyword signal at all.
    let windows = build_windows(&transcript, config.window_size_seconds, config.overlap_seconds);
    let scored = score_windows(&windows, &table);
    let flagged: Vec<_> = scored.iter().filter(|s| s.probability > 0.0).collect();
    println!("Windows: {} ({} with non-zero keyword score)", scored.len(), flagged.len());
    for sw in &flagged {
        println!(
            "[{:7.1}s - {:7.1}s] p={:.2} signals={:?}  {}",
            sw.window.start_time,
            sw.window.end_time,
            sw.probability,
            sw.matched_signals,
            preview(&sw.window.text, 80)
        );
    }
    println!();

    let outcome = if enable_llm {
        detect_segments_with_llm(&transcript, threshold, &config, &table).await?
    } else {
        detect_segments(&transcript, threshold, &config, &table)?
    };

    println!(
        "Detected {} sponsor segments (classifier path: {}, request {})",
        outcome.segments.len(),
        outcome.classifier_path,
        outcome.request_id
    );
    for (i, seg) in outcome.segments.iter().enumerate() {
        println!(
            "Segment {}: {:.1}s - {:.1}s (duration: {:.1}s, probability: {:.2})",
            i + 1,
            seg.start_time,
            seg.end_time,
            seg.duration(),
            seg.probability
        );
    }

    if let Some(out_path) = out_path {
        let json = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(&out_path, json)
            .with_context(|| format!("write output to {}", out_path))?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
