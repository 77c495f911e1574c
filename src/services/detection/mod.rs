// Detection Pipeline
// windowing -> classifier (LLM, else heuristic) -> merger

pub mod heuristic;
pub mod llm_classifier;
pub mod merger;
pub mod orchestrator;

pub use heuristic::{score_text, score_window, score_windows};
pub use llm_classifier::{classify_windows, ClassifyError};
pub use merger::merge_windows;
pub use orchestrator::{
    detect_segments, detect_segments_with_llm, detect_video, DetectError,
};
