// Sponsorskip Core Services

pub mod config_store;
pub mod detection;
pub mod providers;
pub mod transcript;
pub mod windowing;

pub use config_store::*;
pub use providers::*;
pub use transcript::*;
pub use windowing::*;

// Re-export detection module functions
pub use detection::{
    classify_windows,
    detect_segments,
    detect_segments_with_llm,
    detect_video,
    merge_windows,
    score_text,
    score_window,
    score_windows,
    ClassifyError,
    DetectError,
};
