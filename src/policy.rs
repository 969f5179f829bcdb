// src/policy.rs
//! Centralized pipeline policy: stage thresholds, caps, and scoring weights.
//! Every go/no-go constant lives here so the rubric stays auditable.

/// Stage 1 keeps at most this many candidates after potential ranking.
pub const MAX_CANDIDATES: usize = 15;

/// Stage 3 inclusion threshold on the overall quality score.
pub const MIN_QUALITY: f64 = 0.6;
/// Stage 3 emits nothing when fewer items pass the threshold.
pub const MIN_ITEMS: usize = 3;
/// Stage 3 never selects more than this many items.
pub const MAX_ITEMS: usize = 5;

// Stage 1 fetch parameters.
pub const STORY_FETCH_LIMIT: usize = 50;
pub const MIN_STORY_POINTS: u32 = 20;
pub const MIN_STORY_COMMENTS: u32 = 10;
pub const PAPER_WINDOW_DAYS: i64 = 7;
pub const MAX_PAPERS_PER_CATEGORY: usize = 20;

// Overall quality score weights (must sum to 1.0).
pub const WEIGHT_COHERENCE: f64 = 0.3;
pub const WEIGHT_SIGNIFICANCE: f64 = 0.3;
pub const WEIGHT_DISCUSSION: f64 = 0.2;
pub const WEIGHT_COMPLETENESS: f64 = 0.2;

// Preprint traction signals.
pub const TRACTION_EXTERNAL_MENTION: f64 = 30.0;
pub const TRACTION_REPO_LINK: f64 = 20.0;
pub const POTENTIAL_REPO_BONUS: f64 = 10.0;

/// Executive summaries and abstracts are truncated to this many chars.
pub const SUMMARY_MAX_CHARS: usize = 400;
