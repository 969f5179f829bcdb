// src/discussion.rs
//! Discussion-thread synthesis: themes, one ranked insight sentence, and a
//! sentiment line, built from a thread's top comments. All keyword tables
//! are fixed policy, English-only, with no extensibility hook.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::split_sentences;
use crate::sources::normalize_text;

/// Seam for comment retrieval so synthesis is testable without a network.
#[async_trait]
pub trait ThreadFetcher: Send + Sync {
    /// Raw bodies of up to `limit` top-level comments for `thread_id`.
    async fn top_comments(&self, thread_id: u64, limit: usize) -> Result<Vec<String>>;
}

/// How many top-level comments are considered at most.
pub const TOP_COMMENT_LIMIT: usize = 12;
/// Below this count of qualifying comments, no synthesis is attempted.
const MIN_QUALIFYING_COMMENTS: usize = 3;

/// Qualifying comment length bounds (exclusive).
const MIN_COMMENT_CHARS: usize = 80;
const MAX_COMMENT_CHARS: usize = 900;

const THEMES: [(&str, &[&str]); 8] = [
    (
        "technical implementation",
        &["implementation", "architecture", "how it works", "code quality"],
    ),
    (
        "privacy concerns",
        &["privacy", "tracking", "data collection", "surveillance"],
    ),
    (
        "business model",
        &["revenue", "business model", "monetize", "sustainable"],
    ),
    (
        "alternatives",
        &["alternative", "instead", "competitor", "better option"],
    ),
    (
        "historical context",
        &["history", "previously", "used to", "in the past"],
    ),
    (
        "criticisms",
        &["issue", "problem", "concern", "flaw", "limitations"],
    ),
    (
        "nostalgia/culture",
        &["nostalgia", "classic", "remember when", "grew up with"],
    ),
    (
        "quality assessment",
        &["quality", "well made", "holds up", "aged well"],
    ),
];

/// At least one of these must appear somewhere in the combined comment text,
/// and the chosen insight sentence must contain one itself.
const INSIGHT_MARKERS: [&str; 11] = [
    "pointed out",
    "noted that",
    "argued that",
    "explained that",
    "the key issue",
    "the real problem",
    "what matters",
    "importantly",
    "experience with",
    "found that",
    "discovered that",
];

const EXPERIENCE_MARKERS: [&str; 5] =
    ["i worked on", "i built", "we use", "in production", "at my company"];
const DEPTH_MARKERS: [&str; 3] = ["the issue is", "the problem with", "what actually happens"];
const HISTORY_MARKERS: [&str; 3] = ["this happened before", "similar to", "historically"];

/// Closed word lists used to check that a candidate sentence reads as a
/// complete clause rather than a fragment.
const SUBJECT_WORDS: [&str; 7] = ["the", "this", "it", "they", "i", "we", "commenters"];
const VERB_WORDS: [&str; 9] = [
    "is", "are", "was", "were", "shows", "indicates", "suggests", "notes", "explains",
];

const POSITIVE_WORDS: [&str; 7] = [
    "great", "excellent", "impressive", "useful", "helpful", "good", "well done",
];
const NEGATIVE_WORDS: [&str; 7] = [
    "problem", "issue", "concern", "flaw", "bad", "disappointing", "worried",
];

/// Fetch and synthesize. Any fetch failure degrades to "no synthesis".
pub async fn synthesize_thread(fetcher: &dyn ThreadFetcher, thread_id: u64) -> Option<String> {
    let raw = match fetcher.top_comments(thread_id, TOP_COMMENT_LIMIT).await {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = ?e, thread_id, "comment fetch failed");
            return None;
        }
    };
    synthesize_from_comments(&raw)
}

/// Pure synthesis over raw comment bodies. Returns `None` unless at least
/// two of {theme intro, insight sentence, sentiment line} can be produced.
pub fn synthesize_from_comments(raw: &[String]) -> Option<String> {
    let comments: Vec<String> = raw
        .iter()
        .map(|t| normalize_text(t))
        .filter(|t| {
            let n = t.chars().count();
            n > MIN_COMMENT_CHARS && n < MAX_COMMENT_CHARS
        })
        .collect();
    if comments.len() < MIN_QUALIFYING_COMMENTS {
        return None;
    }

    let all_text = comments
        .iter()
        .map(|c| c.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let themes: Vec<&str> = THEMES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| all_text.contains(k)))
        .map(|(theme, _)| *theme)
        .collect();

    let has_insight = INSIGHT_MARKERS.iter().any(|m| all_text.contains(m));

    // Stable descending rank, so equally-scored comments keep API order.
    let mut ranked: Vec<&String> = comments.iter().collect();
    ranked.sort_by_key(|c| std::cmp::Reverse(insight_score(c.as_str())));

    let mut parts: Vec<String> = Vec::new();

    if !themes.is_empty() && has_insight {
        let names = themes.iter().take(2).copied().collect::<Vec<_>>().join(", ");
        parts.push(format!("Commenters discussed {names}."));
    }

    let mut insight_added = false;
    if has_insight {
        'comments: for comment in ranked.iter().take(3) {
            let text = scrub_citations(comment.as_str());
            let sentences: Vec<String> = split_sentences(&text)
                .into_iter()
                .filter(|s| s.chars().count() > 50)
                .collect();
            for sent in sentences.iter().take(2) {
                let lower = sent.to_lowercase();
                if !INSIGHT_MARKERS.iter().any(|m| lower.contains(m)) {
                    continue;
                }
                let words: Vec<&str> = lower.split_whitespace().collect();
                let has_subject = SUBJECT_WORDS.iter().any(|w| words.contains(w));
                let has_verb = VERB_WORDS.iter().any(|w| words.contains(w));
                if has_subject && has_verb && sent.chars().count() < 350 {
                    parts.push(sent.clone());
                    insight_added = true;
                    break 'comments;
                }
            }
        }
    }

    // Sentiment only rides along with a substantive insight.
    if insight_added {
        let pos = count_hits(&comments, &POSITIVE_WORDS);
        let neg = count_hits(&comments, &NEGATIVE_WORDS);
        let line = if pos > neg + 1 {
            "Overall reception was positive."
        } else if neg > pos + 1 {
            "Significant concerns were raised."
        } else {
            "Mixed reactions with substantive debate."
        };
        parts.push(line.to_string());
    }

    if parts.len() >= 2 {
        Some(parts.join(" "))
    } else {
        None
    }
}

fn insight_score(text: &str) -> i32 {
    let lower = text.to_lowercase();
    let mut score = 0;
    if EXPERIENCE_MARKERS.iter().any(|m| lower.contains(m)) {
        score += 10;
    } else if DEPTH_MARKERS.iter().any(|m| lower.contains(m)) {
        score += 7;
    } else if HISTORY_MARKERS.iter().any(|m| lower.contains(m)) {
        score += 6;
    }
    if text.chars().count() < 120 {
        score -= 5;
    }
    score
}

fn count_hits(comments: &[String], words: &[&str]) -> usize {
    comments
        .iter()
        .map(|c| {
            let lower = c.to_lowercase();
            words.iter().filter(|w| lower.contains(*w)).count()
        })
        .sum()
}

fn scrub_citations(text: &str) -> String {
    static RE_CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").expect("citation regex"));
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
    let out = RE_CITATION.replace_all(text, "");
    RE_WS.replace_all(&out, " ").trim().to_string()
}
