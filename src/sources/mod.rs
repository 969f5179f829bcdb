// src/sources/mod.rs
//! Source collaborators: typed records per origin, async provider traits,
//! and shared text normalization. Providers never let network failures cross
//! the core boundary; callers receive an error to log and treat as "no
//! candidates from this origin".

pub mod arxiv;
pub mod hackernews;

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// Which stream a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "hn")]
    Discussion,
    #[serde(rename = "arxiv")]
    Preprint,
}

impl Origin {
    /// Stable short tag used in records, logs, and rendered output.
    pub fn label(&self) -> &'static str {
        match self {
            Origin::Discussion => "hn",
            Origin::Preprint => "arxiv",
        }
    }
}

/// A discussion-aggregator story, as surfaced by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub points: u32,
    pub comments: u32,
    pub category: String,
}

/// A preprint with traction signals already attached by the fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub url: String,
    pub published_unix: u64,
    pub categories: Vec<String>,
    pub externally_mentioned: bool,
    pub repo_links: Vec<String>,
}

#[async_trait::async_trait]
pub trait StoryProvider: Send + Sync {
    async fn fetch_top(&self, limit: usize) -> anyhow::Result<Vec<Story>>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait PaperProvider: Send + Sync {
    async fn fetch_recent(&self, days: i64, max_per_cat: usize) -> anyhow::Result<Vec<Paper>>;
    fn name(&self) -> &'static str;
}

/// One-time metrics registration (facade only; an embedding host may wire an
/// exporter and pick these series up).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("source_items_total", "Items parsed from source providers.");
        describe_counter!("source_provider_errors_total", "Provider fetch/parse errors.");
        describe_histogram!("source_parse_ms", "Provider parse time in milliseconds.");
        describe_counter!(
            "pipeline_candidates_total",
            "Candidates surviving Stage 1 dedup."
        );
    });
}

/// Normalize text pulled out of feeds and APIs: decode HTML entities, strip
/// tags, normalize curly quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Char-boundary-safe prefix of at most `max` chars.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => s[..i].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_decodes_strips_and_collapses() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p>  \u{201C}ok\u{201D} ";
        assert_eq!(normalize_text(s), "Hello, world \"ok\"");
    }

    #[test]
    fn normalize_text_keeps_terminal_punctuation() {
        // Abstracts feed the coherence rubric; the final period must survive.
        assert_eq!(normalize_text("A result.\n"), "A result.");
    }

    #[test]
    fn origin_labels_are_stable() {
        assert_eq!(Origin::Discussion.label(), "hn");
        assert_eq!(Origin::Preprint.label(), "arxiv");
    }
}
