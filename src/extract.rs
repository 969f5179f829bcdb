// src/extract.rs
//! Content extraction and executive summarization for digest items.
//!
//! Everything here is a total function: a URL that cannot be fetched or a
//! page with no usable text degrades to a fixed sentinel result instead of
//! an error. The `"Unable to extract"` prefix is the machine-checked
//! failure marker consumed by Stage 2 and the quality rubrics.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::discussion::{self, ThreadFetcher};
use crate::policy::SUMMARY_MAX_CHARS;
use crate::sources::truncate_chars;

/// Failure sentinel prefix shared by both degraded summaries.
pub const UNEXTRACTED_PREFIX: &str = "Unable to extract";
/// Significance text used when the source could not be fetched.
pub const UNAVAILABLE_SIGNIFICANCE: &str = "Source content unavailable — see original link.";
/// Significance fallback when no category keyword matched.
pub const GENERIC_SIGNIFICANCE: &str =
    "Interesting development in your areas of focus — monitoring for emerging patterns.";

/// Fetched article text is capped before any heuristic runs.
const ARTICLE_MAX_CHARS: usize = 8000;
/// Only this many leading sentences are scored for the summary.
const SCORED_SENTENCE_WINDOW: usize = 20;
/// Sentences at or under this length are noise (nav links, bylines).
const MIN_SENTENCE_CHARS: usize = 30;

/// Extracted and analyzed content for one article.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub title: String,
    pub url: String,
    pub executive_summary: String,
    pub significance: String,
    pub discussion_synthesis: Option<String>,
}

/// Seam for article retrieval so Stage 2 is testable without a network.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Readable text of the page at `url`, or `None` on any failure.
    async fn fetch_text(&self, url: &str) -> Option<String>;
}

pub struct HttpArticleFetcher {
    client: reqwest::Client,
}

impl HttpArticleFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpArticleFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(15))
            .header(
                reqwest::header::USER_AGENT,
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            )
            .send()
            .await;
        let html = match resp {
            Ok(r) => match r.text().await {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!(error = ?e, "article body read failed");
                    return None;
                }
            },
            Err(e) => {
                tracing::debug!(error = ?e, "article fetch failed");
                return None;
            }
        };
        readable_text(&html)
    }
}

static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("script regex"));
static RE_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("style regex"));
static RE_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<article[^>]*>(.*?)</article>").expect("article regex"));
static RE_MAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<main[^>]*>(.*?)</main>").expect("main regex"));
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

/// Readability pass over raw HTML: drop scripts/styles, prefer the first
/// `<article>`/`<main>` block, strip tags, decode entities, cap length.
pub fn readable_text(html: &str) -> Option<String> {
    let stripped = RE_SCRIPT.replace_all(html, " ");
    let stripped = RE_STYLE.replace_all(&stripped, " ");
    let body: &str = RE_ARTICLE
        .captures(&stripped)
        .or_else(|| RE_MAIN.captures(&stripped))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(&stripped);
    let text = RE_TAG.replace_all(body, " ");
    let text = html_escape::decode_html_entities(&text).to_string();
    let text = RE_WS.replace_all(&text, " ");
    let text = truncate_chars(text.trim(), ARTICLE_MAX_CHARS);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Split on terminal punctuation followed by whitespace. Segments come back
/// trimmed and unfiltered; each caller applies its own length floor.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    static RE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").expect("boundary regex"));
    let mut out = Vec::new();
    let mut last = 0;
    for m in RE_BOUNDARY.find_iter(text) {
        // keep the punctuation mark, drop the whitespace run
        let end = m.start() + 1;
        out.push(text[last..end].trim().to_string());
        last = m.end();
    }
    out.push(text[last..].trim().to_string());
    out
}

const RESULT_VERBS: [&str; 5] = ["found", "discovered", "revealed", "showed", "demonstrated"];
const CAUSAL_CONNECTIVES: [&str; 4] = ["because", "therefore", "as a result", "this means"];
const PROBLEM_WORDS: [&str; 4] = ["problem", "challenge", "issue", "crisis"];
const SOLUTION_WORDS: [&str; 4] = ["solution", "approach", "method", "strategy"];

/// Extractive 1-2 sentence narrative summary of article text.
pub fn synthesize_executive_summary(content: &str) -> String {
    let sentences: Vec<String> = split_sentences(content)
        .into_iter()
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .collect();

    if sentences.is_empty() {
        return "Unable to extract summary.".to_string();
    }

    let mut scored: Vec<(i32, usize)> = Vec::new();
    for (idx, sent) in sentences.iter().take(SCORED_SENTENCE_WINDOW).enumerate() {
        let lower = sent.to_lowercase();
        let len = sent.chars().count();
        let mut score = 0i32;
        if RESULT_VERBS.iter().any(|w| lower.contains(w)) {
            score += 3;
        }
        if CAUSAL_CONNECTIVES.iter().any(|w| lower.contains(w)) {
            score += 2;
        }
        if PROBLEM_WORDS.iter().any(|w| lower.contains(w)) {
            score += 2;
        }
        if SOLUTION_WORDS.iter().any(|w| lower.contains(w)) {
            score += 2;
        }
        if sent.chars().any(|c| c.is_ascii_digit()) {
            score += 1;
        }
        if len > 100 {
            score += 1;
        }
        if len > 300 {
            score -= 2;
        }
        scored.push((score, idx));
    }

    // Stable descending sort: score ties keep the original sentence order.
    scored.sort_by_key(|(score, _)| std::cmp::Reverse(*score));
    let top: Vec<usize> = scored.iter().take(3).map(|(_, idx)| *idx).collect();

    // Re-walk original order so the summary keeps narrative flow.
    let mut picked: Vec<&str> = Vec::new();
    for (idx, sent) in sentences.iter().enumerate() {
        if picked.len() < 2 && top.contains(&idx) {
            picked.push(sent);
        }
    }

    let summary = if picked.is_empty() {
        sentences[0].clone()
    } else {
        picked.join(" ")
    };
    let summary = RE_WS.replace_all(&summary, " ").trim().to_string();
    truncate_with_ellipsis(&summary, SUMMARY_MAX_CHARS)
}

/// Truncate to `max` chars total, marking the cut with a `...` suffix.
pub(crate) fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = truncate_chars(s, max.saturating_sub(3));
    out.push_str("...");
    out
}

/// One significance category: label, where to look, and the implication
/// clause appended when this is the first match.
#[derive(Debug, Deserialize)]
struct CategoryDef {
    label: String,
    #[serde(default)]
    title_keywords: Vec<String>,
    content_keywords: Vec<String>,
    #[serde(default)]
    content_window: Option<usize>,
    implication: String,
}

static CATEGORIES: Lazy<Vec<CategoryDef>> = Lazy::new(|| {
    let raw = include_str!("significance_categories.json");
    serde_json::from_str(raw).expect("valid significance category table")
});

fn head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Templated "why this matters" sentence from fixed keyword categories.
/// Detection order is the table order; only the first three matches are
/// ever combined, and the implication follows the first match.
pub fn analyze_significance(content: &str, title: &str) -> String {
    let content_lower = content.to_lowercase();
    let title_lower = title.to_lowercase();

    let mut matched: Vec<&CategoryDef> = Vec::new();
    for cat in CATEGORIES.iter() {
        let title_hit = cat
            .title_keywords
            .iter()
            .any(|k| title_lower.contains(k.as_str()));
        let window = match cat.content_window {
            Some(n) => head(&content_lower, n),
            None => content_lower.as_str(),
        };
        let content_hit = cat
            .content_keywords
            .iter()
            .any(|k| window.contains(k.as_str()));
        if title_hit || content_hit {
            matched.push(cat);
        }
    }

    if matched.is_empty() {
        return GENERIC_SIGNIFICANCE.to_string();
    }

    let base = match matched.len() {
        1 => matched[0].label.clone(),
        2 => format!("{} intersecting with {}", matched[0].label, matched[1].label),
        _ => format!(
            "{} at the intersection of {} and {}",
            matched[0].label, matched[1].label, matched[2].label
        ),
    };
    format!("{} {}", base, matched[0].implication)
}

/// Main entry for discussion-origin items: fetch the article, build the
/// summary and significance, and (when a thread is supplied) the discussion
/// synthesis. Never fails; a dead URL yields the degraded sentinel result.
pub async fn extract_and_summarize(
    articles: &dyn ArticleFetcher,
    threads: Option<(&dyn ThreadFetcher, u64)>,
    url: &str,
    title: &str,
) -> ExtractedContent {
    let Some(content) = articles.fetch_text(url).await else {
        return ExtractedContent {
            title: title.to_string(),
            url: url.to_string(),
            executive_summary: format!(
                "Unable to extract article content. Original title: {title}"
            ),
            significance: UNAVAILABLE_SIGNIFICANCE.to_string(),
            discussion_synthesis: None,
        };
    };

    let executive_summary = synthesize_executive_summary(&content);
    let significance = analyze_significance(&content, title);
    let discussion_synthesis = match threads {
        Some((fetcher, thread_id)) => discussion::synthesize_thread(fetcher, thread_id).await,
        None => None,
    };

    ExtractedContent {
        title: title.to_string(),
        url: url.to_string(),
        executive_summary,
        significance,
        discussion_synthesis,
    }
}
