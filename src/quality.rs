// src/quality.rs
//! Quality scoring for summarized items: four independent sub-scores in
//! [0,1] plus the weighted overall score that gates digest inclusion.
//! Every rubric is a pure function of its text inputs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::{split_sentences, UNEXTRACTED_PREFIX};
use crate::policy::{
    WEIGHT_COHERENCE, WEIGHT_COMPLETENESS, WEIGHT_DISCUSSION, WEIGHT_SIGNIFICANCE,
};

/// Quality assessment for one summarized item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub extraction_success: bool,
    /// Sentence flow and readability of the executive summary.
    pub coherence: f64,
    /// Whether the summary captures the article's main point.
    pub completeness: f64,
    /// Whether the significance tag is specific and on-category.
    pub significance_accuracy: f64,
    /// Discussion synthesis vs. generic filler (0.5 when not attempted).
    pub discussion_quality: f64,
}

impl QualityScore {
    /// Weighted overall score. A failed extraction zeroes everything,
    /// whatever the sub-scores say.
    pub fn overall(&self) -> f64 {
        if !self.extraction_success {
            return 0.0;
        }
        self.coherence * WEIGHT_COHERENCE
            + self.significance_accuracy * WEIGHT_SIGNIFICANCE
            + self.discussion_quality * WEIGHT_DISCUSSION
            + self.completeness * WEIGHT_COMPLETENESS
    }
}

/// Words that signal the summary carries substance rather than filler.
const SUBSTANTIVE_WORDS: [&str; 15] = [
    "found",
    "shows",
    "enables",
    "introduces",
    "built",
    "developed",
    "research",
    "approach",
    "system",
    "method",
    "results",
    "performance",
    "users",
    "data",
    "model",
];

const EXPLANATORY_WORDS: [&str; 10] = [
    "because", "by", "through", "using", "which", "that", "allows", "enables", "means", "results",
];

/// Category names a well-formed significance tag should mention.
const SIGNIFICANCE_CATEGORIES: [&str; 9] = [
    "privacy",
    "security",
    "ai/ml",
    "infrastructure",
    "market",
    "open source",
    "research",
    "preservation",
    "media",
];

const PERSONAL_IMPLICATION_WORDS: [&str; 4] = ["your", "relevant", "impact", "affects"];

const SYNTHESIS_INSIGHT_SIGNALS: [&str; 8] = [
    "pointed out",
    "noted",
    "argued",
    "explained",
    "experience",
    "production",
    "worked on",
    "built",
];

const SENTIMENT_WORDS: [&str; 5] = ["positive", "negative", "mixed", "concerns", "enthusiasm"];

/// Substring of the generic significance fallback; its presence caps the
/// significance score at the flat minimum.
const GENERIC_FALLBACK_MARKER: &str = "monitoring for emerging patterns";

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\w+").expect("word regex"));
static RE_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("digit regex"));

fn is_degraded(summary: &str) -> bool {
    summary.is_empty() || summary.starts_with(UNEXTRACTED_PREFIX)
}

/// How coherent and readable a summary is (0-1).
pub fn score_coherence(summary: &str) -> f64 {
    if is_degraded(summary) {
        return 0.0;
    }

    let mut score = 0.0;

    let sentence_count = split_sentences(summary)
        .iter()
        .filter(|s| s.chars().count() > 10)
        .count();
    if sentence_count >= 2 {
        score += 0.3;
    } else if sentence_count == 1 {
        score += 0.15;
    }

    let len = summary.chars().count();
    if (80..=400).contains(&len) {
        score += 0.25;
    } else if len > 400 {
        score += 0.1;
    }

    let trimmed = summary.trim_end();
    if trimmed.ends_with("...\"") {
        score += 0.15;
    } else if trimmed.ends_with("...") {
        // Truncated, but marked as such.
        score += 0.05;
    } else if trimmed.ends_with(['.', '!', '?']) {
        score += 0.15;
    }

    let lower = summary.to_lowercase();
    let matches = SUBSTANTIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    score += (matches as f64 * 0.05).min(0.2);

    if !summary.contains('<') && !summary.contains("&amp;") {
        score += 0.1;
    }

    score.min(1.0)
}

/// Whether the summary captures the main point of the titled article (0-1).
pub fn score_completeness(summary: &str, title: &str, url: &str) -> f64 {
    if is_degraded(summary) {
        return 0.0;
    }

    let mut score = 0.0;
    let summary_lower = summary.to_lowercase();
    let title_lower = title.to_lowercase();

    let title_words: Vec<&str> = RE_WORD
        .find_iter(&title_lower)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() > 3)
        .collect();
    if !title_words.is_empty() {
        let overlap = title_words
            .iter()
            .filter(|w| summary_lower.contains(*w))
            .count();
        score += (overlap as f64 / title_words.len() as f64).min(1.0) * 0.4;
    }

    // Domain tokens give a cheap cross-check that the extracted text really
    // belongs to the linked page.
    if !url.is_empty() {
        let domain = url.split('/').nth(2).unwrap_or("");
        let domain_keywords: Vec<String> = domain
            .replace(['.', '-'], " ")
            .split_whitespace()
            .filter(|k| k.chars().count() > 3 && !matches!(*k, "github" | "com" | "www" | "blog"))
            .map(|k| k.to_string())
            .collect();
        if !domain_keywords.is_empty() {
            let overlap = domain_keywords
                .iter()
                .filter(|k| summary_lower.contains(k.as_str()))
                .count();
            score += (overlap as f64 / domain_keywords.len() as f64).min(1.0) * 0.15;
        }
    }

    if summary.chars().count() as f64 > title.chars().count() as f64 * 1.5 {
        score += 0.3;
    }

    if EXPLANATORY_WORDS.iter().any(|w| summary_lower.contains(w)) {
        score += 0.2;
    }

    if RE_DIGIT.is_match(summary) {
        score += 0.1;
    }

    // Topic-drift penalty: none of the top title keywords present means the
    // extractor likely grabbed the wrong content.
    if title_words.len() >= 2 {
        let key_matches = title_words
            .iter()
            .take(3)
            .filter(|w| summary_lower.contains(*w))
            .count();
        if key_matches == 0 {
            score = (score - 0.5).max(0.0);
        }
    }

    score.min(1.0)
}

/// Whether the significance tag is accurate and specific (0-1).
pub fn score_significance_accuracy(significance: &str) -> f64 {
    if significance.is_empty() {
        return 0.0;
    }

    let lower = significance.to_lowercase();
    if lower.contains(GENERIC_FALLBACK_MARKER) {
        return 0.15;
    }

    let mut score: f64 = 0.3;

    if SIGNIFICANCE_CATEGORIES.iter().any(|c| lower.contains(c)) {
        score += 0.3;
    }

    if PERSONAL_IMPLICATION_WORDS.iter().any(|w| lower.contains(w)) {
        score += 0.2;
    }

    let len = significance.chars().count();
    if (30..=200).contains(&len) {
        score += 0.2;
    }

    score.min(1.0)
}

/// Discussion synthesis quality (0-1). `None` means synthesis was never
/// attempted (non-discussion origin) and scores a neutral 0.5.
pub fn score_discussion_synthesis(synthesis: Option<&str>) -> f64 {
    let Some(synthesis) = synthesis else {
        return 0.5;
    };
    if synthesis.is_empty() {
        return 0.0;
    }

    let mut score: f64 = 0.0;
    let lower = synthesis.to_lowercase();

    if lower.contains("discussed") || lower.contains("debate") || lower.contains("commenters") {
        score += 0.2;
    }

    if SYNTHESIS_INSIGHT_SIGNALS.iter().any(|s| lower.contains(s)) {
        score += 0.25;
    }

    if split_sentences(synthesis).len() >= 2 {
        score += 0.2;
    }

    if SENTIMENT_WORDS.iter().any(|w| lower.contains(w)) {
        score += 0.15;
    }

    let len = synthesis.chars().count();
    if (50..=400).contains(&len) {
        score += 0.2;
    }

    score.min(1.0)
}

/// Assess the overall quality of a summarized item.
pub fn assess_quality(
    summary: &str,
    title: &str,
    significance: &str,
    url: &str,
    discussion_synthesis: Option<&str>,
    extraction_success: bool,
) -> QualityScore {
    QualityScore {
        extraction_success,
        coherence: score_coherence(summary),
        completeness: score_completeness(summary, title, url),
        significance_accuracy: score_significance_accuracy(significance),
        discussion_quality: score_discussion_synthesis(discussion_synthesis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_SUMMARY: &str = "Researchers found that the caching system cut lookup latency by 40 percent. \
         The approach works because every record carries a version stamp.";

    #[test]
    fn degraded_summary_zeroes_coherence_and_overall() {
        let summary = "Unable to extract article content. Original title: X";
        assert_eq!(score_coherence(summary), 0.0);
        let q = assess_quality(summary, "X", "whatever", "https://a.test/x", None, false);
        assert_eq!(q.overall(), 0.0);
    }

    #[test]
    fn extraction_failure_zeroes_overall_even_with_high_subscores() {
        let q = QualityScore {
            extraction_success: false,
            coherence: 1.0,
            completeness: 1.0,
            significance_accuracy: 1.0,
            discussion_quality: 1.0,
        };
        assert_eq!(q.overall(), 0.0);
    }

    #[test]
    fn coherent_two_sentence_summary_scores_high() {
        let score = score_coherence(GOOD_SUMMARY);
        // 2 sentences + in-range length + terminal period + substantive
        // words + no markup.
        assert!(score > 0.9, "got {score}");
        assert!(score <= 1.0);
    }

    #[test]
    fn markup_artifacts_forfeit_the_cleanliness_bonus() {
        let clean = score_coherence("The system shows good results in tests overall, with data to back it up somewhere.");
        let dirty = score_coherence("The system shows good <b>results</b> in tests overall, with data to back it up somewhere.");
        assert!((clean - dirty - 0.1).abs() < 1e-9);
    }

    #[test]
    fn ellipsis_counts_less_than_terminal_punctuation() {
        let terminal = score_coherence("The pipeline design is straightforward and its parts compose without friction anywhere.");
        let ellipsis = score_coherence("The pipeline design is straightforward and its parts compose without friction anywher...");
        assert!((terminal - ellipsis - 0.1).abs() < 1e-9);
    }

    #[test]
    fn completeness_rewards_title_overlap_and_detail() {
        let score = score_completeness(
            "The caching system uses version stamps, which cut latency by 40 percent.",
            "Caching system with version stamps",
            "https://caching.test/post",
        );
        assert!(score > 0.7, "got {score}");
    }

    #[test]
    fn topic_drift_is_penalized() {
        let on_topic = score_completeness(
            "The televised series returns with remastered episodes through a new deal.",
            "Televised series remastered",
            "",
        );
        let drifted = score_completeness(
            "Buy the trade paperback now at a discount through our store.",
            "Televised series remastered",
            "",
        );
        assert!(drifted < on_topic);
        assert!(drifted < 0.5);
    }

    #[test]
    fn generic_significance_fallback_scores_flat_minimum() {
        assert_eq!(
            score_significance_accuracy(
                "Interesting development in your areas of focus — monitoring for emerging patterns."
            ),
            0.15
        );
        assert_eq!(score_significance_accuracy(""), 0.0);
    }

    #[test]
    fn specific_significance_accumulates_bonuses() {
        let score = score_significance_accuracy(
            "Infrastructure tooling — directly relevant to your DevOps work.",
        );
        // not-fallback + category + personalized + length
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn synthesis_neutral_when_not_attempted_zero_when_empty() {
        assert_eq!(score_discussion_synthesis(None), 0.5);
        assert_eq!(score_discussion_synthesis(Some("")), 0.0);
    }

    #[test]
    fn rich_synthesis_scores_near_top() {
        let synthesis = "Commenters discussed technical implementation, privacy concerns. \
             One noted that the rollout worked in production. Overall reception was positive.";
        let score = score_discussion_synthesis(Some(synthesis));
        assert!((score - 1.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn all_subscores_stay_in_unit_interval() {
        let nasty = "<<<>>> &amp; ".repeat(100);
        for s in [
            "",
            " ",
            "one.",
            nasty.as_str(),
            GOOD_SUMMARY,
        ] {
            for score in [
                score_coherence(s),
                score_completeness(s, "some title words here", "https://x.test/a"),
                score_significance_accuracy(s),
                score_discussion_synthesis(Some(s)),
            ] {
                assert!((0.0..=1.0).contains(&score), "{score} out of range for {s:?}");
            }
        }
    }

    #[test]
    fn rescoring_is_idempotent() {
        let a = assess_quality(
            GOOD_SUMMARY,
            "Caching system",
            "Infrastructure tooling — directly relevant to your DevOps work.",
            "https://caching.test/post",
            Some("Commenters discussed criticisms. One noted that it holds up."),
            true,
        );
        let b = assess_quality(
            GOOD_SUMMARY,
            "Caching system",
            "Infrastructure tooling — directly relevant to your DevOps work.",
            "https://caching.test/post",
            Some("Commenters discussed criticisms. One noted that it holds up."),
            true,
        );
        assert_eq!(a, b);
        assert_eq!(a.overall(), b.overall());
    }
}
