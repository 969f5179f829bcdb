// src/pipeline.rs
//! The three-stage digest pipeline: wide-funnel candidate selection,
//! summarization with quality scoring, and threshold-gated assembly.
//!
//! Each stage is a one-shot transformation of the previous stage's full
//! output; no stage retries or reaches back. The pipeline itself is
//! infallible: collaborator failures degrade locally and the caller always
//! receives a `PipelineResult`.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::discussion::ThreadFetcher;
use crate::extract::{self, ArticleFetcher, HttpArticleFetcher, UNEXTRACTED_PREFIX};
use crate::history::{anon_hash, HistoryStore};
use crate::policy::{
    MAX_CANDIDATES, MAX_ITEMS, MAX_PAPERS_PER_CATEGORY, MIN_ITEMS, MIN_QUALITY,
    MIN_STORY_COMMENTS, MIN_STORY_POINTS, PAPER_WINDOW_DAYS, POTENTIAL_REPO_BONUS,
    STORY_FETCH_LIMIT, SUMMARY_MAX_CHARS, TRACTION_EXTERNAL_MENTION, TRACTION_REPO_LINK,
};
use crate::quality::assess_quality;
use crate::quality::QualityScore;
use crate::render;
use crate::sources::arxiv::ArxivSource;
use crate::sources::hackernews::{filter_interesting, HackerNewsSource};
use crate::sources::{truncate_chars, Origin, PaperProvider, StoryProvider};

/// Skip reason when Stage 1 comes back empty.
pub const NO_CANDIDATES_REASON: &str = "No candidates found from any source.";

/// A candidate item from Stage 1, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub origin: Origin,
    pub title: String,
    /// Canonical URL; the deduplication key.
    pub url: String,
    pub potential_score: f64,
    pub details: CandidateDetails,
}

/// Origin-specific payload. A preprint can never carry a thread id, and a
/// story never carries traction signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateDetails {
    Discussion {
        thread_id: u64,
        points: u32,
        comments: u32,
        category: String,
    },
    Preprint {
        paper_id: String,
        authors: Vec<String>,
        abstract_text: String,
        traction_score: f64,
        repo_links: Vec<String>,
    },
}

impl Candidate {
    pub fn category(&self) -> &str {
        match &self.details {
            CandidateDetails::Discussion { category, .. } => category,
            CandidateDetails::Preprint { .. } => "research",
        }
    }
}

/// A candidate after Stage 2 summarization and quality scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizedItem {
    pub candidate: Candidate,
    pub extraction_success: bool,
    pub executive_summary: String,
    pub significance: String,
    pub discussion_synthesis: Option<String>,
    pub quality: QualityScore,
}

impl SummarizedItem {
    pub fn quality_score(&self) -> f64 {
        self.quality.overall()
    }
}

/// Final output from one pipeline run. Exactly one of `digest_path` and
/// `skipped_reason` is set once the run completes.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub candidates_found: usize,
    pub candidates_summarized: usize,
    pub items_selected: usize,
    pub digest_path: Option<PathBuf>,
    pub skipped_reason: Option<String>,
    pub selected: Vec<SummarizedItem>,
}

/// Injected Stage-1 collaborators. An absent slot is simply never queried.
pub struct SourceSet<'a> {
    pub stories: Option<&'a dyn StoryProvider>,
    pub papers: Option<&'a dyn PaperProvider>,
}

/* ----------------------------
Stage 1: selection (wide funnel)
---------------------------- */

/// Potential of a discussion story: raw engagement plus the
/// comments-per-point ratio as a controversy proxy.
pub fn story_potential(points: u32, comments: u32) -> f64 {
    let mut score = (points as f64 / 50.0).min(3.0) * 20.0
        + (comments as f64 / 50.0).min(2.0) * 10.0;
    if points > 0 {
        score += (comments as f64 / points as f64).min(1.0) * 10.0;
    }
    round2(score)
}

/// Potential of a preprint: traction base plus a bonus for an available
/// implementation.
pub fn paper_potential(traction: f64, has_repo: bool) -> f64 {
    round2(traction + if has_repo { POTENTIAL_REPO_BONUS } else { 0.0 })
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Fetch from all enabled origins, drop already-sent URLs, score potential,
/// keep the top candidates. A failing origin contributes nothing; it never
/// aborts the run.
pub async fn select_candidates(
    config: &Config,
    sources: &SourceSet<'_>,
    history: &HistoryStore,
) -> Vec<Candidate> {
    crate::sources::ensure_metrics_described();

    let mut candidates: Vec<Candidate> = Vec::new();
    // URLs must be unique within one run even across origins.
    let mut seen: HashSet<String> = HashSet::new();

    if config.sources.hackernews.enabled {
        if let Some(provider) = sources.stories {
            info!(stage = 1, source = provider.name(), "fetching stories");
            let stories = match provider.fetch_top(STORY_FETCH_LIMIT).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = ?e, source = provider.name(), "provider error");
                    counter!("source_provider_errors_total").increment(1);
                    Vec::new()
                }
            };
            for story in filter_interesting(stories, MIN_STORY_POINTS, MIN_STORY_COMMENTS) {
                if history.has_been_sent(&story.url) || !seen.insert(story.url.clone()) {
                    debug!(url = %anon_hash(&story.url), "already sent, skipping");
                    continue;
                }
                candidates.push(Candidate {
                    origin: Origin::Discussion,
                    potential_score: story_potential(story.points, story.comments),
                    title: story.title,
                    url: story.url,
                    details: CandidateDetails::Discussion {
                        thread_id: story.id,
                        points: story.points,
                        comments: story.comments,
                        category: story.category,
                    },
                });
            }
        }
    }

    if config.sources.arxiv.enabled {
        if let Some(provider) = sources.papers {
            info!(stage = 1, source = provider.name(), "fetching papers");
            let papers = match provider
                .fetch_recent(PAPER_WINDOW_DAYS, MAX_PAPERS_PER_CATEGORY)
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = ?e, source = provider.name(), "provider error");
                    counter!("source_provider_errors_total").increment(1);
                    Vec::new()
                }
            };
            for paper in papers {
                if history.has_been_sent(&paper.url) || !seen.insert(paper.url.clone()) {
                    debug!(url = %anon_hash(&paper.url), "already sent, skipping");
                    continue;
                }
                let mut traction = 0.0;
                if paper.externally_mentioned {
                    traction += TRACTION_EXTERNAL_MENTION;
                }
                if !paper.repo_links.is_empty() {
                    traction += TRACTION_REPO_LINK;
                }
                candidates.push(Candidate {
                    origin: Origin::Preprint,
                    potential_score: paper_potential(traction, !paper.repo_links.is_empty()),
                    title: paper.title,
                    url: paper.url,
                    details: CandidateDetails::Preprint {
                        paper_id: paper.id,
                        authors: paper.authors.into_iter().take(3).collect(),
                        abstract_text: paper.abstract_text,
                        traction_score: traction,
                        repo_links: paper.repo_links,
                    },
                });
            }
        }
    }

    let total = candidates.len();
    // Stable sort: potential ties keep fetch order.
    candidates.sort_by(|a, b| {
        b.potential_score
            .partial_cmp(&a.potential_score)
            .unwrap_or(Ordering::Equal)
    });
    candidates.truncate(MAX_CANDIDATES);

    counter!("pipeline_candidates_total").increment(candidates.len() as u64);
    info!(stage = 1, total, kept = candidates.len(), "selection complete");
    candidates
}

/* ----------------------------
Stage 2: summarize (generate many)
---------------------------- */

fn truncate_abstract(text: &str) -> String {
    let mut out = truncate_chars(text, SUMMARY_MAX_CHARS);
    if text.chars().count() > SUMMARY_MAX_CHARS {
        out.push_str("...");
    }
    out
}

fn preprint_significance(category: &str, has_repo: bool) -> String {
    let mut s = format!("Recent research in {category}");
    if has_repo {
        s.push_str(" with available implementation");
    }
    s.push_str(" — potential relevance to technical work.");
    s
}

async fn summarize_one(
    articles: &dyn ArticleFetcher,
    threads: Option<&dyn ThreadFetcher>,
    candidate: Candidate,
) -> SummarizedItem {
    match &candidate.details {
        CandidateDetails::Discussion { thread_id, .. } => {
            let thread_id = *thread_id;
            let extracted = extract::extract_and_summarize(
                articles,
                threads.map(|t| (t, thread_id)),
                &candidate.url,
                &candidate.title,
            )
            .await;
            let extraction_success = !extracted
                .executive_summary
                .starts_with(UNEXTRACTED_PREFIX);
            let quality = assess_quality(
                &extracted.executive_summary,
                &candidate.title,
                &extracted.significance,
                &candidate.url,
                extracted.discussion_synthesis.as_deref(),
                extraction_success,
            );
            SummarizedItem {
                candidate,
                extraction_success,
                executive_summary: extracted.executive_summary,
                significance: extracted.significance,
                discussion_synthesis: extracted.discussion_synthesis,
                quality,
            }
        }
        CandidateDetails::Preprint {
            abstract_text,
            repo_links,
            ..
        } => {
            // No content fetch for preprints; the abstract is the summary.
            let executive_summary = truncate_abstract(abstract_text);
            let significance = preprint_significance(candidate.category(), !repo_links.is_empty());
            let quality = assess_quality(
                &executive_summary,
                &candidate.title,
                &significance,
                &candidate.url,
                None,
                true,
            );
            SummarizedItem {
                candidate,
                extraction_success: true,
                executive_summary,
                significance,
                discussion_synthesis: None,
                quality,
            }
        }
    }
}

/// Extract and score every candidate in input order, then sort by overall
/// quality descending. The sort is stable, so quality ties keep the Stage-1
/// potential ordering.
pub async fn summarize_candidates(
    articles: &dyn ArticleFetcher,
    threads: Option<&dyn ThreadFetcher>,
    candidates: Vec<Candidate>,
) -> Vec<SummarizedItem> {
    let total = candidates.len();
    let mut results = Vec::with_capacity(total);

    for (i, candidate) in candidates.into_iter().enumerate() {
        info!(
            stage = 2,
            item = i + 1,
            total,
            title = %truncate_chars(&candidate.title, 55),
            "summarizing"
        );
        let item = summarize_one(articles, threads, candidate).await;
        if item.extraction_success {
            debug!(quality = item.quality_score(), "scored");
        } else {
            debug!("extraction failed");
        }
        results.push(item);
    }

    results.sort_by(|a, b| {
        b.quality_score()
            .partial_cmp(&a.quality_score())
            .unwrap_or(Ordering::Equal)
    });
    results
}

/* ----------------------------
Stage 3: assembly (filter to best)
---------------------------- */

/// Quality gate: items at or above `min_quality`, capped at `max_items`,
/// in the order given.
pub fn select_items(
    summarized: &[SummarizedItem],
    min_quality: f64,
    max_items: usize,
) -> Vec<SummarizedItem> {
    summarized
        .iter()
        .filter(|s| s.quality_score() >= min_quality)
        .take(max_items)
        .cloned()
        .collect()
}

/// Apply the quality gate and either render the digest or skip with a
/// reason. Skipped-but-selected items stay attached for diagnostics.
pub fn assemble_digest(summarized: Vec<SummarizedItem>, output_dir: &Path) -> PipelineResult {
    let candidates_found = summarized.len();
    let candidates_summarized = summarized.iter().filter(|s| s.extraction_success).count();

    let selected = select_items(&summarized, MIN_QUALITY, MAX_ITEMS);
    info!(
        stage = 3,
        summarized = candidates_found,
        selected = selected.len(),
        threshold = MIN_QUALITY,
        "quality gate applied"
    );

    if selected.len() < MIN_ITEMS {
        let reason = format!(
            "Only {} items met quality threshold (need {}). Skipping digest — quality > quantity.",
            selected.len(),
            MIN_ITEMS
        );
        info!(%reason, "digest skipped");
        return PipelineResult {
            candidates_found,
            candidates_summarized,
            items_selected: selected.len(),
            digest_path: None,
            skipped_reason: Some(reason),
            selected,
        };
    }

    let now = chrono::Local::now();
    let html = render::render_digest(&selected, &now.format("%B %d, %Y").to_string());
    match render::save_digest(&html, output_dir, &now.format("%Y-%m-%d").to_string()) {
        Ok(path) => PipelineResult {
            candidates_found,
            candidates_summarized,
            items_selected: selected.len(),
            digest_path: Some(path),
            skipped_reason: None,
            selected,
        },
        Err(e) => {
            warn!(error = ?e, "failed to write digest");
            PipelineResult {
                candidates_found,
                candidates_summarized,
                items_selected: selected.len(),
                digest_path: None,
                skipped_reason: Some(format!("Failed to write digest: {e}")),
                selected,
            }
        }
    }
}

/* ----------------------------
Entry points
---------------------------- */

/// Run the full pipeline against the live collaborators.
pub async fn run_pipeline(
    config: &Config,
    history: &HistoryStore,
    output_dir: &Path,
) -> PipelineResult {
    let hn = HackerNewsSource::http();
    let arxiv = ArxivSource::http();
    let articles = HttpArticleFetcher::new();
    let sources = SourceSet {
        stories: Some(&hn),
        papers: Some(&arxiv),
    };
    run_pipeline_with(config, &sources, &articles, Some(&hn), history, output_dir).await
}

/// Same pipeline with every collaborator injected; the seam used by tests.
pub async fn run_pipeline_with(
    config: &Config,
    sources: &SourceSet<'_>,
    articles: &dyn ArticleFetcher,
    threads: Option<&dyn ThreadFetcher>,
    history: &HistoryStore,
    output_dir: &Path,
) -> PipelineResult {
    info!("pipeline start");

    let candidates = select_candidates(config, sources, history).await;
    if candidates.is_empty() {
        info!("no candidates; nothing to do");
        return PipelineResult {
            candidates_found: 0,
            candidates_summarized: 0,
            items_selected: 0,
            digest_path: None,
            skipped_reason: Some(NO_CANDIDATES_REASON.to_string()),
            selected: Vec::new(),
        };
    }

    let summarized = summarize_candidates(articles, threads, candidates).await;
    let result = assemble_digest(summarized, output_dir);

    info!(
        found = result.candidates_found,
        summarized = result.candidates_summarized,
        selected = result.items_selected,
        "pipeline complete"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_potential_matches_worked_example() {
        // min(100/50,3)*20 + min(30/50,2)*10 + min(30/100,1)*10 = 49.0
        assert_eq!(story_potential(100, 30), 49.0);
    }

    #[test]
    fn story_potential_zero_points_drops_ratio_term() {
        // Only the comment term contributes.
        assert_eq!(story_potential(0, 50), 10.0);
    }

    #[test]
    fn story_potential_caps_each_term() {
        // 3.0*20 + 2.0*10 + 1.0*10
        assert_eq!(story_potential(10_000, 10_000), 90.0);
    }

    #[test]
    fn story_potential_is_deterministic() {
        assert_eq!(story_potential(73, 41), story_potential(73, 41));
    }

    #[test]
    fn paper_potential_adds_repo_bonus_on_top_of_traction() {
        assert_eq!(paper_potential(50.0, true), 60.0);
        assert_eq!(paper_potential(30.0, false), 30.0);
        assert_eq!(paper_potential(0.0, false), 0.0);
    }

    #[test]
    fn preprint_significance_mentions_implementation_only_with_repo() {
        assert_eq!(
            preprint_significance("research", true),
            "Recent research in research with available implementation — potential relevance to technical work."
        );
        assert_eq!(
            preprint_significance("research", false),
            "Recent research in research — potential relevance to technical work."
        );
    }

    #[test]
    fn abstract_truncation_appends_marker_only_when_cut() {
        let short = "A result.";
        assert_eq!(truncate_abstract(short), short);
        let long = "x".repeat(450);
        let out = truncate_abstract(&long);
        assert_eq!(out.chars().count(), 403);
        assert!(out.ends_with("..."));
    }

    fn dummy_item(quality_stub: f64) -> SummarizedItem {
        // Coherence is the only nonzero sub-score; overall = 0.3 * coherence.
        SummarizedItem {
            candidate: Candidate {
                origin: Origin::Discussion,
                title: "t".into(),
                url: format!("https://x.test/{quality_stub}"),
                potential_score: 1.0,
                details: CandidateDetails::Discussion {
                    thread_id: 1,
                    points: 1,
                    comments: 1,
                    category: "tech".into(),
                },
            },
            extraction_success: true,
            executive_summary: "s".into(),
            significance: "".into(),
            discussion_synthesis: None,
            quality: QualityScore {
                extraction_success: true,
                coherence: quality_stub,
                completeness: 0.0,
                significance_accuracy: 0.0,
                discussion_quality: 0.0,
            },
        }
    }

    #[test]
    fn raising_the_threshold_never_selects_more() {
        let items: Vec<SummarizedItem> =
            [0.9, 0.8, 0.5, 0.4, 0.2].into_iter().map(dummy_item).collect();
        let mut last = usize::MAX;
        for threshold in [0.0, 0.1, 0.15, 0.2, 0.25, 0.3] {
            let count = select_items(&items, threshold, MAX_ITEMS).len();
            assert!(count <= last, "threshold {threshold} selected more items");
            last = count;
        }
    }

    #[test]
    fn select_items_caps_at_max() {
        let items: Vec<SummarizedItem> = (0..10).map(|_| dummy_item(1.0)).collect();
        assert_eq!(select_items(&items, 0.0, MAX_ITEMS).len(), MAX_ITEMS);
    }
}
