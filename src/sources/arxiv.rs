// src/sources/arxiv.rs
//! Preprint-origin fetcher over the arXiv Atom API, with traction
//! enrichment (external-mention lookup, code-repository links in the
//! abstract).

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

use crate::sources::{
    ensure_metrics_described, normalize_text, truncate_chars, Paper, PaperProvider,
};

/// Categories polled for recent submissions.
const CATEGORIES: [&str; 7] = [
    "cs.AI", "cs.SE", "cs.CL", "cs.CY", "econ.GN", "econ.TH", "q-fin.EC",
];

/// Abstracts are capped before any downstream heuristic sees them.
const ABSTRACT_MAX_CHARS: usize = 500;

fn query_url(category: &str, max_results: usize) -> String {
    format!(
        "http://export.arxiv.org/api/query?search_query=cat:{category}&start=0&max_results={max_results}&sortBy=submittedDate&sortOrder=descending"
    )
}

fn mention_search_url(paper_id: &str) -> String {
    format!("https://hn.algolia.com/api/v1/search?query=arxiv.org/abs/{paper_id}&tags=story")
}

static RE_REPO_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com/[a-zA-Z0-9_-]+/[a-zA-Z0-9_-]+").expect("repo link regex")
});

fn parse_rfc3339_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts, &Rfc3339)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term")]
    term: Option<String>,
}

pub struct ArxivSource {
    mode: Mode,
}

enum Mode {
    /// Canned records for tests; traction flags come pre-filled.
    Fixture(Vec<Paper>),
    Http { client: reqwest::Client },
}

impl ArxivSource {
    pub fn http() -> Self {
        Self {
            mode: Mode::Http {
                client: reqwest::Client::new(),
            },
        }
    }

    pub fn from_fixture(papers: Vec<Paper>) -> Self {
        Self {
            mode: Mode::Fixture(papers),
        }
    }

    /// Whether the discussion origin has picked up this paper. Lookup
    /// failure leaves the signal unset rather than failing the fetch.
    async fn check_external_mention(&self, client: &reqwest::Client, paper_id: &str) -> bool {
        #[derive(Deserialize)]
        struct Hits {
            #[serde(default)]
            hits: Vec<serde_json::Value>,
        }

        let resp = client
            .get(mention_search_url(paper_id))
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        match resp {
            Ok(r) => match r.json::<Hits>().await {
                Ok(h) => !h.hits.is_empty(),
                Err(_) => false,
            },
            Err(e) => {
                tracing::debug!(error = ?e, paper_id, "mention lookup failed");
                false
            }
        }
    }
}

#[async_trait]
impl PaperProvider for ArxivSource {
    async fn fetch_recent(&self, days: i64, max_per_cat: usize) -> Result<Vec<Paper>> {
        ensure_metrics_described();
        match &self.mode {
            Mode::Fixture(papers) => Ok(papers.clone()),
            Mode::Http { client } => {
                let cutoff = chrono::Utc::now().timestamp().max(0) as u64
                    - (days.max(0) as u64) * 24 * 3600;

                let mut papers = Vec::new();
                for cat in CATEGORIES {
                    let body = match client
                        .get(query_url(cat, max_per_cat))
                        .timeout(Duration::from_secs(30))
                        .send()
                        .await
                    {
                        Ok(resp) => resp.text().await.context("reading feed body")?,
                        Err(e) => {
                            tracing::warn!(error = ?e, category = cat, "feed fetch failed");
                            counter!("source_provider_errors_total").increment(1);
                            continue;
                        }
                    };
                    match parse_feed_str(&body) {
                        Ok(mut batch) => {
                            batch.retain(|p| p.published_unix >= cutoff);
                            papers.append(&mut batch);
                        }
                        Err(e) => {
                            tracing::warn!(error = ?e, category = cat, "feed parse failed");
                            counter!("source_provider_errors_total").increment(1);
                        }
                    }
                    // Polite rate limit between category queries.
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }

                // Papers cross-listed in several categories show up once.
                let mut seen = HashSet::new();
                papers.retain(|p| seen.insert(p.id.clone()));

                for paper in papers.iter_mut() {
                    if self.check_external_mention(client, &paper.id).await {
                        paper.externally_mentioned = true;
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }

                Ok(papers)
            }
        }
    }

    fn name(&self) -> &'static str {
        "arxiv"
    }
}

/// Parse one Atom feed document into typed papers. Repo links are collected
/// from the abstract here so fixtures and HTTP mode agree.
pub fn parse_feed_str(s: &str) -> Result<Vec<Paper>> {
    let t0 = std::time::Instant::now();
    let feed: Feed = quick_xml::de::from_str(s).context("parsing preprint atom feed")?;

    let mut out = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let Some(paper) = paper_from_entry(entry) else {
            continue;
        };
        out.push(paper);
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("source_parse_ms").record(ms);
    counter!("source_items_total").increment(out.len() as u64);
    Ok(out)
}

fn paper_from_entry(entry: Entry) -> Option<Paper> {
    let id = normalize_paper_id(entry.id.as_deref()?);
    if id.is_empty() {
        return None;
    }
    let title = normalize_text(&entry.title?.replace('\n', " "));
    if title.is_empty() {
        return None;
    }

    let abstract_text = {
        let full = normalize_text(&entry.summary.unwrap_or_default().replace('\n', " "));
        truncate_chars(&full, ABSTRACT_MAX_CHARS)
    };
    let url = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .and_then(|l| l.href.clone())
        .unwrap_or_else(|| format!("https://arxiv.org/abs/{id}"));

    let repo_links = RE_REPO_LINK
        .find_iter(&abstract_text)
        .map(|m| m.as_str().to_string())
        .collect();

    Some(Paper {
        id,
        title,
        authors: entry
            .authors
            .into_iter()
            .filter_map(|a| a.name)
            .collect(),
        abstract_text,
        url,
        published_unix: entry
            .published
            .as_deref()
            .map(parse_rfc3339_to_unix)
            .unwrap_or(0),
        categories: entry
            .categories
            .into_iter()
            .filter_map(|c| c.term)
            .collect(),
        externally_mentioned: false,
        repo_links,
    })
}

/// "http://arxiv.org/abs/2401.12345v2" -> "2401.12345"
fn normalize_paper_id(raw: &str) -> String {
    let last = raw.rsplit('/').next().unwrap_or(raw);
    last.split('v').next().unwrap_or(last).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>query results</title>
  <entry>
    <id>http://arxiv.org/abs/2401.12345v2</id>
    <title>Retrieval at Scale:
 a Study</title>
    <summary>We found that retrieval improves accuracy.
 Code at github.com/acme/retrieval for reproduction.</summary>
    <published>2024-01-20T10:00:00Z</published>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link rel="alternate" href="http://arxiv.org/abs/2401.12345v2" type="text/html"/>
    <link rel="related" href="http://arxiv.org/pdf/2401.12345v2" title="pdf"/>
    <category term="cs.AI"/>
    <category term="cs.CL"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_with_repo_links_and_ids() {
        let papers = parse_feed_str(FEED).unwrap();
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.id, "2401.12345");
        assert_eq!(p.title, "Retrieval at Scale: a Study");
        assert_eq!(p.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(p.repo_links, vec!["github.com/acme/retrieval"]);
        assert_eq!(p.categories, vec!["cs.AI", "cs.CL"]);
        assert_eq!(p.url, "http://arxiv.org/abs/2401.12345v2");
        assert_eq!(p.published_unix, 1_705_744_800);
        assert!(!p.externally_mentioned);
    }

    #[test]
    fn paper_id_normalization_strips_version() {
        assert_eq!(normalize_paper_id("http://arxiv.org/abs/2312.00001v1"), "2312.00001");
        assert_eq!(normalize_paper_id("2312.00001"), "2312.00001");
    }

    #[test]
    fn malformed_feed_is_an_error_not_a_panic() {
        assert!(parse_feed_str("<feed><entry>").is_err());
    }
}
