// src/sources/hackernews.rs
//! Discussion-origin fetcher over the Hacker News Firebase API, plus the
//! comment fetch used by discussion synthesis.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use crate::discussion::ThreadFetcher;
use crate::sources::{ensure_metrics_described, normalize_text, Story, StoryProvider};

const TOP_STORIES_URL: &str = "https://hacker-news.firebaseio.com/v0/topstories.json";

fn item_url(id: u64) -> String {
    format!("https://hacker-news.firebaseio.com/v0/item/{id}.json")
}

/// Title keywords used to categorize stories. Most hits wins; default "tech".
const CATEGORIES: [(&str, &[&str]); 3] = [
    (
        "tech",
        &[
            "ai",
            "llm",
            "claude",
            "gpt",
            "machine learning",
            "database",
            "infrastructure",
            "cloud",
            "kubernetes",
            "observability",
            "mcp",
            "server",
            "api",
            "code",
            "programming",
            "developer",
        ],
    ),
    (
        "economics",
        &[
            "startup",
            "business",
            "finance",
            "market",
            "economy",
            "valuation",
            "revenue",
            "profit",
            "venture",
            "ipo",
        ],
    ),
    (
        "science",
        &[
            "physics",
            "biology",
            "research",
            "study",
            "paper",
            "experiment",
            "discovery",
            "breakthrough",
        ],
    ),
];

/// Raw Firebase item payload. Stories and comments share this shape.
#[derive(Debug, Deserialize)]
struct ItemJson {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    score: Option<u32>,
    descendants: Option<u32>,
    kids: Option<Vec<u64>>,
    text: Option<String>,
}

pub struct HackerNewsSource {
    mode: Mode,
}

enum Mode {
    /// Canned records for tests; no network.
    Fixture {
        stories: Vec<Story>,
        comments: HashMap<u64, Vec<String>>,
    },
    Http {
        client: reqwest::Client,
    },
}

impl HackerNewsSource {
    pub fn http() -> Self {
        Self {
            mode: Mode::Http {
                client: reqwest::Client::new(),
            },
        }
    }

    pub fn from_fixture(stories: Vec<Story>) -> Self {
        Self::from_fixture_with_comments(stories, HashMap::new())
    }

    pub fn from_fixture_with_comments(
        stories: Vec<Story>,
        comments: HashMap<u64, Vec<String>>,
    ) -> Self {
        Self {
            mode: Mode::Fixture { stories, comments },
        }
    }

    async fn fetch_story(&self, client: &reqwest::Client, id: u64) -> Option<Story> {
        let resp = client
            .get(item_url(id))
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        let item: ItemJson = match resp {
            Ok(r) => match r.json().await {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(error = ?e, id, "story json decode failed");
                    counter!("source_provider_errors_total").increment(1);
                    return None;
                }
            },
            Err(e) => {
                tracing::debug!(error = ?e, id, "story fetch failed");
                counter!("source_provider_errors_total").increment(1);
                return None;
            }
        };
        story_from_json(id, item)
    }

    async fn fetch_comment_text(&self, client: &reqwest::Client, id: u64) -> Option<String> {
        let resp = client
            .get(item_url(id))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .ok()?;
        let item: ItemJson = resp.json().await.ok()?;
        if item.kind.as_deref() != Some("comment") {
            return None;
        }
        item.text
    }
}

#[async_trait]
impl StoryProvider for HackerNewsSource {
    async fn fetch_top(&self, limit: usize) -> Result<Vec<Story>> {
        ensure_metrics_described();
        match &self.mode {
            Mode::Fixture { stories, .. } => Ok(stories.iter().take(limit).cloned().collect()),
            Mode::Http { client } => {
                let ids: Vec<u64> = client
                    .get(TOP_STORIES_URL)
                    .timeout(Duration::from_secs(30))
                    .send()
                    .await
                    .context("fetching top story ids")?
                    .json()
                    .await
                    .context("decoding top story ids")?;

                let mut stories = Vec::new();
                for id in ids.into_iter().take(limit) {
                    if let Some(story) = self.fetch_story(client, id).await {
                        stories.push(story);
                    }
                }
                counter!("source_items_total").increment(stories.len() as u64);
                Ok(stories)
            }
        }
    }

    fn name(&self) -> &'static str {
        "hackernews"
    }
}

#[async_trait]
impl ThreadFetcher for HackerNewsSource {
    /// Raw bodies of up to `limit` top-level comments, as delivered by the
    /// API (HTML-encoded). Missing threads and non-story items yield an
    /// empty list, never an error that would abort the caller.
    async fn top_comments(&self, thread_id: u64, limit: usize) -> Result<Vec<String>> {
        match &self.mode {
            Mode::Fixture { comments, .. } => Ok(comments
                .get(&thread_id)
                .map(|v| v.iter().take(limit).cloned().collect())
                .unwrap_or_default()),
            Mode::Http { client } => {
                let resp = client
                    .get(item_url(thread_id))
                    .timeout(Duration::from_secs(10))
                    .send()
                    .await
                    .context("fetching thread item")?;
                let story: ItemJson = resp.json().await.context("decoding thread item")?;
                if story.kind.as_deref() != Some("story") {
                    return Ok(Vec::new());
                }

                let mut out = Vec::new();
                for cid in story.kids.unwrap_or_default().into_iter().take(limit) {
                    if let Some(text) = self.fetch_comment_text(client, cid).await {
                        out.push(text);
                    }
                }
                Ok(out)
            }
        }
    }
}

fn story_from_json(id: u64, item: ItemJson) -> Option<Story> {
    if item.kind.as_deref() != Some("story") {
        return None;
    }
    // Self-posts carry no external URL; nothing to extract from.
    let url = item.url.unwrap_or_default();
    if url.is_empty() || url.starts_with("item?id=") {
        return None;
    }
    let title = normalize_text(&item.title.unwrap_or_default());
    if title.is_empty() {
        return None;
    }
    let category = categorize(&title.to_lowercase());
    Some(Story {
        id,
        title,
        url,
        points: item.score.unwrap_or(0),
        comments: item.descendants.unwrap_or(0),
        category: category.to_string(),
    })
}

fn categorize(title_lower: &str) -> &'static str {
    let mut best = "tech";
    let mut best_hits = 0usize;
    for (cat, keywords) in CATEGORIES {
        let hits = keywords.iter().filter(|kw| title_lower.contains(*kw)).count();
        if hits > best_hits {
            best = cat;
            best_hits = hits;
        }
    }
    best
}

/// Engagement filter applied by Stage 1; result is sorted by points
/// descending so potential-score ties keep the popularity order.
pub fn filter_interesting(stories: Vec<Story>, min_points: u32, min_comments: u32) -> Vec<Story> {
    let mut kept: Vec<Story> = stories
        .into_iter()
        .filter(|s| s.points >= min_points && s.comments >= min_comments)
        .collect();
    kept.sort_by(|a, b| b.points.cmp(&a.points));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: &str, title: &str, url: &str) -> ItemJson {
        ItemJson {
            kind: Some(kind.to_string()),
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            score: Some(42),
            descendants: Some(7),
            kids: None,
            text: None,
        }
    }

    #[test]
    fn story_from_json_skips_self_posts_and_non_stories() {
        assert!(story_from_json(1, item("story", "t", "")).is_none());
        assert!(story_from_json(1, item("story", "t", "item?id=123")).is_none());
        assert!(story_from_json(1, item("comment", "t", "https://x.test")).is_none());
        let s = story_from_json(1, item("story", "A title", "https://x.test/a")).unwrap();
        assert_eq!(s.points, 42);
        assert_eq!(s.comments, 7);
    }

    #[test]
    fn categorize_picks_most_hits_and_defaults_to_tech() {
        assert_eq!(categorize("new kubernetes observability api"), "tech");
        assert_eq!(categorize("startup revenue and valuation after ipo"), "economics");
        assert_eq!(categorize("a quiet day"), "tech");
    }

    #[test]
    fn filter_interesting_applies_both_floors_and_sorts() {
        let mk = |id, points, comments| Story {
            id,
            title: format!("s{id}"),
            url: format!("https://x.test/{id}"),
            points,
            comments,
            category: "tech".into(),
        };
        let out = filter_interesting(vec![mk(1, 10, 50), mk(2, 30, 5), mk(3, 25, 12), mk(4, 90, 40)], 20, 10);
        let ids: Vec<u64> = out.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[tokio::test]
    async fn fixture_mode_serves_stories_and_comments() {
        let story = Story {
            id: 9,
            title: "t".into(),
            url: "https://x.test/t".into(),
            points: 50,
            comments: 20,
            category: "tech".into(),
        };
        let mut comments = HashMap::new();
        comments.insert(9u64, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let src = HackerNewsSource::from_fixture_with_comments(vec![story.clone()], comments);

        assert_eq!(src.fetch_top(10).await.unwrap(), vec![story]);
        assert_eq!(src.top_comments(9, 2).await.unwrap().len(), 2);
        assert!(src.top_comments(8, 12).await.unwrap().is_empty());
    }
}
