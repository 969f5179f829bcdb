// tests/pipeline_e2e.rs
// Full pipeline runs with every collaborator mocked: happy path, the
// quality-gate skip, and the zero-candidate skip.

use std::collections::HashMap;

use async_trait::async_trait;
use tempfile::tempdir;

use morning_digest::config::Config;
use morning_digest::extract::ArticleFetcher;
use morning_digest::history::HistoryStore;
use morning_digest::pipeline::{run_pipeline_with, SourceSet, NO_CANDIDATES_REASON};
use morning_digest::sources::arxiv::ArxivSource;
use morning_digest::sources::hackernews::HackerNewsSource;
use morning_digest::sources::{Paper, Story};

struct MapArticles(HashMap<String, String>);

#[async_trait]
impl ArticleFetcher for MapArticles {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        self.0.get(url).cloned()
    }
}

fn story(id: u64, title: &str, url: &str, points: u32, comments: u32) -> Story {
    Story {
        id,
        title: title.to_string(),
        url: url.to_string(),
        points,
        comments,
        category: "tech".to_string(),
    }
}

const STAMPS_URL: &str = "https://caching.test/stamps";
const ARCHIVE_URL: &str = "https://preserve.test/archive";

const STAMPS_ARTICLE: &str =
    "Engineers found that versioned cache stamps cut tail latency by 40 percent across the fleet. \
     The approach works because every record carries a version stamp through the database layer.";

const ARCHIVE_ARTICLE: &str =
    "Maintainers discovered that the internet archive mirrors lost 12 percent of links since 2019. \
     They built an open source approach that rescues those pages through the archive.org api.";

fn good_paper() -> Paper {
    Paper {
        id: "2401.00001".into(),
        title: "Retrieval pipelines for evaluation".into(),
        authors: vec!["Ada".into(), "Alan".into()],
        abstract_text:
            "We found that retrieval pipelines improve evaluation accuracy by 12 percent. \
             The method shows consistent results across 3 benchmark suites because context windows stay bounded."
                .into(),
        url: "https://arxiv.org/abs/2401.00001".into(),
        published_unix: 1_700_000_000,
        categories: vec!["cs.AI".into()],
        externally_mentioned: true,
        repo_links: vec!["github.com/acme/retrieval".into()],
    }
}

fn thread_comments() -> Vec<String> {
    vec![
        "I worked on a similar pipeline in production and the key issue is that extraction quality varies wildly between sites. We use a fallback chain for this.".into(),
        "The implementation and architecture concerns are real, and the privacy tracking story makes monetize discussions harder than people assume here.".into(),
        "Overall this is a great and impressive effort, genuinely useful and helpful for anyone who curates content daily, good work from the team involved.".into(),
    ]
}

fn empty_history() -> (tempfile::TempDir, HistoryStore) {
    let dir = tempdir().unwrap();
    let store = HistoryStore::open(dir.path().join("history.json")).unwrap();
    (dir, store)
}

#[tokio::test]
async fn happy_path_renders_a_digest() {
    let (_hdir, history) = empty_history();
    let out = tempdir().unwrap();

    let hn = HackerNewsSource::from_fixture_with_comments(
        vec![
            story(1, "Versioned cache stamps", STAMPS_URL, 100, 30),
            story(2, "Open source archive tooling", ARCHIVE_URL, 80, 40),
        ],
        HashMap::from([(1u64, thread_comments())]),
    );
    let arxiv = ArxivSource::from_fixture(vec![good_paper()]);
    let articles = MapArticles(HashMap::from([
        (STAMPS_URL.to_string(), STAMPS_ARTICLE.to_string()),
        (ARCHIVE_URL.to_string(), ARCHIVE_ARTICLE.to_string()),
    ]));

    let sources = SourceSet {
        stories: Some(&hn),
        papers: Some(&arxiv),
    };
    let result = run_pipeline_with(
        &Config::default(),
        &sources,
        &articles,
        Some(&hn),
        &history,
        out.path(),
    )
    .await;

    assert_eq!(result.candidates_found, 3);
    assert_eq!(result.candidates_summarized, 3);
    assert_eq!(result.items_selected, 3);
    assert!(result.skipped_reason.is_none());

    let path = result.digest_path.expect("digest rendered");
    let html = std::fs::read_to_string(&path).unwrap();
    assert!(html.contains("Versioned cache stamps"));
    assert!(html.contains("Why this matters:"));
    assert!(html.contains("Discussion synthesis"));
    assert!(html.contains("Recent research in research with available implementation"));

    // The discussion item with the rich synthesis outranks the rest.
    assert_eq!(result.selected[0].candidate.url, STAMPS_URL);
    assert!(result.selected[0].discussion_synthesis.is_some());
    for item in &result.selected {
        assert!(item.quality_score() >= morning_digest::policy::MIN_QUALITY);
    }
}

#[tokio::test]
async fn failed_extractions_zero_out_and_gate_the_digest() {
    let (_hdir, history) = empty_history();
    let out = tempdir().unwrap();

    // Third story has no fetchable article: degraded, quality 0.
    let hn = HackerNewsSource::from_fixture_with_comments(
        vec![
            story(1, "Versioned cache stamps", STAMPS_URL, 100, 30),
            story(2, "Open source archive tooling", ARCHIVE_URL, 80, 40),
            story(3, "Dead link story", "https://gone.test/404", 60, 25),
        ],
        HashMap::from([(1u64, thread_comments())]),
    );
    let articles = MapArticles(HashMap::from([
        (STAMPS_URL.to_string(), STAMPS_ARTICLE.to_string()),
        (ARCHIVE_URL.to_string(), ARCHIVE_ARTICLE.to_string()),
    ]));

    let sources = SourceSet {
        stories: Some(&hn),
        papers: None,
    };
    let result = run_pipeline_with(
        &Config::default(),
        &sources,
        &articles,
        Some(&hn),
        &history,
        out.path(),
    )
    .await;

    assert_eq!(result.candidates_found, 3);
    assert_eq!(result.candidates_summarized, 2);
    assert_eq!(result.items_selected, 2);
    assert!(result.digest_path.is_none());
    let reason = result.skipped_reason.expect("skip reason set");
    assert!(reason.contains("Only 2 items met quality threshold (need 3)"));

    // Diagnostics stay attached, but nothing was rendered.
    assert_eq!(result.selected.len(), 2);
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);

    // The degraded item sits at the bottom with overall zero.
    assert!(result
        .selected
        .iter()
        .all(|s| s.candidate.url != "https://gone.test/404"));
}

#[tokio::test]
async fn zero_candidates_short_circuits_with_a_reason() {
    let (_hdir, history) = empty_history();
    let out = tempdir().unwrap();

    let hn = HackerNewsSource::from_fixture(vec![]);
    let arxiv = ArxivSource::from_fixture(vec![]);
    let articles = MapArticles(HashMap::new());
    let sources = SourceSet {
        stories: Some(&hn),
        papers: Some(&arxiv),
    };

    let result = run_pipeline_with(
        &Config::default(),
        &sources,
        &articles,
        Some(&hn),
        &history,
        out.path(),
    )
    .await;

    assert_eq!(result.candidates_found, 0);
    assert_eq!(result.candidates_summarized, 0);
    assert_eq!(result.items_selected, 0);
    assert!(result.digest_path.is_none());
    assert_eq!(result.skipped_reason.as_deref(), Some(NO_CANDIDATES_REASON));
    assert!(result.selected.is_empty());
}
