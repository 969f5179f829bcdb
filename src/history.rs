// src/history.rs
//! Sent-item history: a JSON file holding every digest ever sent, plus the
//! derived URL set Stage 1 uses for deduplication. The file is read once at
//! open and rewritten atomically (temp file + rename) only after a digest
//! is confirmed sent.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::{CandidateDetails, SummarizedItem};
use crate::sources::Origin;

pub const ENV_HISTORY_PATH: &str = "DIGEST_HISTORY_PATH";

/// One item as recorded after a successful send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestItem {
    pub origin: Origin,
    pub source_id: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub category: String,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub comments: u32,
    #[serde(default)]
    pub traction_score: f64,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl DigestItem {
    /// Flatten a selected item into its history record.
    pub fn from_summarized(item: &SummarizedItem) -> Self {
        let c = &item.candidate;
        let mut out = Self {
            origin: c.origin,
            source_id: String::new(),
            title: c.title.clone(),
            url: c.url.clone(),
            summary: item.executive_summary.clone(),
            category: c.category().to_string(),
            points: 0,
            comments: 0,
            traction_score: 0.0,
            authors: Vec::new(),
        };
        match &c.details {
            CandidateDetails::Discussion {
                thread_id,
                points,
                comments,
                ..
            } => {
                out.source_id = thread_id.to_string();
                out.points = *points;
                out.comments = *comments;
            }
            CandidateDetails::Preprint {
                paper_id,
                authors,
                traction_score,
                ..
            } => {
                out.source_id = paper_id.clone();
                out.traction_score = *traction_score;
                out.authors = authors.clone();
            }
        }
        out
    }
}

/// One sent digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRecord {
    pub id: u64,
    /// RFC 3339 send time.
    pub sent_at: String,
    pub subject: String,
    pub recipient: String,
    pub digest_path: String,
    pub items: Vec<DigestItem>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    digests: Vec<DigestRecord>,
}

struct State {
    file: HistoryFile,
    sent_urls: HashSet<String>,
}

/// File-backed history with the URL set cached in memory.
pub struct HistoryStore {
    path: PathBuf,
    inner: Mutex<State>,
}

impl HistoryStore {
    /// Open (or lazily create) the history at `path`. A missing file is an
    /// empty history; a corrupt one is an error rather than silent loss.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = match fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing history at {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => HistoryFile::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading history at {}", path.display()))
            }
        };

        let sent_urls = file
            .digests
            .iter()
            .flat_map(|d| d.items.iter())
            .map(|i| i.url.clone())
            .collect();

        Ok(Self {
            path,
            inner: Mutex::new(State { file, sent_urls }),
        })
    }

    /// Resolution order: $DIGEST_HISTORY_PATH, then the per-user data dir.
    pub fn default_path() -> PathBuf {
        if let Ok(p) = std::env::var(ENV_HISTORY_PATH) {
            return PathBuf::from(p);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(".local/share/morning-digest/history.json")
    }

    pub fn has_been_sent(&self, url: &str) -> bool {
        let state = self.inner.lock().expect("history mutex poisoned");
        state.sent_urls.contains(url)
    }

    /// Append a sent digest and persist. Returns the new record id.
    pub fn record_digest(
        &self,
        subject: &str,
        recipient: &str,
        digest_path: &Path,
        items: Vec<DigestItem>,
    ) -> Result<u64> {
        let mut state = self.inner.lock().expect("history mutex poisoned");

        let id = state.file.digests.iter().map(|d| d.id).max().unwrap_or(0) + 1;
        for item in &items {
            state.sent_urls.insert(item.url.clone());
        }
        state.file.digests.push(DigestRecord {
            id,
            sent_at: chrono::Utc::now().to_rfc3339(),
            subject: subject.to_string(),
            recipient: recipient.to_string(),
            digest_path: digest_path.display().to_string(),
            items,
        });

        self.persist(&state.file)?;
        Ok(id)
    }

    /// Most recent digests, newest first.
    pub fn recent(&self, limit: usize) -> Vec<DigestRecord> {
        let state = self.inner.lock().expect("history mutex poisoned");
        state
            .file
            .digests
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    fn persist(&self, file: &HistoryFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating history dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(file).context("serializing history")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// Short anonymized fingerprint for URLs in logs; raw URLs stay out of
/// debug output.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
