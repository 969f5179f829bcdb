// src/config.rs
//! TOML configuration: which origins are enabled, where digests land, and
//! how delivery is performed. Path is overridable via $DIGEST_CONFIG_PATH;
//! a missing file falls back to defaults (all sources on, no delivery).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub output: OutputConfig,
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub hackernews: SourceToggle,
    pub arxiv: SourceToggle,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceToggle {
    pub enabled: bool,
}

impl Default for SourceToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for rendered digests; defaults to the per-user data dir.
    pub dir: Option<PathBuf>,
}

impl OutputConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(".local/share/morning-digest/digests")
    }
}

/// SMTP delivery settings. The password may be left out of the file and
/// supplied via $SMTP_PASS instead.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub to: String,
    pub from: String,
    pub host: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Load configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config at {}", path.display()))
}

/// Load configuration using env var + fallback:
/// 1) $DIGEST_CONFIG_PATH (must exist)
/// 2) config/digest.toml if present
/// 3) built-in defaults
pub fn load_default() -> Result<Config> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            anyhow::bail!("{ENV_CONFIG_PATH} points to a non-existent path");
        }
        return load_from(&pb);
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default.exists() {
        return load_from(&default);
    }
    Ok(Config::default())
}
