use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub suggestions: SuggestionConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub threads: ThreadsConfig,
}

impl Config {
    /// Load config from a TOML file. Missing sections fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Remote endpoints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Multi-game page-scan completion endpoint.
    #[serde(default = "d_scan_url")]
    pub page_scan_url: String,
    /// Single-game insight / more-details / alternative-insight endpoint.
    #[serde(default = "d_insight_url")]
    pub game_insight_url: String,
    /// Streaming chat completion endpoint (progressively-growing plain text).
    #[serde(default = "d_chat_url")]
    pub chat_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            page_scan_url: d_scan_url(),
            game_insight_url: d_insight_url(),
            chat_url: d_chat_url(),
            api_key: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Suggestion bubble timing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Client-side deadline for suggestion fetches.
    #[serde(default = "d_15000")]
    pub request_timeout_ms: u64,
    /// Auto-dismiss window for a successful suggestion.
    #[serde(default = "d_20000")]
    pub show_ms: u64,
    /// Auto-dismiss window for fallback / no-data text.
    #[serde(default = "d_5000")]
    pub fallback_show_ms: u64,
    /// Delay before the first-visit trigger fires for a new sport.
    #[serde(default = "d_2000")]
    pub first_visit_delay_ms: u64,
    /// Recurring re-trigger cadence.
    #[serde(default = "d_120000")]
    pub retrigger_interval_ms: u64,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_timeout_ms: 15_000,
            show_ms: 20_000,
            fallback_show_ms: 5_000,
            first_visit_delay_ms: 2_000,
            retrigger_interval_ms: 120_000,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat stream ingestion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Overall deadline for one chat request.
    #[serde(default = "d_30000")]
    pub request_timeout_ms: u64,
    /// Cadence at which the poll path re-reads the response log.
    #[serde(default = "d_150")]
    pub poll_interval_ms: u64,
    /// Minimum spacing between UI renders.
    #[serde(default = "d_100")]
    pub flush_interval_ms: u64,
    /// Minimum spacing between haptic pulses.
    #[serde(default = "d_100")]
    pub haptic_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            poll_interval_ms: 150,
            flush_interval_ms: 100,
            haptic_interval_ms: 100,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Thread persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadsConfig {
    #[serde(default = "d_threads_path")]
    pub state_path: PathBuf,
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            state_path: d_threads_path(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Serde default helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_true() -> bool {
    true
}
fn d_100() -> u64 {
    100
}
fn d_150() -> u64 {
    150
}
fn d_2000() -> u64 {
    2_000
}
fn d_5000() -> u64 {
    5_000
}
fn d_15000() -> u64 {
    15_000
}
fn d_20000() -> u64 {
    20_000
}
fn d_30000() -> u64 {
    30_000
}
fn d_120000() -> u64 {
    120_000
}
fn d_scan_url() -> String {
    "https://api.courtside.app/assistant/page-scan".into()
}
fn d_insight_url() -> String {
    "https://api.courtside.app/assistant/game-insight".into()
}
fn d_chat_url() -> String {
    "https://api.courtside.app/assistant/chat".into()
}
fn d_threads_path() -> PathBuf {
    PathBuf::from("./data/threads")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_timings() {
        let cfg = Config::default();
        assert_eq!(cfg.suggestions.show_ms, 20_000);
        assert_eq!(cfg.suggestions.fallback_show_ms, 5_000);
        assert_eq!(cfg.suggestions.first_visit_delay_ms, 2_000);
        assert_eq!(cfg.suggestions.retrigger_interval_ms, 120_000);
        assert_eq!(cfg.stream.request_timeout_ms, 30_000);
        assert_eq!(cfg.stream.poll_interval_ms, 150);
        assert_eq!(cfg.stream.flush_interval_ms, 100);
        assert!(cfg.suggestions.enabled);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [endpoints]
            chat_url = "http://localhost:9000/chat"

            [suggestions]
            first_visit_delay_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.endpoints.chat_url, "http://localhost:9000/chat");
        assert_eq!(cfg.endpoints.page_scan_url, d_scan_url());
        assert_eq!(cfg.suggestions.first_visit_delay_ms, 500);
        assert_eq!(cfg.suggestions.show_ms, 20_000);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
