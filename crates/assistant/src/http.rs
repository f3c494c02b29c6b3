//! HTTP adapter for the two suggestion endpoints.
//!
//! Both operations post `{ message, SystemPrompt, conversationHistory }` and
//! read back a plain-text body, optionally ending in a `[GAME_ID:<id>]`
//! trailer. Timeout and non-2xx responses are downgraded to
//! `success: false`; the caller owns fallback text.

use std::time::{Duration, Instant};

use serde::Serialize;

use cs_domain::chat::ChatMessage;
use cs_domain::config::{EndpointConfig, SuggestionConfig};
use cs_domain::error::{Error, Result};
use cs_domain::game::{Game, Sport};
use cs_domain::trace::TraceEvent;

use crate::parse::parse_response;
use crate::traits::{PagePayload, SuggestionBackend, SuggestionResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire body
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// JSON body shared by both endpoints. Field names follow the server
/// contract, not Rust convention.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CompletionBody {
    pub message: String,
    #[serde(rename = "SystemPrompt")]
    pub system_prompt: String,
    #[serde(rename = "conversationHistory", skip_serializing_if = "Vec::is_empty")]
    pub conversation_history: Vec<ChatMessage>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// System prompts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const SCAN_PROMPT: &str = "You are a sharp, concise betting assistant. Given the \
data below, surface the single most interesting angle in one or two sentences. \
If one game stands out, end your reply with [GAME_ID:<id>].";

const INSIGHT_PROMPT: &str = "You are a sharp, concise betting assistant focused \
on a single game. Give one actionable insight in one or two sentences. Do not \
repeat anything you have already told the user.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// HTTP implementation of [`SuggestionBackend`].
pub struct HttpSuggestionClient {
    scan_url: String,
    insight_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpSuggestionClient {
    pub fn new(endpoints: &EndpointConfig, cfg: &SuggestionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            scan_url: endpoints.page_scan_url.trim_end_matches('/').to_string(),
            insight_url: endpoints.game_insight_url.trim_end_matches('/').to_string(),
            api_key: endpoints.api_key.clone(),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder
    }

    /// One request/response cycle. Returns the raw text of a 2xx response.
    async fn complete(&self, url: &str, page_kind: &str, body: &CompletionBody) -> Result<String> {
        let started = Instant::now();
        let response = self
            .authed_post(url)
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        TraceEvent::SuggestionFetch {
            endpoint: url.to_string(),
            page_kind: page_kind.to_string(),
            status: status.as_u16(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        if !status.is_success() {
            return Err(Error::Network(format!("{url} returned {status}")));
        }

        let text = response.text().await.map_err(from_reqwest)?;
        if text.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl SuggestionBackend for HttpSuggestionClient {
    async fn fetch_page_suggestion(&self, payload: &PagePayload) -> SuggestionResult {
        let body = CompletionBody {
            message: describe_payload(payload),
            system_prompt: SCAN_PROMPT.to_string(),
            conversation_history: Vec::new(),
        };

        match self.complete(&self.scan_url, payload.kind(), &body).await {
            Ok(text) => {
                let parsed = parse_response(&text);
                SuggestionResult {
                    suggestion: parsed.suggestion,
                    game_id: parsed.game_id,
                    success: true,
                }
            }
            Err(e) => {
                tracing::warn!(page_kind = payload.kind(), error = %e, "page suggestion fetch failed");
                SuggestionResult::failed()
            }
        }
    }

    async fn fetch_game_insight(
        &self,
        game: &Game,
        sport: Sport,
        previous_insights: &[String],
    ) -> SuggestionResult {
        // Prior insights ride along as assistant history so the model can
        // avoid repeating itself.
        let history: Vec<ChatMessage> = previous_insights
            .iter()
            .map(|text| ChatMessage::assistant(text.clone()))
            .collect();

        let body = CompletionBody {
            message: describe_game(game, sport),
            system_prompt: INSIGHT_PROMPT.to_string(),
            conversation_history: history,
        };

        match self.complete(&self.insight_url, "game", &body).await {
            Ok(text) => {
                let parsed = parse_response(&text);
                SuggestionResult {
                    suggestion: parsed.suggestion,
                    // Single-game insights are always linked to their game.
                    game_id: Some(parsed.game_id.unwrap_or_else(|| game.id.clone())),
                    success: true,
                }
            }
            Err(e) => {
                tracing::warn!(game_id = %game.id, error = %e, "game insight fetch failed");
                SuggestionResult::failed()
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt assembly
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn describe_payload(payload: &PagePayload) -> String {
    match payload {
        PagePayload::Feed { games, sport } => {
            let mut out = format!("Today's {sport} slate:\n");
            for g in games {
                out.push_str(&format!(
                    "- [{}] {} @ {}, spread {}, total {}\n",
                    g.id,
                    g.away_team,
                    g.home_team,
                    fmt_opt(g.spread),
                    fmt_opt(g.total),
                ));
            }
            out
        }
        PagePayload::Picks { picks } => {
            let mut out = String::from("The user's tailed picks:\n");
            for p in picks {
                out.push_str(&format!("- [{}] {} at {:+}\n", p.game_id, p.selection, p.odds));
            }
            out
        }
        PagePayload::Outliers {
            value_alerts,
            fade_alerts,
        } => {
            let mut out = String::from("Current outlier alerts:\n");
            for v in value_alerts {
                out.push_str(&format!(
                    "- value: [{}] {} {:+.1}, edge {:.1}%\n",
                    v.game_id, v.team, v.line, v.edge_pct
                ));
            }
            for f in fade_alerts {
                out.push_str(&format!(
                    "- fade: [{}] {} {:+.1}, public {:.0}%\n",
                    f.game_id, f.team, f.line, f.public_pct
                ));
            }
            out
        }
        PagePayload::Scoreboard { live_games } => {
            let mut out = String::from("Live right now:\n");
            for lg in live_games {
                out.push_str(&format!(
                    "- [{}] {} {} - {} {}, {}\n",
                    lg.game_id,
                    lg.away_team,
                    lg.away_score,
                    lg.home_score,
                    lg.home_team,
                    lg.period,
                ));
            }
            out
        }
    }
}

fn describe_game(game: &Game, sport: Sport) -> String {
    format!(
        "{sport}: {} @ {} (game {}), spread {}, total {}, tip {}",
        game.away_team,
        game.home_team,
        game.id,
        fmt_opt(game.spread),
        fmt_opt(game.total),
        game.start_time.to_rfc3339(),
    )
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:+.1}"))
        .unwrap_or_else(|| "n/a".into())
}

/// Map reqwest failures onto the domain error: timeouts stay distinguishable
/// from plain network faults.
fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}
