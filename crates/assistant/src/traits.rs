use cs_domain::game::{FadeAlert, Game, LiveGame, Pick, Sport, ValueAlert};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Page-specific data handed to a scan fetch. Each variant carries whatever
/// the owning screen last pushed into the context tracker.
#[derive(Debug, Clone)]
pub enum PagePayload {
    Feed { games: Vec<Game>, sport: Sport },
    Picks { picks: Vec<Pick> },
    Outliers {
        value_alerts: Vec<ValueAlert>,
        fade_alerts: Vec<FadeAlert>,
    },
    Scoreboard { live_games: Vec<LiveGame> },
}

impl PagePayload {
    /// True when there is nothing to scan; the caller shows a page-specific
    /// "no data" message instead of hitting the network.
    pub fn is_empty(&self) -> bool {
        match self {
            PagePayload::Feed { games, .. } => games.is_empty(),
            PagePayload::Picks { picks } => picks.is_empty(),
            PagePayload::Outliers {
                value_alerts,
                fade_alerts,
            } => value_alerts.is_empty() && fade_alerts.is_empty(),
            PagePayload::Scoreboard { live_games } => live_games.is_empty(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PagePayload::Feed { .. } => "feed",
            PagePayload::Picks { .. } => "picks",
            PagePayload::Outliers { .. } => "outliers",
            PagePayload::Scoreboard { .. } => "scoreboard",
        }
    }
}

/// Outcome of one suggestion fetch.
///
/// `success: false` means the caller must substitute fallback text; the
/// suggestion field is empty in that case. `game_id` is absent whenever the
/// response carried no (or a malformed) trailer tag.
#[derive(Debug, Clone, Default)]
pub struct SuggestionResult {
    pub suggestion: String,
    pub game_id: Option<String>,
    pub success: bool,
}

impl SuggestionResult {
    pub fn failed() -> Self {
        Self::default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The seam between the lifecycle controller and the remote model.
///
/// Both operations are single request/response cycles with a client-side
/// deadline. Failures never propagate as errors — they come back as
/// `success: false` and the controller renders fallback text.
#[async_trait::async_trait]
pub trait SuggestionBackend: Send + Sync {
    /// Fetch a multi-game suggestion for the current page.
    async fn fetch_page_suggestion(&self, payload: &PagePayload) -> SuggestionResult;

    /// Fetch a single-game insight. `previous_insights` is the content the
    /// user has already seen for this game, so the model can avoid repeats.
    async fn fetch_game_insight(
        &self,
        game: &Game,
        sport: Sport,
        previous_insights: &[String],
    ) -> SuggestionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outliers_payload_empty_only_when_both_lists_empty() {
        let payload = PagePayload::Outliers {
            value_alerts: vec![],
            fade_alerts: vec![FadeAlert {
                game_id: "g1".into(),
                team: "Knicks".into(),
                line: -2.5,
                public_pct: 81.0,
            }],
        };
        assert!(!payload.is_empty());

        let payload = PagePayload::Outliers {
            value_alerts: vec![],
            fade_alerts: vec![],
        };
        assert!(payload.is_empty());
        assert_eq!(payload.kind(), "outliers");
    }

    #[test]
    fn failed_result_has_empty_suggestion() {
        let r = SuggestionResult::failed();
        assert!(!r.success);
        assert!(r.suggestion.is_empty());
        assert!(r.game_id.is_none());
    }
}
