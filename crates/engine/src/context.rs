//! Where the user currently is.
//!
//! Screens push whatever they last rendered through the setters; triggers
//! and scans read a snapshot at fire time. No freshness assumptions beyond
//! "whatever was last set".

use parking_lot::RwLock;

use cs_domain::game::{FadeAlert, Game, LiveGame, Pick, Sport, ValueAlert};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageKind {
    #[default]
    Feed,
    GameDetails,
    Picks,
    Outliers,
    Scoreboard,
    ModelDetails,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Feed => "feed",
            PageKind::GameDetails => "game-details",
            PageKind::Picks => "picks",
            PageKind::Outliers => "outliers",
            PageKind::Scoreboard => "scoreboard",
            PageKind::ModelDetails => "model-details",
        }
    }
}

/// Point-in-time copy of the page context, read by the controller.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub page: PageKind,
    pub sport: Option<Sport>,
    pub open_game: Option<Game>,
    pub games: Vec<Game>,
    pub picks: Vec<Pick>,
    pub value_alerts: Vec<ValueAlert>,
    pub fade_alerts: Vec<FadeAlert>,
    pub live_games: Vec<LiveGame>,
    pub chat_open: bool,
    /// Content already shown for the current game, so "another insight"
    /// requests can tell the model what not to repeat.
    pub previous_insights: Vec<String>,
}

#[derive(Default)]
pub struct PageContextTracker {
    inner: RwLock<PageSnapshot>,
}

impl PageContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PageSnapshot {
        self.inner.read().clone()
    }

    pub fn set_page(&self, page: PageKind) {
        self.inner.write().page = page;
    }

    pub fn set_sport(&self, sport: Sport) {
        self.inner.write().sport = Some(sport);
    }

    pub fn set_open_game(&self, game: Option<Game>) {
        self.inner.write().open_game = game;
    }

    pub fn set_games(&self, games: Vec<Game>) {
        self.inner.write().games = games;
    }

    pub fn set_picks(&self, picks: Vec<Pick>) {
        self.inner.write().picks = picks;
    }

    pub fn set_alerts(&self, value_alerts: Vec<ValueAlert>, fade_alerts: Vec<FadeAlert>) {
        let mut inner = self.inner.write();
        inner.value_alerts = value_alerts;
        inner.fade_alerts = fade_alerts;
    }

    pub fn set_live_games(&self, live_games: Vec<LiveGame>) {
        self.inner.write().live_games = live_games;
    }

    pub fn set_chat_open(&self, open: bool) {
        self.inner.write().chat_open = open;
    }

    pub fn push_insight(&self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.inner.write().previous_insights.push(text);
    }

    /// Floating-only context is dropped when the floating bubble goes away.
    pub fn clear_floating_context(&self) {
        let mut inner = self.inner.write();
        inner.open_game = None;
        inner.previous_insights.clear();
    }
}
