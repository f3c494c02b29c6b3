//! Game, pick, and alert shapes supplied by the host app's screens.
//!
//! The engine makes no freshness assumptions about any of these — whatever
//! was last pushed through the tracker setters is what triggers and scans
//! act on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nba,
    Nfl,
    Mlb,
    Nhl,
    Ncaab,
    Ncaaf,
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sport::Nba => "NBA",
            Sport::Nfl => "NFL",
            Sport::Mlb => "MLB",
            Sport::Nhl => "NHL",
            Sport::Ncaab => "NCAAB",
            Sport::Ncaaf => "NCAAF",
        };
        write!(f, "{s}")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Games & picks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One upcoming or in-progress matchup as shown on the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    /// American odds for the home side, when the book has posted a line.
    #[serde(default)]
    pub home_odds: Option<i32>,
    #[serde(default)]
    pub away_odds: Option<i32>,
    #[serde(default)]
    pub spread: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
}

/// A pick the user has tailed, as rendered on the picks tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub id: String,
    pub game_id: String,
    /// Display form of the selection, e.g. "Lakers -4.5".
    pub selection: String,
    pub odds: i32,
    #[serde(default)]
    pub model_confidence: Option<f64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outlier alerts & live games
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Line-value outlier flagged by the models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueAlert {
    pub game_id: String,
    pub team: String,
    pub line: f64,
    /// Model edge over the posted line, in percentage points.
    pub edge_pct: f64,
}

/// Heavy-public-action fade candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FadeAlert {
    pub game_id: String,
    pub team: String,
    pub line: f64,
    /// Share of public money on this side.
    pub public_pct: f64,
}

/// Scoreboard entry for an in-progress game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveGame {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    pub period: String,
    #[serde(default)]
    pub clock: Option<String>,
}
