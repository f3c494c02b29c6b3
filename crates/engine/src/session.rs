//! Bubble session state broadcast to the UI.

use chrono::{DateTime, Utc};

use cs_domain::game::Sport;

/// How the bubble is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleMode {
    /// Tied to the current screen; time-gated auto-triggers, auto-dismiss.
    Anchored,
    /// Persists across navigation; re-fetches on every page/game change and
    /// never auto-expires.
    Floating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubblePhase {
    Hidden,
    Scanning,
    ShowingSuggestion,
    /// Anchored only; the floating bubble and the menu are mutually
    /// exclusive surfaces.
    ShowingMenu,
}

/// The single active bubble instance. Mutated in place by every controller
/// action; reset to Hidden on dismiss, mode switch, or chat focus.
#[derive(Debug, Clone)]
pub struct BubbleState {
    pub mode: BubbleMode,
    pub phase: BubblePhase,
    pub text: String,
    pub source_game_id: Option<String>,
    pub sport: Option<Sport>,
    /// Where the floating bubble was dropped, in screen coordinates.
    pub position: Option<(f64, f64)>,
    pub created_at: DateTime<Utc>,
    /// None while Floating or ShowingMenu (no auto-dismiss).
    pub expires_at: Option<DateTime<Utc>>,
}

impl BubbleState {
    pub fn hidden() -> Self {
        Self {
            mode: BubbleMode::Anchored,
            phase: BubblePhase::Hidden,
            text: String::new(),
            source_game_id: None,
            sport: None,
            position: None,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.phase != BubblePhase::Hidden
    }

    pub fn is_floating(&self) -> bool {
        self.mode == BubbleMode::Floating
    }
}

impl Default for BubbleState {
    fn default() -> Self {
        Self::hidden()
    }
}
