//! Game-id trailer extraction.
//!
//! Page-scan responses may end with a `[GAME_ID:<id>]` trailer that links the
//! suggestion to one game. The tag is matched case-insensitively, stripped
//! from the display text, and its absence means "no linked game" — never an
//! error. A malformed tag (empty id) is treated exactly like an absent one.

use std::sync::OnceLock;

use regex::Regex;

/// A suggestion split into display text and optional linked game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSuggestion {
    pub suggestion: String,
    pub game_id: Option<String>,
}

fn trailer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Trailing tag only; anything mid-text is left alone.
        Regex::new(r"(?i)\[game_id:\s*([^\]\s]+)\s*\]\s*$").unwrap()
    })
}

/// Split raw response text into display text and an optional game id.
pub fn parse_response(raw: &str) -> ParsedSuggestion {
    let trimmed = raw.trim();
    match trailer_re().captures(trimmed) {
        Some(caps) => {
            let tag = caps.get(0).unwrap();
            let game_id = caps.get(1).unwrap().as_str().to_string();
            ParsedSuggestion {
                suggestion: trimmed[..tag.start()].trim_end().to_string(),
                game_id: Some(game_id),
            }
        }
        None => ParsedSuggestion {
            suggestion: trimmed.to_string(),
            game_id: None,
        },
    }
}
