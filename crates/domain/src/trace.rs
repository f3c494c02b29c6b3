use serde::Serialize;

/// Structured trace events emitted across all Courtside crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SuggestionFetch {
        endpoint: String,
        page_kind: String,
        status: u16,
        duration_ms: u64,
    },
    SuggestionShown {
        sport: Option<String>,
        source_game_id: Option<String>,
        fallback: bool,
    },
    BubbleDismissed {
        reason: String,
    },
    TriggerArmed {
        sport: String,
        kind: String,
        delay_ms: u64,
    },
    StreamStarted {
        request_id: String,
    },
    StreamCompleted {
        request_id: String,
        chunk_events: usize,
        bytes: usize,
        duration_ms: u64,
        atomic_delivery: bool,
    },
    StreamFailed {
        request_id: String,
        reason: String,
    },
    ThreadCreated {
        thread_id: String,
        user_id: String,
    },
    ThreadMessageSaved {
        thread_id: String,
        role: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cs_event");
    }
}
