//! Suggestion fetch client — stateless request/response wrapper around the
//! page-scan and single-game insight endpoints.

pub mod http;
pub mod parse;
pub mod traits;

pub use http::HttpSuggestionClient;
pub use parse::parse_response;
pub use traits::{PagePayload, SuggestionBackend, SuggestionResult};
