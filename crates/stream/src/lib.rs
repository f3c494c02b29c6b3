//! Stream ingestion pipeline for the assistant chat.
//!
//! One chat turn is one HTTP request whose plain-text body arrives
//! incrementally, through delivery mechanisms that differ by host platform.
//! Everything here exists to reassemble that body without losing bytes and
//! to hand the UI render-sized updates instead of raw chunk noise.

pub mod buffer;
pub mod gate;
pub mod pipeline;
pub mod transport;

pub use buffer::ResponseLog;
pub use gate::{FlushDecision, FlushGate, HapticGate};
pub use pipeline::{ChatEvent, StreamHandle, StreamPipeline};
pub use transport::{ChatBody, ChatTransport, HttpChatTransport};
