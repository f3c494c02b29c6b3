//! Chat thread persistence.
//!
//! The stream pipeline treats this store as fire-and-forget on the write
//! path: a failed save degrades history but never blocks the conversation.

pub mod store;

pub use store::{FileThreadStore, ThreadStore, ThreadSummary};
