//! The proactive suggestion engine.
//!
//! Composes the page context tracker, the auto-trigger scheduler, and the
//! suggestion backend into the lifecycle controller that owns the bubble:
//! when it appears, what it says, which mode it is in, and when it goes away.

pub mod context;
pub mod controller;
pub mod observe;
pub mod scheduler;
pub mod session;

pub use context::{PageContextTracker, PageKind, PageSnapshot};
pub use controller::SuggestionController;
pub use scheduler::{AutoTriggerScheduler, TriggerRecord};
pub use session::{BubbleMode, BubblePhase, BubbleState};
