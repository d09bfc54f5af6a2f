//! PromptRelay conversation state
//!
//! In-memory conversation state: prompt history, the active stream
//! session, and the raw-text-to-safe-markup formatter that drives
//! incremental display updates.

pub mod controller;
pub mod format;

pub use controller::{
    ConversationController, DisplayPhase, DisplaySnapshot, SessionPhase, StreamSession,
};
pub use format::format_for_display;
