//! The Chorus turn orchestrator.
//!
//! One turn handles one inbound chat message:
//!
//! 1. **Resolve** the channel's active provider
//! 2. **Load** the channel's conversation, or seed one from channel history
//! 3. **Call** the provider with tools enabled
//! 4. **If host tool calls**: run them in order, then call the provider once
//!    more with tools disabled
//! 5. **Reply** in the channel and persist the conversation
//!
//! At most one round of host tools runs per turn.

pub mod history;
pub mod orchestrator;
pub mod prompt;
pub mod reply;
pub mod turn_locks;
pub mod typing;

pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use turn_locks::TurnLocks;
pub use typing::TypingIndicator;
