//! Chat channel implementations for Chorus.
//!
//! Each channel implements [`chorus_core::ChatChannel`]: paging history,
//! replying, the typing indicator and image upload.
//!
//! Available channels:
//! - **Discord**: REST API, plus conversion of gateway message payloads
//! - **CLI**: local terminal session with in-process history

pub mod cli;
pub mod discord;

pub use cli::CliChannel;
pub use discord::{DiscordChannel, DiscordMessage};
