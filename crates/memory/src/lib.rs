//! Keyed in-process stores for Chorus.
//!
//! Every piece of per-channel mutable state lives in one of these stores and
//! is injected where it is needed, so tests get isolated instances.
//!
//! - [`ConversationStore`]: conversation state with idle expiry
//! - [`ChannelPins`]: which provider each channel is pinned to
//! - [`ImageCache`]: the last generated image per channel

pub mod conversation_store;
pub mod image_cache;
pub mod pins;

pub use conversation_store::ConversationStore;
pub use image_cache::ImageCache;
pub use pins::ChannelPins;
