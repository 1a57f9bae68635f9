//! # Memory
//!
//! Volatile per-session state for the coach answering pipeline:
//!
//! - **Conversation Memory**: a bounded, ordered log of recent turns per
//!   session key, evicting oldest-first at the cap
//! - **Profile Store**: personalization descriptors looked up by the same
//!   session key space
//!
//! Nothing here survives a process restart; durability is a non-goal.

pub mod conversation;
pub mod profile;

pub use conversation::{ConversationMemory, ConversationTurn, Role, normalize_key};
pub use profile::{ProfileDescriptor, ProfileStore};
