//! Personalization profiles.
//!
//! Profiles are loaded once at startup and read per request. A missing key
//! yields an empty descriptor, and a malformed profile file degrades to an
//! empty store with a warning; profile problems never block serving.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::conversation::normalize_key;

/// A personalization descriptor: free text or an ordered bullet list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileDescriptor {
    Text(String),
    Bullets(Vec<String>),
}

impl ProfileDescriptor {
    /// An empty descriptor, used for unknown keys.
    pub fn empty() -> Self {
        ProfileDescriptor::Text(String::new())
    }

    /// Render the descriptor as prompt text.
    pub fn render(&self) -> String {
        match self {
            ProfileDescriptor::Text(text) => text.trim().to_string(),
            ProfileDescriptor::Bullets(items) => items
                .iter()
                .map(|item| format!("- {item}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Check if there is nothing to render.
    pub fn is_empty(&self) -> bool {
        match self {
            ProfileDescriptor::Text(text) => text.trim().is_empty(),
            ProfileDescriptor::Bullets(items) => items.is_empty(),
        }
    }
}

/// Mapping from normalized session key to personalization descriptor.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: HashMap<String, ProfileDescriptor>,
}

impl ProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from key/descriptor pairs, normalizing keys.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, ProfileDescriptor)>) -> Self {
        let profiles = entries
            .into_iter()
            .map(|(key, descriptor)| (normalize_key(&key), descriptor))
            .collect::<HashMap<_, _>>();

        info!("Loaded {} profile(s)", profiles.len());
        Self { profiles }
    }

    /// Load a store from a JSON object of `key -> descriptor`.
    ///
    /// Malformed content degrades to an empty store; a profile file must
    /// never prevent the service from answering.
    pub fn from_json_str(json: &str) -> Self {
        match serde_json::from_str::<HashMap<String, ProfileDescriptor>>(json) {
            Ok(map) => Self::from_entries(map),
            Err(err) => {
                warn!("Malformed profile data, serving without profiles: {err}");
                Self::new()
            }
        }
    }

    /// Look up a descriptor. Unknown keys yield the empty descriptor.
    pub fn lookup(&self, key: &str) -> ProfileDescriptor {
        self.profiles
            .get(&normalize_key(key))
            .cloned()
            .unwrap_or_else(ProfileDescriptor::empty)
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
