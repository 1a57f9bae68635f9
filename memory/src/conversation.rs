//! Bounded per-session conversation memory.
//!
//! Sessions are independent: each key owns its own lock, so appends on
//! different keys never contend. Within one key, appends are serialized
//! and the cap invariant (`len <= max_turns`) holds after every append.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering transcripts.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Normalize a session key so one user cannot fragment their memory and
/// profile across differently-cased keys.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

type Session = Arc<Mutex<VecDeque<ConversationTurn>>>;

/// Process-wide conversation memory, keyed by normalized session key.
pub struct ConversationMemory {
    sessions: RwLock<HashMap<String, Session>>,
    max_turns: usize,
}

impl ConversationMemory {
    /// Create a memory with the given per-session cap.
    pub fn new(max_turns: usize) -> Self {
        let max_turns = if max_turns == 0 {
            warn!("Conversation memory cap of 0 clamped to 1");
            1
        } else {
            max_turns
        };

        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
        }
    }

    /// Per-session cap.
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Get or create the session for a key. The map write lock is held only
    /// long enough to insert; turn mutation happens under the session's own
    /// lock.
    async fn session(&self, key: &str) -> Session {
        let key = normalize_key(key);

        if let Some(session) = self.sessions.read().await.get(&key) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new()))),
        )
    }

    /// Append a turn to a session, evicting oldest-first at the cap.
    pub async fn append(&self, key: &str, turn: ConversationTurn) {
        let session = self.session(key).await;
        let mut turns = session.lock().await;

        turns.push_back(turn);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }

        // The eviction loop makes this unreachable; if it ever trips, the
        // session is reset rather than served with corrupt history.
        if turns.len() > self.max_turns {
            warn!("Conversation cap invariant broken for session, resetting");
            turns.clear();
        }

        debug!("Session now holds {} turn(s)", turns.len());
    }

    /// Replace a session's turns with the given history, keeping only the
    /// last `max_turns`. Used by stateless callers that resend their full
    /// history on every request.
    pub async fn seed(&self, key: &str, history: Vec<ConversationTurn>) {
        let session = self.session(key).await;
        let mut turns = session.lock().await;

        turns.clear();
        let skip = history.len().saturating_sub(self.max_turns);
        turns.extend(history.into_iter().skip(skip));
    }

    /// Render a session's transcript in insertion order, one
    /// `"<Role>: <text>"` line per turn. Unknown or empty sessions render
    /// to an empty string.
    pub async fn render(&self, key: &str) -> String {
        let key = normalize_key(key);

        let session = match self.sessions.read().await.get(&key) {
            Some(session) => Arc::clone(session),
            None => return String::new(),
        };

        let turns = session.lock().await;
        turns
            .iter()
            .map(|t| format!("{}: {}", t.role.label(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Copy out a session's turns, oldest first.
    pub async fn snapshot(&self, key: &str) -> Vec<ConversationTurn> {
        let key = normalize_key(key);

        let session = match self.sessions.read().await.get(&key) {
            Some(session) => Arc::clone(session),
            None => return Vec::new(),
        };

        let turns = session.lock().await;
        turns.iter().cloned().collect()
    }

    /// Drop a session entirely.
    pub async fn clear(&self, key: &str) {
        let key = normalize_key(key);
        self.sessions.write().await.remove(&key);
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_append_keeps_last_m_turns() {
        let memory = ConversationMemory::new(3);

        for i in 1..=4 {
            memory
                .append("u1", ConversationTurn::user(format!("turn {i}")))
                .await;
        }

        let turns = memory.snapshot("u1").await;
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["turn 2", "turn 3", "turn 4"]);
    }

    #[tokio::test]
    async fn test_cap_holds_after_every_append() {
        let memory = ConversationMemory::new(2);

        for i in 0..10 {
            memory
                .append("s", ConversationTurn::user(format!("{i}")))
                .await;
            assert!(memory.snapshot("s").await.len() <= 2);
        }
    }

    #[tokio::test]
    async fn test_render_empty_session_is_empty_string() {
        let memory = ConversationMemory::new(3);
        assert_eq!(memory.render("nobody").await, "");
    }

    #[tokio::test]
    async fn test_render_labels_and_order() {
        let memory = ConversationMemory::new(4);
        memory.append("s", ConversationTurn::user("hi")).await;
        memory
            .append("s", ConversationTurn::assistant("hello"))
            .await;

        assert_eq!(memory.render("s").await, "User: hi\nAssistant: hello");
    }

    #[tokio::test]
    async fn test_keys_are_case_normalized() {
        let memory = ConversationMemory::new(3);
        memory.append("Alice", ConversationTurn::user("one")).await;
        memory.append(" ALICE ", ConversationTurn::user("two")).await;

        assert_eq!(memory.snapshot("alice").await.len(), 2);
        assert_eq!(memory.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let memory = ConversationMemory::new(1);
        memory.append("a", ConversationTurn::user("for a")).await;
        memory.append("b", ConversationTurn::user("for b")).await;

        assert_eq!(memory.render("a").await, "User: for a");
        assert_eq!(memory.render("b").await, "User: for b");
    }

    #[tokio::test]
    async fn test_seed_replaces_and_caps() {
        let memory = ConversationMemory::new(2);
        memory.append("s", ConversationTurn::user("stale")).await;

        memory
            .seed(
                "s",
                vec![
                    ConversationTurn::user("one"),
                    ConversationTurn::assistant("two"),
                    ConversationTurn::user("three"),
                ],
            )
            .await;

        let texts: Vec<String> = memory
            .snapshot("s")
            .await
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["two".to_string(), "three".to_string()]);
    }

    #[tokio::test]
    async fn test_zero_cap_clamps_to_one() {
        let memory = ConversationMemory::new(0);
        memory.append("s", ConversationTurn::user("only")).await;
        memory.append("s", ConversationTurn::user("kept")).await;

        let turns = memory.snapshot("s").await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "kept");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_preserve_cap() {
        let memory = Arc::new(ConversationMemory::new(5));

        let mut handles = Vec::new();
        for i in 0..16 {
            let memory = Arc::clone(&memory);
            handles.push(tokio::spawn(async move {
                memory
                    .append("shared", ConversationTurn::user(format!("{i}")))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.expect("append task panicked");
        }

        assert_eq!(memory.snapshot("shared").await.len(), 5);
    }
}
