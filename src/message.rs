use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One chat message. Immutable once constructed; the store replaces its
/// whole visible sequence on every snapshot rather than editing records in
/// place.
///
/// Field names are part of the remote document schema and are
/// case-sensitive.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    /// Client-generated unique id, assigned at send time.
    pub id: String,
    /// Message payload. Non-emptiness is the UI's job, not the entity's.
    pub text: String,
    /// Client clock at creation time.
    pub timestamp: DateTime<Utc>,
    /// Author identity (email-like string), also the ownership key.
    pub username: String,
}

impl Message {
    /// Create a fresh message ready to be published.
    pub fn new(text: &str, username: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            username: username.to_string(),
        }
    }

    /// Whether this message was sent by the given user.
    ///
    /// Exact, case-sensitive string equality against `username`. No
    /// trimming or case folding is applied.
    pub fn is_outgoing(&self, user_email: &str) -> bool {
        self.username == user_email
    }

    /// Fixed sample conversation for the store's fixture mode.
    ///
    /// Deterministic across constructions: stable ids, stable timestamps,
    /// already in chronological order.
    pub fn mocked() -> Vec<Message> {
        let at = |secs: i64| DateTime::from_timestamp(secs, 0).expect("fixture timestamp in range");
        vec![
            Message {
                id: "5f9b24c6-3d86-4a10-8f8c-0d6a1f1f0001".into(),
                text: "Anyone here?".into(),
                timestamp: at(1_711_618_200),
                username: "ada@example.com".into(),
            },
            Message {
                id: "5f9b24c6-3d86-4a10-8f8c-0d6a1f1f0002".into(),
                text: "Hey! Just joined.".into(),
                timestamp: at(1_711_618_260),
                username: "grace@example.com".into(),
            },
            Message {
                id: "5f9b24c6-3d86-4a10-8f8c-0d6a1f1f0003".into(),
                text: "Welcome 👋".into(),
                timestamp: at(1_711_618_290),
                username: "ada@example.com".into(),
            },
            Message {
                id: "5f9b24c6-3d86-4a10-8f8c-0d6a1f1f0004".into(),
                text: "Thanks! What did I miss?".into(),
                timestamp: at(1_711_618_350),
                username: "grace@example.com".into(),
            },
        ]
    }
}
