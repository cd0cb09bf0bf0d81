//! Wire-level chat data model.
//!
//! `Message` and `Conversation` mirror the server's JSON shapes; the store
//! owns the canonical copies and everything rendered is derived from them.

use serde::{Deserialize, Serialize};

/// Payload type of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    File,
}

/// Attachment metadata carried by non-text messages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDetails {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Playback length in seconds, for audio/video.
    #[serde(default)]
    pub duration: Option<u64>,
}

/// A single chat message. Immutable once created; `id` is unique.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Creation time, epoch seconds or milliseconds (see [`to_millis`]).
    pub created_at: i64,
    #[serde(default)]
    pub details: Option<MessageDetails>,
}

impl Message {
    /// Creation time normalized to epoch milliseconds.
    pub fn created_at_ms(&self) -> i64 {
        to_millis(self.created_at)
    }

    /// Ordering key: creation time, with the unique id as tie-break.
    pub fn sort_key(&self) -> (i64, i64) {
        (self.created_at_ms(), self.id)
    }
}

/// Minimal user record used for display-name and avatar resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserMinified {
    pub user_id: i64,
    pub mobile: u64,
    #[serde(default)]
    pub country_code: Option<u16>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl UserMinified {
    /// Name to show for this user: full name, falling back to mobile number.
    pub fn display_name(&self) -> String {
        match &self.full_name {
            Some(name) => name.clone(),
            None => self.mobile.to_string(),
        }
    }
}

/// A conversation as listed in the sidebar, carrying its most recent message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub owner_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub created_at: i64,
    /// Tracks `created_at` of the most recent message.
    pub updated_at: i64,
    /// Highest message id the local user has acknowledged.
    pub last_seen_id: i64,
    pub users: Vec<UserMinified>,
    /// Most recent message of the conversation.
    pub message: Message,
}

impl Conversation {
    /// Look up a participant by id.
    pub fn user(&self, user_id: i64) -> Option<&UserMinified> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    /// The participant that is not the local user (for direct chats).
    pub fn counterpart(&self, local_user_id: i64) -> Option<&UserMinified> {
        self.users.iter().find(|u| u.user_id != local_user_id)
    }

    /// Title to show for the conversation.
    ///
    /// Fallback order: explicit `title`, then the counterpart's full name,
    /// then the counterpart's mobile number, then `None`.
    pub fn display_title(&self, local_user_id: i64) -> Option<String> {
        if let Some(title) = &self.title {
            return Some(title.clone());
        }
        let other = self.counterpart(local_user_id)?;
        if let Some(name) = &other.full_name {
            return Some(name.clone());
        }
        Some(other.mobile.to_string())
    }
}

/// A conversation paired with its fetched message history (newest-first).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub id: i64,
    pub owner_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_seen_id: i64,
    pub users: Vec<UserMinified>,
    /// Newest-first: index 0 is the most recent message.
    pub messages: Vec<Message>,
}

impl ConversationHistory {
    /// Manufacture a `Conversation` from a fetched history: the most recent
    /// message becomes `conversation.message`, the rest becomes the cached
    /// history. `None` when the fetched list is empty.
    pub fn into_parts(mut self) -> Option<(Conversation, Vec<Message>)> {
        if self.messages.is_empty() {
            return None;
        }
        let newest = self.messages.remove(0);
        let conversation = Conversation {
            id: self.id,
            owner_id: self.owner_id,
            kind: self.kind,
            title: self.title,
            icon: self.icon,
            created_at: self.created_at,
            updated_at: newest.created_at,
            last_seen_id: self.last_seen_id,
            users: self.users,
            message: newest,
        };
        Some((conversation, self.messages))
    }
}

/// Normalize a timestamp to epoch milliseconds.
///
/// A 10-decimal-digit value is treated as seconds and scaled by 1000; any
/// other digit count is taken as already-milliseconds. This length sniffing
/// is inherited from the wire format and is only reliable for timestamps
/// reasonably close to the present (10-digit seconds cover ~2001-2286).
pub fn to_millis(timestamp: i64) -> i64 {
    let digits = timestamp.unsigned_abs().to_string().len();
    if digits == 10 {
        timestamp * 1000
    } else {
        timestamp
    }
}
