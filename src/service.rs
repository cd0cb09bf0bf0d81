//! Message-source abstraction over the chat HTTP API.
//!
//! `ChatStore` only sees the [`MessageSource`] trait, so tests and the
//! headless binary run against [`FixtureService`] without any network.

use thiserror::Error;

use crate::model::{Conversation, ConversationHistory, Message, MessageKind, UserMinified};

/// Typed API failure carried up from the transport layer.
#[derive(Debug, Clone, Error)]
#[error("api error {status_code}: {message}")]
pub struct ApiError {
    pub status_code: u16,
    /// Raw response body, when one was received.
    pub body: Option<String>,
    pub message: String,
}

impl ApiError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self {
            status_code: 404,
            body: None,
            message: format!("{} not found", what),
        }
    }
}

/// An attachment handed to the API for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Source of conversation lists, message histories, and file uploads.
pub trait MessageSource {
    /// All conversations visible to the local user.
    fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    /// Full message history for one conversation, newest-first.
    fn fetch_messages(&self, chat_id: i64) -> Result<ConversationHistory, ApiError>;

    /// Upload an attachment; returns the URL to embed in the message.
    fn send_file(&self, upload: &FileUpload) -> Result<String, ApiError>;
}

/// Canned in-memory source backing tests and offline runs.
pub struct FixtureService {
    conversations: Vec<ConversationHistory>,
}

impl FixtureService {
    /// Three direct chats for user 1, with staggered activity times.
    pub fn new() -> Self {
        let base = 1_718_000_000_000i64;
        Self {
            conversations: vec![
                fixture_chat(
                    1,
                    user(2, 15551230001, "Dana Reyes"),
                    &[
                        (103, 2, "See you tomorrow then", base + 7_200_000),
                        (102, 1, "Works for me", base + 7_100_000),
                        (101, 2, "Lunch at noon?", base + 7_000_000),
                    ],
                ),
                fixture_chat(
                    2,
                    user(3, 15551230002, "Omar Haddad"),
                    &[
                        (202, 3, "Sent you the draft", base + 3_600_000),
                        (201, 1, "Ping me when it's ready", base + 3_500_000),
                    ],
                ),
                fixture_chat(
                    3,
                    user(4, 15551230003, "Priya Nair"),
                    &[(301, 4, "Welcome aboard!", base)],
                ),
            ],
        }
    }
}

impl Default for FixtureService {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSource for FixtureService {
    fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        Ok(self
            .conversations
            .iter()
            .cloned()
            .filter_map(|h| h.into_parts().map(|(conversation, _)| conversation))
            .collect())
    }

    fn fetch_messages(&self, chat_id: i64) -> Result<ConversationHistory, ApiError> {
        self.conversations
            .iter()
            .find(|h| h.id == chat_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("chat {}", chat_id)))
    }

    fn send_file(&self, upload: &FileUpload) -> Result<String, ApiError> {
        if upload.bytes.is_empty() {
            return Err(ApiError {
                status_code: 422,
                body: None,
                message: "empty upload".into(),
            });
        }
        Ok(format!("https://files.courier.example/{}", upload.file_name))
    }
}

fn user(user_id: i64, mobile: u64, full_name: &str) -> UserMinified {
    UserMinified {
        user_id,
        mobile,
        country_code: Some(1),
        full_name: Some(full_name.to_string()),
        icon: None,
    }
}

fn fixture_chat(
    id: i64,
    counterpart: UserMinified,
    messages: &[(i64, i64, &str, i64)],
) -> ConversationHistory {
    let messages: Vec<Message> = messages
        .iter()
        .map(|&(msg_id, user_id, content, created_at)| Message {
            id: msg_id,
            chat_id: id,
            user_id,
            content: content.to_string(),
            kind: MessageKind::Text,
            created_at,
            details: None,
        })
        .collect();
    let newest = messages.first().map(|m| m.created_at).unwrap_or(0);
    ConversationHistory {
        id,
        owner_id: 1,
        kind: "direct".into(),
        title: None,
        icon: None,
        created_at: newest,
        updated_at: newest,
        last_seen_id: 0,
        users: vec![user(1, 15551230000, "Sam Doyle"), counterpart],
        messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_conversations_carry_newest_message() {
        let service = FixtureService::new();
        let conversations = service.list_conversations().unwrap();
        assert_eq!(conversations.len(), 3);
        let first = &conversations[0];
        assert_eq!(first.id, 1);
        assert_eq!(first.message.id, 103);
        assert_eq!(first.updated_at, first.message.created_at);
    }

    #[test]
    fn test_fetch_messages_unknown_chat() {
        let service = FixtureService::new();
        let err = service.fetch_messages(99).unwrap_err();
        assert_eq!(err.status_code, 404);
        assert!(err.message.contains("chat 99"));
    }

    #[test]
    fn test_fixture_histories_are_newest_first() {
        let service = FixtureService::new();
        let history = service.fetch_messages(1).unwrap();
        let times: Vec<i64> = history.messages.iter().map(|m| m.created_at).collect();
        let mut sorted = times.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(times, sorted);
    }

    #[test]
    fn test_send_file_returns_a_url() {
        let service = FixtureService::new();
        let url = service
            .send_file(&FileUpload {
                file_name: "photo.png".into(),
                mime_type: "image/png".into(),
                bytes: vec![1, 2, 3],
            })
            .unwrap();
        assert!(url.ends_with("photo.png"));

        let err = service
            .send_file(&FileUpload {
                file_name: "empty.bin".into(),
                mime_type: "application/octet-stream".into(),
                bytes: vec![],
            })
            .unwrap_err();
        assert_eq!(err.status_code, 422);
    }
}
