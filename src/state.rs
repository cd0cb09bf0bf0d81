//! Core chat state, separated from rendering logic.
//!
//! `ChatStore` holds all canonical session data: the conversation list,
//! cached per-conversation histories, and the active-conversation pointer.
//! The rendered transcript tree is a derived projection; on any conflict the
//! store wins.

use std::collections::HashMap;

use crate::model::{to_millis, Conversation, ConversationHistory, Message, UserMinified};
use crate::service::{ApiError, MessageSource};

/// Result of applying one message to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Message accepted and conversation metadata updated.
    Applied,
    /// Message id already known; state untouched.
    Duplicate,
    /// Owning conversation unknown locally; caller should perform a full
    /// history load for this chat id.
    NeedsHistory(i64),
}

/// Authoritative in-memory chat state for the client.
pub struct ChatStore {
    local_user_id: i64,
    /// Conversations sorted descending by `updated_at` (insertion order on ties).
    conversations: Vec<Conversation>,
    /// Cached message lists keyed by chat id, newest-first.
    histories: HashMap<i64, Vec<Message>>,
    /// Currently open conversation, if any.
    active_chat: Option<i64>,
}

impl ChatStore {
    pub fn new(local_user_id: i64) -> Self {
        Self {
            local_user_id,
            conversations: Vec::new(),
            histories: HashMap::new(),
            active_chat: None,
        }
    }

    pub fn local_user_id(&self) -> i64 {
        self.local_user_id
    }

    /// Conversations, most recently updated first.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, chat_id: i64) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == chat_id)
    }

    /// Cached message list for a conversation (newest-first), absent if the
    /// history was never fetched.
    pub fn messages(&self, chat_id: i64) -> Option<&[Message]> {
        self.histories.get(&chat_id).map(Vec::as_slice)
    }

    /// Replace the conversation list from the message source.
    pub fn load_conversations(&mut self, source: &dyn MessageSource) -> Result<(), ApiError> {
        self.conversations = source.list_conversations()?;
        self.sort_conversations();
        Ok(())
    }

    /// Fetch and install the message history for one conversation.
    pub fn load_messages(
        &mut self,
        source: &dyn MessageSource,
        chat_id: i64,
    ) -> Result<(), ApiError> {
        let history = source.fetch_messages(chat_id)?;
        self.install_history(history);
        Ok(())
    }

    /// Install a fetched history. When the conversation is already listed the
    /// full list becomes its cached history; otherwise a conversation entry is
    /// manufactured from the newest message and inserted into the list.
    pub fn install_history(&mut self, history: ConversationHistory) {
        if self.conversation(history.id).is_some() {
            self.histories.insert(history.id, history.messages);
            return;
        }
        if let Some((conversation, rest)) = history.into_parts() {
            self.histories.insert(conversation.id, rest);
            self.conversations.push(conversation);
            self.sort_conversations();
        }
    }

    /// Apply exactly one new message to local state. Idempotent by message id:
    /// redelivery of an already-known id leaves state untouched. While a
    /// conversation's history is uncached the latest message is the only id
    /// on record, so anything not ordered after it is treated as redelivered.
    pub fn ingest_message(&mut self, message: Message) -> IngestOutcome {
        let Some(index) = self.conversations.iter().position(|c| c.id == message.chat_id)
        else {
            return IngestOutcome::NeedsHistory(message.chat_id);
        };

        let known_in_history = self
            .histories
            .get(&message.chat_id)
            .is_some_and(|list| list.iter().any(|m| m.id == message.id));
        if known_in_history || self.conversations[index].message.id == message.id {
            return IngestOutcome::Duplicate;
        }
        let latest_key = self.conversations[index].message.sort_key();
        if !self.histories.contains_key(&message.chat_id) && message.sort_key() <= latest_key {
            return IngestOutcome::Duplicate;
        }

        if let Some(list) = self.histories.get_mut(&message.chat_id) {
            // Keep the cache newest-first even for late arrivals
            let pos = list
                .iter()
                .position(|m| m.sort_key() < message.sort_key())
                .unwrap_or(list.len());
            list.insert(pos, message.clone());
        }
        let conversation = &mut self.conversations[index];
        if message.sort_key() > conversation.message.sort_key() {
            conversation.updated_at = message.created_at;
            conversation.message = message;
            self.sort_conversations();
        }
        IngestOutcome::Applied
    }

    /// Switch the active conversation; `None` (or an unknown id) clears it.
    pub fn set_active_conversation(&mut self, chat_id: Option<i64>) {
        self.active_chat = chat_id.filter(|id| self.conversation(*id).is_some());
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_chat.and_then(|id| self.conversation(id))
    }

    /// A conversation has unread messages iff the acknowledged id trails the
    /// most recent message id.
    pub fn has_unread(&self, conversation: &Conversation) -> bool {
        conversation.last_seen_id < conversation.message.id
    }

    /// Monotonically advance the acknowledged read position.
    pub fn mark_seen(&mut self, chat_id: i64, message_id: i64) {
        if let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == chat_id) {
            if message_id > conversation.last_seen_id {
                conversation.last_seen_id = message_id;
            }
        }
    }

    /// Display title for a conversation (title, counterpart name, mobile).
    pub fn conversation_title(&self, conversation: &Conversation) -> Option<String> {
        conversation.display_title(self.local_user_id)
    }

    /// Participant lookup within the active conversation.
    pub fn user_info(&self, user_id: i64) -> Option<&UserMinified> {
        self.active_conversation().and_then(|c| c.user(user_id))
    }

    fn sort_conversations(&mut self) {
        // Stable sort: ties keep insertion order.
        self.conversations
            .sort_by_key(|c| std::cmp::Reverse(to_millis(c.updated_at)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageKind;

    fn msg(id: i64, chat_id: i64, user_id: i64, created_at: i64) -> Message {
        Message {
            id,
            chat_id,
            user_id,
            content: format!("m{}", id),
            kind: MessageKind::Text,
            created_at,
            details: None,
        }
    }

    fn conv(id: i64, updated_at: i64, last_seen_id: i64, message: Message) -> Conversation {
        Conversation {
            id,
            owner_id: 1,
            kind: "direct".into(),
            title: None,
            icon: None,
            created_at: updated_at,
            updated_at,
            last_seen_id,
            users: vec![],
            message,
        }
    }

    fn history(id: i64, messages: Vec<Message>) -> ConversationHistory {
        ConversationHistory {
            id,
            owner_id: 1,
            kind: "direct".into(),
            title: None,
            icon: None,
            created_at: 0,
            updated_at: 0,
            last_seen_id: 0,
            users: vec![],
            messages,
        }
    }

    fn store_with_two_chats() -> ChatStore {
        let mut store = ChatStore::new(1);
        store.conversations = vec![
            conv(1, 2_000_000_000_000, 10, msg(10, 1, 2, 2_000_000_000_000)),
            conv(2, 1_000_000_000_000, 5, msg(5, 2, 3, 1_000_000_000_000)),
        ];
        store.histories.insert(1, vec![msg(10, 1, 2, 2_000_000_000_000)]);
        store
    }

    #[test]
    fn test_conversations_sorted_by_updated_at() {
        let mut store = store_with_two_chats();
        store.sort_conversations();
        let ids: Vec<i64> = store.conversations().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);

        // A newer message in chat 2 moves it to the top.
        store.ingest_message(msg(11, 2, 3, 3_000_000_000_000));
        let ids: Vec<i64> = store.conversations().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_ingest_updates_latest_message_invariant() {
        let mut store = store_with_two_chats();
        store.ingest_message(msg(12, 1, 1, 2_500_000_000_000));

        let conversation = store.conversation(1).unwrap();
        assert_eq!(conversation.message.id, 12);
        assert_eq!(conversation.updated_at, 2_500_000_000_000);

        let max = store
            .messages(1)
            .unwrap()
            .iter()
            .map(|m| m.created_at_ms())
            .max()
            .unwrap();
        assert_eq!(conversation.message.created_at_ms(), max);
    }

    #[test]
    fn test_ingest_prepends_to_cached_history() {
        let mut store = store_with_two_chats();
        store.ingest_message(msg(12, 1, 1, 2_500_000_000_000));
        let ids: Vec<i64> = store.messages(1).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![12, 10]);
    }

    #[test]
    fn test_ingest_is_idempotent_by_id() {
        let mut store = store_with_two_chats();
        let message = msg(12, 1, 1, 2_500_000_000_000);
        assert_eq!(store.ingest_message(message.clone()), IngestOutcome::Applied);
        assert_eq!(store.ingest_message(message), IngestOutcome::Duplicate);
        assert_eq!(store.messages(1).unwrap().len(), 2);
    }

    #[test]
    fn test_redelivery_with_uncached_history_is_dropped() {
        // Steady state right after startup: conversations listed, no history
        // fetched yet.
        let mut store = ChatStore::new(1);
        store
            .load_conversations(&crate::service::FixtureService::new())
            .unwrap();
        let base = store.conversation(1).unwrap().message.created_at;

        let m104 = msg(104, 1, 2, base + 1_000);
        let m105 = msg(105, 1, 2, base + 2_000);
        assert_eq!(store.ingest_message(m104.clone()), IngestOutcome::Applied);
        assert_eq!(store.ingest_message(m105), IngestOutcome::Applied);

        // Redelivered older id: no longer the latest, not in any cache.
        assert_eq!(store.ingest_message(m104), IngestOutcome::Duplicate);
        let conversation = store.conversation(1).unwrap();
        assert_eq!(conversation.message.id, 105);
        assert_eq!(conversation.updated_at, base + 2_000);
    }

    #[test]
    fn test_out_of_order_ingest_keeps_latest_message_invariant() {
        let mut store = store_with_two_chats();
        store.ingest_message(msg(12, 1, 2, 2_500_000_000_000));
        // A genuinely new but older message arrives late.
        assert_eq!(
            store.ingest_message(msg(11, 1, 2, 2_200_000_000_000)),
            IngestOutcome::Applied
        );

        let conversation = store.conversation(1).unwrap();
        assert_eq!(conversation.message.id, 12);
        assert_eq!(conversation.updated_at, 2_500_000_000_000);
        // Cache stays newest-first.
        let ids: Vec<i64> = store.messages(1).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![12, 11, 10]);
    }

    #[test]
    fn test_ingest_unknown_conversation_requests_history() {
        let mut store = store_with_two_chats();
        let outcome = store.ingest_message(msg(99, 42, 7, 2_500_000_000_000));
        assert_eq!(outcome, IngestOutcome::NeedsHistory(42));
        assert!(store.conversation(42).is_none());
    }

    #[test]
    fn test_install_history_manufactures_conversation() {
        let mut store = ChatStore::new(1);
        store.install_history(history(
            7,
            vec![
                msg(3, 7, 2, 3_000_000_000_000),
                msg(2, 7, 2, 2_000_000_000_000),
                msg(1, 7, 1, 1_000_000_000_000),
            ],
        ));

        let conversation = store.conversation(7).unwrap();
        assert_eq!(conversation.message.id, 3);
        assert_eq!(conversation.updated_at, 3_000_000_000_000);
        let ids: Vec<i64> = store.messages(7).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_install_history_replaces_existing_cache() {
        let mut store = store_with_two_chats();
        store.install_history(history(
            1,
            vec![msg(10, 1, 2, 2_000_000_000_000), msg(9, 1, 2, 1_900_000_000_000)],
        ));
        assert_eq!(store.messages(1).unwrap().len(), 2);
        // Conversation entry untouched by a refresh.
        assert_eq!(store.conversation(1).unwrap().message.id, 10);
    }

    #[test]
    fn test_unread_invariant() {
        let store = store_with_two_chats();
        // last_seen_id == message.id: read
        assert!(!store.has_unread(store.conversation(1).unwrap()));
        // last_seen_id 5 == message id 5: read; bump the message to make it unread
        let mut store = store_with_two_chats();
        store.ingest_message(msg(6, 2, 3, 2_100_000_000_000));
        assert!(store.has_unread(store.conversation(2).unwrap()));
    }

    #[test]
    fn test_mark_seen_is_monotonic() {
        let mut store = store_with_two_chats();
        store.mark_seen(1, 12);
        assert_eq!(store.conversation(1).unwrap().last_seen_id, 12);
        store.mark_seen(1, 11);
        assert_eq!(store.conversation(1).unwrap().last_seen_id, 12);
    }

    #[test]
    fn test_active_conversation_switching() {
        let mut store = store_with_two_chats();
        store.set_active_conversation(Some(2));
        assert_eq!(store.active_conversation().map(|c| c.id), Some(2));

        // Unknown id clears the pointer.
        store.set_active_conversation(Some(99));
        assert!(store.active_conversation().is_none());

        store.set_active_conversation(Some(1));
        store.set_active_conversation(None);
        assert!(store.active_conversation().is_none());
    }
}
