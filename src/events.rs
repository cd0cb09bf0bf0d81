//! Channel event processing (live messages, connection lifecycle).

use chrono::Local;
use crossbeam_channel::Receiver;

use crate::grouping::{ScrollRequest, TranscriptTree};
use crate::logging::{LogEntry, Logger};
use crate::protocol::ChatEvent;
use crate::service::MessageSource;
use crate::state::{ChatStore, IngestOutcome};

/// Process all pending events from the channel worker.
///
/// Returns the scroll requests produced by transcript updates, for the
/// rendering layer to act on.
pub fn process_events(
    event_rx: &Receiver<ChatEvent>,
    is_connected: &mut bool,
    store: &mut ChatStore,
    tree: &mut TranscriptTree,
    source: &dyn MessageSource,
    system_log: &mut Vec<String>,
    logger: &Option<Logger>,
) -> Vec<ScrollRequest> {
    let mut scrolls = Vec::new();

    // Drain all pending events from the worker
    while let Ok(event) = event_rx.try_recv() {
        match event {
            ChatEvent::Opened => {
                *is_connected = true;
                let ts = Local::now().format("%H:%M:%S").to_string();
                system_log.push(format!("[{}] ✓ Connected", ts));
            }

            ChatEvent::Closed {
                reason,
                user_initiated,
            } => {
                *is_connected = false;
                let ts = Local::now().format("%H:%M:%S").to_string();
                let mark = if user_initiated { "←" } else { "✗" };
                system_log.push(format!("[{}] {} Disconnected: {}", ts, mark, reason));
            }

            ChatEvent::Error(msg) => {
                let ts = Local::now().format("%H:%M:%S").to_string();
                system_log.push(format!("[{}] ⚠ Error: {}", ts, msg));
            }

            ChatEvent::ReconnectsExhausted => {
                *is_connected = false;
                let ts = Local::now().format("%H:%M:%S").to_string();
                system_log.push(format!(
                    "[{}] ✗ Gave up reconnecting; reconnect manually",
                    ts
                ));
            }

            ChatEvent::Raw(msg) => {
                let ts = Local::now().format("%H:%M:%S").to_string();
                system_log.push(format!("[{}] {}", ts, msg));
                // Keep log from growing too large
                if system_log.len() > 500 {
                    system_log.remove(0);
                }
            }

            ChatEvent::NewMessage(message) => {
                let chat_id = message.chat_id;
                let sender = store
                    .conversation(chat_id)
                    .and_then(|c| c.user(message.user_id))
                    .map(|u| u.display_name())
                    .unwrap_or_else(|| message.user_id.to_string());
                let content = message.content.clone();
                let is_active = store.active_conversation().map(|c| c.id) == Some(chat_id);

                match store.ingest_message(message.clone()) {
                    IngestOutcome::Applied => {
                        if is_active {
                            if let Some(scroll) = tree.append(&message, store.local_user_id()) {
                                scrolls.push(scroll);
                            }
                        }
                        // Log to file (non-blocking)
                        if let Some(logger) = logger {
                            logger.log(LogEntry {
                                chat_id,
                                timestamp: Local::now().format("%H:%M:%S").to_string(),
                                sender,
                                content,
                            });
                        }
                    }
                    // Redelivered id: state already reflects it
                    IngestOutcome::Duplicate => {}
                    IngestOutcome::NeedsHistory(chat_id) => match source.fetch_messages(chat_id) {
                        Ok(history) => store.install_history(history),
                        Err(e) => {
                            let ts = Local::now().format("%H:%M:%S").to_string();
                            system_log
                                .push(format!("[{}] ⚠ History load failed: {}", ts, e));
                        }
                    },
                }
            }
        }
    }

    scrolls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Message, MessageKind};
    use crate::service::FixtureService;
    use crossbeam_channel::unbounded;

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

    fn loaded_store() -> ChatStore {
        let mut store = ChatStore::new(1);
        store.load_conversations(&FixtureService::new()).unwrap();
        store
    }

    #[test]
    fn test_lifecycle_events_toggle_connection_flag() {
        let (tx, rx) = unbounded();
        let mut connected = false;
        let mut store = loaded_store();
        let mut tree = TranscriptTree::new(0);
        let mut log = Vec::new();

        tx.send(ChatEvent::Opened).unwrap();
        process_events(&rx, &mut connected, &mut store, &mut tree, &FixtureService::new(), &mut log, &None);
        assert!(connected);
        assert!(log.last().unwrap().contains("Connected"));

        tx.send(ChatEvent::Closed {
            reason: "closed by server".into(),
            user_initiated: false,
        })
        .unwrap();
        process_events(&rx, &mut connected, &mut store, &mut tree, &FixtureService::new(), &mut log, &None);
        assert!(!connected);
    }

    #[test]
    fn test_new_message_in_active_chat_reaches_the_tree() {
        let (tx, rx) = unbounded();
        let mut connected = true;
        let mut store = loaded_store();
        store.set_active_conversation(Some(1));
        let mut tree = TranscriptTree::new(1);
        let mut log = Vec::new();

        tx.send(ChatEvent::NewMessage(msg(900, 1, 1, 1_719_000_000_000)))
            .unwrap();
        let scrolls = process_events(
            &rx, &mut connected, &mut store, &mut tree, &FixtureService::new(), &mut log, &None,
        );

        assert_eq!(tree.message_count(), 1);
        assert_eq!(store.conversation(1).unwrap().message.id, 900);
        // Own message requests a smooth scroll.
        assert_eq!(scrolls.len(), 1);
        assert!(scrolls[0].smooth);
    }

    #[test]
    fn test_new_message_in_background_chat_skips_the_tree() {
        let (tx, rx) = unbounded();
        let mut connected = true;
        let mut store = loaded_store();
        store.set_active_conversation(Some(1));
        let mut tree = TranscriptTree::new(1);
        let mut log = Vec::new();

        tx.send(ChatEvent::NewMessage(msg(901, 2, 3, 1_719_000_000_000)))
            .unwrap();
        process_events(
            &rx, &mut connected, &mut store, &mut tree, &FixtureService::new(), &mut log, &None,
        );

        assert!(tree.is_empty());
        assert_eq!(store.conversation(2).unwrap().message.id, 901);
        assert!(store.has_unread(store.conversation(2).unwrap()));
    }

    #[test]
    fn test_redelivered_message_is_dropped() {
        let (tx, rx) = unbounded();
        let mut connected = true;
        let mut store = loaded_store();
        store.set_active_conversation(Some(1));
        let mut tree = TranscriptTree::new(1);
        let mut log = Vec::new();

        let message = msg(902, 1, 2, 1_719_000_000_000);
        tx.send(ChatEvent::NewMessage(message.clone())).unwrap();
        tx.send(ChatEvent::NewMessage(message)).unwrap();
        process_events(
            &rx, &mut connected, &mut store, &mut tree, &FixtureService::new(), &mut log, &None,
        );

        assert_eq!(tree.message_count(), 1);
    }

    #[test]
    fn test_message_for_unknown_chat_loads_history() {
        let (tx, rx) = unbounded();
        let mut connected = true;
        // Empty store: every chat id is unknown.
        let mut store = ChatStore::new(1);
        let mut tree = TranscriptTree::new(0);
        let mut log = Vec::new();

        tx.send(ChatEvent::NewMessage(msg(903, 3, 4, 1_719_000_000_000)))
            .unwrap();
        process_events(
            &rx, &mut connected, &mut store, &mut tree, &FixtureService::new(), &mut log, &None,
        );

        // The fixture history for chat 3 was fetched and installed.
        assert!(store.conversation(3).is_some());
        assert!(store.messages(3).is_some());
    }

    #[test]
    fn test_raw_log_is_bounded() {
        let (tx, rx) = unbounded();
        let mut connected = false;
        let mut store = ChatStore::new(1);
        let mut tree = TranscriptTree::new(0);
        let mut log = Vec::new();

        for i in 0..600 {
            tx.send(ChatEvent::Raw(format!("line {}", i))).unwrap();
        }
        process_events(
            &rx, &mut connected, &mut store, &mut tree, &FixtureService::new(), &mut log, &None,
        );
        assert!(log.len() <= 500);
        assert!(log.last().unwrap().contains("line 599"));
    }
}
