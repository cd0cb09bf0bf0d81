//! Courier Client - a chat client core with a terminal front end
//!
//! Architecture:
//! - Main thread: owns the store and transcript tree, drives the prompt loop
//! - Channel thread: runs a Tokio runtime for the websocket
//! - Communication via crossbeam channels (lock-free, sync-safe)

use std::io::{self, BufRead, Write};
use std::thread;

use crossbeam_channel::unbounded;

use courier_client::channel::run_channel;
use courier_client::config::{load_settings, save_settings, Settings};
use courier_client::events::process_events;
use courier_client::files::attachment_label;
use courier_client::grouping::TranscriptTree;
use courier_client::logging::Logger;
use courier_client::model::MessageKind;
use courier_client::protocol::{ChannelAction, SendMessagePayload};
use courier_client::service::{FixtureService, MessageSource};
use courier_client::state::ChatStore;
use courier_client::timefmt::human_readable_time_now;
use courier_client::visibility::ReadTracker;

fn main() {
    let settings = load_settings().unwrap_or_default();
    let local_user_id = if settings.local_user_id != 0 {
        settings.local_user_id
    } else {
        1
    };

    // Channels for main <-> worker
    let (action_tx, action_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    thread::spawn(move || {
        run_channel(action_rx, event_tx);
    });

    let logger = Logger::new().ok();
    let source = FixtureService::new();
    let mut store = ChatStore::new(local_user_id);
    let mut tree = TranscriptTree::new(0);
    let mut tracker = ReadTracker::new();
    let mut is_connected = false;
    let mut system_log: Vec<String> = vec!["Welcome to Courier!".into()];

    if let Err(e) = store.load_conversations(&source) {
        eprintln!("Failed to load conversations: {}", e);
    }
    print_sidebar(&store);

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }

        // Apply everything the worker produced since the last prompt
        process_events(
            &event_rx,
            &mut is_connected,
            &mut store,
            &mut tree,
            &source,
            &mut system_log,
            &logger,
        );

        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "list" => print_sidebar(&store),

            "open" => match rest.parse::<i64>() {
                Ok(chat_id) => open_chat(&mut store, &mut tree, &mut tracker, &source, chat_id),
                Err(_) => println!("usage: open <chat id>"),
            },

            "send" => {
                let Some(conversation) = store.active_conversation() else {
                    println!("open a chat first");
                    continue;
                };
                let Some(counterpart) = conversation.counterpart(store.local_user_id()) else {
                    println!("no counterpart in this chat");
                    continue;
                };
                let _ = action_tx.send(ChannelAction::Send(SendMessagePayload {
                    send_to: counterpart.user_id,
                    chat_id: conversation.id,
                    kind: MessageKind::Text,
                    content: rest.to_string(),
                }));
            }

            "connect" => {
                let _ = action_tx.send(ChannelAction::Connect {
                    url: settings.socket_url.clone(),
                });
            }

            "disconnect" => {
                let _ = action_tx.send(ChannelAction::Disconnect);
            }

            "log" => {
                for entry in system_log.iter().rev().take(20).rev() {
                    println!("{}", entry);
                }
            }

            "quit" | "exit" => break,

            "" => {}
            _ => println!("commands: list, open <id>, send <text>, connect, disconnect, log, quit"),
        }
    }

    let _ = action_tx.send(ChannelAction::Disconnect);
    let _ = save_settings(&Settings {
        local_user_id,
        ..settings
    });
}

fn print_sidebar(store: &ChatStore) {
    println!("--- chats ---");
    for conversation in store.conversations() {
        let title = store
            .conversation_title(conversation)
            .unwrap_or_else(|| format!("chat {}", conversation.id));
        let unread = if store.has_unread(conversation) { "*" } else { " " };
        let preview = attachment_label(&conversation.message)
            .unwrap_or_else(|| conversation.message.content.clone());
        println!(
            "{} [{}] {} - {} ({})",
            unread,
            conversation.id,
            title,
            preview,
            human_readable_time_now(conversation.updated_at),
        );
    }
}

fn open_chat(
    store: &mut ChatStore,
    tree: &mut TranscriptTree,
    tracker: &mut ReadTracker,
    source: &dyn MessageSource,
    chat_id: i64,
) {
    if let Err(e) = store.load_messages(source, chat_id) {
        println!("cannot open chat {}: {}", chat_id, e);
        return;
    }
    store.set_active_conversation(Some(chat_id));
    tracker.reset();

    *tree = TranscriptTree::new(chat_id);
    if let Some(messages) = store.messages(chat_id) {
        let messages = messages.to_vec();
        tree.backfill(&messages, false);
    }
    print_transcript(store, tree, tracker);
}

fn print_transcript(store: &mut ChatStore, tree: &TranscriptTree, tracker: &mut ReadTracker) {
    let mut sightings = Vec::new();
    for day in &tree.date_groups {
        println!("=== {} ===", day.label);
        for group in &day.groups {
            let sender = store
                .user_info(group.user_id)
                .map(|u| u.display_name())
                .unwrap_or_else(|| group.user_id.to_string());
            for tag in &group.messages {
                let body = store
                    .messages(tree.chat_id)
                    .and_then(|list| list.iter().find(|m| m.id == tag.message_id))
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                println!(
                    "  {} <{}> {}",
                    human_readable_time_now(tag.created_at),
                    sender,
                    body
                );
                sightings.push(tag.clone());
            }
        }
    }
    // Everything printed was "seen"
    for tag in sightings {
        if let Some(advance) = tracker.element_visible(&tag, 1.0, store) {
            store.mark_seen(advance.chat_id, advance.message_id);
        }
    }
}
