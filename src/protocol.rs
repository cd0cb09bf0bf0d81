//! Actions and events exchanged between the UI thread and the channel worker.

use crate::model::{Message, MessageKind};

/// Outbound message payload handed to the live channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SendMessagePayload {
    /// Recipient user id.
    pub send_to: i64,
    pub chat_id: i64,
    pub kind: MessageKind,
    pub content: String,
}

/// Actions sent from the UI to the channel worker.
#[derive(Debug, Clone)]
pub enum ChannelAction {
    /// Open (or re-open) the websocket to the given URL.
    Connect { url: String },
    /// User-initiated teardown; suppresses all further auto-reconnects.
    Disconnect,
    /// Send a chat message; no-op while the channel is not open.
    Send(SendMessagePayload),
}

/// Events sent from the channel worker to the UI.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Channel established; retry counter has been reset.
    Opened,
    /// Channel closed.
    Closed { reason: String, user_initiated: bool },
    /// A newly created message arrived over the wire.
    NewMessage(Message),
    /// Non-fatal channel error.
    Error(String),
    /// All reconnect attempts spent; no further automatic recovery.
    ReconnectsExhausted,
    /// Informational line for the system log.
    Raw(String),
}
