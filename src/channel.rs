//! Live-update channel: a reconnecting websocket worker.
//!
//! Runs on its own thread with a dedicated Tokio runtime; the UI side talks
//! to it over crossbeam channels. Unexpected closes are retried with capped
//! exponential backoff; a user-initiated disconnect sets a sticky flag that
//! suppresses all further reconnects.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use crate::model::Message;
use crate::protocol::{ChannelAction, ChatEvent, SendMessagePayload};

/// Reconnects give up permanently after this many attempts.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Backoff ceiling.
pub const MAX_RECONNECT_DELAY_MS: u64 = 10_000;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    ClosedByError,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket failure: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Exponential backoff delay for the given retry attempt (0-based):
/// `min(1000 * 2^attempt, 10000)` ms.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let millis = 1000u64
        .saturating_mul(1u64 << attempt.min(31))
        .min(MAX_RECONNECT_DELAY_MS);
    Duration::from_millis(millis)
}

/// Delay before the next retry, or `None` once all attempts are spent.
pub fn next_reconnect_delay(attempts: u32) -> Option<Duration> {
    (attempts < MAX_RECONNECT_ATTEMPTS).then(|| reconnect_delay(attempts))
}

// ============================================================================
// Wire format: JSON envelope {event, data}
// ============================================================================

/// Discriminated event envelope shared by both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Decoded inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `new_message` / `send_message`: a newly created message.
    NewMessage(Message),
    /// Server informational event.
    Info(serde_json::Value),
    /// Server-side exception report.
    Exception(serde_json::Value),
    /// Unrecognized event name; logged and dropped by the dispatcher.
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct MessageData {
    message: Message,
}

/// Decode one inbound text frame. Malformed JSON is an error the dispatch
/// loop logs and drops; it never tears down the channel.
pub fn decode_envelope(text: &str) -> Result<Inbound, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(text)?;
    match envelope.event.as_str() {
        "new_message" | "send_message" => {
            let data: MessageData = serde_json::from_value(envelope.data)?;
            Ok(Inbound::NewMessage(data.message))
        }
        "message" => Ok(Inbound::Info(envelope.data)),
        "exception" => Ok(Inbound::Exception(envelope.data)),
        other => Ok(Inbound::Unknown(other.to_string())),
    }
}

/// Serialize an outbound `send_message` envelope.
pub fn encode_send(payload: &SendMessagePayload) -> String {
    serde_json::json!({
        "event": "send_message",
        "data": {
            "send_to": payload.send_to,
            "message": {
                "chat_id": payload.chat_id,
                "type": payload.kind,
                "content": payload.content,
                "details": null,
            },
        },
    })
    .to_string()
}

// ============================================================================
// Worker loop
// ============================================================================

/// Create a TLS connector backed by the webpki root certificates.
pub(crate) fn tls_connector() -> Connector {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Connector::Rustls(Arc::new(config))
}

async fn open_socket(url: &str) -> Result<Socket, ChannelError> {
    let (socket, _response) =
        connect_async_tls_with_config(url, None, false, Some(tls_connector())).await?;
    Ok(socket)
}

/// Run the channel worker. Intended for a dedicated thread; returns only if
/// the runtime cannot be created or the action channel closes.
pub fn run_channel(action_rx: Receiver<ChannelAction>, event_tx: Sender<ChatEvent>) {
    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            let _ = event_tx.send(ChatEvent::Error(format!(
                "Failed to create Tokio runtime: {}",
                e
            )));
            return;
        }
    };

    rt.block_on(async move {
        let mut socket: Option<Socket> = None;
        let mut state = ChannelState::Disconnected;
        let mut url: Option<String> = None;
        let mut attempts: u32 = 0;
        let mut user_disconnected = false;
        let mut next_retry_at: Option<Instant> = None;

        loop {
            // Drain actions from the UI (non-blocking)
            while let Ok(action) = action_rx.try_recv() {
                match action {
                    ChannelAction::Connect { url: target } => {
                        // Dialing anew replaces any live socket
                        if let Some(mut s) = socket.take() {
                            let _ = s.close(None).await;
                        }
                        user_disconnected = false;
                        attempts = 0;
                        next_retry_at = None;
                        url = Some(target.clone());
                        state = ChannelState::Connecting;
                        match open_socket(&target).await {
                            Ok(s) => {
                                socket = Some(s);
                                state = ChannelState::Open;
                                let _ = event_tx.send(ChatEvent::Opened);
                            }
                            Err(e) => {
                                state = ChannelState::ClosedByError;
                                let _ = event_tx.send(ChatEvent::Error(e.to_string()));
                                schedule_reconnect(
                                    &mut attempts,
                                    &mut next_retry_at,
                                    &event_tx,
                                );
                            }
                        }
                    }

                    ChannelAction::Disconnect => {
                        user_disconnected = true;
                        next_retry_at = None;
                        if let Some(mut s) = socket.take() {
                            state = ChannelState::Closing;
                            // Normal closure; failures here are moot
                            let _ = s.close(None).await;
                        }
                        state = ChannelState::Disconnected;
                        let _ = event_tx.send(ChatEvent::Closed {
                            reason: "user disconnect".into(),
                            user_initiated: true,
                        });
                    }

                    ChannelAction::Send(payload) => {
                        if state != ChannelState::Open {
                            continue;
                        }
                        if let Some(s) = socket.as_mut() {
                            let frame = WsMessage::Text(encode_send(&payload));
                            if let Err(e) = s.send(frame).await {
                                let _ = event_tx
                                    .send(ChatEvent::Error(format!("Failed to send: {}", e)));
                            }
                        }
                    }
                }
            }

            if let Some(s) = socket.as_mut() {
                // Read with a short timeout so we keep servicing actions
                match timeout(Duration::from_millis(50), s.next()).await {
                    Ok(Some(Ok(WsMessage::Text(text)))) => {
                        dispatch_frame(&text, &event_tx);
                    }
                    Ok(Some(Ok(WsMessage::Close(_)))) | Ok(None) => {
                        socket = None;
                        state = ChannelState::ClosedByError;
                        let _ = event_tx.send(ChatEvent::Closed {
                            reason: "closed by server".into(),
                            user_initiated: false,
                        });
                        if !user_disconnected {
                            schedule_reconnect(&mut attempts, &mut next_retry_at, &event_tx);
                        }
                    }
                    Ok(Some(Ok(_))) => {
                        // Ping/pong/binary frames carry no chat events
                    }
                    Ok(Some(Err(e))) => {
                        socket = None;
                        state = ChannelState::ClosedByError;
                        let _ = event_tx.send(ChatEvent::Error(format!("Read error: {}", e)));
                        let _ = event_tx.send(ChatEvent::Closed {
                            reason: "read error".into(),
                            user_initiated: false,
                        });
                        if !user_disconnected {
                            schedule_reconnect(&mut attempts, &mut next_retry_at, &event_tx);
                        }
                    }
                    Err(_) => {
                        // Timeout: normal, loop back to actions
                    }
                }
            } else if let Some(at) = next_retry_at {
                if Instant::now() < at {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    continue;
                }
                next_retry_at = None;
                // The sticky flag is re-checked before every scheduled retry
                if user_disconnected {
                    continue;
                }
                let Some(target) = url.clone() else { continue };
                state = ChannelState::Connecting;
                let _ = event_tx.send(ChatEvent::Raw(format!(
                    "Reconnecting to {} (attempt {})...",
                    target, attempts
                )));
                match open_socket(&target).await {
                    Ok(s) => {
                        socket = Some(s);
                        state = ChannelState::Open;
                        attempts = 0;
                        let _ = event_tx.send(ChatEvent::Opened);
                    }
                    Err(e) => {
                        state = ChannelState::ClosedByError;
                        let _ = event_tx.send(ChatEvent::Error(e.to_string()));
                        schedule_reconnect(&mut attempts, &mut next_retry_at, &event_tx);
                    }
                }
            } else {
                // Idle: no connection and nothing scheduled
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    });
}

/// Route one inbound text frame to chat events. Unknown or malformed frames
/// are logged and dropped; the dispatch loop never crashes on them.
fn dispatch_frame(text: &str, event_tx: &Sender<ChatEvent>) {
    match decode_envelope(text) {
        Ok(Inbound::NewMessage(message)) => {
            let _ = event_tx.send(ChatEvent::NewMessage(message));
        }
        Ok(Inbound::Info(data)) => {
            let _ = event_tx.send(ChatEvent::Raw(format!("server message: {}", data)));
        }
        Ok(Inbound::Exception(data)) => {
            let _ = event_tx.send(ChatEvent::Raw(format!("server exception: {}", data)));
        }
        Ok(Inbound::Unknown(event)) => {
            let _ = event_tx.send(ChatEvent::Raw(format!("unrecognized event: {}", event)));
        }
        Err(e) => {
            let _ = event_tx.send(ChatEvent::Raw(format!("malformed envelope: {}", e)));
        }
    }
}

fn schedule_reconnect(
    attempts: &mut u32,
    next_retry_at: &mut Option<Instant>,
    event_tx: &Sender<ChatEvent>,
) {
    match next_reconnect_delay(*attempts) {
        Some(delay) => {
            *attempts += 1;
            *next_retry_at = Some(Instant::now() + delay);
            let _ = event_tx.send(ChatEvent::Raw(format!(
                "Reconnecting in {} ms...",
                delay.as_millis()
            )));
        }
        None => {
            let _ = event_tx.send(ChatEvent::ReconnectsExhausted);
        }
    }
}
