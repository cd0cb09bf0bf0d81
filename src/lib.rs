//! Courier Client library.
//!
//! Headless chat-client core: conversation store, incremental transcript
//! grouping, a reconnecting websocket channel, and read tracking. A rendering
//! layer projects the transcript tree; nothing in here touches a display
//! surface.

pub mod channel;
pub mod config;
pub mod events;
pub mod files;
pub mod grouping;
pub mod logging;
pub mod model;
pub mod protocol;
pub mod service;
pub mod state;
pub mod timefmt;
pub mod visibility;
pub mod voice;
