//! Read tracking driven by message visibility.
//!
//! The rendering layer reports message elements as they enter the viewport;
//! the tracker turns qualifying sightings into [`ReadAdvance`] reports. It
//! only reports — persisting the read position is the caller's job, via
//! `ChatStore::mark_seen` and whatever backend acknowledgement applies.

use std::collections::HashSet;

use crate::grouping::MessageTag;
use crate::state::ChatStore;

/// Fraction of a message element that must be visible to count as seen.
pub const VISIBILITY_THRESHOLD: f64 = 0.01;

/// A sighting that should advance the read position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadAdvance {
    pub chat_id: i64,
    pub message_id: i64,
}

/// One-shot per-message visibility tracker for the active conversation.
#[derive(Debug, Default)]
pub struct ReadTracker {
    seen: HashSet<i64>,
}

impl ReadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all sightings; called when the active conversation changes.
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    /// Report that `ratio` of a message element is visible.
    ///
    /// Emits at most one [`ReadAdvance`] per message id, and only when the
    /// visible fraction clears the threshold, the element belongs to the
    /// active conversation, and its id is ahead of the acknowledged read
    /// position. Sub-threshold sightings do not consume the one shot.
    pub fn element_visible(
        &mut self,
        tag: &MessageTag,
        ratio: f64,
        store: &ChatStore,
    ) -> Option<ReadAdvance> {
        if ratio < VISIBILITY_THRESHOLD {
            return None;
        }
        if store.active_conversation().map(|c| c.id) != Some(tag.chat_id) {
            return None;
        }
        if !self.seen.insert(tag.message_id) {
            return None;
        }
        let behind = store
            .conversation(tag.chat_id)
            .is_some_and(|c| tag.message_id > c.last_seen_id);
        behind.then_some(ReadAdvance {
            chat_id: tag.chat_id,
            message_id: tag.message_id,
        })
    }
}
