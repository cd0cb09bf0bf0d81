//! Incremental transcript grouping.
//!
//! Maintains an explicit in-memory tree of date groups and sender groups for
//! one conversation. The rendering layer projects this tree; grouping logic
//! never touches a display surface. Two entry points cover both growth
//! directions: `append` for live messages (newest, at the bottom) and
//! `backfill` for older history pages (prepended at the top).

use chrono::NaiveDate;

use crate::model::Message;
use crate::timefmt::local_date;

/// Stable identification of a rendered message element, used for scroll
/// targeting and read tracking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTag {
    pub message_id: i64,
    pub user_id: i64,
    /// Normalized epoch milliseconds.
    pub created_at: i64,
    pub chat_id: i64,
}

impl MessageTag {
    pub fn of(message: &Message) -> Self {
        Self {
            message_id: message.id,
            user_id: message.user_id,
            created_at: message.created_at_ms(),
            chat_id: message.chat_id,
        }
    }
}

/// Scroll side effect for the rendering layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrollRequest {
    pub message_id: i64,
    /// Smooth animation for own live messages, instant for backfill anchoring.
    pub smooth: bool,
}

/// A contiguous run of messages by one sender within a single date group,
/// time-ascending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageGroup {
    pub user_id: i64,
    pub messages: Vec<MessageTag>,
}

impl MessageGroup {
    fn with(tag: MessageTag) -> Self {
        Self { user_id: tag.user_id, messages: vec![tag] }
    }

    /// Avatars render only for groups not authored by the local user, once
    /// per group.
    pub fn shows_avatar(&self, local_user_id: i64) -> bool {
        self.user_id != local_user_id
    }

    pub fn oldest(&self) -> Option<&MessageTag> {
        self.messages.first()
    }

    pub fn newest(&self) -> Option<&MessageTag> {
        self.messages.last()
    }
}

/// A contiguous run of sender groups sharing one local calendar date. Exactly
/// one date label per group; ordered oldest-to-newest top-to-bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub label: String,
    pub groups: Vec<MessageGroup>,
}

impl DateGroup {
    fn for_message(date: NaiveDate, tag: MessageTag) -> Self {
        Self {
            date,
            label: date.format("%Y-%m-%d").to_string(),
            groups: vec![MessageGroup::with(tag)],
        }
    }
}

/// The rendered transcript of one conversation, as a date-group tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranscriptTree {
    pub chat_id: i64,
    pub date_groups: Vec<DateGroup>,
}

impl TranscriptTree {
    pub fn new(chat_id: i64) -> Self {
        Self { chat_id, date_groups: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.date_groups.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.date_groups.is_empty()
    }

    pub fn message_count(&self) -> usize {
        self.date_groups
            .iter()
            .flat_map(|d| &d.groups)
            .map(|g| g.messages.len())
            .sum()
    }

    /// Element lookup by message id (scroll targeting).
    pub fn find(&self, message_id: i64) -> Option<&MessageTag> {
        self.date_groups
            .iter()
            .flat_map(|d| &d.groups)
            .flat_map(|g| &g.messages)
            .find(|t| t.message_id == message_id)
    }

    /// Apply one live message, always logically newest.
    ///
    /// Extends the last sender group when date and sender both match, starts
    /// a new sender group on a sender change, and starts a new date group on
    /// a date change (or an empty tree). Returns a smooth scroll request iff
    /// the message was authored by the local user.
    pub fn append(&mut self, message: &Message, local_user_id: i64) -> Option<ScrollRequest> {
        let date = local_date(message.created_at);
        let tag = MessageTag::of(message);

        match self.date_groups.last_mut() {
            Some(day) if day.date == date => match day.groups.last_mut() {
                Some(group) if group.user_id == tag.user_id => group.messages.push(tag),
                _ => day.groups.push(MessageGroup::with(tag)),
            },
            _ => self.date_groups.push(DateGroup::for_message(date, tag)),
        }

        (message.user_id == local_user_id)
            .then(|| ScrollRequest { message_id: message.id, smooth: true })
    }

    /// Prepend a page of older history. `messages` is newest-first; when
    /// `hide_newest` the batch's first entry duplicates an already-rendered
    /// message and is skipped.
    ///
    /// Each message lands at the current oldest position: it extends the
    /// oldest sender group on a matching date and sender, opens a new sender
    /// group before it on a sender change, and opens a new date group above
    /// on a date change. Returns an instant scroll request anchoring the
    /// viewport: the previously-oldest group when paging, or the newest group
    /// on a first fill.
    pub fn backfill(&mut self, messages: &[Message], hide_newest: bool) -> Option<ScrollRequest> {
        let previous_oldest = self
            .date_groups
            .first()
            .and_then(|d| d.groups.first())
            .and_then(|g| g.oldest())
            .map(|t| t.message_id);

        for message in messages.iter().skip(usize::from(hide_newest)) {
            let date = local_date(message.created_at);
            let tag = MessageTag::of(message);

            match self.date_groups.first_mut() {
                Some(day) if day.date == date => match day.groups.first_mut() {
                    Some(group) if group.user_id == tag.user_id => group.messages.insert(0, tag),
                    _ => day.groups.insert(0, MessageGroup::with(tag)),
                },
                _ => self.date_groups.insert(0, DateGroup::for_message(date, tag)),
            }
        }

        let anchor = previous_oldest.or_else(|| {
            self.date_groups
                .last()
                .and_then(|d| d.groups.last())
                .and_then(|g| g.newest())
                .map(|t| t.message_id)
        });
        anchor.map(|message_id| ScrollRequest { message_id, smooth: false })
    }
}
