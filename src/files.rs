//! Attachment display helpers.

use crate::model::{Message, MessageKind};

/// Human-readable file size with one decimal above bytes.
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else {
        format!("{:.1} GB", b / GB)
    }
}

/// Message kind for an outgoing attachment, from its mime type prefix.
pub fn kind_for_mime(mime_type: &str) -> MessageKind {
    if mime_type.starts_with("image/") {
        MessageKind::Image
    } else if mime_type.starts_with("audio/") {
        MessageKind::Audio
    } else if mime_type.starts_with("video/") {
        MessageKind::Video
    } else {
        MessageKind::File
    }
}

/// Short label for an attachment message in the conversation list, where
/// only text content renders literally.
pub fn attachment_label(message: &Message) -> Option<String> {
    let name = message
        .details
        .as_ref()
        .and_then(|d| d.file_name.clone());
    let size = message
        .details
        .as_ref()
        .and_then(|d| d.size)
        .map(format_file_size);

    let label = match message.kind {
        MessageKind::Text => return None,
        MessageKind::Image => "Photo".to_string(),
        MessageKind::Audio => "Voice message".to_string(),
        MessageKind::Video => "Video".to_string(),
        MessageKind::File => name.unwrap_or_else(|| "File".to_string()),
    };
    Some(match size {
        Some(size) => format!("{} ({})", label, size),
        None => label,
    })
}
