//! Common types exchanged with the host editor

use std::sync::Arc;

use serde::Serialize;
use tower_lsp::lsp_types::Range;

use crate::config::INLAY_HINTS_COLOR;
use crate::host::document::{TextDocument, TextEditor};

/// Handle to a decoration type registered with the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecorationTypeId(pub u64);

/// Font style applied to attached decoration text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FontStyle {
    Normal,
}

/// Whether a decoration grows when text is typed at its edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RangeBehavior {
    ClosedClosed,
}

/// Style of text rendered before or after a decoration range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentStyle {
    /// Theme color key
    pub color: String,
    pub font_style: FontStyle,
}

/// Options used to register a decoration type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationStyle {
    pub before: AttachmentStyle,
    pub after: AttachmentStyle,
    pub range_behavior: RangeBehavior,
}

impl DecorationStyle {
    /// Style of the inlay hint overlay
    pub fn inlay_hints() -> Self {
        let attachment = AttachmentStyle {
            color: INLAY_HINTS_COLOR.to_string(),
            font_style: FontStyle::Normal,
        };
        Self {
            before: attachment.clone(),
            after: attachment,
            range_behavior: RangeBehavior::ClosedClosed,
        }
    }
}

/// Text rendered next to a decoration range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "side", rename_all = "camelCase")]
pub enum Attachment {
    #[serde(rename_all = "camelCase")]
    Before { content_text: String },
    #[serde(rename_all = "camelCase")]
    After { content_text: String },
}

/// A rendering-only annotation applied to an editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoration {
    pub range: Range,
    pub attachment: Attachment,
}

/// Notifications delivered by the host
#[derive(Debug, Clone)]
pub enum EditorEvent {
    /// The full set of visible editors after the change
    VisibleEditorsChanged(Vec<Arc<TextEditor>>),
    DocumentOpened(Arc<TextDocument>),
    DocumentChanged(Arc<TextDocument>),
    DocumentClosed(Arc<TextDocument>),
}
