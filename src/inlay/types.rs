//! Inlay hint payloads returned by `textDocument/inlayHints`

use serde::{Deserialize, Serialize};

/// A piece of text the server wants displayed at a character offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlayHint {
    pub position: usize,
    pub text: String,
}

/// Hints for one document snapshot, split by the side they render on.
///
/// An empty set means "checked, nothing to show" and clears the overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintSet {
    #[serde(default)]
    pub before: Vec<InlayHint>,
    #[serde(default)]
    pub after: Vec<InlayHint>,
}

impl HintSet {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}
