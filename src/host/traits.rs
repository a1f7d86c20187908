//! Host editor trait definition

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::host::document::{TextDocument, TextEditor};
use crate::host::types::{Decoration, DecorationStyle, DecorationTypeId, EditorEvent};

/// The editor surface the client renders into and listens to
pub trait EditorHost: Send + Sync + 'static {
    /// Register a decoration type used by later `set_decorations` calls
    fn create_decoration_type(&self, style: DecorationStyle) -> DecorationTypeId;

    /// Release a decoration type, removing its decorations from every editor
    fn dispose_decoration_type(&self, decoration_type: DecorationTypeId);

    /// Replace every decoration of `decoration_type` in `editor` at once.
    /// An empty list clears the overlay.
    fn set_decorations(
        &self,
        editor: &TextEditor,
        decoration_type: DecorationTypeId,
        decorations: Vec<Decoration>,
    );

    fn visible_editors(&self) -> Vec<Arc<TextEditor>>;

    /// The focused editor, if any
    fn active_editor(&self) -> Option<Arc<TextEditor>>;

    /// Every open document
    fn text_documents(&self) -> Vec<Arc<TextDocument>>;

    /// Root of the first workspace folder
    fn workspace_root(&self) -> Option<PathBuf>;

    /// Subscribe to host notifications. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<EditorEvent>;
}
