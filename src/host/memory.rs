//! In-memory host editor
//!
//! Keeps documents, editors and applied decorations in plain collections and
//! publishes the matching [`EditorEvent`]s. Used by the `stree-client`
//! binary and by tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tower_lsp::lsp_types::Url;
use tracing::debug;

use crate::host::document::{EditorId, TextDocument, TextEditor};
use crate::host::traits::EditorHost;
use crate::host::types::{Decoration, DecorationStyle, DecorationTypeId, EditorEvent};

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct State {
    documents: Vec<Arc<TextDocument>>,
    visible: Vec<Arc<TextEditor>>,
    active: Option<Arc<TextEditor>>,
    decoration_types: HashMap<DecorationTypeId, DecorationStyle>,
    decorations: HashMap<(EditorId, DecorationTypeId), Vec<Decoration>>,
    next_decoration_type: u64,
    set_decorations_count: usize,
}

pub struct MemoryHost {
    state: Mutex<State>,
    events: broadcast::Sender<EditorEvent>,
    workspace_root: Option<PathBuf>,
}

impl MemoryHost {
    pub fn new(workspace_root: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            events,
            workspace_root,
        }
    }

    pub fn open_document(
        &self,
        uri: Url,
        language_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Arc<TextDocument> {
        let document = Arc::new(TextDocument::new(uri, language_id, text));
        self.lock().documents.push(document.clone());
        self.emit(EditorEvent::DocumentOpened(document.clone()));
        document
    }

    /// Show `document` in a new editor and focus it
    pub fn show(&self, document: &Arc<TextDocument>) -> Arc<TextEditor> {
        let editor = Arc::new(TextEditor::new(document.clone()));
        let visible = {
            let mut state = self.lock();
            state.visible.push(editor.clone());
            state.active = Some(editor.clone());
            state.visible.clone()
        };
        self.emit(EditorEvent::VisibleEditorsChanged(visible));
        editor
    }

    pub fn focus(&self, editor: &Arc<TextEditor>) {
        self.lock().active = Some(editor.clone());
    }

    /// Move focus away from every editor
    pub fn blur(&self) {
        self.lock().active = None;
    }

    pub fn hide(&self, editor: &TextEditor) {
        let visible = {
            let mut state = self.lock();
            state.visible.retain(|e| e.id() != editor.id());
            if state.active.as_ref().is_some_and(|e| e.id() == editor.id()) {
                state.active = None;
            }
            state.decorations.retain(|(id, _), _| *id != editor.id());
            state.visible.clone()
        };
        self.emit(EditorEvent::VisibleEditorsChanged(visible));
    }

    /// Replace the content of `document`
    pub fn edit(&self, document: &Arc<TextDocument>, text: impl Into<String>) {
        document.set_text(text);
        self.emit(EditorEvent::DocumentChanged(document.clone()));
    }

    /// Change the language of `document`. Editors reopen a document under
    /// its new language, so this emits close, open and a visibility change.
    pub fn set_language(&self, document: &Arc<TextDocument>, language_id: impl Into<String>) {
        document.set_language_id(language_id);
        self.emit(EditorEvent::DocumentClosed(document.clone()));
        self.emit(EditorEvent::DocumentOpened(document.clone()));
        let visible = self.lock().visible.clone();
        self.emit(EditorEvent::VisibleEditorsChanged(visible));
    }

    /// Close `document` and every editor showing it. The host releases its
    /// references, so the document is dropped once nobody else holds it.
    pub fn close(&self, document: &Arc<TextDocument>) {
        let visible = {
            let mut state = self.lock();
            state.documents.retain(|d| d.id() != document.id());
            let closed: Vec<_> = state
                .visible
                .iter()
                .filter(|e| e.document().id() == document.id())
                .map(|e| e.id())
                .collect();
            state.visible.retain(|e| !closed.contains(&e.id()));
            if state
                .active
                .as_ref()
                .is_some_and(|e| closed.contains(&e.id()))
            {
                state.active = None;
            }
            state.decorations.retain(|(id, _), _| !closed.contains(id));
            state.visible.clone()
        };
        self.emit(EditorEvent::VisibleEditorsChanged(visible));
        self.emit(EditorEvent::DocumentClosed(document.clone()));
    }

    /// Decorations currently applied to `editor`, or `None` if none were
    /// ever set through a live decoration type
    pub fn decorations(&self, editor: &TextEditor) -> Option<Vec<Decoration>> {
        let state = self.lock();
        let mut found = false;
        let mut decorations = Vec::new();
        for ((editor_id, _), applied) in &state.decorations {
            if *editor_id == editor.id() {
                found = true;
                decorations.extend(applied.iter().cloned());
            }
        }
        found.then_some(decorations)
    }

    /// Number of accepted `set_decorations` calls
    pub fn set_decorations_count(&self) -> usize {
        self.lock().set_decorations_count
    }

    /// Number of registered, not yet disposed decoration types
    pub fn live_decoration_types(&self) -> usize {
        self.lock().decoration_types.len()
    }

    fn emit(&self, event: EditorEvent) {
        // No receivers is fine: nothing is listening yet.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EditorHost for MemoryHost {
    fn create_decoration_type(&self, style: DecorationStyle) -> DecorationTypeId {
        let mut state = self.lock();
        state.next_decoration_type += 1;
        let id = DecorationTypeId(state.next_decoration_type);
        state.decoration_types.insert(id, style);
        id
    }

    fn dispose_decoration_type(&self, decoration_type: DecorationTypeId) {
        let mut state = self.lock();
        state.decoration_types.remove(&decoration_type);
        state
            .decorations
            .retain(|(_, type_id), _| *type_id != decoration_type);
    }

    fn set_decorations(
        &self,
        editor: &TextEditor,
        decoration_type: DecorationTypeId,
        decorations: Vec<Decoration>,
    ) {
        let mut state = self.lock();
        if !state.decoration_types.contains_key(&decoration_type) {
            debug!("Ignoring decorations for disposed type {:?}", decoration_type);
            return;
        }
        if !state.visible.iter().any(|e| e.id() == editor.id()) {
            debug!("Ignoring decorations for hidden editor {:?}", editor.id());
            return;
        }
        state.set_decorations_count += 1;
        state
            .decorations
            .insert((editor.id(), decoration_type), decorations);
    }

    fn visible_editors(&self) -> Vec<Arc<TextEditor>> {
        self.lock().visible.clone()
    }

    fn active_editor(&self) -> Option<Arc<TextEditor>> {
        self.lock().active.clone()
    }

    fn text_documents(&self) -> Vec<Arc<TextDocument>> {
        self.lock().documents.clone()
    }

    fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_root.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }
}
