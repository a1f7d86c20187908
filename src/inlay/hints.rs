//! Fetch/render cycle for inlay hints
//!
//! Hints are resolved per document through a read-through [`HintCache`] and
//! rendered per editor as one decoration set. Edits in the focused editor are
//! debounced, edits elsewhere invalidate the cache immediately.
//!
//! ```text
//! host events ──▶ Debouncer (per editor) ──▶ invalidate ──▶ render_for_editor
//!                                                              │
//!                                         HintCache ◀── resolve ──▶ HintSource
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinHandle, JoinSet};
use tower_lsp::lsp_types::Range;
use tracing::{debug, warn};

use crate::client::traits::HintSource;
use crate::config::TARGET_LANGUAGE;
use crate::host::document::{TextDocument, TextEditor};
use crate::host::traits::EditorHost;
use crate::host::types::{Attachment, Decoration, DecorationStyle, DecorationTypeId, EditorEvent};
use crate::inlay::cache::HintCache;
use crate::inlay::debounce::Debouncer;
use crate::inlay::types::HintSet;

struct Inner<S, H> {
    source: Arc<S>,
    host: Arc<H>,
    cache: HintCache,
    decoration_type: DecorationTypeId,
    disposed: AtomicBool,
    renders: Mutex<JoinSet<()>>,
}

/// Inlay hint overlay for every visible editor of the host
pub struct InlayHints<S: HintSource, H: EditorHost> {
    inner: Arc<Inner<S, H>>,
    debouncer: Arc<Debouncer<Arc<TextEditor>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<S: HintSource, H: EditorHost> InlayHints<S, H> {
    /// Register the decoration type, render the currently visible editors
    /// and start listening to host events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(source: Arc<S>, host: Arc<H>, debounce_delay: Duration) -> Self {
        let decoration_type = host.create_decoration_type(DecorationStyle::inlay_hints());
        let inner = Arc::new(Inner {
            source,
            host,
            cache: HintCache::new(),
            decoration_type,
            disposed: AtomicBool::new(false),
            renders: Mutex::new(JoinSet::new()),
        });

        let debouncer = Arc::new(Debouncer::new(debounce_delay, {
            let inner = inner.clone();
            move |editor: Arc<TextEditor>| {
                let inner = inner.clone();
                async move {
                    debug!("Handling text document changes (debounced)");
                    inner.cache.delete(editor.document());
                    // The editor may have been closed while the delay ran.
                    if !inner.host.visible_editors().contains(&editor) {
                        debug!("Editor for {} is gone, skipping refresh", editor.document().uri());
                        return;
                    }
                    inner.render_for_editor(&editor).await;
                }
            }
        }));

        // Subscribe before the initial render so no change is missed.
        let events = inner.host.subscribe();

        let visible = inner.host.visible_editors();
        if !visible.is_empty() {
            inner.spawn_render(visible);
        }

        let listener = tokio::spawn(Self::listen(inner.clone(), debouncer.clone(), events));

        Self {
            inner,
            debouncer,
            listener: Mutex::new(Some(listener)),
        }
    }

    async fn listen(
        inner: Arc<Inner<S, H>>,
        debouncer: Arc<Debouncer<Arc<TextEditor>>>,
        mut events: broadcast::Receiver<EditorEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(EditorEvent::VisibleEditorsChanged(editors)) => inner.spawn_render(editors),
                Ok(EditorEvent::DocumentChanged(document)) => {
                    inner.handle_document_change(&debouncer, &document);
                }
                Ok(EditorEvent::DocumentOpened(_) | EditorEvent::DocumentClosed(_)) => {}
                Err(RecvError::Lagged(missed)) => {
                    // Missed changes may have left stale entries behind.
                    warn!("Missed {} editor events, clearing inlay hint cache", missed);
                    inner.cache.clear();
                    inner.spawn_render(inner.host.visible_editors());
                }
                Err(RecvError::Closed) => {
                    debug!("Host event stream closed");
                    break;
                }
            }
        }
    }

    /// Hints for `document`, from the cache or the server.
    ///
    /// `Some` of an empty set means the overlay must be cleared, `None`
    /// means the overlay must be left as it is.
    pub async fn resolve(&self, document: &Arc<TextDocument>) -> Option<Arc<HintSet>> {
        self.inner.resolve(document).await
    }

    /// Resolve hints for the editor's document and replace its overlay
    pub async fn render_for_editor(&self, editor: &Arc<TextEditor>) {
        self.inner.render_for_editor(editor).await;
    }

    /// Render each editor independently
    pub async fn render_editors(&self, editors: &[Arc<TextEditor>]) {
        self.inner.render_editors(editors).await;
    }

    /// React to a content change of `document`
    pub fn handle_document_change(&self, document: &Arc<TextDocument>) {
        self.inner.handle_document_change(&self.debouncer, document);
    }

    pub fn cache(&self) -> &HintCache {
        &self.inner.cache
    }

    pub fn decoration_type(&self) -> DecorationTypeId {
        self.inner.decoration_type
    }

    /// Number of editors with a debounced refresh pending
    pub fn pending_refreshes(&self) -> usize {
        self.debouncer.pending()
    }

    /// Stop listening, abort pending refreshes and running renders, then
    /// release the decoration type. Later calls do nothing.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(listener) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
        self.debouncer.dispose();
        self.inner.renders().abort_all();
        self.inner
            .host
            .dispose_decoration_type(self.inner.decoration_type);
        debug!("Inlay hints disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl<S: HintSource, H: EditorHost> Drop for InlayHints<S, H> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<S: HintSource, H: EditorHost> Inner<S, H> {
    /// Render `editors` in a task that is aborted on dispose
    fn spawn_render(self: &Arc<Self>, editors: Vec<Arc<TextEditor>>) {
        // Checked under the lock so nothing is spawned after `abort_all`.
        let mut renders = self.renders();
        if self.is_disposed() {
            return;
        }

        while renders.try_join_next().is_some() {}
        let inner = self.clone();
        renders.spawn(async move { inner.render_editors(&editors).await });
    }

    fn renders(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.renders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    async fn resolve(&self, document: &Arc<TextDocument>) -> Option<Arc<HintSet>> {
        if self.is_disposed() {
            return None;
        }

        if document.language_id() != TARGET_LANGUAGE {
            // The document may have been a ruby file before, its overlay has
            // to be cleared.
            if self.cache.delete(document).is_some() {
                debug!("{} is no longer {}, clearing inlay hints", document.uri(), TARGET_LANGUAGE);
                return Some(Arc::new(HintSet::default()));
            }
            return None;
        }

        if let Some(hints) = self.cache.get(document) {
            debug!("Loading inlay hints from cache for {}", document.uri());
            return Some(hints);
        }

        debug!("Requesting inlay hints for {}", document.uri());
        let reply = self.source.inlay_hints(document.uri()).await;
        if self.is_disposed() {
            return None;
        }

        match reply {
            Ok(Some(hints)) => {
                let hints = Arc::new(hints);
                self.cache.set(document, hints.clone());
                Some(hints)
            }
            // Typically a syntax error. Neither cache nor clear anything so
            // the previous render stays.
            Ok(None) => {
                debug!("No inlay hints returned for {}", document.uri());
                None
            }
            Err(e) => {
                warn!("Failed to request inlay hints for {}: {}", document.uri(), e);
                None
            }
        }
    }

    async fn render_for_editor(&self, editor: &Arc<TextEditor>) {
        let Some(hints) = self.resolve(editor.document()).await else {
            return;
        };

        if self.is_disposed() {
            return;
        }

        let decorations = to_decorations(editor.document(), &hints);
        debug!(
            "Setting {} inlay hints for {}",
            decorations.len(),
            editor.document().uri()
        );
        self.host
            .set_decorations(editor, self.decoration_type, decorations);
    }

    async fn render_editors(&self, editors: &[Arc<TextEditor>]) {
        join_all(editors.iter().map(|editor| self.render_for_editor(editor))).await;
    }

    fn handle_document_change(
        &self,
        debouncer: &Debouncer<Arc<TextEditor>>,
        document: &Arc<TextDocument>,
    ) {
        match self.host.active_editor() {
            Some(editor) if editor.document().id() == document.id() => debouncer.call(editor),
            _ => {
                // Nothing visible depends on it, invalidate right away.
                self.cache.delete(document);
            }
        }
    }
}

/// Zero-width decorations for every hint, before-hints first
fn to_decorations(document: &TextDocument, hints: &HintSet) -> Vec<Decoration> {
    let lines = document.line_index();
    let anchor = |offset: usize| {
        let position = lines.position(offset);
        Range::new(position, position)
    };

    let before = hints.before.iter().map(|hint| Decoration {
        range: anchor(hint.position),
        attachment: Attachment::Before {
            content_text: hint.text.clone(),
        },
    });
    let after = hints.after.iter().map(|hint| Decoration {
        range: anchor(hint.position),
        attachment: Attachment::After {
            content_text: hint.text.clone(),
        },
    });

    before.chain(after).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::error::ClientError;
    use crate::client::traits::MockHintSource;
    use crate::host::memory::MemoryHost;
    use crate::inlay::types::InlayHint;
    use tower_lsp::lsp_types::{Position, Url};

    const DELAY: Duration = Duration::from_millis(300);

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///project/{name}")).unwrap()
    }

    fn hint(position: usize, text: &str) -> InlayHint {
        InlayHint {
            position,
            text: text.to_string(),
        }
    }

    fn hint_set() -> HintSet {
        HintSet {
            before: vec![hint(0, "#")],
            after: vec![],
        }
    }

    #[test]
    fn to_decorations_anchors_before_hints_then_after_hints() {
        let document = TextDocument::new(uri("a.rb"), "ruby", "a\n1 + 2");
        let hints = HintSet {
            before: vec![hint(2, "(")],
            after: vec![hint(7, ")")],
        };

        let decorations = to_decorations(&document, &hints);

        let start = Position::new(1, 0);
        let end = Position::new(1, 5);
        assert_eq!(
            decorations,
            vec![
                Decoration {
                    range: Range::new(start, start),
                    attachment: Attachment::Before {
                        content_text: "(".to_string()
                    },
                },
                Decoration {
                    range: Range::new(end, end),
                    attachment: Attachment::After {
                        content_text: ")".to_string()
                    },
                },
            ]
        );
    }

    #[tokio::test]
    async fn resolve_skips_other_languages_without_cache_entry() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source.expect_inlay_hints().times(0);
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        let document = host.open_document(uri("notes.txt"), "plaintext", "hello");

        assert_eq!(hints.resolve(&document).await, None);
        assert!(hints.cache().is_empty());
    }

    #[tokio::test]
    async fn resolve_clears_stale_entry_when_language_changes() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source.expect_inlay_hints().times(0);
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        let document = host.open_document(uri("a.rb"), "ruby", "class Foo; end");
        hints.cache().set(&document, Arc::new(hint_set()));

        document.set_language_id("plaintext");

        assert_eq!(
            hints.resolve(&document).await.as_deref(),
            Some(&HintSet::default())
        );
        assert!(!hints.cache().contains(&document));
        assert_eq!(hints.resolve(&document).await, None);
    }

    #[tokio::test]
    async fn resolve_fetches_once_then_serves_from_cache() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source
            .expect_inlay_hints()
            .withf(|uri| uri.as_str() == "file:///project/a.rb")
            .times(1)
            .returning(|_| Ok(Some(hint_set())));
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        let document = host.open_document(uri("a.rb"), "ruby", "class Foo; end");

        let first = hints.resolve(&document).await.unwrap();
        let second = hints.resolve(&document).await.unwrap();

        assert_eq!(*first, hint_set());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn resolve_caches_empty_hint_set() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source
            .expect_inlay_hints()
            .times(1)
            .returning(|_| Ok(Some(HintSet::default())));
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        let document = host.open_document(uri("a.rb"), "ruby", "");

        assert!(hints.resolve(&document).await.unwrap().is_empty());
        assert!(hints.resolve(&document).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_does_not_cache_missing_result() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source.expect_inlay_hints().times(2).returning(|_| Ok(None));
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        let document = host.open_document(uri("a.rb"), "ruby", "class Foo");

        assert_eq!(hints.resolve(&document).await, None);
        assert_eq!(hints.resolve(&document).await, None);
        assert!(hints.cache().is_empty());
    }

    #[tokio::test]
    async fn resolve_treats_request_failure_as_missing_result() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source
            .expect_inlay_hints()
            .times(1)
            .returning(|_| Err(ClientError::Closed));
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        let document = host.open_document(uri("a.rb"), "ruby", "class Foo; end");

        assert_eq!(hints.resolve(&document).await, None);
        assert!(hints.cache().is_empty());
    }

    #[tokio::test]
    async fn render_for_editor_leaves_overlay_when_no_result() {
        let host = Arc::new(MemoryHost::new(None));
        let document = host.open_document(uri("a.rb"), "ruby", "class Foo");
        let editor = host.show(&document);
        let mut source = MockHintSource::new();
        source.expect_inlay_hints().returning(|_| Ok(None));
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);

        hints.render_for_editor(&editor).await;

        assert_eq!(host.decorations(&editor), None);
    }

    #[tokio::test]
    async fn background_change_invalidates_cache_immediately() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source.expect_inlay_hints().times(0);
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        let background = host.open_document(uri("b.rb"), "ruby", "b");
        hints.cache().set(&background, Arc::new(hint_set()));

        hints.handle_document_change(&background);

        assert!(!hints.cache().contains(&background));
        assert_eq!(hints.pending_refreshes(), 0);
    }

    #[tokio::test]
    async fn focused_change_is_debounced_and_keeps_cache_until_fire() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source.expect_inlay_hints().returning(|_| Ok(Some(hint_set())));
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        let document = host.open_document(uri("a.rb"), "ruby", "a");
        host.show(&document);
        hints.cache().set(&document, Arc::new(hint_set()));

        hints.handle_document_change(&document);

        assert!(hints.cache().contains(&document));
        assert_eq!(hints.pending_refreshes(), 1);
    }

    #[tokio::test]
    async fn dispose_releases_decoration_type_once() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source.expect_inlay_hints().times(0);
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        assert_eq!(host.live_decoration_types(), 1);

        hints.dispose();
        hints.dispose();

        assert!(hints.is_disposed());
        assert_eq!(host.live_decoration_types(), 0);
    }

    #[tokio::test]
    async fn resolve_after_dispose_skips_request() {
        let host = Arc::new(MemoryHost::new(None));
        let mut source = MockHintSource::new();
        source.expect_inlay_hints().times(0);
        let hints = InlayHints::new(Arc::new(source), host.clone(), DELAY);
        let document = host.open_document(uri("a.rb"), "ruby", "a");

        hints.dispose();

        assert_eq!(hints.resolve(&document).await, None);
        assert!(hints.cache().is_empty());
    }
}
