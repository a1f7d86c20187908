//! Document synchronization with the language server
//!
//! Forwards host document events as `didOpen`/`didChange`/`didClose`, for
//! ruby documents on disk only.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::Url;
use tracing::{debug, warn};

use crate::client::traits::DocumentNotifier;
use crate::config::{SYNCED_SCHEME, TARGET_LANGUAGE};
use crate::host::document::TextDocument;
use crate::host::traits::EditorHost;
use crate::host::types::EditorEvent;

/// Running document synchronization
pub struct DocumentSync {
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl DocumentSync {
    /// Open every already-open ruby document with the server, then keep
    /// forwarding host events until disposed.
    pub async fn start<N, H>(notifier: Arc<N>, host: Arc<H>) -> Self
    where
        N: DocumentNotifier,
        H: EditorHost,
    {
        let events = host.subscribe();
        let mut synchronizer = Synchronizer::new(notifier);
        for document in host.text_documents() {
            synchronizer.open(&document).await;
        }

        let listener = tokio::spawn(synchronizer.listen(events));
        Self {
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Stop forwarding events. Later calls do nothing.
    pub fn dispose(&self) {
        if let Some(listener) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            listener.abort();
        }
    }
}

impl Drop for DocumentSync {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct Synchronizer<N> {
    notifier: Arc<N>,
    opened: HashSet<Url>,
}

impl<N: DocumentNotifier> Synchronizer<N> {
    fn new(notifier: Arc<N>) -> Self {
        Self {
            notifier,
            opened: HashSet::new(),
        }
    }

    async fn listen(mut self, mut events: broadcast::Receiver<EditorEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle(event).await,
                Err(RecvError::Lagged(missed)) => {
                    warn!("Document sync missed {} editor events", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    async fn handle(&mut self, event: EditorEvent) {
        match event {
            EditorEvent::DocumentOpened(document) => self.open(&document).await,
            EditorEvent::DocumentChanged(document) => self.change(&document).await,
            EditorEvent::DocumentClosed(document) => self.close(document.uri()).await,
            EditorEvent::VisibleEditorsChanged(_) => {}
        }
    }

    fn is_synced(document: &TextDocument) -> bool {
        document.uri().scheme() == SYNCED_SCHEME && document.language_id() == TARGET_LANGUAGE
    }

    async fn open(&mut self, document: &TextDocument) {
        if !Self::is_synced(document) || self.opened.contains(document.uri()) {
            return;
        }

        match self.notifier.did_open(document).await {
            Ok(()) => {
                debug!("Opened {} with the language server", document.uri());
                self.opened.insert(document.uri().clone());
            }
            Err(e) => warn!("Failed to open {}: {}", document.uri(), e),
        }
    }

    async fn change(&mut self, document: &TextDocument) {
        if !self.opened.contains(document.uri()) {
            return;
        }

        if !Self::is_synced(document) {
            self.close(document.uri()).await;
            return;
        }

        if let Err(e) = self.notifier.did_change(document).await {
            warn!("Failed to sync changes of {}: {}", document.uri(), e);
        }
    }

    async fn close(&mut self, uri: &Url) {
        if !self.opened.remove(uri) {
            return;
        }

        if let Err(e) = self.notifier.did_close(uri).await {
            warn!("Failed to close {}: {}", uri, e);
        }
    }
}
