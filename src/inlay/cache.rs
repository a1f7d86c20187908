//! Document-keyed hint cache that never keeps documents alive

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::host::document::{DocumentId, TextDocument};
use crate::inlay::types::HintSet;

struct Entry {
    document: Weak<TextDocument>,
    hints: Arc<HintSet>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.document.strong_count() > 0
    }
}

/// Last known hints per open document.
///
/// Entries hold only a weak reference to their document. Once the host drops
/// a document its entry is treated as absent and pruned on the next write,
/// so the cache is bounded by the number of open documents.
#[derive(Default)]
pub struct HintCache {
    entries: Mutex<HashMap<DocumentId, Entry>>,
}

impl HintCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, document: &TextDocument) -> Option<Arc<HintSet>> {
        let mut entries = self.lock();
        match entries.get(&document.id()) {
            Some(entry) if entry.is_live() => Some(entry.hints.clone()),
            Some(_) => {
                entries.remove(&document.id());
                None
            }
            None => None,
        }
    }

    pub fn contains(&self, document: &TextDocument) -> bool {
        self.get(document).is_some()
    }

    pub fn set(&self, document: &Arc<TextDocument>, hints: Arc<HintSet>) {
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.is_live());
        entries.insert(
            document.id(),
            Entry {
                document: Arc::downgrade(document),
                hints,
            },
        );
    }

    /// Remove the entry for `document`, returning it if one was present
    pub fn delete(&self, document: &TextDocument) -> Option<Arc<HintSet>> {
        self.lock()
            .remove(&document.id())
            .filter(Entry::is_live)
            .map(|entry| entry.hints)
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of entries whose document is still alive
    pub fn len(&self) -> usize {
        self.lock().values().filter(|entry| entry.is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inlay::types::InlayHint;
    use tower_lsp::lsp_types::Url;

    fn document(name: &str) -> Arc<TextDocument> {
        Arc::new(TextDocument::new(
            Url::parse(&format!("file:///project/{name}")).unwrap(),
            "ruby",
            "class Foo; end",
        ))
    }

    fn hints(text: &str) -> Arc<HintSet> {
        Arc::new(HintSet {
            before: vec![InlayHint {
                position: 0,
                text: text.to_string(),
            }],
            after: vec![],
        })
    }

    #[test]
    fn get_returns_none_for_unknown_document() {
        let cache = HintCache::new();
        assert!(cache.get(&document("a.rb")).is_none());
    }

    #[test]
    fn set_then_get_returns_stored_hints() {
        let cache = HintCache::new();
        let doc = document("a.rb");

        cache.set(&doc, hints("#"));

        assert_eq!(cache.get(&doc).unwrap().before[0].text, "#");
    }

    #[test]
    fn empty_hint_set_is_a_cached_value() {
        let cache = HintCache::new();
        let doc = document("a.rb");

        cache.set(&doc, Arc::new(HintSet::default()));

        assert!(cache.contains(&doc));
        assert!(cache.get(&doc).unwrap().is_empty());
    }

    #[test]
    fn set_replaces_previous_entry() {
        let cache = HintCache::new();
        let doc = document("a.rb");

        cache.set(&doc, hints("old"));
        cache.set(&doc, hints("new"));

        assert_eq!(cache.get(&doc).unwrap().before[0].text, "new");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn delete_returns_removed_entry() {
        let cache = HintCache::new();
        let doc = document("a.rb");
        cache.set(&doc, hints("#"));

        assert!(cache.delete(&doc).is_some());
        assert!(cache.delete(&doc).is_none());
        assert!(cache.get(&doc).is_none());
    }

    #[test]
    fn clear_removes_all_entries() {
        let cache = HintCache::new();
        let first = document("a.rb");
        let second = document("b.rb");
        cache.set(&first, hints("#"));
        cache.set(&second, hints("#"));

        cache.clear();

        assert!(cache.is_empty());
    }

    #[test]
    fn entries_are_keyed_by_document_identity() {
        let cache = HintCache::new();
        let first = document("a.rb");
        let second = document("a.rb");

        cache.set(&first, hints("#"));

        assert!(cache.get(&second).is_none());
    }

    #[test]
    fn cache_does_not_keep_documents_alive() {
        let cache = HintCache::new();
        let doc = document("a.rb");
        let weak = Arc::downgrade(&doc);
        cache.set(&doc, hints("#"));

        drop(doc);

        assert!(weak.upgrade().is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn dropped_documents_are_pruned_on_next_write() {
        let cache = HintCache::new();
        let kept = document("kept.rb");
        for i in 0..10 {
            let doc = document(&format!("{i}.rb"));
            cache.set(&doc, hints("#"));
        }

        cache.set(&kept, hints("#"));

        assert_eq!(cache.lock().len(), 1);
    }
}
