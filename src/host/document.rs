//! Host-owned documents and the editors that show them

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tower_lsp::lsp_types::{Position, Url};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_EDITOR_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an open document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

/// Stable identity of an editor, distinct from the document it shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditorId(u64);

#[derive(Debug)]
struct DocumentState {
    language_id: String,
    text: String,
    version: i32,
}

/// An open text buffer. Created and dropped by the host.
#[derive(Debug)]
pub struct TextDocument {
    id: DocumentId,
    uri: Url,
    state: RwLock<DocumentState>,
}

impl TextDocument {
    pub fn new(uri: Url, language_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed)),
            uri,
            state: RwLock::new(DocumentState {
                language_id: language_id.into(),
                text: text.into(),
                version: 1,
            }),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn language_id(&self) -> String {
        self.read().language_id.clone()
    }

    pub fn text(&self) -> String {
        self.read().text.clone()
    }

    pub fn version(&self) -> i32 {
        self.read().version
    }

    /// Replace the whole content, bumping the version
    pub fn set_text(&self, text: impl Into<String>) {
        let mut state = self.write();
        state.text = text.into();
        state.version += 1;
    }

    pub fn set_language_id(&self, language_id: impl Into<String>) {
        self.write().language_id = language_id.into();
    }

    /// Convert a character offset into a line/character position. See
    /// [`LineIndex::position`].
    pub fn position_at(&self, offset: usize) -> Position {
        self.line_index().position(offset)
    }

    /// Line table of the current text, for converting many offsets
    pub fn line_index(&self) -> LineIndex {
        LineIndex::new(&self.read().text)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DocumentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DocumentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Character offsets where each line starts and where its content ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    ends: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        let mut ends = Vec::new();
        let mut previous = None;
        let mut len = 0;

        for (offset, c) in text.chars().enumerate() {
            if c == '\n' {
                ends.push(if previous == Some('\r') { offset - 1 } else { offset });
                starts.push(offset + 1);
            }
            previous = Some(c);
            len = offset + 1;
        }
        ends.push(len);

        Self { starts, ends, len }
    }

    /// Offsets past the end clamp to the end of the text. Both `\n` and
    /// `\r\n` end a line, and an offset between `\r` and `\n` maps to the end
    /// of that line.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = self.starts.partition_point(|&start| start <= offset) - 1;
        let character = offset.min(self.ends[line]) - self.starts[line];
        Position::new(line as u32, character as u32)
    }
}

/// A visible surface bound to one document
#[derive(Debug)]
pub struct TextEditor {
    id: EditorId,
    document: Arc<TextDocument>,
}

impl TextEditor {
    pub fn new(document: Arc<TextDocument>) -> Self {
        Self {
            id: EditorId(NEXT_EDITOR_ID.fetch_add(1, Ordering::Relaxed)),
            document,
        }
    }

    pub fn id(&self) -> EditorId {
        self.id
    }

    pub fn document(&self) -> &Arc<TextDocument> {
        &self.document
    }
}

impl PartialEq for TextEditor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TextEditor {}

impl Hash for TextEditor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn document(text: &str) -> TextDocument {
        TextDocument::new(
            Url::parse("file:///project/foo.rb").unwrap(),
            "ruby",
            text,
        )
    }

    #[rstest]
    #[case("class Foo; end", 0, Position::new(0, 0))]
    #[case("class Foo; end", 6, Position::new(0, 6))]
    #[case("a\nbc\nd", 3, Position::new(1, 1))]
    #[case("a\nbc\nd", 5, Position::new(2, 0))]
    #[case("a\r\nb", 3, Position::new(1, 0))]
    #[case("a\r\nb", 1, Position::new(0, 1))]
    #[case("a\r\nb", 2, Position::new(0, 1))]
    #[case("ab", 100, Position::new(0, 2))]
    #[case("é\nx", 3, Position::new(1, 1))]
    #[case("a\rb", 3, Position::new(0, 3))]
    #[case("", 4, Position::new(0, 0))]
    fn position_at_maps_offsets_to_line_and_character(
        #[case] text: &str,
        #[case] offset: usize,
        #[case] expected: Position,
    ) {
        assert_eq!(document(text).position_at(offset), expected);
    }

    #[test]
    fn line_index_converts_offsets_in_any_order() {
        let lines = LineIndex::new("def a\r\n  1\r\nend");

        let positions: Vec<_> = [12, 0, 9, 5, 7]
            .into_iter()
            .map(|offset| lines.position(offset))
            .collect();

        assert_eq!(
            positions,
            vec![
                Position::new(2, 0),
                Position::new(0, 0),
                Position::new(1, 2),
                Position::new(0, 5),
                Position::new(1, 0),
            ]
        );
    }

    #[test]
    fn set_text_bumps_version() {
        let doc = document("a");
        doc.set_text("ab");

        assert_eq!(doc.text(), "ab");
        assert_eq!(doc.version(), 2);
    }

    #[test]
    fn documents_and_editors_get_distinct_ids() {
        let first = Arc::new(document(""));
        let second = Arc::new(document(""));
        assert_ne!(first.id(), second.id());

        let left = TextEditor::new(first.clone());
        let right = TextEditor::new(first);
        assert_ne!(left, right);
        assert_eq!(left.document().id(), right.document().id());
    }
}
