//! Host editor model
//!
//! The client never owns documents or editors; it receives them from the
//! host and talks back through [`EditorHost`].
//!
//! # Modules
//!
//! - [`document`]: `TextDocument` and `TextEditor`
//! - [`types`]: decorations, decoration styles and host events
//! - [`traits`]: the `EditorHost` seam
//! - [`memory`]: an in-memory `EditorHost` implementation

pub mod document;
pub mod memory;
pub mod traits;
pub mod types;

pub use document::{DocumentId, EditorId, LineIndex, TextDocument, TextEditor};
pub use memory::MemoryHost;
pub use traits::EditorHost;
pub use types::{Attachment, Decoration, DecorationStyle, DecorationTypeId, EditorEvent};
