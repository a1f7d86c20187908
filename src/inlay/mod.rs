//! Inlay hint rendering
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Debouncer  │────▶│ InlayHints  │────▶│ HintSource  │
//! │ (per editor)│     │  (render)   │     │  (server)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │  HintCache  │
//!                     │(weak, per doc)
//!                     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: Hint cache keyed by document, weakly held
//! - [`debounce`]: Per-key debouncer with bulk cancellation
//! - [`hints`]: Fetch/render cycle tying host events to the overlay
//! - [`types`]: `InlayHint` and `HintSet`

pub mod cache;
pub mod debounce;
pub mod hints;
pub mod types;

pub use hints::InlayHints;
pub use types::{HintSet, InlayHint};
