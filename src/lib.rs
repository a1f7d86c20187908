//! Editor-side client for the Syntax Tree (`stree lsp`) language server
//!
//! Starts and talks to the server, keeps it in sync with the host's ruby
//! documents and renders the server's inlay hints as debounced, cached
//! decorations.

pub mod client;
pub mod config;
pub mod extension;
pub mod host;
pub mod inlay;
pub mod logging;
