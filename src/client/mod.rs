//! Language server connection layer
//!
//! This module starts the `stree lsp` process, speaks JSON-RPC with it and
//! keeps it in sync with the host's documents.
//!
//! # Modules
//!
//! - [`error`]: Error type for every client operation
//! - [`transport`]: `Content-Length` message framing
//! - [`language_client`]: JSON-RPC client, implements the trait seams
//! - [`traits`]: `HintSource` and `DocumentNotifier`
//! - [`server`]: Server command resolution and process lifecycle
//! - [`sync`]: Forwards document events to the server

pub mod error;
pub mod language_client;
pub mod server;
pub mod sync;
pub mod traits;
pub mod transport;
