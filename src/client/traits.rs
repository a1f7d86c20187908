//! Seams between the client core and the language server connection

#[cfg(test)]
use mockall::automock;
use tower_lsp::lsp_types::Url;

use crate::client::error::ClientError;
use crate::host::document::TextDocument;
use crate::inlay::types::HintSet;

/// Source of inlay hints for a document
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait HintSource: Send + Sync + 'static {
    /// Request hints for the current content of the document at `uri`
    ///
    /// # Returns
    /// * `Ok(Some(HintSet))` - Hints for the snapshot the server holds
    /// * `Ok(None)` - The server could not produce hints (e.g. syntax error)
    /// * `Err(ClientError)` - The request failed
    async fn inlay_hints(&self, uri: &Url) -> Result<Option<HintSet>, ClientError>;
}

/// Receiver of document lifecycle notifications
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait DocumentNotifier: Send + Sync + 'static {
    async fn did_open(&self, document: &TextDocument) -> Result<(), ClientError>;

    /// Send the full current text of `document`
    async fn did_change(&self, document: &TextDocument) -> Result<(), ClientError>;

    async fn did_close(&self, uri: &Url) -> Result<(), ClientError>;
}
