//! Extension lifecycle: starts the server and the components built on it

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::client::error::ClientError;
use crate::client::language_client::LanguageClient;
use crate::client::server::{ServerProcess, plugins, resolve_command};
use crate::client::sync::DocumentSync;
use crate::config::ExtensionConfig;
use crate::host::document::TextEditor;
use crate::host::traits::EditorHost;
use crate::inlay::hints::InlayHints;

struct Session<H: EditorHost> {
    server: ServerProcess,
    sync: DocumentSync,
    inlay_hints: InlayHints<LanguageClient, H>,
}

pub struct Extension<H: EditorHost> {
    host: Arc<H>,
    config: Mutex<ExtensionConfig>,
    session: AsyncMutex<Option<Session<H>>>,
}

impl<H: EditorHost> Extension<H> {
    pub fn new(host: Arc<H>, config: ExtensionConfig) -> Self {
        Self {
            host,
            config: Mutex::new(config),
            session: AsyncMutex::new(None),
        }
    }

    pub fn config(&self) -> ExtensionConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start the server, sync open documents and begin rendering hints.
    /// Does nothing if already running.
    pub async fn start(&self) -> Result<(), ClientError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        let config = self.config();
        let root = self.host.workspace_root();
        let command = resolve_command(&config, root.as_deref()).await;
        info!(
            "Starting language server with {} plugin(s)...",
            plugins(&config).len()
        );

        let server = ServerProcess::start(&command, root.as_deref()).await?;
        let client = server.client().clone();
        let sync = DocumentSync::start(client.clone(), self.host.clone()).await;
        let inlay_hints = InlayHints::new(
            client,
            self.host.clone(),
            Duration::from_millis(config.inlay_hints.debounce_delay),
        );

        *session = Some(Session {
            server,
            sync,
            inlay_hints,
        });
        Ok(())
    }

    /// Tear down hints and sync, then stop the server
    pub async fn stop(&self) -> Result<(), ClientError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };

        session.inlay_hints.dispose();
        session.sync.dispose();
        session.server.stop().await
    }

    pub async fn restart(&self) -> Result<(), ClientError> {
        info!("Restarting language server...");
        if let Err(e) = self.stop().await {
            warn!("Failed to stop language server cleanly: {}", e);
        }
        self.start().await
    }

    /// Apply new settings, restarting the server when they changed
    pub async fn update_config(&self, config: ExtensionConfig) -> Result<(), ClientError> {
        let changed = {
            let mut current = self.config.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = *current != config;
            *current = config;
            changed
        };

        if changed && self.is_running().await {
            self.restart().await?;
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Printed syntax tree of the editor's document. `None` if the
    /// extension is not running or the server could not parse it.
    pub async fn visualize(&self, editor: &TextEditor) -> Result<Option<String>, ClientError> {
        let session = self.session.lock().await;
        let Some(session) = session.as_ref() else {
            return Ok(None);
        };
        session
            .server
            .client()
            .visualize(editor.document().uri())
            .await
    }

    /// Render hints for `editor` now, if the extension is running
    pub async fn render(&self, editor: &Arc<TextEditor>) {
        if let Some(session) = self.session.lock().await.as_ref() {
            session.inlay_hints.render_for_editor(editor).await;
        }
    }
}
