//! Language server command resolution and process handling

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::client::error::ClientError;
use crate::client::language_client::LanguageClient;
use crate::config::{ExtensionConfig, SERVER_STOP_TIMEOUT_MS, substitute};

const SINGLE_QUOTES_PLUGIN: &str = "plugin/single_quotes";
const TRAILING_COMMA_PLUGIN: &str = "plugin/trailing_comma";

/// A program invocation that starts `stree lsp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Plugins to load, in order and without duplicates
pub fn plugins(config: &ExtensionConfig) -> IndexSet<String> {
    let mut plugins = IndexSet::new();
    if config.single_quotes {
        plugins.insert(SINGLE_QUOTES_PLUGIN.to_string());
    }
    if config.trailing_comma {
        plugins.insert(TRAILING_COMMA_PLUGIN.to_string());
    }
    plugins.extend(config.additional_plugins.iter().map(|plugin| substitute(plugin)));
    plugins
}

fn lsp_args(config: &ExtensionConfig) -> Vec<String> {
    let plugins = plugins(config);
    let mut args = vec!["lsp".to_string()];
    if !plugins.is_empty() {
        let joined: Vec<_> = plugins.into_iter().collect();
        args.push(format!("--plugins={}", joined.join(",")));
    }
    args
}

/// Command for a globally installed `stree`
pub fn global_command(config: &ExtensionConfig) -> ServerCommand {
    ServerCommand {
        program: "stree".to_string(),
        args: lsp_args(config),
        cwd: None,
    }
}

/// Command running the workspace's bundled `stree`
pub fn bundled_command(config: &ExtensionConfig, root: &Path) -> ServerCommand {
    let mut args = vec!["exec".to_string(), "stree".to_string()];
    args.extend(lsp_args(config));
    ServerCommand {
        program: "bundle".to_string(),
        args,
        cwd: Some(root.to_path_buf()),
    }
}

/// Whether the workspace bundle includes syntax_tree
async fn has_bundled_syntax_tree(root: &Path) -> bool {
    let status = Command::new("bundle")
        .args(["show", "syntax_tree"])
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("Could not run bundler in {:?}: {}", root, e);
            false
        }
    }
}

/// Prefer the workspace bundle, fall back to the global `stree`
pub async fn resolve_command(config: &ExtensionConfig, root: Option<&Path>) -> ServerCommand {
    if let Some(root) = root {
        if has_bundled_syntax_tree(root).await {
            return bundled_command(config, root);
        }
        info!("No bundled syntax_tree, running global stree.");
    }
    global_command(config)
}

/// A running language server process and its client connection
pub struct ServerProcess {
    client: Arc<LanguageClient>,
    child: Child,
    stderr: Option<JoinHandle<()>>,
}

impl ServerProcess {
    /// Spawn `command` and complete the `initialize` handshake
    pub async fn start(command: &ServerCommand, root: Option<&Path>) -> Result<Self, ClientError> {
        info!("Starting language server: {}", command);

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &command.cwd {
            process.current_dir(cwd);
        }

        let mut child = process.spawn().map_err(|source| ClientError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ClientError::Spawn {
                program: command.program.clone(),
                source: std::io::Error::other("stdio pipes unavailable"),
            });
        };
        let stderr = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!("[stree] {}", line);
                }
            })
        });

        let client = Arc::new(LanguageClient::new(stdout, stdin));
        let server = Self {
            client,
            child,
            stderr,
        };
        server.client.initialize(root).await?;
        Ok(server)
    }

    pub fn client(&self) -> &Arc<LanguageClient> {
        &self.client
    }

    /// Ask the server to shut down, killing it if it does not exit in time
    pub async fn stop(mut self) -> Result<(), ClientError> {
        info!("Stopping language server...");

        if let Err(e) = self.client.shutdown().await {
            warn!("Language server shutdown request failed: {}", e);
        }
        if let Err(e) = self.client.exit().await {
            debug!("Failed to send exit notification: {}", e);
        }

        match timeout(Duration::from_millis(SERVER_STOP_TIMEOUT_MS), self.child.wait()).await {
            Ok(Ok(status)) => info!("Language server exited with {}", status),
            Ok(Err(e)) => return Err(ClientError::Io(e)),
            Err(_) => {
                warn!("Language server did not exit in time, killing it");
                self.child.kill().await?;
            }
        }

        if let Some(stderr) = self.stderr.take() {
            stderr.abort();
        }
        Ok(())
    }
}
