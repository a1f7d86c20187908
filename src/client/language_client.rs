//! JSON-RPC client for a language server
//!
//! Works over any reader/writer pair, usually the stdio pipes of a spawned
//! `stree lsp` process. A background task reads every incoming message and
//! routes responses to the request waiting for them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::Request;
use tower_lsp::lsp_types::*;
use tracing::{debug, error, info, warn};

use crate::client::error::ClientError;
use crate::client::traits::{DocumentNotifier, HintSource};
use crate::client::transport::{read_message, write_message};
use crate::config::{INLAY_HINTS_METHOD, VISUALIZING_METHOD};
use crate::host::document::TextDocument;
use crate::inlay::types::HintSet;

type Reply = Result<Value, ClientError>;
type SharedWriter = Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

#[derive(Default)]
struct Pending {
    closed: bool,
    waiting: HashMap<i64, oneshot::Sender<Reply>>,
}

type SharedPending = Arc<Mutex<Pending>>;

/// Any message the server sends: a response, a request or a notification
#[derive(Debug, serde::Deserialize)]
struct Incoming {
    id: Option<Value>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
    result: Option<Value>,
    error: Option<ResponseError>,
}

#[derive(Debug, serde::Deserialize)]
struct ResponseError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextDocumentParams {
    text_document: TextDocumentIdentifier,
}

pub struct LanguageClient {
    writer: SharedWriter,
    pending: SharedPending,
    next_id: AtomicI64,
    reader: JoinHandle<()>,
}

impl LanguageClient {
    /// Start reading from `reader` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(Box::new(writer)));
        let pending = SharedPending::default();
        let reader = tokio::spawn(Self::read_loop(
            BufReader::new(reader),
            writer.clone(),
            pending.clone(),
        ));

        Self {
            writer,
            pending,
            next_id: AtomicI64::new(1),
            reader,
        }
    }

    async fn read_loop<R>(mut reader: R, writer: SharedWriter, pending: SharedPending)
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            match read_message(&mut reader).await {
                Ok(Some(body)) => match serde_json::from_slice::<Incoming>(&body) {
                    Ok(message) => Self::dispatch(message, &writer, &pending).await,
                    Err(e) => warn!("Discarding malformed message from language server: {}", e),
                },
                Ok(None) => {
                    info!("Language server closed its output");
                    break;
                }
                Err(e) => {
                    error!("Failed to read from language server: {}", e);
                    break;
                }
            }
        }

        let waiting = {
            let mut pending = lock(&pending);
            pending.closed = true;
            std::mem::take(&mut pending.waiting)
        };
        for (_, sender) in waiting {
            let _ = sender.send(Err(ClientError::Closed));
        }
    }

    async fn dispatch(message: Incoming, writer: &SharedWriter, pending: &SharedPending) {
        match (message.method, message.id) {
            (Some(method), Some(id)) => {
                // Requests from the server (progress, configuration) get an
                // empty answer so the server never blocks on us.
                debug!("Answering server request {} with null", method);
                let response = json!({ "jsonrpc": "2.0", "id": id, "result": null });
                if let Err(e) = write_json(writer, &response).await {
                    warn!("Failed to answer server request {}: {}", method, e);
                }
            }
            (Some(method), None) => log_notification(&method, message.params),
            (None, Some(id)) => {
                let Some(id) = id.as_i64() else {
                    debug!("Ignoring response with non-numeric id {}", id);
                    return;
                };
                let reply = match message.error {
                    Some(e) => Err(ClientError::Server {
                        code: e.code,
                        message: e.message,
                    }),
                    None => Ok(message.result.unwrap_or(Value::Null)),
                };
                match lock(pending).waiting.remove(&id) {
                    Some(sender) => {
                        let _ = sender.send(reply);
                    }
                    None => debug!("Ignoring response for unknown request {}", id),
                }
            }
            (None, None) => debug!("Ignoring message without method or id"),
        }
    }

    /// Send a request and wait for its result
    pub async fn send_request<R>(&self, method: &str, params: Option<Value>) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            if pending.closed {
                return Err(ClientError::Closed);
            }
            pending.waiting.insert(id, sender);
        }

        let mut builder = Request::build(method.to_string()).id(id);
        if let Some(params) = params {
            builder = builder.params(params);
        }

        if let Err(e) = write_json(&self.writer, &builder.finish()).await {
            lock(&self.pending).waiting.remove(&id);
            return Err(e);
        }

        let value = receiver.await.map_err(|_| ClientError::Closed)??;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), ClientError> {
        let mut builder = Request::build(method.to_string());
        if let Some(params) = params {
            builder = builder.params(params);
        }
        write_json(&self.writer, &builder.finish()).await
    }

    /// Run the `initialize` handshake for a workspace rooted at `root`
    pub async fn initialize(&self, root: Option<&Path>) -> Result<InitializeResult, ClientError> {
        let root_uri = root.and_then(|path| Url::from_directory_path(path).ok());
        let workspace_folders = root.zip(root_uri.clone()).map(|(path, uri)| {
            vec![WorkspaceFolder {
                uri,
                name: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            }]
        });

        #[allow(deprecated)]
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri,
            workspace_folders,
            client_info: Some(ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            ..Default::default()
        };

        let result: InitializeResult = self
            .send_request("initialize", Some(serde_json::to_value(params)?))
            .await?;
        self.send_notification(
            "initialized",
            Some(serde_json::to_value(InitializedParams {})?),
        )
        .await?;

        match &result.server_info {
            Some(server) => info!(
                "Connected to {} {}",
                server.name,
                server.version.as_deref().unwrap_or("")
            ),
            None => info!("Connected to language server"),
        }
        Ok(result)
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send_request::<Value>("shutdown", None).await?;
        Ok(())
    }

    pub async fn exit(&self) -> Result<(), ClientError> {
        self.send_notification("exit", None).await
    }

    /// Printed syntax tree of `uri`, `None` if the server could not parse it
    pub async fn visualize(&self, uri: &Url) -> Result<Option<String>, ClientError> {
        self.send_request(VISUALIZING_METHOD, Some(text_document_params(uri)?))
            .await
    }

    /// Whether the server's output stream has ended
    pub fn is_closed(&self) -> bool {
        lock(&self.pending).closed
    }
}

impl Drop for LanguageClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait::async_trait]
impl HintSource for LanguageClient {
    async fn inlay_hints(&self, uri: &Url) -> Result<Option<HintSet>, ClientError> {
        self.send_request(INLAY_HINTS_METHOD, Some(text_document_params(uri)?))
            .await
    }
}

#[async_trait::async_trait]
impl DocumentNotifier for LanguageClient {
    async fn did_open(&self, document: &TextDocument) -> Result<(), ClientError> {
        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: document.uri().clone(),
                language_id: document.language_id(),
                version: document.version(),
                text: document.text(),
            },
        };
        self.send_notification("textDocument/didOpen", Some(serde_json::to_value(params)?))
            .await
    }

    async fn did_change(&self, document: &TextDocument) -> Result<(), ClientError> {
        let params = DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: document.uri().clone(),
                version: document.version(),
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: document.text(),
            }],
        };
        self.send_notification(
            "textDocument/didChange",
            Some(serde_json::to_value(params)?),
        )
        .await
    }

    async fn did_close(&self, uri: &Url) -> Result<(), ClientError> {
        let params = DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
        };
        self.send_notification("textDocument/didClose", Some(serde_json::to_value(params)?))
            .await
    }
}

fn text_document_params(uri: &Url) -> Result<Value, ClientError> {
    let params = TextDocumentParams {
        text_document: TextDocumentIdentifier { uri: uri.clone() },
    };
    Ok(serde_json::to_value(params)?)
}

async fn write_json<T: Serialize>(writer: &SharedWriter, message: &T) -> Result<(), ClientError> {
    let body = serde_json::to_vec(message)?;
    let mut writer = writer.lock().await;
    write_message(&mut **writer, &body).await
}

/// Re-emit server log notifications as tracing events
fn log_notification(method: &str, params: Value) {
    match method {
        "window/logMessage" | "window/showMessage" => {
            let Ok(params) = serde_json::from_value::<LogMessageParams>(params) else {
                debug!("Malformed {} notification", method);
                return;
            };
            if params.typ == MessageType::ERROR {
                error!("[server] {}", params.message);
            } else if params.typ == MessageType::WARNING {
                warn!("[server] {}", params.message);
            } else if params.typ == MessageType::INFO {
                info!("[server] {}", params.message);
            } else {
                debug!("[server] {}", params.message);
            }
        }
        _ => debug!("Ignoring notification {}", method),
    }
}

fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}
