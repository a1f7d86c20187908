//! In-process fake `stree lsp` server over an in-memory pipe

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::io::{BufReader, duplex, split};
use tokio::task::JoinHandle;

use syntax_tree_client::client::language_client::LanguageClient;
use syntax_tree_client::client::transport::{read_message, write_message};

/// Observable state of the fake server
#[derive(Default)]
pub struct FakeServer {
    /// Methods of every message received, in order
    pub methods: Mutex<Vec<String>>,
    /// Latest text per document URI
    pub documents: Mutex<HashMap<String, String>>,
}

impl FakeServer {
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }

    /// Hints the fake server computes for `text`: a `#` before the first
    /// character and the character count after the last one. Text containing
    /// `syntax error` yields no result.
    fn hints_for(text: &str) -> Value {
        if text.contains("syntax error") {
            return Value::Null;
        }
        let length = text.chars().count();
        json!({
            "before": [{ "position": 0, "text": "#" }],
            "after": [{ "position": length, "text": format!(" # {length}") }]
        })
    }

    /// Printed tree the fake server returns for `text`, one statement per
    /// line. Text containing `syntax error` yields no result.
    fn tree_for(text: &str) -> Value {
        if text.contains("syntax error") {
            return Value::Null;
        }
        let statements: Vec<_> = text.lines().map(|line| format!("(stmt {line:?})")).collect();
        Value::String(format!("(program {})", statements.join(" ")))
    }

    fn handle(&self, message: &Value) -> Option<Value> {
        let method = message["method"].as_str()?.to_string();
        self.methods.lock().unwrap().push(method.clone());

        let result = match method.as_str() {
            "initialize" => json!({
                "capabilities": {},
                "serverInfo": { "name": "fake-stree", "version": "0.0.0" }
            }),
            "textDocument/didOpen" => {
                let document = &message["params"]["textDocument"];
                self.store(&document["uri"], &document["text"]);
                return None;
            }
            "textDocument/didChange" => {
                let params = &message["params"];
                self.store(
                    &params["textDocument"]["uri"],
                    &params["contentChanges"][0]["text"],
                );
                return None;
            }
            "textDocument/didClose" => {
                let uri = message["params"]["textDocument"]["uri"].as_str()?;
                self.documents.lock().unwrap().remove(uri);
                return None;
            }
            "textDocument/inlayHints" => {
                let uri = message["params"]["textDocument"]["uri"].as_str()?;
                match self.documents.lock().unwrap().get(uri) {
                    Some(text) => Self::hints_for(text),
                    None => Value::Null,
                }
            }
            "syntaxTree/visualizing" => {
                let uri = message["params"]["textDocument"]["uri"].as_str()?;
                match self.documents.lock().unwrap().get(uri) {
                    Some(text) => Self::tree_for(text),
                    None => Value::Null,
                }
            }
            "shutdown" => Value::Null,
            _ => return None,
        };

        let id = message.get("id")?.clone();
        Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }

    fn store(&self, uri: &Value, text: &Value) {
        if let (Some(uri), Some(text)) = (uri.as_str(), text.as_str()) {
            self.documents
                .lock()
                .unwrap()
                .insert(uri.to_string(), text.to_string());
        }
    }
}

/// Start a fake server task and a client connected to it
pub fn connect_fake_server() -> (Arc<LanguageClient>, Arc<FakeServer>, JoinHandle<()>) {
    let (client_end, server_end) = duplex(64 * 1024);
    let (client_read, client_write) = split(client_end);
    let (server_read, mut server_write) = split(server_end);
    let server = Arc::new(FakeServer::default());

    let task = tokio::spawn({
        let server = server.clone();
        async move {
            let mut reader = BufReader::new(server_read);
            while let Ok(Some(body)) = read_message(&mut reader).await {
                let message: Value = serde_json::from_slice(&body).unwrap();
                if let Some(response) = server.handle(&message) {
                    let body = serde_json::to_vec(&response).unwrap();
                    if write_message(&mut server_write, &body).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    (
        Arc::new(LanguageClient::new(client_read, client_write)),
        server,
        task,
    )
}
