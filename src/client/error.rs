use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid message header: {0}")]
    InvalidHeader(String),

    #[error("Server error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("Connection to the language server is closed")]
    Closed,

    #[error("Failed to start language server `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
