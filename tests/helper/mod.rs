//! Shared test utilities

#![allow(dead_code)]

pub mod server;
pub mod source;

use std::time::Duration;

use tower_lsp::lsp_types::Url;

pub use server::{FakeServer, connect_fake_server};
pub use source::FakeHintSource;

/// Debounce delay used throughout the tests
pub const DEBOUNCE: Duration = Duration::from_millis(300);

pub fn file_uri(name: &str) -> Url {
    Url::parse(&format!("file:///project/{name}")).unwrap()
}

/// Let spawned tasks run until they are all waiting again
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
