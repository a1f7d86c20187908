use std::path::{MAIN_SEPARATOR, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;

// =============================================================================
// Constants
// =============================================================================

/// Default quiet period before a focused editor's hints are refreshed (300ms)
pub const DEFAULT_DEBOUNCE_DELAY_MS: u64 = 300;

/// Language id of the documents the server produces hints for
pub const TARGET_LANGUAGE: &str = "ruby";

/// URI scheme of the documents synced with the server
pub const SYNCED_SCHEME: &str = "file";

/// Custom request served by `stree lsp`
pub const INLAY_HINTS_METHOD: &str = "textDocument/inlayHints";

/// Custom request returning a printed syntax tree
pub const VISUALIZING_METHOD: &str = "syntaxTree/visualizing";

/// Theme color key used by the inlay hint decoration type
pub const INLAY_HINTS_COLOR: &str = "syntaxTree.inlayHints";

/// How long `stop` waits for the server to exit before killing it (5 seconds)
pub const SERVER_STOP_TIMEOUT_MS: u64 = 5_000;

/// Extension configuration, read from the `syntaxTree` settings section
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtensionConfig {
    /// Extra `stree` plugins, `${var}` substitution is applied to each entry
    pub additional_plugins: Vec<String>,
    pub single_quotes: bool,
    pub trailing_comma: bool,
    pub inlay_hints: InlayHintsConfig,
}

/// Inlay hint related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InlayHintsConfig {
    /// Debounce delay in milliseconds
    pub debounce_delay: u64,
}

impl Default for InlayHintsConfig {
    fn default() -> Self {
        Self {
            debounce_delay: DEFAULT_DEBOUNCE_DELAY_MS,
        }
    }
}

impl ExtensionConfig {
    /// Parse a settings object. Accepts both the bare section and an object
    /// wrapping it under `syntaxTree`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        match value {
            serde_json::Value::Object(mut map) if map.contains_key("syntaxTree") => {
                let section = map.remove("syntaxTree").unwrap_or_default();
                serde_json::from_value(section)
            }
            other => serde_json::from_value(other),
        }
    }
}

/// Returns the path to the data directory for syntax-tree-client.
/// Uses $XDG_DATA_HOME/syntax-tree-client if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/syntax-tree-client,
/// or ./syntax-tree-client if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("syntax-tree-client.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("syntax-tree-client")
}

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("variable pattern is valid"));

/// Expand `${cwd}`, `${pathSeparator}` and `${userHome}` in a setting value.
/// Unknown variables are left as they are.
pub fn substitute(s: &str) -> String {
    let cwd = std::env::current_dir().ok();
    substitute_with(s, cwd, dirs::home_dir())
}

fn substitute_with(s: &str, cwd: Option<PathBuf>, home_dir: Option<PathBuf>) -> String {
    VARIABLE
        .replace_all(s, |caps: &Captures<'_>| {
            let value = match &caps[1] {
                "cwd" => cwd.as_ref().map(|p| p.display().to_string()),
                "pathSeparator" => Some(MAIN_SEPARATOR.to_string()),
                "userHome" => home_dir.as_ref().map(|p| p.display().to_string()),
                _ => None,
            };
            value.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
