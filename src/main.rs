use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use tower_lsp::lsp_types::Url;

use syntax_tree_client::client::server::resolve_command;
use syntax_tree_client::config::{ExtensionConfig, TARGET_LANGUAGE, log_path};
use syntax_tree_client::extension::Extension;
use syntax_tree_client::host::{MemoryHost, TextEditor};
use syntax_tree_client::logging;

#[derive(Parser)]
#[command(name = "stree-client")]
#[command(version, about = "Client for the Syntax Tree language server")]
struct Cli {
    /// JSON settings file, either the `syntaxTree` section or an object containing it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the inlay hint decorations the server produces for a file
    Hints {
        file: PathBuf,

        /// Language id to open the file with
        #[arg(long, default_value = TARGET_LANGUAGE)]
        language: String,
    },
    /// Print the syntax tree the server produces for a file
    Visualize {
        file: PathBuf,

        /// Language id to open the file with
        #[arg(long, default_value = TARGET_LANGUAGE)]
        language: String,
    },
    /// Print the command line used to start the language server
    Command {
        /// Workspace root, defaults to the current directory
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(&log_path(), cli.log_json)?;
    let config = load_config(cli.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Command::Hints { file, language } => runtime.block_on(print_hints(config, &file, language)),
        Command::Visualize { file, language } => {
            runtime.block_on(print_tree(config, &file, language))
        }
        Command::Command { root } => runtime.block_on(print_command(config, root)),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ExtensionConfig> {
    let Some(path) = path else {
        return Ok(ExtensionConfig::default());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {:?}", path))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("config {:?} is not valid JSON", path))?;
    ExtensionConfig::from_value(value).with_context(|| format!("invalid config {:?}", path))
}

/// Open `file` in a fresh host, shown in a focused editor
fn open_file(file: &Path, language: String) -> anyhow::Result<(Arc<MemoryHost>, Arc<TextEditor>)> {
    let path = std::fs::canonicalize(file)
        .with_context(|| format!("failed to resolve {:?}", file))?;
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {:?}", path))?;
    let uri = Url::from_file_path(&path)
        .map_err(|()| anyhow!("{:?} is not an absolute path", path))?;

    let host = Arc::new(MemoryHost::new(std::env::current_dir().ok()));
    let document = host.open_document(uri, language, text);
    let editor = host.show(&document);
    Ok((host, editor))
}

async fn print_hints(config: ExtensionConfig, file: &Path, language: String) -> anyhow::Result<()> {
    let (host, editor) = open_file(file, language)?;
    let uri = editor.document().uri().clone();

    let extension = Extension::new(host.clone(), config);
    extension.start().await?;
    extension.render(&editor).await;
    let decorations = host.decorations(&editor);
    extension.stop().await?;

    let Some(decorations) = decorations else {
        bail!("the language server returned no inlay hints for {}", uri);
    };
    println!("{}", serde_json::to_string_pretty(&decorations)?);
    Ok(())
}

async fn print_tree(config: ExtensionConfig, file: &Path, language: String) -> anyhow::Result<()> {
    let (host, editor) = open_file(file, language)?;

    let extension = Extension::new(host, config);
    extension.start().await?;
    let tree = extension.visualize(&editor).await;
    extension.stop().await?;

    let Some(tree) = tree? else {
        bail!("the language server could not visualize {}", editor.document().uri());
    };
    println!("{tree}");
    Ok(())
}

async fn print_command(config: ExtensionConfig, root: Option<PathBuf>) -> anyhow::Result<()> {
    let root = root.or_else(|| std::env::current_dir().ok());
    let command = resolve_command(&config, root.as_deref()).await;

    println!("{command}");
    if let Some(cwd) = &command.cwd {
        println!("cwd: {}", cwd.display());
    }
    Ok(())
}
