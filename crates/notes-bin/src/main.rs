use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

use notes_core::config::NotesConfig;
use notes_core::filename::is_text_file;
use notes_core::{DriveSession, FileNode, HttpDriveTransport, Workspace};
use notes_platform::{EntryKind, StorageType};

/// Lifetime assumed for an access token passed on the command line
const CLI_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Parser, Debug)]
#[command(name = "fs-notes")]
#[command(about = "Browse and edit text notes in a local folder or a remote document store")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long, env = "FS_NOTES_CONFIG_PATH", global = true)]
    config_path: Option<PathBuf>,

    /// Directory used as the local tree
    #[arg(long, env = "FS_NOTES_LOCAL_ROOT", global = true)]
    local_root: Option<PathBuf>,

    /// Storage the command operates on
    #[arg(long, value_enum, default_value = "local", global = true)]
    backend: Backend,

    /// Bearer token for the remote document store
    #[arg(long, env = "FS_NOTES_ACCESS_TOKEN", global = true, hide_env_values = true)]
    access_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "FS_NOTES_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Local,
    Remote,
}

impl From<Backend> for StorageType {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Local => StorageType::Local,
            Backend::Remote => StorageType::Remote,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the sorted tree
    Tree {
        /// Hide files without a known text extension
        #[arg(long)]
        text_only: bool,
    },
    /// Print the content of a file
    Cat { path: String },
    /// Replace the content of a file with stdin, creating it if needed
    Write { path: String },
    /// Save stdin as a new document under a generated name
    Draft,
    /// Create an empty file, with any missing parent directories
    New { path: String },
    /// Create a directory, with any missing parents
    Mkdir { path: String },
    /// Delete a file or directory
    Rm {
        path: String,
        /// Also remove non-empty local directories
        #[arg(long)]
        recursive: bool,
    },
    /// Print the node at a path as JSON
    Resolve { path: String },
    /// Forget the stored remote access token
    SignOut,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config_path
        .clone()
        .unwrap_or_else(NotesConfig::default_path);
    let mut config = NotesConfig::load_or_default(&config_path)?;

    // CLI args override config file
    if let Some(root) = cli.local_root.clone() {
        config.local_root = Some(root);
    }

    let session = Arc::new(DriveSession::with_store(config.token_path()));
    if let Some(token) = cli.access_token.clone() {
        session
            .sign_in(token, CLI_TOKEN_LIFETIME)
            .context("failed to store access token")?;
    }

    if let Commands::SignOut = cli.command {
        session.sign_out()?;
        println!("signed out");
        return Ok(());
    }

    let storage = StorageType::from(cli.backend);
    let workspace = Workspace::new();
    match storage {
        StorageType::Local => {
            let root = config
                .local_root
                .clone()
                .context("no local root configured (--local-root or config file)")?;
            workspace
                .connect_local(&root)
                .await
                .with_context(|| format!("failed to open {}", root.display()))?;
        }
        StorageType::Remote => {
            if session.needs_refresh() {
                warn!(
                    "remote access token expires at {} (unix time), pass a fresh --access-token",
                    session.expires_at().unwrap_or_default()
                );
            }
            let transport = Arc::new(HttpDriveTransport::new(
                config.drive_api_base.clone(),
                config.drive_upload_base.clone(),
            ));
            workspace
                .connect_remote(transport, session.clone(), &config.drive_folder_name)
                .await
                .context("failed to connect to the remote document store")?;
        }
    }
    info!("connected {} storage", storage);

    match cli.command {
        Commands::Tree { text_only } => {
            print_tree(&workspace.tree(storage), 0, text_only);
        }
        Commands::Cat { path } => {
            let node = existing(&workspace, storage, &path).await?;
            let id = workspace.open_file(&node).await?;
            if let Some(tab) = workspace.tabs().tab(id) {
                print!("{}", tab.content);
            }
        }
        Commands::Write { path } => {
            let text = read_stdin().await?;
            let node = match workspace.resolve(storage, &path).await? {
                Some(node) => node,
                None => workspace.create_entry(storage, &path, EntryKind::File).await?,
            };
            let id = workspace.open_file(&node).await?;
            workspace.tabs().update_tab_content(id, text);
            let saved = workspace.save_tab(id, storage).await?;
            info!("wrote {}", saved.path);
        }
        Commands::Draft => {
            let text = read_stdin().await?;
            let id = workspace.tabs().create_new_tab();
            workspace.tabs().update_tab_content(id, text);
            let saved = workspace.save_tab(id, storage).await?;
            println!("{}", saved.path);
        }
        Commands::New { path } => {
            let node = workspace.create_entry(storage, &path, EntryKind::File).await?;
            println!("{}", node.path);
        }
        Commands::Mkdir { path } => {
            let node = workspace
                .create_entry(storage, &path, EntryKind::Directory)
                .await?;
            println!("{}/", node.path);
        }
        Commands::Rm { path, recursive } => {
            workspace.delete_entry(storage, &path, recursive).await?;
        }
        Commands::Resolve { path } => {
            let node = existing(&workspace, storage, &path).await?;
            println!("{}", serde_json::to_string_pretty(&node)?);
        }
        Commands::SignOut => {}
    }

    Ok(())
}

async fn existing(workspace: &Workspace, storage: StorageType, path: &str) -> Result<FileNode> {
    workspace
        .resolve(storage, path)
        .await?
        .with_context(|| format!("no such {} entry: {}", storage, path))
}

async fn read_stdin() -> Result<String> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("failed to read stdin")?;
    Ok(text)
}

fn print_tree(nodes: &[FileNode], depth: usize, text_only: bool) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match &node.children {
            Some(children) => {
                println!("{}{}/", indent, node.name);
                print_tree(children, depth + 1, text_only);
            }
            None if node.is_directory() => println!("{}{}/", indent, node.name),
            None => {
                if !text_only || is_text_file(&node.name) {
                    println!("{}{}", indent, node.name);
                }
            }
        }
    }
}
