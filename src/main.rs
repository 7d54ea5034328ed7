#![forbid(unsafe_code)]

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use thiserror_ext::AsReport;
use tracing::{Level, event};
use tracing_log::LogTracer;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::format::FmtSpan,
    prelude::*,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use brokerfs::{
    auth::AuthClient,
    config::Config,
    transport::HttpBroker,
    vfs::{Node, SessionStore, VfsPath},
    workspace::Workspace,
};

#[derive(Parser, Debug)]
#[command(name = "brokerfs", version, about)]
struct Args {
    /// Configuration file to read instead of `brokerfs.toml`.
    #[arg(short, long, env = "BROKERFS_CONFIG")]
    config: Option<PathBuf>,

    /// JSON tree, as written by `export`, to merge into the session root
    /// before running the command.
    #[arg(short, long, value_name = "JSON")]
    import: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List one folder.
    Ls { path: String },
    /// Print the Home tree as loaded after auto-mount.
    Tree,
    /// Print a file.
    Cat { path: String },
    /// Print a folder and everything below it as JSON.
    Export { path: String },
}

fn print_tree(node: &Node, depth: usize) {
    let marker = match (node.is_folder(), node.connected) {
        (_, Some(false)) => " (not connected)",
        (true, _) if node.is_magnet => " (magnet)",
        _ => "",
    };
    println!("{:indent$}{}{marker}", "", node.name, indent = depth * 2);

    for child in node.children.iter().flatten() {
        print_tree(child, depth + 1);
    }
}

#[tokio::main]
pub async fn main() -> Result<()> {
    LogTracer::init()?;

    let env_filter = EnvFilter::builder()
        .with_env_var("BROKERFS_LOG")
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(env_filter);
    let subscriber = tracing_subscriber::registry().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let broker = Arc::new(HttpBroker::new(&config.broker)?);
    let workspace = Workspace::new(
        SessionStore::new(config.session.name.clone()),
        config.profiles.clone(),
        config.session.default_image_url.clone(),
        broker.clone(),
        Arc::new(AuthClient::new(broker)),
    )?;

    for outcome in workspace.auto_mount().await {
        if let Err(error) = outcome.result {
            event!(Level::WARN, profile = %outcome.profile.name, error = %error.as_report(), "not mounted");
        }
    }

    if let Some(import) = &args.import {
        let raw = std::fs::read_to_string(import)
            .with_context(|| format!("reading {}", import.display()))?;
        let tree: Node = serde_json::from_str(&raw)?;
        workspace
            .import_tree(&VfsPath::parse(&config.session.name), &tree)
            .await?;
    }

    match args.command {
        Command::Ls { path } => {
            let path = VfsPath::parse(&path);
            let provider = workspace.resolve_provider(&path)?;
            for node in provider.get_contents(path.relative()).await? {
                let kind = if node.is_folder() { 'd' } else { '-' };
                println!("{kind} {}", node.name);
            }
        }
        Command::Tree => {
            let tree = workspace.reload_tree().await?;
            print_tree(&tree, 0);
        }
        Command::Cat { path } => {
            let path = VfsPath::parse(&path);
            let name = path.name().context("cat needs a file path")?;
            print!("{}", workspace.read_file(&path.parent(), name).await?);
        }
        Command::Export { path } => {
            let tree = workspace.export_tree(&VfsPath::parse(&path)).await?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
    }

    Ok(())
}
