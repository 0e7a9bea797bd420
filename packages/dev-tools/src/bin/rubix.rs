//! Rubix Library CLI
//!
//! Development binary that opens a Rubix library on disk and runs one
//! command against it. Useful for inspecting a data directory copied off a
//! device and for exercising the core services without a front end.
//!
//! # Usage
//!
//! ```bash
//! # Create a folder and import two photos into it
//! rubix folder "Trip"
//! rubix import --parent <folder-id> beach.jpg sunset.png
//!
//! # Browse
//! rubix ls
//! rubix ls --trashed
//! rubix ancestors <node-id>
//!
//! # Follow the root list as it changes
//! rubix watch
//! ```
//!
//! # Environment Variables
//!
//! - `RUBIX_DATA_DIR`: Library data directory (overridden by `--data-dir`)
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rubix_core::config::RubixConfig;
use rubix_core::services::{Library, MoveOutcome};
use rubix_core::Node;

#[derive(Parser, Debug)]
#[command(name = "rubix")]
#[command(about = "Inspect and edit a Rubix library", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Library data directory
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print nodes as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import images or PDFs
    Import {
        /// Files to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Destination folder id
        #[arg(short, long)]
        parent: Option<String>,

        /// Treat sources as camera captures: delete each after import
        #[arg(long)]
        batch: bool,
    },

    /// Create a folder
    Folder {
        name: String,

        /// Parent folder id
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Write a note
    Note {
        title: String,

        #[arg(default_value = "")]
        content: String,

        /// Parent folder id
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// List a folder, the archive or the trash
    #[command(alias = "ls")]
    List {
        /// Folder id (root when omitted)
        parent: Option<String>,

        #[arg(long, conflicts_with = "trashed")]
        archived: bool,

        #[arg(long)]
        trashed: bool,
    },

    /// Move a node to the archive
    Archive { id: String },

    /// Move a node to the trash
    Trash { id: String },

    /// Return an archived or trashed node
    Restore { id: String },

    /// Permanently delete a trashed node and its subtree
    Purge {
        /// Node id; omit with --all to empty the trash
        #[arg(required_unless_present = "all")]
        id: Option<String>,

        #[arg(long)]
        all: bool,
    },

    /// Toggle a node's pin
    Pin { id: String },

    /// Move a node to another folder
    Move {
        id: String,

        /// Destination folder id (root when omitted)
        #[arg(long)]
        to: Option<String>,
    },

    /// Show the folder path of a node
    Ancestors { id: String },

    /// Search titles and note bodies
    Search { text: String },

    /// Print the listing again after every change (Ctrl-C to stop)
    Watch {
        /// Folder id (root when omitted)
        parent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RubixConfig::load(path)
            .await
            .map_err(|e| anyhow::anyhow!(e))?,
        None => RubixConfig::default(),
    }
    .apply_env();

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }

    let library = Library::open(config)
        .await
        .context("Failed to open library")?;

    run(&library, cli.command, cli.json).await
}

async fn run(library: &Library, command: Commands, json: bool) -> anyhow::Result<()> {
    let nodes = library.nodes();

    match command {
        Commands::Import {
            paths,
            parent,
            batch,
        } => {
            if batch {
                let report = library.import_batch(&paths, parent.as_deref()).await;
                print_nodes(&report.imported, json)?;
                for (path, error) in &report.failed {
                    tracing::error!(source = %path.display(), error = %error, "Capture not imported");
                }
                tracing::info!(
                    imported = report.imported.len(),
                    failed = report.failed.len(),
                    "Batch import finished"
                );
            } else {
                for path in &paths {
                    let node = library.import_file(path, parent.as_deref()).await?;
                    print_nodes(std::slice::from_ref(&node), json)?;
                }
            }
        }
        Commands::Folder { name, parent } => {
            let folder = library.create_folder(&name, parent.as_deref()).await?;
            print_nodes(&[folder], json)?;
        }
        Commands::Note {
            title,
            content,
            parent,
        } => {
            let mut editor = library.new_note(parent.as_deref()).await?;
            editor.update_content(&title, &content).await;
            if let Some(note) = editor.save_now().await? {
                print_nodes(&[note], json)?;
            }
        }
        Commands::List {
            parent,
            archived,
            trashed,
        } => {
            let listing = if archived {
                nodes.list_archived().await?
            } else if trashed {
                nodes.list_trashed().await?
            } else {
                nodes.list_children(parent.as_deref()).await?
            };
            print_nodes(&listing, json)?;
        }
        Commands::Archive { id } => nodes.archive(&id).await?,
        Commands::Trash { id } => nodes.trash(&id).await?,
        Commands::Restore { id } => nodes.restore(&id).await?,
        Commands::Purge { id, all } => {
            let result = match id {
                Some(id) if !all => nodes.delete_forever(&id).await?,
                _ => nodes.empty_trash().await?,
            };
            println!(
                "deleted {} node(s), {} file(s)",
                result.deleted_ids.len(),
                result.files_removed
            );
        }
        Commands::Pin { id } => nodes.toggle_pinned(&id).await?,
        Commands::Move { id, to } => {
            match library.hierarchy().move_node(&id, to.as_deref()).await? {
                MoveOutcome::Moved => println!("moved"),
                MoveOutcome::Unchanged => println!("unchanged"),
                MoveOutcome::NotFound => anyhow::bail!("node {} not found", id),
            }
        }
        Commands::Ancestors { id } => {
            let ancestors = library.hierarchy().get_ancestors(&id).await?;
            if json {
                print_nodes(&ancestors, true)?;
            } else {
                let path: Vec<&str> = ancestors.iter().map(|n| n.title.as_str()).collect();
                println!("/{}", path.join("/"));
            }
        }
        Commands::Search { text } => {
            print_nodes(&nodes.search(&text).await?, json)?;
        }
        Commands::Watch { parent } => {
            let mut live = nodes.watch_children(parent.as_deref());
            loop {
                tokio::select! {
                    snapshot = live.next() => match snapshot {
                        Some(listing) => {
                            println!("--- {} node(s)", listing.len());
                            print_nodes(&listing, json)?;
                        }
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}

fn print_nodes(nodes: &[Node], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(nodes)?);
        return Ok(());
    }

    for node in nodes {
        let pin = if node.is_pinned { "*" } else { " " };
        println!("{}{}  {:<6}  {}", pin, node.id, node.node_type.as_str(), node.title);
    }
    Ok(())
}
