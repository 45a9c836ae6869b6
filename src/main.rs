//! # tutor-rag CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag ingest <path>... --partition <name>` | Load documents into a partition |
//! | `rag list` | Print every stored segment |
//! | `rag search "<query>"` | Retrieve relevant segments |
//! | `rag chat` | Chat with retrieval from a partition |
//! | `rag export` | Export segments to files grouped by source |
//! | `rag sources` | List ingested sources |
//! | `rag partition add/remove/list` | Manage partitions |
//! | `rag shell` | Interactive menu |
//! | `rag completions <shell>` | Print shell completions |

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use tutor_rag::chat::{create_chat_provider, ChatSession};
use tutor_rag::config::{self, Config};
use tutor_rag::embedding::create_embedder;
use tutor_rag::ingest::ingest_path;
use tutor_rag::partitions::{remove_partition, AddOutcome, PartitionRegistry, RemoveOutcome};
use tutor_rag::shell::{run_shell, Prompter};
use tutor_rag::sources::{print_sources, SourceRegistry};
use tutor_rag::vector_store::{IngestOutcome, VectorStore};

/// Partitioned retrieval-augmented chat over your own documents.
#[derive(Parser)]
#[command(name = "rag", version, about)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents (files or directories) into a partition.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Partition to tag the segments with. Must already exist.
        #[arg(long, short)]
        partition: String,
    },

    /// Print every stored segment in insertion order.
    List {
        #[arg(long, short)]
        partition: Option<String>,
    },

    /// Retrieve segments relevant to a query.
    Search {
        query: String,

        #[arg(long, short)]
        partition: Option<String>,

        /// Number of nearest segments to consider.
        #[arg(long, short)]
        k: Option<usize>,

        /// Override the maximum accepted distance.
        #[arg(long)]
        threshold: Option<f32>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Chat with context retrieved from a partition.
    ///
    /// With `--message`, sends one message and prints the reply; otherwise
    /// reads messages from stdin until `exit` or end of input.
    Chat {
        #[arg(long, short)]
        partition: Option<String>,

        #[arg(long, short)]
        message: Option<String>,
    },

    /// Export segments to text files grouped by source.
    Export,

    /// List ingested sources.
    Sources,

    /// Manage partitions.
    Partition {
        #[command(subcommand)]
        action: PartitionAction,
    },

    /// Interactive menu.
    Shell,

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PartitionAction {
    /// Register a partition.
    Add { name: String },
    /// Unregister a partition.
    Remove {
        name: String,
        /// Remove even if segments are still tagged with it.
        #[arg(long)]
        force: bool,
    },
    /// List partitions.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("RAG_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "rag", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { paths, partition } => run_ingest(&cfg, &paths, &partition).await?,
        Commands::List { partition } => {
            let store = open_store(&cfg)?;
            let entries = store.list_all(partition.as_deref()).await;
            if entries.is_empty() {
                println!("The knowledge base is empty.");
            } else {
                println!("Total segments: {}", entries.len());
                for (i, entry) in entries.iter().enumerate() {
                    println!(
                        "\n--- {} [{}] {} ---",
                        i + 1,
                        entry.segment.partition(),
                        entry.segment.source()
                    );
                    println!("{}", entry.segment.content);
                }
            }
        }
        Commands::Search {
            query,
            partition,
            k,
            threshold,
            json,
        } => {
            if query.trim().is_empty() {
                bail!("query must not be empty");
            }
            let mut store = open_store(&cfg)?;
            if let Some(threshold) = threshold {
                store.set_similarity_threshold(threshold);
            }
            let hits = store.search(&query, partition.as_deref(), k).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No relevant segments found.");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    println!(
                        "\n{}. score={:.4} [{}] {}",
                        i + 1,
                        hit.score,
                        hit.segment.partition(),
                        hit.segment.source()
                    );
                    println!("{}", hit.segment.content.trim());
                }
            }
        }
        Commands::Chat { partition, message } => {
            run_chat(&cfg, partition.as_deref(), message.as_deref()).await?
        }
        Commands::Export => {
            let store = open_store(&cfg)?;
            match store.export_by_source().await {
                Some(dir) => println!("Exported segments to {}", dir.display()),
                None => println!("Nothing to export."),
            }
        }
        Commands::Sources => {
            print_sources(&SourceRegistry::load(&cfg.store.sources_path()));
        }
        Commands::Partition { action } => run_partition(&cfg, action).await?,
        Commands::Shell => run_shell(cfg).await?,
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}

fn open_store(cfg: &Config) -> Result<VectorStore> {
    VectorStore::open(cfg, create_embedder(cfg)?)
}

async fn run_ingest(cfg: &Config, paths: &[PathBuf], partition: &str) -> Result<()> {
    let registry = PartitionRegistry::load(&cfg.partitions.path);
    if !registry.contains(partition) {
        bail!(
            "unknown partition '{}'; add it with `rag partition add`",
            partition
        );
    }

    let splitter = cfg.chunking.splitter()?;
    let mut store = open_store(cfg)?;
    let mut failed = 0;

    for path in paths {
        let results = ingest_path(
            &mut store,
            &splitter,
            path,
            partition,
            cfg.store.split_report_dir(),
        )
        .await;
        for result in results {
            match result.outcome {
                IngestOutcome::Ingested { segments, .. } => {
                    println!("ingested {} ({} segments)", result.source, segments)
                }
                IngestOutcome::Skipped(reason) => {
                    println!("skipped {} ({})", result.source, reason)
                }
                IngestOutcome::Failed(e) => {
                    failed += 1;
                    eprintln!("failed {}: {:#}", result.source, e);
                }
            }
        }
    }

    if failed > 0 {
        bail!("{} document(s) failed to ingest", failed);
    }
    Ok(())
}

async fn run_chat(cfg: &Config, partition: Option<&str>, message: Option<&str>) -> Result<()> {
    let store = open_store(cfg)?;
    let mut session = ChatSession::new(create_chat_provider(cfg)?, cfg);

    if let Some(message) = message {
        println!("{}", session.send(&store, partition, message).await);
        return Ok(());
    }

    let mut prompter = Prompter::new(BufReader::new(tokio::io::stdin()));
    while let Some(line) = prompter.ask("\nYou: ").await? {
        if matches!(line.as_str(), "exit" | "quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }
        println!("\nAssistant: {}", session.send(&store, partition, &line).await);
    }
    Ok(())
}

async fn run_partition(cfg: &Config, action: PartitionAction) -> Result<()> {
    let mut registry = PartitionRegistry::load(&cfg.partitions.path);
    match action {
        PartitionAction::Add { name } => match registry.add(&name)? {
            AddOutcome::Added => println!("Added partition '{}'.", name),
            AddOutcome::AlreadyPresent => println!("Partition '{}' already exists.", name),
        },
        PartitionAction::Remove { name, force } => {
            let outcome = if force {
                registry.remove(&name)?
            } else {
                let store = open_store(cfg)?;
                remove_partition(&mut registry, store.index(), &name).await?
            };
            match outcome {
                RemoveOutcome::Removed => println!("Removed partition '{}'.", name),
                RemoveOutcome::NotFound => println!("Partition '{}' does not exist.", name),
                RemoveOutcome::InUse { entries } => bail!(
                    "partition '{}' still tags {} segments; use --force to remove it anyway",
                    name,
                    entries
                ),
            }
        }
        PartitionAction::List => {
            let listing = registry.list();
            if listing.is_empty() {
                println!("No partitions.");
            }
            for row in listing {
                println!("{}. {}", row.position, row.name);
            }
        }
    }
    Ok(())
}
