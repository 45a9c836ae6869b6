//! Interactive menu (`rag shell`).
//!
//! A thin adapter over [`VectorStore`], [`PartitionRegistry`], and
//! [`ChatSession`]: it reads choices from stdin, prints results to stdout,
//! and holds no logic of its own beyond prompting.

use anyhow::Result;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use tutor_rag_core::chunk::TextSplitter;

use crate::chat::{create_chat_provider, ChatSession};
use crate::config::{Config, EmbeddingModel};
use crate::embedding::create_embedder;
use crate::ingest::ingest_path;
use crate::partitions::{remove_partition, AddOutcome, PartitionRegistry, RemoveOutcome};
use crate::vector_store::{IngestOutcome, VectorStore};

const EXIT_WORDS: &[&str] = &["exit", "quit", "退出"];

/// Line-oriented prompt reader.
pub struct Prompter<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> Prompter<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Print `prompt` and read one trimmed line. `None` at end of input.
    pub async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }
}

/// Choose an embedding model from the menu. Empty input keeps `current`.
pub async fn select_model<R: AsyncBufRead + Unpin>(
    prompter: &mut Prompter<R>,
    current: EmbeddingModel,
) -> Result<EmbeddingModel> {
    println!("\nSelect an embedding model:");
    for model in EmbeddingModel::ALL {
        let marker = if model == current { " *" } else { "" };
        println!(
            "{}. {} ({}){}",
            model.menu_key(),
            model.name(),
            model.description(),
            marker
        );
    }
    loop {
        let Some(choice) = prompter.ask("Enter a choice (1-3, Enter to keep): ").await? else {
            return Ok(current);
        };
        if choice.is_empty() {
            return Ok(current);
        }
        match EmbeddingModel::from_choice(&choice) {
            Some(model) => return Ok(model),
            None => println!("Invalid choice, try again."),
        }
    }
}

struct Shell<R> {
    prompter: Prompter<R>,
    splitter: TextSplitter,
    report_dir: Option<std::path::PathBuf>,
    store: VectorStore,
    partitions: PartitionRegistry,
    chat: ChatSession,
}

/// Run the interactive menu on stdin until the user exits.
pub async fn run_shell(mut config: Config) -> Result<()> {
    let mut prompter = Prompter::new(BufReader::new(tokio::io::stdin()));

    if config.api_key.is_none() && config.embedding.is_enabled() {
        if let Some(key) = prompter.ask("Enter your API key: ").await? {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }
    }
    config.embedding.model = select_model(&mut prompter, config.embedding.model).await?;
    tracing::info!(model = config.embedding.model.name(), "using embedding model");

    let store = VectorStore::open(&config, create_embedder(&config)?)?;
    let chat = ChatSession::new(create_chat_provider(&config)?, &config);
    let mut shell = Shell {
        prompter,
        splitter: config.chunking.splitter()?,
        report_dir: config.store.split_report_dir().map(Path::to_path_buf),
        store,
        partitions: PartitionRegistry::load(&config.partitions.path),
        chat,
    };
    shell.main_menu().await
}

impl<R: AsyncBufRead + Unpin> Shell<R> {
    async fn main_menu(&mut self) -> Result<()> {
        loop {
            println!("\n=== Main menu ===");
            match self.partitions.current() {
                Some(name) => println!("Current partition: {}", name),
                None => println!("Current partition: (none)"),
            }
            println!("1. Load documents");
            println!("2. View knowledge base");
            println!("3. Start chat");
            println!("4. Export knowledge base");
            println!("5. Manage partitions");
            println!("6. Exit");

            let Some(choice) = self.prompter.ask("\nChoose an option (1-6): ").await? else {
                return Ok(());
            };
            match choice.as_str() {
                "1" => self.load_documents().await?,
                "2" => self.view_segments().await,
                "3" => self.chat_loop().await?,
                "4" => match self.store.export_by_source().await {
                    Some(dir) => println!("\nSegments exported by source to: {}", dir.display()),
                    None => println!("\nNothing to export."),
                },
                "5" => self.partition_menu().await?,
                "6" => {
                    println!("\nGoodbye!");
                    return Ok(());
                }
                _ => println!("\nInvalid choice, try again."),
            }
        }
    }

    /// The selected partition, prompting for one when none is selected.
    async fn require_partition(&mut self) -> Result<Option<String>> {
        if let Some(name) = self.partitions.current() {
            return Ok(Some(name.to_string()));
        }
        if self.partitions.is_empty() {
            println!("\nNo partitions yet. Add one first.");
            self.add_partition().await?;
        }
        self.select_partition().await
    }

    async fn load_documents(&mut self) -> Result<()> {
        let Some(partition) = self.require_partition().await? else {
            println!("No partition selected.");
            return Ok(());
        };
        println!("\nEnter document paths (.txt, .md, .docx, .pdf) or a directory; 'done' to finish.");

        loop {
            let Some(input) = self.prompter.ask("\nPath (or 'done'): ").await? else {
                return Ok(());
            };
            if input.is_empty() {
                continue;
            }
            if input.eq_ignore_ascii_case("done") {
                return Ok(());
            }

            let results = ingest_path(
                &mut self.store,
                &self.splitter,
                Path::new(&input),
                &partition,
                self.report_dir.as_deref(),
            )
            .await;
            for result in results {
                match result.outcome {
                    IngestOutcome::Ingested { segments, .. } => {
                        println!("Loaded {} ({} segments)", result.source, segments)
                    }
                    IngestOutcome::Skipped(reason) => {
                        println!("Skipped {}: {}", result.source, reason)
                    }
                    IngestOutcome::Failed(e) => println!("Failed {}: {:#}", result.source, e),
                }
            }
        }
    }

    async fn view_segments(&self) {
        let entries = self.store.list_all(self.partitions.current()).await;
        if entries.is_empty() {
            println!("\nThe knowledge base is empty.");
            return;
        }
        println!("\n=== Knowledge base segments ===");
        println!("Total segments: {}", entries.len());
        println!("{}", "=".repeat(50));
        for (i, entry) in entries.iter().enumerate() {
            println!("\nSegment {}:", i + 1);
            println!(
                "Source: {}  Partition: {}",
                entry.segment.source(),
                entry.segment.partition()
            );
            println!("Content:\n{}", entry.segment.content);
            println!("{}", "-".repeat(50));
        }
    }

    async fn chat_loop(&mut self) -> Result<()> {
        let Some(partition) = self.require_partition().await? else {
            println!("No partition selected.");
            return Ok(());
        };
        println!("\nChatting with partition '{}'. Type 'exit' to leave.", partition);

        loop {
            let Some(message) = self.prompter.ask("\nYou: ").await? else {
                return Ok(());
            };
            if EXIT_WORDS.contains(&message.as_str()) {
                return Ok(());
            }
            if message.is_empty() {
                continue;
            }
            let reply = self.chat.send(&self.store, Some(&partition), &message).await;
            println!("\nAssistant: {}", reply);
        }
    }

    async fn partition_menu(&mut self) -> Result<()> {
        loop {
            println!("\n=== Partitions ===");
            println!("1. List");
            println!("2. Add");
            println!("3. Remove");
            println!("4. Select");
            println!("5. Back");
            let Some(choice) = self.prompter.ask("\nChoose an option (1-5): ").await? else {
                return Ok(());
            };
            match choice.as_str() {
                "1" => self.print_partitions(),
                "2" => self.add_partition().await?,
                "3" => self.remove_partition().await?,
                "4" => {
                    self.select_partition().await?;
                }
                "5" => return Ok(()),
                _ => println!("\nInvalid choice, try again."),
            }
        }
    }

    fn print_partitions(&self) {
        let listing = self.partitions.list();
        if listing.is_empty() {
            println!("\nNo partitions.");
            return;
        }
        println!();
        for row in listing {
            let marker = if row.selected { " (current)" } else { "" };
            println!("{}. {}{}", row.position, row.name, marker);
        }
    }

    async fn add_partition(&mut self) -> Result<()> {
        let Some(name) = self.prompter.ask("Partition name: ").await? else {
            return Ok(());
        };
        match self.partitions.add(&name) {
            Ok(AddOutcome::Added) => println!("Added '{}'.", name),
            Ok(AddOutcome::AlreadyPresent) => println!("'{}' already exists.", name),
            Err(e) => println!("Error: {:#}", e),
        }
        Ok(())
    }

    async fn remove_partition(&mut self) -> Result<()> {
        let Some(name) = self.prompter.ask("Partition to remove: ").await? else {
            return Ok(());
        };
        match remove_partition(&mut self.partitions, self.store.index(), &name).await {
            Ok(RemoveOutcome::Removed) => println!("Removed '{}'.", name),
            Ok(RemoveOutcome::NotFound) => println!("'{}' does not exist.", name),
            Ok(RemoveOutcome::InUse { entries }) => println!(
                "'{}' still has {} indexed segments and was not removed.",
                name, entries
            ),
            Err(e) => println!("Error: {:#}", e),
        }
        Ok(())
    }

    async fn select_partition(&mut self) -> Result<Option<String>> {
        self.print_partitions();
        if self.partitions.is_empty() {
            return Ok(None);
        }
        let Some(choice) = self.prompter.ask("Select a partition number (Enter to cancel): ").await?
        else {
            return Ok(None);
        };
        let selected = choice
            .parse::<usize>()
            .ok()
            .and_then(|position| self.partitions.select(position));
        match &selected {
            Some(name) => {
                self.chat.reset();
                println!("Selected '{}'.", name);
            }
            None if choice.is_empty() => {}
            None => println!("Invalid selection."),
        }
        Ok(selected)
    }
}
