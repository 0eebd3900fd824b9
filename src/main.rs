// src/main.rs
// Engram - adaptive memory and affinity engine

use anyhow::Result;
use clap::{Parser, Subcommand};
use engram::config::EngramConfig;
use engram::maintenance;
use engram::memory::MemoryRepository;
use engram::store::open_store;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "engram")]
#[command(about = "Adaptive memory and affinity engine")]
#[command(version)]
struct Cli {
    /// Override the database path from the config file
    #[arg(long, global = true, env = "ENGRAM_DB")]
    db: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background maintenance scheduler (default)
    Run,

    /// Run exactly one maintenance cycle and print the report
    Maintain,

    /// Store a memory
    Remember {
        /// Memory content
        content: String,

        /// Tags (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// Retrieve memories by tag
    Recall {
        /// Tags to match (repeatable; no tags means everything)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show store record counts
    Stats,
}

async fn run_scheduler(config: EngramConfig) -> Result<()> {
    let store = open_store(&config.store);

    if !config.maintenance.enabled {
        info!("maintenance disabled by config, nothing to do");
        return Ok(());
    }

    let (shutdown_tx, handle) = maintenance::spawn(store, config.maintenance.clone());
    info!(
        interval_secs = config.maintenance.interval_secs,
        "engram running, ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;
    shutdown_tx.send(true)?;
    handle.await?;

    Ok(())
}

fn run_maintain(config: &EngramConfig) -> Result<()> {
    let store = open_store(&config.store);
    let report = maintenance::run_cycle(store.as_ref(), &config.maintenance, chrono::Utc::now())?;
    println!(
        "decayed {}, evicted {}, rescored {}, {} tags / {} pairs",
        report.decayed, report.evicted, report.rescored, report.distinct_tags, report.tag_pairs
    );
    Ok(())
}

fn run_remember(config: &EngramConfig, content: String, tags: Vec<String>) -> Result<()> {
    let repo = MemoryRepository::new(open_store(&config.store));
    match repo.store(content, &tags, serde_json::json!({}))? {
        Some(id) => println!("{id}"),
        None => eprintln!("store unavailable, memory dropped"),
    }
    Ok(())
}

fn run_recall(config: &EngramConfig, tags: Vec<String>, limit: usize) -> Result<()> {
    let repo = MemoryRepository::new(open_store(&config.store));
    let filter = (!tags.is_empty()).then_some(tags.as_slice());
    for memory in repo.retrieve(filter, limit)? {
        println!(
            "{}  w={:.3}  n={}  [{}]  {}",
            memory.id,
            memory.weight,
            memory.access_count,
            memory.tags.join(","),
            memory.content
        );
    }
    Ok(())
}

fn run_stats(config: &EngramConfig) -> Result<()> {
    let store = open_store(&config.store);
    let stats = store.stats()?;
    println!(
        "memories: {}\nconversations: {}\nrelationships: {}",
        stats.memories, stats.conversations, stats.relationships
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = match &cli.command {
        None | Some(Commands::Run) | Some(Commands::Maintain) => Level::INFO,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = EngramConfig::load()?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    match cli.command {
        None | Some(Commands::Run) => run_scheduler(config).await?,
        Some(Commands::Maintain) => run_maintain(&config)?,
        Some(Commands::Remember { content, tag }) => run_remember(&config, content, tag)?,
        Some(Commands::Recall { tag, limit }) => run_recall(&config, tag, limit)?,
        Some(Commands::Stats) => run_stats(&config)?,
    }

    Ok(())
}
