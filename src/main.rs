use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use graph_recall::config::{default_data_dir, AppConfig, AppState};
use graph_recall::embedding::ModelType;
use graph_recall::ingest::{ingest, GraphDocument};
use graph_recall::storage::GraphStore;
use graph_recall::types::{
    HybridSearchOptions, VectorSearchOptions, DEFAULT_LIMIT, DEFAULT_MIN_SIMILARITY,
};

#[derive(Parser)]
#[command(name = "graph-recall")]
#[command(about = "Hybrid vector and keyword search over a local knowledge graph")]
struct Cli {
    #[arg(long, env, default_value_os_t = default_data_dir(), global = true)]
    data_dir: PathBuf,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = "e5_multi", global = true)]
    model: String,

    #[arg(long, env, default_value = "1000", global = true)]
    cache_size: usize,

    #[arg(long, env, default_value = "32", global = true)]
    batch_size: usize,

    /// Per-search deadline in milliseconds. 0 = disabled.
    #[arg(long, env = "TIMEOUT_MS", default_value = "30000", global = true)]
    timeout: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// How long to wait for the embedding model to load, in seconds.
    #[arg(long, default_value = "600", global = true)]
    model_wait: u64,

    #[arg(long)]
    list_models: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Hybrid (vector + keyword) search
    Search {
        query: String,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        #[arg(long, default_value_t = graph_recall::graph::RRF_K)]
        rrf_k: u32,
        /// Accepted but not applied
        #[arg(long = "entity-type")]
        entity_types: Vec<String>,
    },
    /// Vector-only search with a similarity floor
    Semantic {
        query: String,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        #[arg(long, default_value_t = DEFAULT_MIN_SIMILARITY, allow_negative_numbers = true)]
        min_similarity: f32,
    },
    /// Load entities and relations from a JSON file
    Ingest { path: PathBuf },
    /// Close the validity window of an entity and its relations
    Invalidate { name: String },
    /// Print store counts and health
    Stats,
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.list_models {
        println!("Available models:");
        for model in ModelType::all() {
            println!(
                "  {:<10} - {} dimensions ({})",
                model.to_string(),
                model.dimensions(),
                model.repo_id()
            );
        }
        return Ok(());
    }

    let Some(command) = cli.command else {
        anyhow::bail!("no command given, see --help");
    };

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let model: ModelType = cli.model.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let config = AppConfig {
        data_dir: cli.data_dir,
        model,
        cache_size: cli.cache_size,
        batch_size: cli.batch_size,
        timeout_ms: cli.timeout,
        log_level: cli.log_level,
    };
    let state = AppState::open(config).await?;
    let model_wait = Duration::from_secs(cli.model_wait);

    let outcome = run(&state, command, model_wait).await;

    tracing::info!("Flushing database...");
    if let Err(e) = state.storage.shutdown().await {
        tracing::warn!("Database shutdown error: {}", e);
    }

    outcome
}

async fn run(state: &AppState, command: Command, model_wait: Duration) -> anyhow::Result<()> {
    match command {
        Command::Search {
            query,
            limit,
            rrf_k,
            entity_types,
        } => {
            state.embedding.wait_ready(model_wait).await?;
            let opts = HybridSearchOptions {
                limit,
                rrf_k,
                entity_types: (!entity_types.is_empty()).then_some(entity_types),
                ..Default::default()
            };
            let result = state.engine().search(&query, &opts).await?;
            print_json(&result)
        }
        Command::Semantic {
            query,
            limit,
            min_similarity,
        } => {
            state.embedding.wait_ready(model_wait).await?;
            let opts = VectorSearchOptions {
                limit,
                min_similarity,
            };
            let result = state.engine().semantic_search(&query, &opts).await?;
            print_json(&result)
        }
        Command::Ingest { path } => {
            let document = GraphDocument::from_path(&path)?;
            state.embedding.wait_ready(model_wait).await?;
            let report = ingest(
                &state.storage,
                state.embedding.as_ref(),
                &document,
                state.config.batch_size,
            )
            .await?;
            print_json(&report)
        }
        Command::Invalidate { name } => {
            let invalidated = state.storage.invalidate_entity(&name).await?;
            if !invalidated {
                tracing::warn!(entity = %name, "No visible entity with that name");
            }
            print_json(&serde_json::json!({ "name": name, "invalidated": invalidated }))
        }
        Command::Stats => {
            let stats = state.storage.stats().await?;
            let healthy = state.storage.health_check().await?;
            print_json(&serde_json::json!({
                "entities": stats.entities,
                "relations": stats.relations,
                "healthy": healthy,
                "model": state.config.model.to_string(),
                "dimensions": state.config.model.dimensions(),
                "embedding": state.embedding.status(),
                "cache": state.embedding.cache_stats(),
            }))
        }
    }
}
