use anyhow::Result;
use clap::{Parser, Subcommand};
use nlsql::config::ENV_DATABASE;
use nlsql::{PipelineConfig, QueryPipeline, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nlsql")]
#[command(about = "Answer natural-language questions with bounded, read-only SQL")]
#[command(version)]
struct Args {
    /// SQLite database file (or set NLSQL_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// JSON pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate and execute a question, printing the JSON response
    Query {
        /// The question in natural language
        text: String,
    },
    /// Show the extracted, resolved and synthesized forms without executing
    Explain {
        text: String,
    },
    /// List the tables in the store
    Tables,
    /// Check that the store answers
    Health,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nlsql=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    }
    .apply_env()?;

    let database = args
        .database
        .or_else(|| std::env::var(ENV_DATABASE).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(":memory:"));
    info!("Using database {}", database.display());

    let store = Arc::new(SqliteStore::open(&database)?);
    let pipeline = QueryPipeline::new(store, config);

    match args.command {
        Commands::Query { text } => {
            let response = pipeline.respond(&text);
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }
        Commands::Explain { text } => {
            let translation = pipeline.translate(&text)?;
            println!("{}", serde_json::to_string_pretty(&translation)?);
        }
        Commands::Tables => {
            for table in pipeline.list_tables() {
                println!("{}", table);
            }
        }
        Commands::Health => {
            if pipeline.health() {
                println!("NL-SQL converter is running");
            } else {
                anyhow::bail!("database connection test failed");
            }
        }
    }

    Ok(())
}
