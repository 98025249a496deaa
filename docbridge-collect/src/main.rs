//! Reverse-engineering collector binary.
//!
//! Connects to a MongoDB-compatible instance, samples its collections, and
//! writes a model package JSON file. Bulk NDJSON sample files can be
//! imported instead of sampling a live database.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::info;

use docbridge_collect::adapters::MongoSource;
use docbridge_collect::collect::{CollectOptions, collect_database};
use docbridge_collect::ndjson;
use docbridge_collect::output::{ModelPackage, write_model_package};
use docbridge_core::error::{DocBridgeError, Result, redact_database_url};
use docbridge_core::infer::infer_documents;
use docbridge_core::logging::{LogProgress, init_logging};
use docbridge_core::model::{CollectionPackage, ModelInfo};
use docbridge_core::sampling::{SamplingConfig, SamplingMode};
use docbridge_core::value::DocumentValue;

#[derive(Parser)]
#[command(name = "docbridge-collect")]
#[command(about = "MongoDB-compatible schema collection tool")]
#[command(version)]
#[command(long_about = "
DocBridge Collector - reverse engineering for MongoDB-compatible stores

Connects to MongoDB, Azure Cosmos DB (Mongo API), or AWS DocumentDB,
samples each collection, infers a structural schema (per-field type and
presence statistics), translates native indexes into model descriptors,
and writes a model package JSON file.

EXAMPLES:
  docbridge-collect collect mongodb://localhost/shop
  docbridge-collect collect --sample 500 --output shop.model.json mongodb://localhost/shop
  docbridge-collect test mongodb://localhost
  docbridge-collect import samples.ndjson --collection orders
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all output except errors")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Collect structural schemas from a live database
    Collect(CollectArgs),
    /// Test the database connection
    Test(TestArgs),
    /// Import a newline-delimited JSON sample file
    Import(ImportArgs),
}

#[derive(Args)]
struct CollectArgs {
    /// Database connection URL
    #[arg(env = "DOCBRIDGE_DATABASE_URL")]
    database_url: String,

    /// Database to collect; defaults to the one in the connection string
    #[arg(long)]
    database: Option<String>,

    /// Output file path
    #[arg(short, long, default_value = "model.docbridge.json")]
    output: PathBuf,

    /// Absolute number of documents to sample per collection
    #[arg(long, conflicts_with = "percent")]
    sample: Option<u64>,

    /// Percentage of each collection to sample
    #[arg(long)]
    percent: Option<f64>,

    /// Server-side time bound per sampling call, in milliseconds
    #[arg(long)]
    max_time_ms: Option<u64>,

    /// Include system.* collections
    #[arg(long)]
    include_system: bool,

    /// Emit packages for empty collections
    #[arg(long)]
    include_empty: bool,
}

#[derive(Args)]
struct TestArgs {
    /// Database connection URL to test
    #[arg(env = "DOCBRIDGE_DATABASE_URL")]
    database_url: String,
}

#[derive(Args)]
struct ImportArgs {
    /// NDJSON file, one document per line
    file: PathBuf,

    /// Collection name recorded in the package
    #[arg(long, default_value = "imported")]
    collection: String,

    /// Output file path
    #[arg(short, long, default_value = "model.docbridge.json")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    match cli.command {
        Command::Collect(args) => run_collect(args).await,
        Command::Test(args) => run_test(&args.database_url).await,
        Command::Import(args) => run_import(args).await,
    }
}

fn sampling_config(args: &CollectArgs) -> SamplingConfig {
    match (args.sample, args.percent) {
        (Some(count), _) => SamplingConfig {
            mode: SamplingMode::Absolute,
            absolute_count: count,
            ..SamplingConfig::default()
        },
        (None, Some(percent)) => SamplingConfig {
            mode: SamplingMode::Relative,
            relative_percent: percent,
            ..SamplingConfig::default()
        },
        (None, None) => SamplingConfig::default(),
    }
}

async fn run_collect(args: CollectArgs) -> Result<()> {
    info!(
        "Connecting to {}",
        redact_database_url(&args.database_url)
    );

    let source = MongoSource::connect(&args.database_url)
        .await
        .map_err(connection_failed)?;

    let database = match args.database.clone() {
        Some(database) => database,
        None => source
            .default_database()
            .map(str::to_string)
            .ok_or_else(|| {
                DocBridgeError::configuration(
                    "No database selected: pass --database or name one in the connection string",
                )
            })?,
    };

    let model_info = source.server_info().await.unwrap_or_else(|error| {
        tracing::warn!(error = %error, "buildInfo unavailable");
        ModelInfo::default()
    });
    info!(version = ?model_info.version, "connected");

    let options = CollectOptions {
        include_system: args.include_system,
        include_empty: args.include_empty,
        sampling: sampling_config(&args),
        max_time_ms: args.max_time_ms,
    };

    let collections = collect_database(&source, &database, &options, &LogProgress).await?;
    info!(count = collections.len(), "collections collected");

    let package = ModelPackage::new(database, model_info, collections);
    write_model_package(&package, &args.output).await?;

    println!("Model package written to {}", args.output.display());
    Ok(())
}

async fn run_test(database_url: &str) -> Result<()> {
    info!("Testing connection to {}", redact_database_url(database_url));

    let source = MongoSource::connect(database_url)
        .await
        .map_err(connection_failed)?;
    source.ping().await.map_err(connection_failed)?;

    println!("Connection successful");
    Ok(())
}

async fn run_import(args: ImportArgs) -> Result<()> {
    let documents = ndjson::read_documents(&args.file, &LogProgress).await?;
    info!(count = documents.len(), "documents read");

    let values: Vec<DocumentValue> = documents.iter().map(DocumentValue::from_json).collect();
    let schema = infer_documents(&values, docbridge_core::infer::DEFAULT_MAX_SAMPLES);

    let package = ModelPackage::new(
        file_stem(&args.file),
        ModelInfo::default(),
        vec![CollectionPackage {
            db_name: file_stem(&args.file),
            collection_name: args.collection.clone(),
            documents,
            json_shape: values.first().and_then(DocumentValue::json_shape),
            structural_schema: schema.to_json_schema(),
            ..CollectionPackage::default()
        }],
    );

    write_model_package(&package, &args.output).await?;
    println!("Model package written to {}", args.output.display());
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "samples".to_string())
}

fn connection_failed(error: docbridge_core::source::SourceError) -> DocBridgeError {
    DocBridgeError::connection_failed("connection", error)
}
