//! Forward-engineering tool.
//!
//! Reads a model file, generates the corresponding database script, and
//! writes it out or applies it to a live MongoDB-compatible instance.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::info;

use docbridge_collect::adapters::MongoSource;
use docbridge_core::error::{DocBridgeError, Result, redact_database_url};
use docbridge_core::logging::{LogProgress, init_logging};
use docbridge_core::model::ModelFile;
use docbridge_core::script::{
    GenerateOptions, ScriptOrigin, ScriptOutput, apply_script, generate,
};

#[derive(Parser)]
#[command(name = "docbridge")]
#[command(about = "Forward engineering for DocBridge models")]
#[command(version)]
#[command(long_about = "
DocBridge - forward engineering for MongoDB-compatible stores

Reads a model file (container settings plus entities with indexes and
sample documents) and renders it as an executable mongo-shell-style
script: shard-key assignment, collection creation, index creation, and
optional sample inserts. The script can be written to a file or applied
directly to a live instance.

EXAMPLES:
  docbridge generate shop.model.json --output shop.script.js
  docbridge generate shop.model.json --include-samples --split
  docbridge apply shop.script.js mongodb://localhost
  docbridge test mongodb://localhost
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
    /// Generate a script from a model file
    Generate(GenerateArgs),
    /// Apply a script to a live instance
    Apply(ApplyArgs),
    /// Test the database connection
    Test(TestArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Model file (JSON)
    model: PathBuf,

    /// Script output path; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Bundle or emit sample-insert statements
    #[arg(long)]
    include_samples: bool,

    /// Return sample inserts as a separate block instead of bundling them
    #[arg(long, requires = "include_samples")]
    split: bool,
}

#[derive(Args)]
struct ApplyArgs {
    /// Script file, or a model file with --from-model
    script: PathBuf,

    /// Database connection URL
    #[arg(env = "DOCBRIDGE_DATABASE_URL")]
    database_url: String,

    /// Treat the input as a model file and generate the script first
    #[arg(long)]
    from_model: bool,
}

#[derive(Args)]
struct TestArgs {
    /// Database connection URL to test
    #[arg(env = "DOCBRIDGE_DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Apply(args) => run_apply(args).await,
        Command::Test(args) => run_test(&args.database_url).await,
    }
}

async fn read_model(path: &Path) -> Result<ModelFile> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DocBridgeError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

    serde_json::from_str(&text).map_err(|e| DocBridgeError::serialization("model file", e))
}

/// Renders generator output as one writable text. Split blocks are joined
/// with their titles as section comments.
fn render_output(output: ScriptOutput) -> String {
    match output {
        ScriptOutput::Combined(script) => script,
        ScriptOutput::Split(blocks) => blocks
            .into_iter()
            .map(|block| format!("// {}\n\n{}", block.title, block.script))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

async fn run_generate(args: GenerateArgs) -> Result<()> {
    let model = read_model(&args.model).await?;

    let options = GenerateOptions {
        origin: if args.split {
            ScriptOrigin::Interactive
        } else {
            ScriptOrigin::Batch
        },
        include_samples: args.include_samples,
    };

    // Batch origin always bundles; drop the samples up front when the
    // caller did not ask for them
    let entities = if args.include_samples {
        model.entities.clone()
    } else {
        model
            .entities
            .iter()
            .cloned()
            .map(|mut entity| {
                entity.samples.clear();
                entity
            })
            .collect()
    };

    let script = render_output(generate(&model.container, &entities, &options)?);

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &script)
                .await
                .map_err(|e| DocBridgeError::Io {
                    context: format!("Failed to write to {}", path.display()),
                    source: e,
                })?;
            println!("Script written to {}", path.display());
        }
        None => println!("{script}"),
    }

    Ok(())
}

async fn run_apply(args: ApplyArgs) -> Result<()> {
    let script = if args.from_model {
        let model = read_model(&args.script).await?;
        render_output(generate(
            &model.container,
            &model.entities,
            &GenerateOptions {
                origin: ScriptOrigin::Batch,
                include_samples: true,
            },
        )?)
    } else {
        tokio::fs::read_to_string(&args.script)
            .await
            .map_err(|e| DocBridgeError::FileRead {
                path: args.script.display().to_string(),
                source: e,
            })?
    };

    info!(
        "Applying script to {}",
        redact_database_url(&args.database_url)
    );

    let source = MongoSource::connect(&args.database_url)
        .await
        .map_err(|e| DocBridgeError::connection_failed("connection", e))?;

    apply_script(&script, &source, &LogProgress).await?;

    println!("Script applied");
    Ok(())
}

async fn run_test(database_url: &str) -> Result<()> {
    info!("Testing connection to {}", redact_database_url(database_url));

    let source = MongoSource::connect(database_url)
        .await
        .map_err(|e| DocBridgeError::connection_failed("connection", e))?;
    source
        .ping()
        .await
        .map_err(|e| DocBridgeError::connection_failed("ping", e))?;

    println!("Connection successful");
    Ok(())
}
