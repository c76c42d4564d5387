//! extract CLI - run an extraction pipeline over NDJSON records
//!
//! Records are read from a file or stdin and the enriched records are written to a
//! file or stdout. Status messages go to stderr.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use ingest_extract::{config, ExtractPipeline, NdjsonReader, NdjsonWriter, StageRegistry};

#[derive(Parser)]
#[command(name = "extract")]
#[command(version, about = "Enrich NDJSON records with extracted entities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline over NDJSON records
    Run {
        /// Pipeline configuration (YAML or JSON)
        #[arg(short, long, default_value = "pipeline.yaml")]
        config: PathBuf,

        /// Input NDJSON file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output NDJSON file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop at the first record that fails instead of passing it through
        #[arg(long)]
        fail_fast: bool,
    },

    /// Build the pipeline from a configuration without processing records
    Validate {
        /// Pipeline configuration (YAML or JSON)
        #[arg(short, long, default_value = "pipeline.yaml")]
        config: PathBuf,
    },

    /// List the registered stages
    Stages,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = StageRegistry::builtin();

    let result = match cli.command {
        Commands::Run { config, input, output, fail_fast } => {
            run_pipeline(&registry, config, input, output, fail_fast)
        }
        Commands::Validate { config } => {
            validate_config(&registry, config)
        }
        Commands::Stages => {
            list_stages(&registry);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_pipeline(registry: &StageRegistry, config_path: &PathBuf) -> Result<ExtractPipeline, String> {
    let config = config::load_config_file(config_path)
        .map_err(|e| format!("Failed to load {}: {}", config_path.display(), e))?;

    ExtractPipeline::from_config(&config, registry)
        .map_err(|e| format!("Failed to build pipeline: {}", e))
}

/// Enrich every record of the input stream
fn run_pipeline(
    registry: &StageRegistry,
    config_path: PathBuf,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    fail_fast: bool,
) -> Result<(), String> {
    let pipeline = load_pipeline(registry, &config_path)?;

    let reader: Box<dyn BufRead> = match &input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).map_err(|e| format!("Failed to create {}: {}", path.display(), e))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut writer = NdjsonWriter::new(writer);

    let mut processed = 0;
    let mut failed = 0;
    let mut extracted = 0;

    for (line_number, document) in NdjsonReader::new(reader) {
        processed += 1;

        let mut document = match document {
            Ok(document) => document,
            Err(e) => {
                // unparseable lines cannot be passed through as records
                failed += 1;
                tracing::warn!("Line {}: {}", line_number, e);
                if fail_fast {
                    return Err(format!("Line {}: {}", line_number, e));
                }
                continue;
            }
        };

        match pipeline.execute(&mut document) {
            Ok(count) => extracted += count,
            Err(e) => {
                failed += 1;
                tracing::warn!("Line {}: {}", line_number, e);
                if fail_fast {
                    return Err(format!("Line {}: {}", line_number, e));
                }
            }
        }

        writer
            .write(&document)
            .map_err(|e| format!("Failed to write record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    eprintln!(
        "✓ Processed {} record(s): {} failed, {} value(s) extracted",
        processed, failed, extracted
    );
    Ok(())
}

/// Build the pipeline and report its shape
fn validate_config(registry: &StageRegistry, config_path: PathBuf) -> Result<(), String> {
    let pipeline = load_pipeline(registry, &config_path)?;

    println!("✓ {} is valid", config_path.display());
    println!("  tag:          {}", pipeline.tag());
    println!("  target field: {}", pipeline.target_field());
    println!("  stages:       {}", pipeline.stage_names().join(", "));
    Ok(())
}

fn list_stages(registry: &StageRegistry) {
    for name in registry.list_stages() {
        let settings = match registry.accepts_settings(name) {
            Ok(true) => " (settings)",
            _ => "",
        };
        println!("{}{}", name, settings);
    }
}
