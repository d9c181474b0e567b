use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modelconv_core::{
    launch, resolve_file_uri, Destination, ExtractOptions, Extractor, ExtractorConfig, HandleScope,
    Injector, JsonExtractor, JsonInjector, LaunchRequest, MemoryStore,
};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "modelconv")]
#[command(about = "Transform models with a compiled rule program and extract them as JSON")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a source model, run a transformation program, write the target model as JSON
    Run {
        /// Launch file (JSON, kebab-case keys) instead of the path flags below
        #[arg(long, conflicts_with_all = [
            "src_model", "src_schema", "src_schema_name",
            "dst_model", "dst_schema", "dst_schema_name", "program",
        ])]
        config: Option<PathBuf>,

        /// Source model file
        #[arg(long, required_unless_present = "config")]
        src_model: Option<PathBuf>,

        /// Source schema file
        #[arg(long, required_unless_present = "config")]
        src_schema: Option<PathBuf>,

        /// Schema name the program uses for the source model
        #[arg(long, required_unless_present = "config")]
        src_schema_name: Option<String>,

        /// Output JSON file
        #[arg(long, required_unless_present = "config")]
        dst_model: Option<PathBuf>,

        /// Destination schema file
        #[arg(long, required_unless_present = "config")]
        dst_schema: Option<PathBuf>,

        /// Schema name the program uses for the target model
        #[arg(long, required_unless_present = "config")]
        dst_schema_name: Option<String>,

        /// Compiled transformation program
        #[arg(long, required_unless_present = "config")]
        program: Option<PathBuf>,

        #[command(flatten)]
        extractor: ExtractorArgs,
    },

    /// Write an existing model as JSON
    Extract {
        /// Schema file the model conforms to
        #[arg(long)]
        schema: PathBuf,

        /// Model file
        #[arg(long)]
        model: PathBuf,

        /// Output JSON file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        extractor: ExtractorArgs,
    },
}

#[derive(clap::Args)]
struct ExtractorArgs {
    /// Type whose instances become top-level entries [default: Root]
    #[arg(long)]
    root_type: Option<String>,

    /// Maximum reference nesting depth [default: 512]
    #[arg(long)]
    max_depth: Option<usize>,
}

impl ExtractorArgs {
    /// Flags win over whatever `base` holds.
    fn apply(self, mut base: ExtractorConfig) -> ExtractorConfig {
        if let Some(root_type) = self.root_type {
            base.root_type = root_type;
        }
        if let Some(max_depth) = self.max_depth {
            base.max_depth = max_depth;
        }
        base
    }
}

/// Contents of a `--config` launch file.
#[derive(Deserialize)]
struct LaunchFile {
    #[serde(flatten)]
    request: LaunchRequest,
    #[serde(flatten)]
    extractor: ExtractorConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            config,
            src_model,
            src_schema,
            src_schema_name,
            dst_model,
            dst_schema,
            dst_schema_name,
            program,
            extractor,
        } => {
            let (request, extractor_config) = match config {
                Some(path) => read_launch_file(&path)?,
                None => (
                    LaunchRequest {
                        src_model: required(src_model, "--src-model")?,
                        src_schema: required(src_schema, "--src-schema")?,
                        src_schema_name: required(src_schema_name, "--src-schema-name")?,
                        dst_model: required(dst_model, "--dst-model")?,
                        dst_schema: required(dst_schema, "--dst-schema")?,
                        dst_schema_name: required(dst_schema_name, "--dst-schema-name")?,
                        program: required(program, "--program")?,
                    },
                    ExtractorConfig::default(),
                ),
            };
            let extractor = JsonExtractor::with_config(extractor.apply(extractor_config));

            launch(&request, &JsonInjector::new(), &extractor)
                .map_err(|e| anyhow::Error::from(e).context("Conversion failed"))?;
        }
        Commands::Extract {
            schema,
            model,
            output,
            extractor,
        } => {
            let extractor = JsonExtractor::with_config(extractor.apply(ExtractorConfig::default()));
            extract(&schema, &model, output.as_deref(), &extractor)?;
        }
    }

    Ok(())
}

fn required<T>(value: Option<T>, flag: &str) -> Result<T> {
    value.with_context(|| format!("{flag} is required unless --config is given"))
}

/// Parse a launch file; relative paths in it are taken from its directory.
fn read_launch_file(path: &Path) -> Result<(LaunchRequest, ExtractorConfig)> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open launch file: {}", path.display()))?;
    let launch_file: LaunchFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse launch file: {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok((launch_file.request.relative_to(base), launch_file.extractor))
}

fn extract(schema: &Path, model: &Path, output: Option<&Path>, extractor: &JsonExtractor) -> Result<()> {
    let injector = JsonInjector::new();
    let mut store = MemoryStore::new();
    let mut scope = HandleScope::new(&mut store);

    let schema_handle = scope.new_schema();
    injector
        .inject(scope.store_mut(), schema_handle.into(), &resolve_file_uri(schema)?)
        .with_context(|| format!("Failed to load schema: {}", schema.display()))?;
    let model_handle = scope.new_model(schema_handle)?;
    injector
        .inject(scope.store_mut(), model_handle.into(), &resolve_file_uri(model)?)
        .with_context(|| format!("Failed to load model: {}", model.display()))?;

    let options = ExtractOptions::default();
    match output {
        Some(path) => extractor
            .extract(scope.store(), model_handle, Destination::from(path), &options)
            .with_context(|| format!("Failed to extract model to: {}", path.display()))?,
        None => {
            let mut writer = BufWriter::new(io::stdout());
            extractor
                .extract(scope.store(), model_handle, Destination::Sink(&mut writer), &options)
                .context("Failed to extract model")?;
            // Ensure trailing newline
            writeln!(writer).context("Failed to write trailing newline")?;
        }
    }
    Ok(())
}
