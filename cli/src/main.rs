use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use form_schema_core::{
    FlatMap, FlattenOptions, PathAllocator, ROOT_ID, SchemaNode, extract_data, flatten_with,
    merge_data_with_report, normalize_document, to_legacy, unflatten_value,
};
use form_schema_session::{EditorConfig, load_document};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Output format for documents written by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

impl CliOutputFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "form-schema", version)]
#[command(about = "Flatten, rebuild, bind and check form schemas")]
struct Cli {
    /// Output format (default: json).
    #[arg(long, global = true, default_value = "json")]
    format: CliOutputFormat,
    /// Editor configuration file (YAML or JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More logging (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Flatten a schema document into its flat map.
    Flatten(FlattenArgs),
    /// Rebuild a schema document from a flat map.
    Unflatten(UnflattenArgs),
    /// Bind form data onto a schema and print the flat map with values.
    Merge(MergeArgs),
    /// Read the form data back out of a flat map.
    Extract(ExtractArgs),
    /// Rewrite schema documents into the current (or legacy) convention.
    Normalize(NormalizeArgs),
    /// Verify that schema documents survive a flatten/unflatten round trip.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct FlattenArgs {
    /// Schema document (any convention).
    input: PathBuf,
    /// Inline local `$ref`s (overrides the config file).
    #[arg(long)]
    resolve_refs: bool,
    /// Output file (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct UnflattenArgs {
    /// Flat map file.
    input: PathBuf,
    /// Entry to rebuild from.
    #[arg(long, default_value = ROOT_ID)]
    root: String,
    /// Keep hidden placeholders and emit `$id`s.
    #[arg(long)]
    include_hidden: bool,
    /// Output file (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Schema document.
    schema: PathBuf,
    /// Form data document.
    data: PathBuf,
    /// Fail when a value does not fit the schema instead of dropping it.
    #[arg(long)]
    strict: bool,
    /// Output file (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Flat map file.
    input: PathBuf,
    /// Output file (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct NormalizeArgs {
    /// Schema documents.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Output directory (required for more than one input).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write the legacy `propsSchema` convention instead.
    #[arg(long)]
    legacy: bool,
    /// Number of parallel jobs (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Schema documents.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Number of parallel jobs (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
}

fn main() {
    let cli = Cli::parse();
    install_tracing(cli.verbose);
    debug!(cli = ?cli, "parsed cli");

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Flatten(args) => run_flatten(args, &config, cli.format),
        Command::Unflatten(args) => run_unflatten(args, cli.format),
        Command::Merge(args) => run_merge(args, &config, cli.format),
        Command::Extract(args) => run_extract(args, cli.format),
        Command::Normalize(args) => run_normalize(args, cli.format),
        Command::Check(args) => run_check(args, &config),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn install_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig, String> {
    match path {
        Some(path) => EditorConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display())),
        None => Ok(EditorConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// flatten / unflatten
// ---------------------------------------------------------------------------

fn run_flatten(args: FlattenArgs, config: &EditorConfig, format: CliOutputFormat) -> Result<(), String> {
    let options = FlattenOptions {
        resolve_refs: args.resolve_refs || config.resolve_refs,
    };
    let flat = flatten_document(&args.input, &options)?;
    emit(&flat, format, args.output.as_deref())
}

fn run_unflatten(args: UnflattenArgs, format: CliOutputFormat) -> Result<(), String> {
    let flat = read_flat_map(&args.input)?;
    let schema = unflatten_value(&flat, &args.root, args.include_hidden)
        .map_err(|e| format!("Failed to rebuild '{}': {e}", args.input.display()))?;
    emit(&schema, format, args.output.as_deref())
}

// ---------------------------------------------------------------------------
// merge / extract
// ---------------------------------------------------------------------------

fn run_merge(args: MergeArgs, config: &EditorConfig, format: CliOutputFormat) -> Result<(), String> {
    let options = FlattenOptions {
        resolve_refs: config.resolve_refs,
    };
    let flat = flatten_document(&args.schema, &options)?;
    let data = read_document(&args.data)?;
    let (merged, mismatches) = merge_data_with_report(&flat, &data);

    if !mismatches.is_empty() {
        if args.strict {
            let details: Vec<String> = mismatches.iter().map(ToString::to_string).collect();
            return Err(format!(
                "{} value(s) do not fit the schema: {}",
                mismatches.len(),
                details.join("; ")
            ));
        }
        eprintln!("{} value(s) dropped while merging.", mismatches.len());
    }

    emit(&merged, format, args.output.as_deref())
}

fn run_extract(args: ExtractArgs, format: CliOutputFormat) -> Result<(), String> {
    let flat = read_flat_map(&args.input)?;
    emit(&extract_data(&flat), format, args.output.as_deref())
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

fn run_normalize(args: NormalizeArgs, format: CliOutputFormat) -> Result<(), String> {
    use rayon::prelude::*;

    if args.inputs.len() > 1 && args.output.is_none() {
        return Err("--output is required when normalizing several documents".to_string());
    }
    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create output directory '{}': {e}", dir.display()))?;
    }

    let pool = build_pool(args.jobs)?;
    let legacy = args.legacy;
    let results: Vec<Result<(PathBuf, Value), String>> = pool.install(|| {
        args.inputs
            .par_iter()
            .map(|input| -> Result<(PathBuf, Value), String> {
                let normalized = normalize_document(&read_document(input)?);
                debug!(path = %input.display(), version = ?normalized.version, "normalized");
                let document = if legacy {
                    to_legacy(&normalized.schema, &normalized.form_props)
                } else {
                    normalized.schema
                };
                Ok((input.clone(), document))
            })
            .collect()
    });

    let mut written = 0usize;
    for result in results {
        let (input, document) = result?;
        let target = args
            .output
            .as_deref()
            .map(|dir| output_path(dir, &input, format));
        emit(&document, format, target.as_deref())?;
        written += 1;
    }

    if args.output.is_some() {
        println!("Normalized {written} document(s).");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn run_check(args: CheckArgs, config: &EditorConfig) -> Result<(), String> {
    use rayon::prelude::*;

    let pool = build_pool(args.jobs)?;
    let options = FlattenOptions {
        resolve_refs: config.resolve_refs,
    };
    let outcomes: Vec<(PathBuf, Result<(), String>)> = pool.install(|| {
        args.inputs
            .par_iter()
            .map(|input| (input.clone(), check_document(input, &options)))
            .collect()
    });

    let mut failed = 0usize;
    for (input, outcome) in &outcomes {
        match outcome {
            Ok(()) => println!("ok   {}", input.display()),
            Err(err) => {
                failed += 1;
                println!("FAIL {}: {err}", input.display());
            }
        }
    }
    println!("Checked {} document(s), {failed} failed.", outcomes.len());

    if failed > 0 {
        return Err(format!("{failed} document(s) failed the round-trip check"));
    }
    Ok(())
}

/// Flattens, validates and rebuilds one document, comparing the result with
/// the parsed input.
fn check_document(path: &Path, options: &FlattenOptions) -> Result<(), String> {
    let normalized = normalize_document(&read_document(path)?);
    let mut schema = SchemaNode::from_value(&normalized.schema).map_err(|e| e.to_string())?;
    let flat = flatten_with(&schema, &mut PathAllocator::default(), options)
        .map_err(|e| e.to_string())?;
    flat.check().map_err(|e| e.to_string())?;

    let rebuilt = form_schema_core::unflatten(&flat, ROOT_ID, false).map_err(|e| e.to_string())?;
    schema.clear_ids();
    // Inlined `$ref`s legitimately change the tree.
    if !options.resolve_refs && rebuilt != schema {
        return Err("schema changed across the round trip".to_string());
    }

    if let Some(data) = &normalized.form_data {
        let (_, mismatches) = merge_data_with_report(&flat, data);
        if !mismatches.is_empty() {
            warn!(path = %path.display(), count = mismatches.len(), "embedded form data does not fit the schema");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_pool(jobs: Option<usize>) -> Result<rayon::ThreadPool, String> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .build()
        .map_err(|e| format!("Failed to create thread pool: {e}"))
}

fn read_document(path: &Path) -> Result<Value, String> {
    load_document(path).map_err(|e| format!("Failed to read '{}': {e}", path.display()))
}

fn flatten_document(path: &Path, options: &FlattenOptions) -> Result<FlatMap, String> {
    let normalized = normalize_document(&read_document(path)?);
    SchemaNode::from_value(&normalized.schema)
        .and_then(|schema| flatten_with(&schema, &mut PathAllocator::default(), options))
        .map_err(|e| format!("Failed to flatten '{}': {e}", path.display()))
}

fn read_flat_map(path: &Path) -> Result<FlatMap, String> {
    let flat: FlatMap = serde_json::from_value(read_document(path)?)
        .map_err(|e| format!("'{}' is not a flat map: {e}", path.display()))?;
    flat.check()
        .map_err(|e| format!("'{}' is not a consistent flat map: {e}", path.display()))?;
    Ok(flat)
}

fn render<T: Serialize>(value: &T, format: CliOutputFormat) -> Result<String, String> {
    match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| format!("Failed to serialize JSON: {e}")),
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|e| format!("Failed to serialize YAML: {e}"))
        }
    }
}

fn emit<T: Serialize>(value: &T, format: CliOutputFormat, output: Option<&Path>) -> Result<(), String> {
    let raw = render(value, format)?;
    match output {
        Some(path) => {
            fs::write(path, raw).map_err(|e| format!("Failed to write '{}': {e}", path.display()))
        }
        None => {
            println!("{}", raw.trim_end());
            Ok(())
        }
    }
}

fn output_path(dir: &Path, input: &Path, format: CliOutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("schema");
    dir.join(format!("{stem}.{}", format.extension()))
}
