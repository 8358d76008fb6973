//! CLI tool for regenerating the text of slide decks.

use anyhow::{bail, Context, Result};
use clap::Parser;
use deck_core::{ProcessingResult, ProcessorConfig};
use deck_pipeline::{DeckProcessor, ProgressCallback};
use deck_rewrite::{HttpTransport, RewriteClient, RewriteConfig};
use serde::Deserialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Rewrite every text run of a slide deck for a new topic, keeping layout
/// and formatting.
#[derive(Parser, Debug)]
#[command(name = "deck-regen")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input slide deck (.pptx)
    input: PathBuf,

    /// Output file (default: <input>_regenerated.pptx next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Industry or use case the new content should target
    #[arg(long, conflicts_with = "user_info_file")]
    user_info: Option<String>,

    /// Read the user info from a file
    #[arg(long)]
    user_info_file: Option<PathBuf>,

    /// Write the processing result as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// TOML file with [processor] and [rewrite] tables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Slides per section
    #[arg(long)]
    section_size: Option<usize>,

    /// Reject decks with more slides than this
    #[arg(long)]
    max_slides: Option<usize>,

    /// Estimated token budget per request
    #[arg(long)]
    token_budget: Option<usize>,

    /// Model identifier sent to the service
    #[arg(long)]
    model: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Contents of a `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    processor: ProcessorConfig,
    rewrite: RewriteConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let (processor_config, rewrite_config) = build_config(&args)?;
    let user_info = read_user_info(&args)?;
    let output = get_output_path(&args.input, args.output.as_ref());

    let transport = HttpTransport::new(&rewrite_config).context("Cannot reach the rewrite service")?;
    let processor = DeckProcessor::new(
        RewriteClient::new(transport, rewrite_config),
        processor_config,
    );

    let progress: ProgressCallback = Arc::new(|current: usize, total: usize| {
        eprintln!("Progress: {}/{} slides", current, total);
    });

    if args.verbose {
        eprintln!("Processing: {}", args.input.display());
    }
    let result = processor
        .process(&args.input, &output, None, &user_info, Some(progress))
        .await
        .with_context(|| format!("Failed to process {}", args.input.display()))?;

    print_summary(&result, &output);
    if let Some(report) = &args.report {
        write_report(report, &result)?;
        if args.verbose {
            eprintln!("Report written to: {}", report.display());
        }
    }

    if !result.success {
        bail!("No output written for {}", args.input.display());
    }
    Ok(())
}

/// Defaults, then the config file, then flags.
fn build_config(args: &Args) -> Result<(ProcessorConfig, RewriteConfig)> {
    let file = match &args.config {
        Some(path) => {
            log::debug!("Loading config from {}", path.display());
            load_config(path)?
        }
        None => FileConfig::default(),
    };

    let mut processor = file.processor;
    if let Some(size) = args.section_size {
        processor = processor.with_max_slides_per_section(size);
    }
    if let Some(max) = args.max_slides {
        processor = processor.with_max_total_slides(max);
    }
    processor.validate()?;

    let mut rewrite = file.rewrite.with_env_key();
    if let Some(budget) = args.token_budget {
        rewrite = rewrite.with_token_budget(budget);
    }
    if let Some(model) = &args.model {
        rewrite = rewrite.with_model(model.clone());
    }

    Ok((processor, rewrite))
}

fn load_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn read_user_info(args: &Args) -> Result<String> {
    match (&args.user_info, &args.user_info_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read user info from {}", path.display())),
        (None, None) => Ok(String::new()),
    }
}

/// Determine the output path for a processed deck.
fn get_output_path(input_path: &Path, output: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = output {
        return path.clone();
    }

    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let output_filename = format!("{}_regenerated.pptx", stem);

    match input_path.parent() {
        Some(parent) => parent.join(output_filename),
        None => PathBuf::from(output_filename),
    }
}

fn print_summary(result: &ProcessingResult, output: &Path) {
    eprintln!(
        "{} slides in {} sections, {} runs replaced in {:.1}s",
        result.total_slides, result.section_count, result.replaced_runs, result.total_duration_secs
    );
    for warning in &result.warnings {
        eprintln!("  warning: {}", warning);
    }
    if result.success {
        eprintln!("Written to: {}", output.display());
    }
}

/// Write the processing result as pretty JSON.
fn write_report(path: &Path, result: &ProcessingResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("Failed to serialize report")?;
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
