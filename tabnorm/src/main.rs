//! Table normalization tool.
//!
//! This binary loads CSV, TSV, JSON or spreadsheet tables, normalizes each
//! into third normal form and writes the resulting tables with a report of
//! keys, foreign keys, proposed indexes and run metrics.

mod output;
mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tabnorm_core::dependency::discover;
use tabnorm_core::export::{NormalizationReport, render_ddl, write_csv_tables};
use tabnorm_core::loader::load_path;
use tabnorm_core::{
    LogFormat, NormalizationPipeline, NormalizationResult, NullStrategy, PipelineConfig,
    init_logging,
};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "tabnorm")]
#[command(about = "Normalize flat tables into third normal form")]
#[command(version)]
#[command(long_about = "
tabnorm - table normalization to 3NF

For each input table this tool:
- Validates column types and constraints
- Fills or drops missing values per column
- Discovers functional dependencies and candidate keys
- Decomposes the table into third normal form
- Proposes foreign keys and indexes

SUPPORTED INPUTS:
- CSV (.csv) and TSV (.tsv) with a header row
- JSON (.json) arrays of records
- Spreadsheets (.xlsx, .xlsm, .xlsb, .xls, .ods), first worksheet

EXAMPLES:
  tabnorm process orders.csv
  tabnorm process --config pipeline.json --format markdown a.csv b.json
  tabnorm inspect orders.csv
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Normalize one or more tables
    Process(ProcessArgs),
    /// Show inferred types, keys and dependencies without decomposing
    Inspect(InspectArgs),
    /// List the NULL strategies
    Strategies,
}

/// Report formats
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON structured report
    Json,
    /// Markdown documentation
    Markdown,
    /// SQL DDL for the normalized schema
    Sql,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormatArg {
    #[default]
    Plain,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Plain => LogFormat::Plain,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Args)]
pub struct ProcessArgs {
    /// Input files
    #[arg(required = true, help = "Input tables (.csv, .tsv, .json or a spreadsheet)")]
    pub inputs: Vec<PathBuf>,

    /// Pipeline configuration
    #[arg(short, long, help = "Pipeline configuration file (JSON)")]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(
        short,
        long,
        default_value = "normalized",
        help = "Directory receiving one subdirectory per input"
    )]
    pub output_dir: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Determinant size ceiling
    #[arg(long, help = "Largest determinant set explored during discovery (1-8)")]
    pub max_determinant_size: Option<usize>,

    /// Discovery sample size
    #[arg(long, help = "Discover dependencies on the first N rows only")]
    pub sample_size: Option<usize>,

    /// Abort on constraint violations
    #[arg(long, help = "Fail an input whose constraint report is not empty")]
    pub strict: bool,

    /// Enable compression
    #[arg(long, help = "Compress the JSON report using Zstandard (.json.zst)")]
    pub compress: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Input file
    #[arg(help = "Input table (.csv, .tsv, .json or a spreadsheet)")]
    pub input: PathBuf,

    /// Determinant size ceiling
    #[arg(long, help = "Largest determinant set explored during discovery (1-8)")]
    pub max_determinant_size: Option<usize>,

    /// Discovery sample size
    #[arg(long, help = "Discover dependencies on the first N rows only")]
    pub sample_size: Option<usize>,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Log record format
    #[arg(long, global = true, value_enum, default_value = "plain")]
    pub log_format: LogFormatArg,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format.into())?;

    match cli.command {
        Command::Process(args) => process(args).await,
        Command::Inspect(args) => inspect(args).await,
        Command::Strategies => {
            list_strategies();
            Ok(())
        }
    }
}

fn build_config(
    path: Option<&Path>,
    max_determinant_size: Option<usize>,
    sample_size: Option<usize>,
) -> anyhow::Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Invalid configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(size) = max_determinant_size {
        config = config.with_max_determinant_size(size);
    }
    if sample_size.is_some() {
        config = config.with_discovery_sample_size(sample_size);
    }
    Ok(config)
}

struct ProcessSettings {
    output_dir: PathBuf,
    format: OutputFormat,
    strict: bool,
    compress: bool,
}

/// Normalizes every input concurrently, one pipeline per input.
async fn process(args: ProcessArgs) -> anyhow::Result<()> {
    let config = build_config(
        args.config.as_deref(),
        args.max_determinant_size,
        args.sample_size,
    )?;
    let pipeline = Arc::new(NormalizationPipeline::new(config)?);
    let settings = Arc::new(ProcessSettings {
        output_dir: args.output_dir,
        format: args.format,
        strict: args.strict,
        compress: args.compress,
    });

    let total = args.inputs.len();
    let mut tasks = JoinSet::new();
    for input in args.inputs {
        let pipeline = Arc::clone(&pipeline);
        let settings = Arc::clone(&settings);
        tasks.spawn(async move {
            let outcome = process_input(&input, &pipeline, &settings).await;
            (input, outcome)
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        let (input, outcome) = joined.context("Normalization task panicked")?;
        match outcome {
            Ok(summary) => println!("{}", summary),
            Err(e) => {
                failures += 1;
                error!("{}: {:#}", input.display(), e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} inputs failed", failures, total);
    }
    Ok(())
}

fn stem(input: &Path) -> String {
    input
        .file_stem()
        .map_or_else(|| "table".to_string(), |s| s.to_string_lossy().into_owned())
}

async fn process_input(
    input: &Path,
    pipeline: &Arc<NormalizationPipeline>,
    settings: &ProcessSettings,
) -> anyhow::Result<String> {
    let name = stem(input);
    let target = settings.output_dir.join(&name);
    tokio::fs::create_dir_all(&target)
        .await
        .with_context(|| format!("Failed to create {}", target.display()))?;

    let result = {
        let pipeline = Arc::clone(pipeline);
        let input = input.to_path_buf();
        let target = target.clone();
        let name = name.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<NormalizationResult> {
            let table = load_path(&input, &name)?;
            let result = pipeline.run(&table)?;
            write_csv_tables(&target, result.tables())?;
            Ok(result)
        })
        .await
        .context("Normalization task panicked")??
    };

    if !result.validation.is_clean() {
        for violation in &result.validation.violations {
            warn!("{}: column '{}': {}", name, violation.column, violation.message);
        }
        if settings.strict {
            bail!(
                "{} constraint violations found (--strict)",
                result.validation.violations.len()
            );
        }
    }

    let report = NormalizationReport::from_result(&result);
    let written = match settings.format {
        OutputFormat::Json => {
            output::save_report(&report.to_json()?, &target.join("report.json"), settings.compress)
                .await?
        }
        OutputFormat::Markdown => {
            let markdown = report::render_markdown(&input.display().to_string(), &report)?;
            let path = target.join("report.md");
            output::save_text(&markdown, &path).await?;
            path
        }
        OutputFormat::Sql => {
            let path = target.join("schema.sql");
            output::save_text(&render_ddl(result.tables(), &result.plan), &path).await?;
            path
        }
    };
    info!("Report written to {}", written.display());

    Ok(format!(
        "{}: {} tables, {} foreign keys, {} indexes -> {}",
        input.display(),
        result.metrics.normalized_tables,
        result.metrics.foreign_keys,
        result.metrics.indexes_proposed,
        target.display()
    ))
}

/// Prints types, keys and dependencies of one input.
async fn inspect(args: InspectArgs) -> anyhow::Result<()> {
    let config = build_config(None, args.max_determinant_size, args.sample_size)?;
    let input = args.input;
    let name = stem(&input);

    let (table, dependencies) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let table = load_path(&input, &name)?;
        let dependencies = discover(&table, &config.discovery_options());
        Ok((table, dependencies))
    })
    .await
    .context("Inspection task panicked")??;

    println!("Table: {} ({} rows)", table.name(), table.row_count());
    println!();
    println!("Columns:");
    for (index, column) in table.columns().iter().enumerate() {
        println!(
            "  {:<24} {:<10} {} missing",
            column.name,
            column.data_type.to_string(),
            table.null_count(index)
        );
    }

    println!();
    println!("Candidate keys:");
    for key in dependencies.named_keys() {
        println!("  ({})", key.join(", "));
    }

    println!();
    println!(
        "Functional dependencies (determinants up to {} columns):",
        dependencies.max_determinant_size
    );
    for dependency in dependencies.named() {
        println!("  {}", dependency);
    }
    Ok(())
}

fn list_strategies() {
    println!("NULL strategies:");
    for (name, description) in NullStrategy::DESCRIPTIONS {
        println!("  {:<14} {}", name, description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_process_flags() {
        let cli = Cli::try_parse_from([
            "tabnorm",
            "-vv",
            "process",
            "a.csv",
            "b.json",
            "--format",
            "sql",
            "--max-determinant-size",
            "2",
            "--strict",
        ])
        .unwrap();

        assert_eq!(cli.global.verbose, 2);
        let Command::Process(args) = cli.command else {
            panic!("expected process command");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.format, OutputFormat::Sql);
        assert_eq!(args.max_determinant_size, Some(2));
        assert!(args.strict);
        assert_eq!(args.output_dir, PathBuf::from("normalized"));
    }

    #[test]
    fn test_process_requires_input() {
        assert!(Cli::try_parse_from(["tabnorm", "process"]).is_err());
    }

    #[test]
    fn test_build_config_applies_overrides() {
        let config = build_config(None, Some(2), Some(100)).unwrap();
        assert_eq!(config.max_determinant_size, 2);
        assert_eq!(config.discovery_sample_size, Some(100));
    }

    #[tokio::test]
    async fn test_process_input_writes_tables_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("orders.csv");
        std::fs::write(
            &input,
            "order,cust,email\n1,Alice,a@x.com\n2,Bob,b@x.com\n3,Alice,a@x.com\n",
        )
        .unwrap();

        let settings = ProcessSettings {
            output_dir: dir.path().join("out"),
            format: OutputFormat::Sql,
            strict: false,
            compress: false,
        };
        let pipeline = Arc::new(NormalizationPipeline::with_defaults());
        let summary = process_input(&input, &pipeline, &settings).await.unwrap();

        assert!(summary.contains("2 tables, 1 foreign keys"));
        let target = dir.path().join("out").join("orders");
        assert!(target.join("orders_order.csv").exists());
        assert!(target.join("orders_cust.csv").exists());
        let ddl = std::fs::read_to_string(target.join("schema.sql")).unwrap();
        assert!(ddl.contains("CREATE TABLE \"orders_cust\""));
    }
}
