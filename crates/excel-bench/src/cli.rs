use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapter::{CalamineAdapter, ExcelAdapter, JsonWorkbookAdapter};
use crate::oracle::{OracleSet, WriteOracle};
use crate::report::{load_results, render_text_summary, to_document, write_results};
use crate::runner::{run_benchmark, Profile, RunConfig};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AdapterKind {
    /// Full-fidelity JSON workbook backend (reads and writes `.json` workbooks).
    Json,
    /// Read-only value backend over `calamine`.
    Calamine,
}

impl AdapterKind {
    fn build(self) -> Box<dyn ExcelAdapter> {
        match self {
            AdapterKind::Json => Box::new(JsonWorkbookAdapter::new()),
            AdapterKind::Calamine => Box::new(CalamineAdapter::new()),
        }
    }
}

#[derive(Parser)]
#[command(
    name = "excel-bench",
    about = "Benchmark spreadsheet libraries against fixture workbooks and score their fidelity."
)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the benchmark over a fixture directory and write `results.json`.
    Run(RunArgs),
    /// Print the score matrix of an existing `results.json`.
    Score(ScoreArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Fixture directory containing `manifest.json`.
    #[arg(long, value_name = "DIR")]
    tests: PathBuf,

    /// Directory that receives `results.json`.
    #[arg(long, value_name = "DIR")]
    output: PathBuf,

    /// Adapters to benchmark (repeatable; default: all).
    #[arg(long = "adapter", value_enum)]
    adapters: Vec<AdapterKind>,

    /// Only run these features (repeatable).
    #[arg(long = "feature")]
    features: Vec<String>,

    /// Which writer output format to benchmark.
    #[arg(long, value_enum, default_value_t = Profile::Xlsx)]
    profile: Profile,

    /// Reader that verifies written files. Falls back to `EXCELBENCH_WRITE_ORACLE`, then `auto`.
    #[arg(long, value_enum)]
    write_oracle: Option<WriteOracle>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(clap::Args)]
struct ScoreArgs {
    /// A `results.json` produced by `run`.
    results: PathBuf,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

pub fn run_with_args(args: Args) -> Result<()> {
    match args.command {
        Command::Run(args) => run_command(args),
        Command::Score(args) => {
            let document = load_results(&args.results)?;
            print!("{}", render_text_summary(&document));
            Ok(())
        }
    }
}

fn run_command(args: RunArgs) -> Result<()> {
    if !args.tests.is_dir() {
        anyhow::bail!("test directory {} does not exist", args.tests.display());
    }

    let mut kinds = args.adapters.clone();
    if kinds.is_empty() {
        kinds = vec![AdapterKind::Json, AdapterKind::Calamine];
    }
    kinds.dedup();
    let adapters: Vec<Box<dyn ExcelAdapter>> = kinds.into_iter().map(AdapterKind::build).collect();
    let adapter_refs: Vec<&dyn ExcelAdapter> = adapters.iter().map(|a| a.as_ref()).collect();

    let oracles = OracleSet::new(Box::new(JsonWorkbookAdapter::new()))
        .with_legacy_biff(Box::new(CalamineAdapter::new()));

    let config = RunConfig {
        features: args.features.clone(),
        profile: args.profile,
        write_oracle: args
            .write_oracle
            .or_else(WriteOracle::from_env)
            .unwrap_or_default(),
        ..RunConfig::default()
    };

    let run = run_benchmark(&args.tests, &adapter_refs, &oracles, &config)
        .with_context(|| format!("benchmark over {}", args.tests.display()))?;
    for warning in &run.warnings {
        eprintln!("warning: {warning}");
    }

    let path = write_results(&run.results, &args.output)
        .with_context(|| format!("write results to {}", args.output.display()))?;
    let document = to_document(&run.results);

    match args.format {
        OutputFormat::Text => {
            print!("{}", render_text_summary(&document));
            println!();
            println!("Results written to {}", path.display());
        }
        OutputFormat::Json => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer(&mut handle, &document)?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}
