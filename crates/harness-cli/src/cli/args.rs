use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Batch-evaluate generated OpenROAD scripts against the real tool"
)]
pub struct Cli {
    /// Log output format (filter with HARNESS_LOG, default `info`)
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sanitize, materialize and execute every script, then write the report
    Run(RunArgs),
    /// Sanitize and materialize every script without executing anything
    Prepare(PrepareArgs),
    /// Write a sample run file
    Init(InitArgs),
    Version,
}

/// Where the corpus comes from and where scripts land. Shared by `run` and `prepare`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CorpusArgs {
    /// YAML run file; flags given on the command line take precedence
    #[arg(long, env = "HARNESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tabular corpus (CSV, or TSV by extension)
    #[arg(long, env = "HARNESS_INPUT")]
    pub input: Option<PathBuf>,

    /// Column holding the script text (default: first column)
    #[arg(long)]
    pub column: Option<String>,

    /// Field delimiter, overriding the extension-based default
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Only evaluate the first N rows
    #[arg(long)]
    pub limit: Option<usize>,

    /// Directory for scripts, logs and the report
    #[arg(long, env = "HARNESS_OUT_DIR")]
    pub out_dir: Option<PathBuf>,

    /// Extension for materialized scripts
    #[arg(long)]
    pub script_ext: Option<String>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Per-script timeout in seconds
    #[arg(long, env = "HARNESS_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Maximum number of tool processes running at once
    #[arg(long, env = "HARNESS_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Tool executable (default: openroad)
    #[arg(long, env = "HARNESS_TOOL")]
    pub tool: Option<String>,

    /// Tool argument, repeatable; `{script}` is replaced by the script path
    #[arg(long = "tool-arg", allow_hyphen_values = true)]
    pub tool_args: Vec<String>,

    /// Report file name inside the output directory
    #[arg(long)]
    pub report_name: Option<String>,

    /// Stop starting new items after this many seconds
    #[arg(long)]
    pub batch_timeout: Option<u64>,

    /// Rewrite the partial report every N finished items
    #[arg(long)]
    pub flush_every: Option<usize>,

    /// Retries for transient spawn failures
    #[arg(long)]
    pub spawn_retries: Option<u32>,

    #[arg(long)]
    pub retry_backoff_ms: Option<u64>,

    /// Grace period between SIGTERM and SIGKILL for a timed-out tool
    #[arg(long)]
    pub kill_grace_ms: Option<u64>,

    /// Also write a JSON run summary
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Also write a JUnit XML report
    #[arg(long)]
    pub junit: Option<PathBuf>,

    /// List passing items in the console summary too
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = "harness.yaml")]
    pub config: PathBuf,
}
