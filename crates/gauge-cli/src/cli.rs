use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "gauge",
    version,
    about = "Run content evaluators over a set of entries and print a results table"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate entries with the evaluators named in a run config
    Run(RunArgs),
    /// List the registered evaluators
    List(ListArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Run config (.yaml, .yml or .json)
    #[arg(long, default_value = "run.yaml")]
    pub config: PathBuf,

    /// Entries file (.json, .jsonl, .ndjson, .yaml or .yml)
    #[arg(long)]
    pub entries: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Override max_evaluators_in_parallel from the config
    #[arg(long)]
    pub max_evaluators: Option<usize>,

    /// Override max_evaluations_in_parallel from the config
    #[arg(long)]
    pub max_evaluations: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Print definitions and default settings as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table
    Table,
    /// Table rows as JSON records
    Json,
    /// Raw results keyed by evaluator name
    List,
}
