use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// itxn-check CLI options.
#[derive(Debug, Parser)]
#[command(
    name = "itxn-check",
    version,
    about = "Check inner transaction ownership and array reads in typed contract CFGs",
    args_conflicts_with_subcommands = true,
    subcommand_precedence_over_arg = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub check: CheckArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check program files or directories of them.
    Check(CheckArgs),

    /// List available checks.
    ListChecks,

    /// Explain a check.
    Explain {
        /// Check code, e.g. `stale_array_read`.
        code: String,
    },
}

#[derive(Debug, Clone, ClapArgs)]
pub struct CheckArgs {
    /// Program JSON files or directories. Reads stdin when absent.
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Path to an itxn-check.toml; discovered from the first PATH otherwise.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Exit with code 1 if any warnings are emitted.
    #[arg(long)]
    pub deny_warnings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
    Github,
}
