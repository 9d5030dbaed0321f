//! Command-line argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cli::commands::check::CheckArgs;
use crate::cli::commands::completions::CompletionsArgs;
use crate::cli::commands::decide::DecideArgs;
use crate::cli::commands::export::ExportArgs;
use crate::cli::commands::init::InitArgs;
use crate::cli::commands::request::RequestCommands;
use crate::cli::commands::team::TeamCommands;
use crate::cli::commands::timeline::TimelineArgs;

/// HR request approval workflow
#[derive(Debug, Parser)]
#[command(name = "hrw", version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options accepted by every command
#[derive(Debug, Clone, Args)]
pub struct GlobalOpts {
    /// Act as this staff member (overrides HRW_ACTOR and config)
    #[arg(long = "as", global = true, value_name = "STAFF_ID")]
    pub actor: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputFormat::Auto)]
    pub output: OutputFormat,

    /// Verbose logging to stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// TSV for lists, a readable summary for single records
    #[default]
    Auto,
    Table,
    Tsv,
    Csv,
    Json,
    Yaml,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize an hrw project in the current directory
    Init(InitArgs),

    /// Create, list and inspect requests
    #[command(subcommand)]
    Request(RequestCommands),

    /// Approve the given stage of a request
    Approve(DecideArgs),

    /// Reject the given stage of a request
    Reject(DecideArgs),

    /// Show the ordered lifecycle events of a request
    Timeline(TimelineArgs),

    /// Export a closed request as a document
    Export(ExportArgs),

    /// Team roster management
    #[command(subcommand)]
    Team(TeamCommands),

    /// Verify that stored statuses agree with the approval ledger
    Check(CheckArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
