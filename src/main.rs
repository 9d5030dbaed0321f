use clap::Parser;
use hrw::cli::commands;
use hrw::cli::{Cli, Commands};
use hrw::core::approval::Decision;
use miette::Result;
use tracing_subscriber::EnvFilter;

/// Log filter environment variable
const LOG_ENV: &str = "HRW_LOG";

fn main() -> Result<()> {
    // Install miette's fancy error handler for beautiful diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let global = cli.global;
    match cli.command {
        Commands::Init(args) => commands::init::run(args, &global),
        Commands::Request(cmd) => commands::request::run(cmd, &global),
        Commands::Approve(args) => commands::decide::run(args, Decision::Approved, &global),
        Commands::Reject(args) => commands::decide::run(args, Decision::Rejected, &global),
        Commands::Timeline(args) => commands::timeline::run(args, &global),
        Commands::Export(args) => commands::export::run(args, &global),
        Commands::Team(cmd) => cmd.run(&global),
        Commands::Check(args) => commands::check::run(args, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}

/// Logs go to stderr so stdout stays parseable
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
