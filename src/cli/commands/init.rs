//! `hrw init` command - Create a project

use console::style;
use miette::{miette, IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::project::Project;
use crate::core::store::RequestStore;
use crate::core::team::TeamRoster;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Default acting staff id written to the project config
    #[arg(long)]
    pub actor: Option<String>,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let root = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().into_diagnostic()?.join(&args.path)
    };
    std::fs::create_dir_all(&root).into_diagnostic()?;

    let project = Project::init(&root).into_diagnostic()?;

    let config = Config {
        actor: args.actor.clone().or_else(|| global.actor.clone()),
        ..Config::default()
    };
    config.save(&project.config_path()).into_diagnostic()?;
    TeamRoster::default()
        .save(&project.team_path())
        .into_diagnostic()?;

    let db_path = config.database_path(&project);
    RequestStore::open(&db_path, config.workflow.busy_timeout())
        .map_err(|e| miette!("Failed to create {}: {}", db_path.display(), e))?;

    println!(
        "{} Initialized hrw project in {}",
        style("✓").green(),
        style(project.root().display()).cyan()
    );
    println!("   {}", style(project.config_path().display()).dim());
    println!("   {}", style(project.team_path().display()).dim());
    println!("   {}", style(db_path.display()).dim());
    println!();
    println!(
        "Add approvers with {}",
        style("hrw team add <id> --name <name> --capability approve-sales").yellow()
    );
    Ok(())
}
