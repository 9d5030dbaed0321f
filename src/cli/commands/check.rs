//! `hrw check` command - Verify stored statuses against the approval ledger

use console::style;
use miette::{bail, miette, Result};

use crate::cli::helpers::Session;
use crate::cli::GlobalOpts;

#[derive(clap::Args, Debug)]
pub struct CheckArgs {}

pub fn run(_args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let engine = session.engine()?;

    let problems = engine
        .store()
        .check_consistency()
        .map_err(|e| miette!("{}", e))?;

    if problems.is_empty() {
        println!("{} Every request status matches its approvals", style("✓").green());
        return Ok(());
    }

    for p in &problems {
        println!(
            "{} {}: stored {} but approvals imply {}",
            style("✗").red(),
            style(p.id).cyan(),
            style(p.stored).yellow(),
            style(p.implied).yellow()
        );
    }
    bail!("{} inconsistent request(s)", problems.len())
}
