//! `hrw timeline` command - Ordered lifecycle events of a request

use miette::Result;

use crate::cli::helpers::{resolve_id, workflow_report, Session};
use crate::cli::output::print_timeline;
use crate::cli::GlobalOpts;
use crate::core::timeline::record_timeline;

#[derive(clap::Args, Debug)]
pub struct TimelineArgs {
    /// Request id or unique prefix
    pub id: String,
}

pub fn run(args: TimelineArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let caller = session.actor()?;
    let engine = session.engine()?;
    let id = resolve_id(&engine, &args.id)?;

    let record = engine.get_request(id, caller).map_err(workflow_report)?;
    print_timeline(&record_timeline(&record), global.output)
}
