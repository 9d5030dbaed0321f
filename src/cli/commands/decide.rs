//! `hrw approve` / `hrw reject` commands - Record a stage decision

use clap::Args;
use console::style;
use miette::Result;

use crate::cli::filters::StageArg;
use crate::cli::helpers::{resolve_id, workflow_report, Session, SignatureArgs};
use crate::cli::output::print_json;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::approval::{Decision, Stage};
use crate::core::workflow::StageDecision;

/// Decide one stage of a request
#[derive(Debug, Args)]
pub struct DecideArgs {
    /// Request id or unique prefix
    pub id: String,

    /// Stage being decided
    #[arg(long, short = 's', value_enum)]
    pub stage: StageArg,

    /// Notes recorded with the decision
    #[arg(long, short = 'm')]
    pub message: Option<String>,

    #[command(flatten)]
    pub signature: SignatureArgs,
}

pub fn run(args: DecideArgs, decision: Decision, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let actor = session.actor()?;
    let engine = session.engine()?;
    let id = resolve_id(&engine, &args.id)?;
    let stage = Stage::from(args.stage);

    let mut input = StageDecision::new(id, actor, stage, decision, args.signature.require()?);
    if let Some(message) = args.message {
        input = input.with_notes(message);
    }

    let request = engine.decide(input).map_err(workflow_report)?;

    if global.output == OutputFormat::Json {
        return print_json(&request);
    }

    let verb = match decision {
        Decision::Approved => style("Approved").green(),
        Decision::Rejected => style("Rejected").red(),
    };
    println!(
        "{} {} {} at the {} stage",
        style("✓").green(),
        verb,
        style(request.id.short()).cyan(),
        stage.title()
    );
    println!(
        "   Status: {} ({})",
        style(request.status).yellow(),
        request.status.label()
    );
    Ok(())
}
