//! `hrw request` command - Create, list and inspect requests

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use miette::{bail, IntoDiagnostic, Result};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::cli::filters::{KindArg, StatusFilter};
use crate::cli::helpers::{format_time, resolve_id, workflow_report, Session, SignatureArgs};
use crate::cli::output::{effective_format, print_json, print_request_page, print_yaml};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::approval::{Approval, Decision, Stage};
use crate::core::request::{NewRequest, RequestKind, RequestRecord};
use crate::core::store::{RequestFilter, DEFAULT_PER_PAGE};

#[derive(Subcommand, Debug)]
pub enum RequestCommands {
    /// File a new request as the acting staff member
    New(NewArgs),

    /// List requests, newest first
    List(ListArgs),

    /// Show a request with its approvals
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Request kind
    #[arg(long, short = 'k', required_unless_present = "interactive")]
    pub kind: Option<KindArg>,

    /// Short title
    #[arg(long, short = 't', required_unless_present = "interactive")]
    pub title: Option<String>,

    /// Free-form details
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Amount requested (advance requests)
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// First day of leave, YYYY-MM-DD (leave requests)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of leave, YYYY-MM-DD (leave requests)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    #[command(flatten)]
    pub signature: SignatureArgs,

    /// Prompt for each field
    #[arg(long, short = 'i')]
    pub interactive: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// List every staff member's requests (requires a reviewer capability)
    #[arg(long, conflicts_with = "owner")]
    pub all: bool,

    /// List this staff member's requests instead of your own
    #[arg(long)]
    pub owner: Option<String>,

    /// Filter by status
    #[arg(long, short = 's', value_enum, default_value_t = StatusFilter::All)]
    pub status: StatusFilter,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Requests per page (at most 100)
    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: u32,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Request id or unique prefix
    pub id: String,
}

pub fn run(cmd: RequestCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RequestCommands::New(args) => run_new(args, global),
        RequestCommands::List(args) => run_list(args, global),
        RequestCommands::Show(args) => run_show(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let owner = session.actor()?.to_string();
    let engine = session.engine()?;

    let input = if args.interactive {
        prompt_request(&owner, &args)?
    } else {
        let Some(kind) = args.kind else {
            bail!("--kind is required");
        };
        let mut input = NewRequest::new(
            owner,
            kind.into(),
            args.title.clone().unwrap_or_default(),
            args.signature.require()?,
        );
        input.description = args.description.clone();
        input.amount = args.amount;
        if let (Some(start), Some(end)) = (args.start, args.end) {
            input = input.with_period(start, end);
        }
        input
    };

    let request = engine.create_request(input).map_err(workflow_report)?;

    match global.output {
        OutputFormat::Json => print_json(&request),
        OutputFormat::Yaml => print_yaml(&request),
        OutputFormat::Tsv | OutputFormat::Csv => {
            println!("{}", request.id);
            Ok(())
        }
        _ => {
            println!(
                "{} Created {} {}",
                style("✓").green(),
                request.kind.heading().to_lowercase(),
                style(request.id.short()).cyan()
            );
            println!("   {}", style(request.id).dim());
            Ok(())
        }
    }
}

fn prompt_request(owner: &str, args: &NewArgs) -> Result<NewRequest> {
    let theme = ColorfulTheme::default();

    let kinds = &[
        "leave   - time off between two dates",
        "advance - cash advance",
        "other   - anything else",
    ];
    let kind = match Select::with_theme(&theme)
        .with_prompt("Request kind")
        .items(kinds)
        .default(0)
        .interact()
        .into_diagnostic()?
    {
        0 => RequestKind::Leave,
        1 => RequestKind::Advance,
        _ => RequestKind::Other,
    };

    let title: String = Input::with_theme(&theme)
        .with_prompt("Title")
        .interact_text()
        .into_diagnostic()?;

    let description: String = Input::with_theme(&theme)
        .with_prompt("Details (optional)")
        .allow_empty(true)
        .interact_text()
        .into_diagnostic()?;

    let signature = match args.signature.reference()? {
        Some(reference) => reference,
        None => Input::with_theme(&theme)
            .with_prompt("Signature reference")
            .interact_text()
            .into_diagnostic()?,
    };

    let mut input = NewRequest::new(owner, kind, title, signature).with_description(description);
    match kind {
        RequestKind::Leave => {
            let start: NaiveDate = Input::with_theme(&theme)
                .with_prompt("First day (YYYY-MM-DD)")
                .interact_text()
                .into_diagnostic()?;
            let end: NaiveDate = Input::with_theme(&theme)
                .with_prompt("Last day (YYYY-MM-DD)")
                .default(start)
                .interact_text()
                .into_diagnostic()?;
            input = input.with_period(start, end);
        }
        RequestKind::Advance => {
            let amount: Decimal = Input::with_theme(&theme)
                .with_prompt("Amount")
                .interact_text()
                .into_diagnostic()?;
            input = input.with_amount(amount);
        }
        RequestKind::Other => {}
    }
    Ok(input)
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let caller = session.actor()?;
    let engine = session.engine()?;

    let mut filter = if args.all {
        RequestFilter::all()
    } else {
        RequestFilter::owner(args.owner.as_deref().unwrap_or(caller))
    };
    if let Some(status) = args.status.status() {
        filter = filter.with_status(status);
    }
    let filter = filter.with_page(args.page, args.per_page);

    let page = engine
        .list_requests(caller, &filter)
        .map_err(workflow_report)?;
    print_request_page(&page, global.output)
}

/// Request details with the caller's view of what happens next
#[derive(Serialize)]
struct ShowView<'a> {
    #[serde(flatten)]
    record: &'a RequestRecord,
    awaiting_stage: Option<Stage>,
    available_stage: Option<Stage>,
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let caller = session.actor()?;
    let engine = session.engine()?;
    let id = resolve_id(&engine, &args.id)?;

    let record = engine.get_request(id, caller).map_err(workflow_report)?;
    let view = ShowView {
        record: &record,
        awaiting_stage: record.request.status.awaiting_stage(),
        available_stage: engine.available_stage(&record, caller),
    };

    match effective_format(global.output, false) {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Yaml => print_yaml(&view),
        _ => {
            print_record(&view);
            Ok(())
        }
    }
}

fn print_record(view: &ShowView<'_>) {
    let request = &view.record.request;

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(request.id).cyan());
    println!("{}: {}", style("Kind").bold(), request.kind.heading());
    println!("{}: {}", style("Title").bold(), style(&request.title).yellow());
    println!(
        "{}: {} ({})",
        style("Status").bold(),
        request.status,
        request.status.label()
    );
    println!("{}: {}", style("Owner").bold(), request.owner_staff_id);
    if let Some(amount) = request.amount {
        println!("{}: {}", style("Amount").bold(), amount);
    }
    if let Some(period) = request.period {
        println!(
            "{}: {} to {} ({} days)",
            style("Period").bold(),
            period.start,
            period.end,
            period.days()
        );
    }
    if let Some(description) = &request.description {
        println!("{}", style("─".repeat(60)).dim());
        println!("{}", description);
    }

    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Approvals:").bold());
    if view.record.approvals.is_empty() {
        println!("  {}", style("none yet").dim());
    }
    for approval in &view.record.approvals {
        print_approval(approval);
    }

    match (view.awaiting_stage, view.available_stage) {
        (Some(stage), Some(_)) => println!(
            "\n{} You can decide the {} stage: {} / {}",
            style("→").cyan(),
            stage.title(),
            style(format!("hrw approve {} --stage {}", request.id.short(), stage_arg(stage))).yellow(),
            style(format!("hrw reject {} --stage {}", request.id.short(), stage_arg(stage))).yellow(),
        ),
        (Some(stage), None) => println!(
            "\n{} Awaiting {} decision",
            style("…").dim(),
            stage.title()
        ),
        (None, _) => println!("\n{} Closed", style("■").dim()),
    }
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {}",
        style("Created").dim(),
        format_time(request.created_at)
    );
}

fn print_approval(approval: &Approval) {
    let decision = match approval.decision {
        Decision::Approved => style(approval.decision.as_str()).green(),
        Decision::Rejected => style(approval.decision.as_str()).red(),
    };
    println!(
        "  {} {} by {} at {}",
        style(approval.stage.title()).bold(),
        decision,
        approval.approver_id,
        format_time(approval.created_at)
    );
    println!("    {}: {}", style("signature").dim(), approval.signature);
    if let Some(notes) = &approval.notes {
        println!("    {}: {}", style("notes").dim(), notes);
    }
}

fn stage_arg(stage: Stage) -> &'static str {
    match stage {
        Stage::SalesManager => "sales",
        Stage::HrManager => "hr",
    }
}
