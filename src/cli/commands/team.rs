//! `hrw team` command - Team roster management

use clap::{Args, Subcommand};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{bail, IntoDiagnostic, Result};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::helpers::Session;
use crate::cli::output::{effective_format, print_json, print_yaml};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::authz::{is_known_capability, KNOWN_CAPABILITIES};
use crate::core::team::{TeamMember, TeamRoster};

/// Team roster management
#[derive(Debug, Subcommand)]
pub enum TeamCommands {
    /// List team members
    List(TeamListArgs),
    /// Show the acting staff member and their capabilities
    Whoami,
    /// Add a team member
    Add(TeamAddArgs),
    /// Remove a team member
    Remove(TeamRemoveArgs),
    /// Grant a capability to a member
    Grant(CapabilityArgs),
    /// Revoke a capability from a member
    Revoke(CapabilityArgs),
}

#[derive(Debug, Args)]
pub struct TeamListArgs {
    /// Only members holding this capability
    #[arg(long, short = 'c', value_parser = capability_code)]
    pub capability: Option<String>,

    /// Include inactive members
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct TeamAddArgs {
    /// Staff id
    pub id: String,

    /// Full name
    #[arg(long)]
    pub name: String,

    /// Email address
    #[arg(long)]
    pub email: Option<String>,

    /// Capabilities (comma-separated, e.g. approve-sales,manage-hr)
    #[arg(long = "capability", value_delimiter = ',', value_parser = capability_code)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Args)]
pub struct TeamRemoveArgs {
    /// Staff id to remove
    pub id: String,

    /// Skip confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct CapabilityArgs {
    /// Staff id
    pub id: String,

    /// Capability code
    #[arg(value_parser = capability_code)]
    pub capability: String,
}

/// Any non-blank code; the catalog lives in the roster
fn capability_code(s: &str) -> std::result::Result<String, String> {
    let code = s.trim();
    if code.is_empty() {
        return Err("capability code must not be empty".to_string());
    }
    Ok(code.to_string())
}

fn warn_unknown_capability(code: &str) {
    if !is_known_capability(code) {
        eprintln!(
            "{} '{}' is not checked by the workflow (known: {})",
            style("!").yellow(),
            code,
            KNOWN_CAPABILITIES.join(", ")
        );
    }
}

impl TeamCommands {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        match self {
            TeamCommands::List(args) => args.run(global),
            TeamCommands::Whoami => run_whoami(global),
            TeamCommands::Add(args) => args.run(global),
            TeamCommands::Remove(args) => args.run(global),
            TeamCommands::Grant(args) => args.run(global, true),
            TeamCommands::Revoke(args) => args.run(global, false),
        }
    }
}

#[derive(Tabled)]
struct MemberRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "EMAIL")]
    email: String,
    #[tabled(rename = "CAPABILITIES")]
    capabilities: String,
    #[tabled(rename = "ACTIVE")]
    active: bool,
}

impl TeamListArgs {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        let session = Session::open(global)?;
        let roster = session.roster()?;

        let members: Vec<&TeamMember> = match &self.capability {
            Some(cap) => roster.members_with_capability(cap).collect(),
            None if self.all => roster.members.iter().collect(),
            None => roster.active_members().collect(),
        };

        match effective_format(global.output, false) {
            OutputFormat::Json => return print_json(&members),
            OutputFormat::Yaml => return print_yaml(&members),
            _ => {}
        }

        if members.is_empty() {
            println!("No team members found.");
            return Ok(());
        }

        let rows: Vec<MemberRow> = members
            .iter()
            .map(|m| MemberRow {
                id: m.id.clone(),
                name: m.name.clone(),
                email: m.email.clone(),
                capabilities: m.capabilities.join(", "),
                active: m.active,
            })
            .collect();

        if global.output == OutputFormat::Tsv {
            for row in &rows {
                println!(
                    "{}\t{}\t{}\t{}",
                    row.id, row.name, row.email, row.capabilities
                );
            }
        } else {
            let mut table = Table::new(rows);
            table.with(Style::sharp());
            println!("{}", table);
        }
        Ok(())
    }
}

fn run_whoami(global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let Some(actor) = session.actor_opt() else {
        println!("No acting staff member configured.");
        println!(
            "Use {}, set HRW_ACTOR, or set 'actor' in .hrw/config.yaml",
            style("--as <staff-id>").yellow()
        );
        return Ok(());
    };

    let roster = session.roster()?;
    match roster.find(actor) {
        Some(member) => {
            println!("{} ({})", style(&member.name).bold(), style(&member.id).cyan());
            if !member.email.is_empty() {
                println!("  Email: {}", member.email);
            }
            if member.capabilities.is_empty() {
                println!("  Capabilities: {}", style("none").dim());
            } else {
                println!("  Capabilities: {}", member.capabilities.join(", "));
            }
            if !member.active {
                println!("  {}", style("inactive - holds no capabilities").yellow());
            }
        }
        None => {
            println!("{} (not in team roster)", style(actor).cyan());
        }
    }
    Ok(())
}

impl TeamAddArgs {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        let session = Session::open(global)?;
        let path = session.project.team_path();
        let mut roster = TeamRoster::load(&path).into_diagnostic()?;

        let mut member = TeamMember::new(&self.id, &self.name);
        member.email = self.email.clone().unwrap_or_default();
        for cap in &self.capabilities {
            warn_unknown_capability(cap);
            if !member.capabilities.contains(cap) {
                member.capabilities.push(cap.clone());
            }
        }

        roster.add(member).into_diagnostic()?;
        roster.save(&path).into_diagnostic()?;

        println!(
            "{} Added {} ({})",
            style("✓").green(),
            style(&self.name).bold(),
            style(&self.id).cyan()
        );
        Ok(())
    }
}

impl TeamRemoveArgs {
    pub fn run(&self, global: &GlobalOpts) -> Result<()> {
        let session = Session::open(global)?;
        let path = session.project.team_path();
        let mut roster = TeamRoster::load(&path).into_diagnostic()?;

        if roster.find(&self.id).is_none() {
            bail!("Team member not found: {}", self.id);
        }

        if !self.yes {
            let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Remove {} from the team roster?", self.id))
                .default(false)
                .interact()
                .into_diagnostic()?;
            if !confirmed {
                println!("Cancelled.");
                return Ok(());
            }
        }

        let removed = roster.remove(&self.id).into_diagnostic()?;
        roster.save(&path).into_diagnostic()?;
        println!(
            "{} Removed {} ({})",
            style("✓").green(),
            removed.name,
            style(&removed.id).cyan()
        );
        Ok(())
    }
}

impl CapabilityArgs {
    pub fn run(&self, global: &GlobalOpts, grant: bool) -> Result<()> {
        let session = Session::open(global)?;
        let path = session.project.team_path();
        let mut roster = TeamRoster::load(&path).into_diagnostic()?;

        let Some(member) = roster.members.iter_mut().find(|m| m.id == self.id) else {
            bail!("Team member not found: {}", self.id);
        };

        if grant {
            warn_unknown_capability(&self.capability);
        }
        let held = member.capabilities.contains(&self.capability);
        match (grant, held) {
            (true, false) => member.capabilities.push(self.capability.clone()),
            (false, true) => member.capabilities.retain(|c| c != &self.capability),
            _ => {
                println!(
                    "{} {} {} {}",
                    style("!").yellow(),
                    self.id,
                    if held { "already holds" } else { "does not hold" },
                    self.capability
                );
                return Ok(());
            }
        }
        roster.save(&path).into_diagnostic()?;

        println!(
            "{} {} {} {} {}",
            style("✓").green(),
            if grant { "Granted" } else { "Revoked" },
            style(&self.capability).yellow(),
            if grant { "to" } else { "from" },
            style(&self.id).cyan()
        );
        Ok(())
    }
}
