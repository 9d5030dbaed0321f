//! `hrw export` command - Render a closed request as a document

use console::style;
use miette::{miette, IntoDiagnostic, Result};
use std::io::Write;
use std::path::PathBuf;

use crate::cli::helpers::{export_report, resolve_id, Session};
use crate::cli::GlobalOpts;
use crate::core::export::{export_request, TextExporter};

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Request id or unique prefix
    pub id: String,

    /// Write the document to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let caller = session.actor()?;
    let engine = session.engine()?;
    let id = resolve_id(&engine, &args.id)?;

    let template = session
        .config
        .export
        .template
        .as_ref()
        .map(|p| session.project.resolve(p));
    let exporter = TextExporter::with_override(template.as_deref()).map_err(export_report)?;

    let document = export_request(&engine, &exporter, id, caller).map_err(export_report)?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, &document)
                .map_err(|e| miette!("Failed to write {}: {}", path.display(), e))?;
            eprintln!(
                "{} Exported {} to {}",
                style("✓").green(),
                style(id.short()).cyan(),
                style(path.display()).dim()
            );
        }
        None => {
            std::io::stdout().write_all(&document).into_diagnostic()?;
        }
    }
    Ok(())
}
