//! Output formatting utilities

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::helpers::{format_time, truncate_str};
use crate::cli::OutputFormat;
use crate::core::request::HrRequest;
use crate::core::store::Page;
use crate::core::timeline::TimelineEvent;

/// Determine the effective output format based on context
pub fn effective_format(format: OutputFormat, is_list: bool) -> OutputFormat {
    match format {
        OutputFormat::Auto => {
            if is_list {
                OutputFormat::Tsv
            } else {
                OutputFormat::Table
            }
        }
        other => other,
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

pub fn print_yaml<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    print!("{}", serde_yml::to_string(value).into_diagnostic()?);
    Ok(())
}

/// Rows as TSV, CSV or a drawn table
fn print_rows<R: Tabled>(rows: Vec<R>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer
                .write_record(R::headers().iter().map(|h| h.as_bytes()))
                .into_diagnostic()?;
            for row in &rows {
                writer
                    .write_record(row.fields().iter().map(|f| f.as_bytes()))
                    .into_diagnostic()?;
            }
            writer.flush().into_diagnostic()?;
        }
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::sharp());
            println!("{}", table);
        }
        _ => {
            println!("{}", R::headers().join("\t"));
            for row in &rows {
                println!("{}", row.fields().join("\t"));
            }
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct RequestRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "TITLE")]
    title: String,
    #[tabled(rename = "OWNER")]
    owner: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "CREATED")]
    created: String,
}

impl RequestRow {
    fn new(request: &HrRequest, full_id: bool) -> Self {
        Self {
            id: if full_id {
                request.id.to_string()
            } else {
                request.id.short()
            },
            kind: request.kind.to_string(),
            title: if full_id {
                request.title.clone()
            } else {
                truncate_str(&request.title, 40)
            },
            owner: request.owner_staff_id.clone(),
            status: request.status.to_string(),
            created: format_time(request.created_at),
        }
    }
}

/// Print a page of requests
pub fn print_request_page(page: &Page<HrRequest>, format: OutputFormat) -> Result<()> {
    match effective_format(format, true) {
        OutputFormat::Json => print_json(page),
        OutputFormat::Yaml => print_yaml(page),
        OutputFormat::Table => {
            if page.items.is_empty() {
                println!("No requests found.");
                return Ok(());
            }
            let rows = page.items.iter().map(|r| RequestRow::new(r, false)).collect();
            print_rows::<RequestRow>(rows, OutputFormat::Table)?;
            let pages = page.total.div_ceil(u64::from(page.per_page.max(1))).max(1);
            println!(
                "{} request(s), page {} of {}",
                style(page.total).cyan(),
                page.page,
                pages
            );
            Ok(())
        }
        other => {
            let rows = page.items.iter().map(|r| RequestRow::new(r, true)).collect();
            print_rows::<RequestRow>(rows, other)
        }
    }
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "EVENT")]
    event: String,
    #[tabled(rename = "ACTOR")]
    actor: String,
    #[tabled(rename = "SIGNATURE")]
    signature: String,
    #[tabled(rename = "NOTES")]
    notes: String,
}

/// Print a request timeline
pub fn print_timeline(events: &[TimelineEvent], format: OutputFormat) -> Result<()> {
    match effective_format(format, true) {
        OutputFormat::Json => print_json(events),
        OutputFormat::Yaml => print_yaml(events),
        other => {
            let rows = events
                .iter()
                .map(|e| EventRow {
                    time: e.timestamp.to_rfc3339(),
                    event: e.summary(),
                    actor: e.actor_id.clone(),
                    signature: e.signature.clone(),
                    notes: e.notes.clone().unwrap_or_default(),
                })
                .collect();
            print_rows::<EventRow>(rows, other)
        }
    }
}
