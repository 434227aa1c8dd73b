//! Terminal output for the `metarev` commands.

use colored::Colorize;
use metarev::render::{line_diff, LineOp};
use metarev::{DiffSection, RestoreReport};
use metarev_store::{RecordInfo, RecordKind};
use serde_json::Value;

pub fn values(values: &[Value]) {
    if values.is_empty() {
        println!("{}", "(not found)".dimmed());
        return;
    }
    for value in values {
        println!("{value}");
    }
}

pub fn record_line(info: &RecordInfo, current: bool) {
    let kind = match info.kind {
        RecordKind::Live => "live".to_string(),
        RecordKind::Revision { .. } => "revision".to_string(),
        RecordKind::Autosave { .. } => "autosave".yellow().to_string(),
    };
    let marker = if current { " (current)".green().to_string() } else { String::new() };
    println!(
        "{:>6}  {:<9} {}{}",
        info.id.to_string().bold(),
        kind,
        info.created_at.format("%Y-%m-%d %H:%M:%S"),
        marker
    );
}

pub fn restore_report(report: &RestoreReport) {
    for key in &report.restored {
        println!("{} {}", "restored".green().bold(), key);
    }
    for key in &report.deleted {
        println!("{} {}", "deleted".red().bold(), key);
    }
}

/// Print diff sections as colored line diffs, or as the renderer's tables with `html`.
pub fn diff_sections(sections: &[DiffSection], html: bool) {
    if sections.is_empty() {
        println!("{}", "No tracked field differs.".dimmed());
        return;
    }
    for section in sections {
        println!("{}", format!("== {} ==", section.name).bold());
        for field in &section.fields {
            println!("{} ({})", field.label.cyan().bold(), field.key);
            if html {
                println!("{}", field.rendered);
                continue;
            }
            for (op, line) in line_diff(&field.from, &field.to) {
                match op {
                    LineOp::Equal => println!("  {line}"),
                    LineOp::Delete => println!("{}", format!("- {line}").red()),
                    LineOp::Insert => println!("{}", format!("+ {line}").green()),
                }
            }
        }
    }
}
