//! Text and JSON rendering of command results.

use crate::compliance::ComplianceReport;
use crate::error::{ConformError, Result};
use crate::remediation::{BatchReport, BatchStatus, Outcome, RemediationRun, ScanEntry};
use crate::template::{render_tree, Template};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

/// Bold, underlined section heading.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn to_pretty_json(value: &serde_json::Value) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(ConformError::from)
}

pub fn format_template_text(template: &Template, max_depth: usize) -> Result<String> {
    let mut out = format!(
        "{}\n\n",
        format_section_heading(&format!("Template {}", template.repo()))
    );
    out.push_str(&template.render(max_depth)?);
    out.push_str(&format!(
        "\n{} files in {} directories\n",
        template.file_list().len(),
        template.directories().len()
    ));
    Ok(out)
}

pub fn format_template_json(template: &Template) -> Result<String> {
    to_pretty_json(&json!({
        "template": template.repo().full_name(),
        "files": template.file_list(),
        "structure": template.structure().to_json(),
    }))
}

pub fn format_report_text(report: &ComplianceReport) -> String {
    let mut out = format!(
        "{}\n\n",
        format_section_heading(&format!("Compliance of {}", report.repo))
    );
    match &report.diff {
        None => out.push_str(&format!(
            "{} with template {}\n",
            "Compliant".green(),
            report.template
        )),
        Some(diff) => {
            out.push_str(&format!(
                "{} at least {} files from template {}\n\n",
                "Missing".red(),
                report.missing_count,
                report.template
            ));
            // Diff trees are never deeper than the template, so no limit here.
            if let Ok(rendered) = render_tree(diff, usize::MAX) {
                out.push_str(&rendered);
            }
        }
    }
    out
}

pub fn format_report_json(report: &ComplianceReport) -> Result<String> {
    to_pretty_json(&report.to_json())
}

pub fn format_scan_text(entries: &[ScanEntry]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Repository", "Status", "Missing"]);
    let mut compliant = 0;
    for entry in entries {
        let (status, missing) = match (&entry.report, &entry.error) {
            (Some(report), _) if report.is_compliant() => {
                compliant += 1;
                ("compliant".to_string(), "-".to_string())
            }
            (Some(report), _) => ("missing".to_string(), report.missing_count.to_string()),
            (None, error) => (
                format!("error: {}", error.as_deref().unwrap_or("unknown")),
                "-".to_string(),
            ),
        };
        table.add_row(vec![entry.repo.full_name(), status, missing]);
    }
    format!(
        "{}\n\n{}\n\n{} of {} repositories compliant\n",
        format_section_heading("Scan"),
        table,
        compliant,
        entries.len()
    )
}

pub fn format_scan_json(entries: &[ScanEntry]) -> Result<String> {
    let rows: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| match &entry.report {
            Some(report) => report.to_json(),
            None => json!({
                "repository": entry.repo.full_name(),
                "error": entry.error,
            }),
        })
        .collect();
    to_pretty_json(&json!(rows))
}

pub fn format_run_text(run: &RemediationRun) -> String {
    match &run.outcome {
        Outcome::Done {
            pull_request,
            updated,
            written,
        } => {
            let verb = if *updated { "Updated" } else { "Opened" };
            let mut out = format!(
                "{} pull request #{} for {}: {}\n",
                verb, pull_request.number, run.target, pull_request.html_url
            );
            for path in written {
                out.push_str(&format!("  + {}\n", path));
            }
            out
        }
        Outcome::Aborted(reason) => format!("Skipped {}: {}\n", run.target, reason),
    }
}

pub fn format_batch_text(report: &BatchReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Repository", "Result", "Detail"]);
    for entry in &report.entries {
        let (result, detail) = match &entry.status {
            BatchStatus::Compliant => ("compliant".to_string(), String::new()),
            BatchStatus::Archived => ("archived".to_string(), String::new()),
            BatchStatus::Remediated {
                url,
                updated,
                files,
            } => (
                if *updated { "updated" } else { "opened" }.to_string(),
                format!("{} ({} new files)", url, files),
            ),
            BatchStatus::Aborted { reason } => ("skipped".to_string(), reason.to_string()),
            BatchStatus::Failed { cause } => (format!("{}", "failed".red()), cause.clone()),
        };
        table.add_row(vec![entry.repo.full_name(), result, detail]);
    }
    let mut out = format!("{}\n\n{}\n", format_section_heading("Batch"), table);
    if report.quit {
        out.push_str("\nStopped early at operator request.\n");
    }
    out
}

pub fn format_batch_json(report: &BatchReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(ConformError::from)
}
