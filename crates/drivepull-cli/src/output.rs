//! Report output
//!
//! Two formatters share one trait: [`HumanFormatter`] prints marks and
//! indented lines, [`JsonFormatter`] prints machine-readable objects.

use anyhow::{Context, Result};
use drivepull_sync::stats::Counts;
use drivepull_sync::{PullReport, RunOutcome};
use serde_json::json;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
    fn is_json(&self) -> bool {
        false
    }
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({"success": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", json!({"success": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
    fn is_json(&self) -> bool {
        true
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

// ============================================================================
// Report rendering
// ============================================================================

/// Machine-readable form of a report
pub fn report_json(report: &PullReport) -> Result<serde_json::Value> {
    let failures: Vec<serde_json::Value> = report
        .failures()
        .into_iter()
        .map(|f| {
            json!({
                "id": f.id.as_str(),
                "path": f.path,
                "attempts": f.attempts,
                "error": f.failure.map(|e| e.to_string()),
            })
        })
        .collect();
    Ok(json!({
        "success": report.is_success(),
        "outcome": serde_json::to_value(&report.outcome).context("Failed to serialize outcome")?,
        "stats": serde_json::to_value(&report.stats).context("Failed to serialize statistics")?,
        "failures": failures,
    }))
}

fn counts_line(label: &str, counts: &Counts) -> String {
    format!(
        "{label:<11}{} (files {}, dirs {}, {} bytes)",
        counts.total, counts.files, counts.dirs, counts.size
    )
}

/// Prints the final report through `formatter`
pub fn print_report(formatter: &dyn OutputFormatter, report: &PullReport) -> Result<()> {
    if formatter.is_json() {
        formatter.print_json(&report_json(report)?);
        return Ok(());
    }

    let stats = &report.stats;
    let source = stats.source_root.as_ref().map_or("?", |e| e.path.as_str());
    let dest = stats
        .dest_root
        .as_ref()
        .map_or_else(|| "?".to_string(), |e| format!("{} (id {})", e.path, e.id));
    match &report.outcome {
        RunOutcome::Completed if report.is_success() => {
            formatter.success(&format!("Pulled {source} into {dest}"));
        }
        RunOutcome::Completed => formatter.warn(&format!(
            "Pulled {source} into {dest} with {} failed task(s)",
            stats.failed.total
        )),
        RunOutcome::Interrupted => formatter.warn("Pull interrupted before completion"),
        RunOutcome::Aborted(reason) => formatter.error(&format!("Pull aborted: {reason}")),
    }

    formatter.info(&counts_line("tasks:", &stats.tasks));
    formatter.info(&counts_line("success:", &stats.success));
    formatter.info(&counts_line("failed:", &stats.failed));
    formatter.info(&counts_line("unfinished:", &stats.unfinished));
    formatter.info(&format!(
        "{:<11}{} (files {}, dirs {})",
        "retries:", stats.retry.total, stats.retry.files, stats.retry.dirs
    ));
    if stats.errors.total > 0 {
        let reasons: Vec<String> = stats
            .errors
            .reasons
            .iter()
            .map(|(kind, n)| format!("{kind} {n}"))
            .collect();
        formatter.info(&format!(
            "{:<11}{} ({})",
            "errors:",
            stats.errors.total,
            reasons.join(", ")
        ));
    }
    formatter.info(&format!("{:<11}{:.2}s", "elapsed:", stats.elapsed.as_secs_f64()));

    let failures = report.failures();
    if !failures.is_empty() {
        formatter.info("");
        formatter.info("Failed entries:");
        for failed in failures {
            let error = failed
                .failure
                .map_or_else(|| "unknown error".to_string(), |e| e.to_string());
            formatter.info(&format!(
                "  {} ({} attempt(s)): {error}",
                failed.path, failed.attempts
            ));
        }
    }
    Ok(())
}
