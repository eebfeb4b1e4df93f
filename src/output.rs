use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{ProgressEvent, ProgressSink, RunReport};
use crate::domain::GenomeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub accession: String,
    pub title: Option<String>,
    pub pattern: GenomeType,
    pub signals: GenomeType,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_classifications(items: &[Classification]) -> io::Result<()> {
        Self::print_json(&items)
    }

    pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards pipeline progress to the log.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

pub fn print_run_summary(report: &RunReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}kira-gr summary{reset}");
    println!(
        "  accessions: {} read, {} considered, {} filtered out",
        report.requested,
        report.considered,
        report.filtered_out.len()
    );
    println!("{green}  downloaded: {}{reset}", report.downloaded);
    if !report.failed.is_empty() {
        println!("{red}  failed: {}{reset}", report.failed.len());
        for outcome in &report.failed {
            println!(
                "{red}    {} {}{reset}",
                outcome.accession,
                outcome.error.as_deref().unwrap_or("")
            );
        }
    }
    if report.metadata_shell {
        println!("{yellow}  metadata: none resolved, wrote empty table{reset}");
    } else {
        println!(
            "{green}  metadata: {} resolved, {} unresolved{reset}",
            report.resolved,
            report.unresolved.len()
        );
    }
    println!("  artifact: {}", report.metadata_path);
    println!(
        "  batches: {}, elapsed {:.1}s",
        report.batches.len(),
        report.elapsed_ms as f64 / 1000.0
    );
}

pub fn print_classification_table(items: &[Classification]) {
    println!("{:<28} {:<10} {:<10}", "accession", "pattern", "signals");
    for item in items {
        println!(
            "{:<28} {:<10} {:<10}",
            item.accession,
            item.pattern.as_str(),
            item.signals.as_str()
        );
    }
}
