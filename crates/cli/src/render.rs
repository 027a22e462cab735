//! Terminal rendering of progress records and reports.

use anyhow::Result;
use std::time::Duration;
use tempo_core::{CountdownReport, GroupReport, Progress, ProgressKind, UnitOutcome};
use tempo_execution::Observer;

/// Prints progress as it happens, either as text or as JSON lines.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    json: bool,
    unit: Duration,
}

impl Renderer {
    pub fn new(json: bool, unit: Duration) -> Self {
        Self { json, unit }
    }

    /// Text line for a progress record; `None` when nothing is shown.
    pub fn line(&self, progress: &Progress) -> Option<String> {
        match &progress.kind {
            ProgressKind::Tick { value } => Some(format!("T minus {} seconds", value)),
            ProgressKind::Milestone { .. } => Some(format!("  → {}", progress.label)),
            ProgressKind::Event { delay } => Some(format!(
                "⏰ [T+{}s] {}",
                self.in_units(*delay),
                progress.label
            )),
            ProgressKind::Task { succeeded: false } => {
                Some(format!("✗ {}: failed", progress.label))
            }
            ProgressKind::Task { succeeded: true } => None,
        }
    }

    /// Print a line spoken by a task, unless JSON output is requested.
    pub fn say(&self, who: &str, line: &str) {
        if !self.json {
            println!("{}: {}", who, line);
        }
    }

    /// Print the final report of a countdown.
    pub fn countdown_report(&self, report: &CountdownReport) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }

        println!();
        if report.is_complete() {
            println!("Countdown from {} complete", report.start);
        } else if let Some(at) = report.interrupted_at {
            let reason = if report.timed_out { "timed out" } else { "interrupted" };
            println!("Countdown {} at {}", reason, at);
            if !report.skipped.is_empty() {
                println!("  Skipped: {}", report.skipped.join(", "));
            }
        }
        for failure in &report.tick_failures {
            println!("  Tick {} failed: {}", failure.value, failure.error);
        }
        for (label, error) in report.failed_milestones() {
            println!("  {} failed: {}", label, error);
        }
        Ok(())
    }

    /// Print the final report of an event or task group.
    pub fn group_report(&self, report: &GroupReport) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }

        println!("{}", "=".repeat(50));
        for unit in &report.units {
            let status = match &unit.outcome {
                UnitOutcome::Succeeded => "ok".to_string(),
                UnitOutcome::Failed { error } => format!("failed: {}", error),
                UnitOutcome::Interrupted => "skipped".to_string(),
            };
            println!("  {:<32} {}", unit.label, status);
        }
        if report.timed_out {
            println!("Deadline expired after {:?}", report.elapsed);
        } else if report.cancelled {
            println!("Cancelled after {:?}", report.elapsed);
        } else {
            println!(
                "{}/{} succeeded in {:?}",
                report.succeeded().len(),
                report.units.len(),
                report.elapsed
            );
        }
        Ok(())
    }

    fn in_units(&self, delay: Duration) -> f64 {
        if self.unit.is_zero() {
            return delay.as_secs_f64();
        }
        let units = delay.as_secs_f64() / self.unit.as_secs_f64();
        (units * 1000.0).round() / 1000.0
    }
}

impl Observer for Renderer {
    fn observe(&self, progress: &Progress) {
        if self.json {
            match serde_json::to_string(progress) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to encode progress: {}", e),
            }
        } else if let Some(line) = self.line(progress) {
            println!("{}", line);
        }
    }
}
