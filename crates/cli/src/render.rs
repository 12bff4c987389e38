//! Terminal rendering of engine events and run reports.

use colored::*;
use mp_core::engine::RunReport;
use mp_core::registry::StepRegistry;
use mp_core::remote::StepError;
use mp_protocol::{
    ArtifactSet, CompletionRule, Event, OutcomeKind, ProgressSnapshot, RunStatus, StepKey,
    StepState, StepStatus,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Prints events as they arrive until every sender is gone.
pub async fn render_events(mut events_rx: UnboundedReceiver<Event>, verbose: bool) {
    let mut last_percent: std::collections::HashMap<StepKey, i64> = Default::default();

    while let Some(event) = events_rx.recv().await {
        match event {
            Event::RunStarted { project_id, steps, .. } => {
                println!(
                    "{} {} ({} steps)",
                    "Running pipeline for".bold(),
                    project_id.bold().cyan(),
                    steps.len()
                );
            }
            Event::StepStatusUpdate { step, status, .. } => {
                last_percent.remove(&step);
                println!("  {:<20} {}", step.label(), status_line(&status));
            }
            Event::StepProgressUpdate {
                step,
                percent,
                message,
                ..
            } => {
                // One line per whole five percent is plenty for a terminal.
                let bucket = (percent / 5.0).floor() as i64;
                if last_percent.insert(step, bucket) == Some(bucket) {
                    continue;
                }
                let detail = message.unwrap_or_default();
                println!(
                    "  {:<20} {} {}",
                    step.label(),
                    format!("{percent:>5.1}%").yellow(),
                    detail.dimmed()
                );
            }
            Event::RunLogLine { entry, .. } => {
                if verbose {
                    println!(
                        "    {} {}",
                        entry.at.format("%H:%M:%S").to_string().dimmed(),
                        entry.message.dimmed()
                    );
                }
            }
            // The prompt answerer prints the question itself.
            Event::ConfirmationRequested { .. } => {}
            Event::RunFinished { status, .. } => {
                println!("{} {}", "Run finished:".bold(), run_status(status));
            }
        }
    }
}

fn status_line(status: &StepStatus) -> String {
    let message = status.message.clone().unwrap_or_default();
    match status.status {
        StepState::Idle => format!("{} {}", "idle".dimmed(), message),
        StepState::Running => format!("{} {}", "running".yellow().bold(), message),
        StepState::Success => format!("{} {}", "success".green().bold(), message),
        StepState::Error => format!("{} {}", "error".red().bold(), message.red()),
    }
}

fn run_status(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Completed => "completed".green().bold(),
        RunStatus::Failed => "failed".red().bold(),
        RunStatus::Halted => "halted".yellow().bold(),
    }
}

/// Per-step table printed after a run.
pub fn print_report(report: &RunReport) {
    let summary = report.summary();
    println!();
    println!(
        "{} {} ({})",
        "Summary for".bold(),
        summary.project_id.bold(),
        run_status(summary.status)
    );
    for step in &summary.steps {
        let outcome = match step.outcome {
            OutcomeKind::Succeeded => "succeeded".green(),
            OutcomeKind::Skipped => "skipped".cyan(),
            OutcomeKind::Failed => "failed".red(),
        };
        println!(
            "  {:<20} {:<10} {:>3} calls  {}",
            step.step.label(),
            outcome,
            step.calls,
            step.message
        );
    }
    let elapsed = summary.completed_at - summary.started_at;
    println!("  finished in {}s", elapsed.num_seconds());
}

/// Registry listing for `mpipe steps`.
pub fn print_steps(registry: &StepRegistry) {
    println!(
        "{:<20} {:<20} {:<9} {:<9} {}",
        "KEY".bold(),
        "LABEL".bold(),
        "POLLABLE".bold(),
        "RESUMABLE".bold(),
        "OUTPUT".bold()
    );
    for step in registry.iter() {
        let output = match &step.completion {
            CompletionRule::AllOf(names) => names.join(" + "),
            CompletionRule::AnyOf(names) => names.join(" | "),
            CompletionRule::Never => "-".to_string(),
        };
        println!(
            "{:<20} {:<20} {:<9} {:<9} {}",
            step.key.as_str(),
            step.label,
            yes_no(step.is_pollable()),
            yes_no(step.resumable),
            output
        );
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Artifact listing and progress readings for `mpipe status`.
pub fn print_status(
    project_id: &str,
    artifacts: Result<ArtifactSet, StepError>,
    progress: &[(StepKey, Result<ProgressSnapshot, StepError>)],
) {
    println!("{} {}", "Project".bold(), project_id.bold().cyan());

    match artifacts {
        Ok(names) if names.is_empty() => println!("  {}", "no artifacts yet".dimmed()),
        Ok(names) => {
            println!("  {}", "Artifacts:".bold());
            for name in names {
                println!("    {name}");
            }
        }
        Err(e) => println!("  {} {}", "artifacts unavailable:".red(), e),
    }

    println!("  {}", "Progress:".bold());
    for (step, reading) in progress {
        match reading {
            Ok(snapshot) => {
                let done = if snapshot.has_result() {
                    "result ready".green().to_string()
                } else {
                    String::new()
                };
                println!(
                    "    {:<20} {:>5.1}% {} {}",
                    step.label(),
                    snapshot.clamped_percent(),
                    snapshot.message.clone().unwrap_or_default().dimmed(),
                    done
                );
            }
            Err(e) => println!("    {:<20} {}", step.label(), e.to_string().red()),
        }
    }
}
