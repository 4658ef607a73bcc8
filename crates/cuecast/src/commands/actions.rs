//! `run`, `batch` and `validate`: action submission through the control
//! plane.

use std::fmt::Write as _;
use std::time::Duration;

use cuecast_core::{
    ActionDescriptor, ActionResult, BatchValidation, ConnectionClient, ControlPlane,
    ExecutionResult,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::{BatchArgs, GlobalOpts, OutputFormat, RunArgs, ValidateArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

fn plane(client: &ConnectionClient, resolved: &Resolved) -> ControlPlane {
    let executor = cuecast_config::executor_config(&resolved.profile, &resolved.defaults);
    ControlPlane::new(client.clone(), executor)
}

// ── run ─────────────────────────────────────────────────────────────

pub async fn run(
    client: &ConnectionClient,
    resolved: &Resolved,
    args: RunArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let descriptor: ActionDescriptor =
        serde_json::from_str(&args.action).map_err(|e| CliError::Validation {
            field: "action".into(),
            reason: format!("expected {{\"type\": ..., \"parameters\": {{...}}}}: {e}"),
        })?;

    let result = plane(client, resolved).submit(&descriptor).await;
    if !result.success {
        return Err(action_failure(&result));
    }

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| format!("{} {}", output::status_text("\u{2713}", true, color), r.message),
        |r| r.message.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

fn action_failure(result: &ActionResult) -> CliError {
    let message = match &result.error {
        Some(error) if *error != result.message => format!("{}: {error}", result.message),
        _ => result.message.clone(),
    };
    CliError::ActionFailed { message }
}

// ── batch ───────────────────────────────────────────────────────────

pub async fn batch(
    client: &ConnectionClient,
    resolved: &Resolved,
    args: BatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let descriptors = util::read_batch_file(&args.file)?;

    let mut executor = cuecast_config::executor_config(&resolved.profile, &resolved.defaults);
    executor.skip_redundant |= args.skip_redundant;
    if let Some(ms) = args.step_delay {
        executor.step_delay = Duration::from_millis(ms);
    }
    let plane = ControlPlane::new(client.clone(), executor);

    let interactive = matches!(global.output, OutputFormat::Table) && !global.quiet;
    let bar = if interactive {
        let bar = ProgressBar::new(u64::try_from(descriptors.len()).unwrap_or(u64::MAX));
        if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}") {
            bar.set_style(style);
        }
        bar
    } else {
        ProgressBar::hidden()
    };
    let progress = |done: usize, total: usize, label: &str| {
        bar.set_length(u64::try_from(total).unwrap_or(u64::MAX));
        bar.set_position(u64::try_from(done).unwrap_or(u64::MAX));
        bar.set_message(label.to_owned());
    };

    let result = plane.submit_batch(&descriptors, Some(&progress)).await?;
    bar.finish_and_clear();

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| batch_report(r, color),
        |r| {
            r.partial_results
                .iter()
                .map(|s| s.label.clone())
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    output::print_output(&out, global.quiet);

    if result.success {
        return Ok(());
    }
    match result.validation {
        Some(validation) => Err(CliError::InvalidActions {
            summary: validation.summary(),
        }),
        None => Err(CliError::BatchFailed {
            message: result.error.unwrap_or_else(|| "unknown failure".into()),
        }),
    }
}

fn batch_report(result: &ExecutionResult, color: bool) -> String {
    let mut out = String::new();
    let ok = output::status_text("\u{2713}", true, color);
    let bad = output::status_text("\u{2717}", false, color);

    for step in &result.partial_results {
        let _ = writeln!(out, "{ok} {}", step.label);
    }
    if let (Some(position), Some(error)) = (result.failed_at, &result.error) {
        let _ = writeln!(out, "{bad} step {}: {error}", position + 1);
    }
    for undo in &result.rolled_back {
        let _ = writeln!(out, "{} {undo}", output::dim("undo", color));
    }
    for failure in &result.rollback_errors {
        let _ = writeln!(out, "{bad} undo {failure}");
    }
    for warning in &result.warnings {
        let _ = writeln!(out, "{} {warning}", output::dim("warning:", color));
    }
    if result.success {
        let _ = write!(
            out,
            "{}",
            output::status_text(
                &format!("Batch applied ({} steps)", result.partial_results.len()),
                true,
                color
            )
        );
    }
    out.trim_end().to_owned()
}

// ── validate ────────────────────────────────────────────────────────

pub async fn validate(
    client: &ConnectionClient,
    resolved: &Resolved,
    args: ValidateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let descriptors = util::read_batch_file(&args.file)?;
    let report = plane(client, resolved).validate(&descriptors).await?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| validation_report(r, descriptors.len(), color),
        |r| if r.is_valid() { "valid".into() } else { "invalid".into() },
    );
    output::print_output(&out, global.quiet);

    if report.is_valid() {
        Ok(())
    } else {
        Err(CliError::InvalidActions {
            summary: report.summary(),
        })
    }
}

fn validation_report(report: &BatchValidation, total: usize, color: bool) -> String {
    let mut out = String::new();
    for error in &report.errors {
        let tag = if error.redundant { "no-op" } else { "error" };
        let _ = writeln!(
            out,
            "{} #{} {}: {}",
            output::status_text(tag, false, color),
            error.index + 1,
            error.label,
            error.issue
        );
    }
    for warning in &report.warnings {
        let _ = writeln!(
            out,
            "{} #{} {}",
            output::dim("warning", color),
            warning.index + 1,
            warning.message
        );
    }
    if report.is_valid() {
        let _ = write!(
            out,
            "{}",
            output::status_text(&format!("All {total} actions are valid"), true, color)
        );
    }
    out.trim_end().to_owned()
}
