use std::fmt::Write;
use std::time::Duration;

use colored::Colorize;
use shardci_logging::Printer;
use shardci_runner::{RunOutcome, RunSummary};

/// Prints the results table, then the captured output of every failed run.
pub(crate) fn print_summary(printer: Printer, summary: &RunSummary) -> std::fmt::Result {
    let mut stdout = printer.stream_for_failure_summary().lock();

    writeln!(stdout, "===> Results")?;
    write!(stdout, "{}", render_table(summary.outcomes()))?;

    for outcome in summary.failures() {
        writeln!(stdout, "     Run {} stdout:", outcome.shard)?;
        write!(stdout, "{}", outcome.output.stdout)?;
        writeln!(stdout, "     Run {} stderr:", outcome.shard)?;
        write!(stdout, "{}", outcome.output.stderr)?;
    }

    Ok(())
}

fn render_table(outcomes: &[RunOutcome]) -> String {
    let rows: Vec<[String; 4]> = outcomes
        .iter()
        .map(|outcome| {
            [
                outcome.shard.to_string(),
                outcome.is_success().to_string(),
                format_duration(outcome.duration),
                outcome.message.clone(),
            ]
        })
        .collect();

    let header = ["RUN", "SUCCESS", "DURATION"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut table = String::new();
    let [run, success, duration] = widths;

    let line = format!(
        "{:<run$}  {:<success$}  {}",
        header[0], header[1], header[2]
    );
    let _ = writeln!(table, "{}", line.trim_end());

    for [id, passed, elapsed, message] in &rows {
        let passed_cell = format!("{passed:<success$}");
        let passed_cell = if passed == "true" {
            passed_cell.green()
        } else {
            passed_cell.red()
        };
        let line = format!("{id:<run$}  {passed_cell}  {elapsed:<duration$}  {message}");
        let _ = writeln!(table, "{}", line.trim_end());
    }

    table
}

/// Whole seconds only, e.g. `1h2m3s`, `4m5s` or `6s`.
fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
