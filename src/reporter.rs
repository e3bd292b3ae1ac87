use crate::config::PipelineConfig;
use crate::types::{CoordinatorReport, RunReport, Verdict};
use anyhow::Result;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Format a slice as right-aligned 4-wide columns on a single line
fn format_values(data: &[i32]) -> String {
    data.iter()
        .map(|v| format!("{:>4}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a slice as rows of `per_row` right-aligned columns
fn format_rows(data: &[i32], per_row: usize) -> String {
    data.chunks(per_row.max(1))
        .map(|row| format!("  {}", format_values(row)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Index and values of the first disagreement between two arrays
fn first_mismatch(got: &[i32], expected: &[i32]) -> Option<(usize, i32, i32)> {
    got.iter()
        .zip(expected)
        .position(|(g, e)| g != e)
        .map(|i| (i, got[i], expected[i]))
}

/// One progress line attributed to a rank. Each line is a single `println!`
/// so concurrent ranks interleave whole lines, never fragments.
pub fn print_rank_line(rank: usize, msg: &str) {
    println!("[rank {}] {}", rank, msg);
}

/// Dump a rank's partition under a short label
pub fn print_partition(rank: usize, label: &str, data: &[i32]) {
    println!("[rank {}] {:<12} {}", rank, label, format_values(data));
}

pub fn print_banner(cfg: &PipelineConfig) {
    let faults = if cfg.faults.is_empty() {
        "no fault overrides"
    } else {
        "fault overrides active"
    };
    println!(
        "world of {} ranks, {} values per rank, {} gate, {}",
        cfg.required_size,
        cfg.partition_len,
        cfg.gate_mode.as_str(),
        faults
    );
}

/// Print the assembled final array and the validation verdict
pub fn print_coordinator_summary(report: &CoordinatorReport, per_row: usize) -> Result<()> {
    println!("final array ({} values):", report.final_array.len());
    println!("{}", format_rows(&report.final_array, per_row));

    let verdict = if report.passed {
        Verdict::Passed
    } else {
        Verdict::Failed
    };
    let detail = if report.final_array.len() != report.expected.len() {
        format!(
            "gathered {} values, expected {}",
            report.final_array.len(),
            report.expected.len()
        )
    } else {
        match first_mismatch(&report.final_array, &report.expected) {
            None => format!("all {} values match the expected sequence", report.expected.len()),
            Some((i, got, want)) => {
                format!("first mismatch at index {}: got {}, expected {}", i, got, want)
            }
        }
    };
    print_verdict(verdict, &detail)
}

pub fn print_skipped_summary() -> Result<()> {
    print_verdict(Verdict::Skipped, "no array was gathered")
}

/// Print the verdict line, color-coding the label when stdout is a terminal
pub fn print_verdict(verdict: Verdict, detail: &str) -> Result<()> {
    let mut out = StandardStream::stdout(ColorChoice::Auto);
    write!(out, "validation: ")?;
    let color = match verdict {
        Verdict::Passed => Color::Green,
        Verdict::Failed => Color::Red,
        Verdict::Skipped => Color::Yellow,
    };
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{}", verdict.label())?;
    out.reset()?;
    writeln!(out, " ({})", detail)?;
    Ok(())
}

/// Print the full run report as JSON
pub fn print_json(report: &RunReport) -> Result<()> {
    let value = serde_json::to_value(report)?;
    println!("{}", colored_json::to_colored_json_auto(&value)?);
    Ok(())
}
