use clap::Parser;
use gathergate::cli::{Cli, Commands};
use gathergate::comm::GroupFault;
use gathergate::config::{FaultTable, GateMode, PipelineConfig};
use gathergate::reporter;
use gathergate::runner;
use std::process;
use std::time::Duration;

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            ranks,
            required,
            partition_len,
            faults,
            no_faults,
            gate,
            timeout_ms,
            json,
            quiet,
        } => run_command(
            ranks,
            required,
            partition_len,
            faults,
            no_faults,
            gate,
            timeout_ms,
            json,
            quiet,
        ),
        #[cfg(feature = "mpi")]
        Commands::Mpi {
            required,
            partition_len,
            faults,
            no_faults,
            gate,
            quiet,
        } => mpi_command(required, partition_len, faults, no_faults, gate, quiet),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(exit_code(&e));
    }
}

/// Map a failed run onto a process exit code. An abort carries its own code
/// (the group agreed on it); everything else is a plain driver failure.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<GroupFault>() {
        Some(GroupFault::Aborted { code }) => *code,
        _ => 1,
    }
}

fn build_config(
    required: usize,
    partition_len: usize,
    faults: &[String],
    no_faults: bool,
    gate: &str,
) -> anyhow::Result<PipelineConfig> {
    Ok(PipelineConfig {
        partition_len,
        required_size: required,
        coordinator: 0,
        gate_mode: GateMode::from_flag(gate)?,
        faults: FaultTable::from_cli(faults, no_faults)?,
    })
}

fn run_command(
    ranks: usize,
    required: usize,
    partition_len: usize,
    faults: Vec<String>,
    no_faults: bool,
    gate: String,
    timeout_ms: u64,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let cfg = build_config(required, partition_len, &faults, no_faults, &gate)?;
    let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
    // JSON output keeps stdout parseable, so progress lines are suppressed.
    let quiet = quiet || json;

    let report = runner::run_local(&cfg, ranks, timeout, quiet)?;

    if json {
        reporter::print_json(&report)?;
    }

    Ok(())
}

#[cfg(feature = "mpi")]
fn mpi_command(
    required: usize,
    partition_len: usize,
    faults: Vec<String>,
    no_faults: bool,
    gate: String,
    quiet: bool,
) -> anyhow::Result<()> {
    let cfg = build_config(required, partition_len, &faults, no_faults, &gate)?;
    runner::run_mpi(&cfg, quiet)
}
