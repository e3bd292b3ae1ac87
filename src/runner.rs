use crate::comm::{LocalGroup, ProcessGroup};
use crate::config::{GateMode, PipelineConfig};
use crate::pipeline;
use crate::reporter;
use crate::types::{CoordinatorReport, RankReport, RunReport, RunState};
use anyhow::{Context, Result};
use std::thread;
use std::time::Duration;

/// Abort code for a group whose size does not match the config.
pub const CONFIG_ABORT_CODE: i32 = 2;

/// Drive one rank through the whole pipeline: generate, transform, gate,
/// gather, barrier, and (on the coordinator) finalize and validate. Every
/// rank of the group runs this same function; only the coordinator comes
/// back with a [`CoordinatorReport`].
pub fn run_rank<G: ProcessGroup>(
    group: &G,
    cfg: &PipelineConfig,
    quiet: bool,
) -> Result<(RankReport, Option<CoordinatorReport>)> {
    let rank = group.rank();
    let size = group.size();

    if size != cfg.required_size {
        if rank == cfg.coordinator {
            eprintln!(
                "this pipeline requires exactly {} ranks, got {}",
                cfg.required_size, size
            );
        }
        return Err(group.abort_all(CONFIG_ABORT_CODE).into());
    }

    let input = pipeline::generate_partition(rank, cfg.partition_len);
    if !quiet {
        reporter::print_partition(rank, "input", &input);
    }

    let mut data = input.clone();
    pipeline::local_transform(&mut data, rank, &cfg.faults);
    if !quiet {
        reporter::print_partition(rank, "transformed", &data);
    }

    let gate_passed = pipeline::integrity_check(&data);
    if !quiet && !gate_passed {
        reporter::print_rank_line(rank, "integrity gate failed: negative value in partition");
    }

    let contributing = match cfg.gate_mode {
        GateMode::Local => gate_passed,
        GateMode::Agreed => {
            let agreed = group.agree(gate_passed)?;
            if !quiet && gate_passed && !agreed {
                reporter::print_rank_line(rank, "another rank failed the gate, standing down");
            }
            agreed
        }
    };

    let gathered = if contributing {
        group.gather(&data, cfg.coordinator)?
    } else {
        if !quiet {
            reporter::print_rank_line(rank, "withholding contribution, skipping the gather");
        }
        None
    };

    group.barrier()?;

    let coordinator = if rank == cfg.coordinator {
        match gathered {
            Some(mut full) => {
                if !quiet {
                    reporter::print_rank_line(
                        rank,
                        &format!("gathered {} values from {} ranks", full.len(), size),
                    );
                }
                pipeline::finalize_in_place(&mut full);
                let expected = pipeline::expected_output(cfg);
                let passed = pipeline::validate(&full, &expected);
                let report = CoordinatorReport {
                    final_array: full,
                    expected,
                    passed,
                };
                if !quiet {
                    reporter::print_coordinator_summary(&report, cfg.partition_len)?;
                }
                Some(report)
            }
            None => {
                if !quiet {
                    reporter::print_skipped_summary()?;
                }
                None
            }
        }
    } else {
        None
    };

    let report = RankReport {
        rank,
        input,
        transformed: data,
        gate_passed,
        contributed: contributing,
    };
    Ok((report, coordinator))
}

/// Run the pipeline over an in-process group of `ranks` threads.
///
/// `timeout` bounds every collective rendezvous; pass `None` to wait
/// indefinitely, which reproduces a real deadlock when participation
/// diverges.
pub fn run_local(
    cfg: &PipelineConfig,
    ranks: usize,
    timeout: Option<Duration>,
    quiet: bool,
) -> Result<RunReport> {
    cfg.ensure_valid()?;
    if ranks == 0 {
        anyhow::bail!("at least one rank is required");
    }
    if !quiet {
        reporter::print_banner(cfg);
    }

    let mut state = RunState::new();
    let handles = LocalGroup::spawn_world(ranks, timeout)
        .into_iter()
        .map(|group| {
            let cfg = cfg.clone();
            thread::Builder::new()
                .name(format!("rank-{}", group.rank()))
                .spawn(move || run_rank(&group, &cfg, quiet))
                .context("failed to spawn rank thread")
        })
        .collect::<Result<Vec<_>>>()?;

    for (rank, handle) in handles.into_iter().enumerate() {
        let outcome = match handle.join() {
            Ok(outcome) => outcome,
            // A rank died. Surface the panic instead of reporting around it.
            Err(payload) => std::panic::resume_unwind(payload),
        };
        let (rank_report, coordinator) =
            outcome.with_context(|| format!("rank {} did not finish the pipeline", rank))?;
        state.record(rank_report, coordinator);
    }

    Ok(state.into_report(cfg))
}

/// Run the pipeline as one rank of an externally launched MPI group.
#[cfg(feature = "mpi")]
pub fn run_mpi(cfg: &PipelineConfig, quiet: bool) -> Result<()> {
    use crate::comm::MpiGroup;

    cfg.ensure_valid()?;
    let group = MpiGroup::init()?;
    if !quiet && group.rank() == cfg.coordinator {
        reporter::print_banner(cfg);
    }
    run_rank(&group, cfg, quiet)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::GroupFault;
    use crate::config::{FaultOverride, FaultTable};
    use crate::types::Verdict;

    fn quiet_run(cfg: &PipelineConfig, ranks: usize) -> Result<RunReport> {
        run_local(cfg, ranks, Some(Duration::from_secs(5)), true)
    }

    #[test]
    fn test_clean_run_passes_validation() {
        let mut cfg = PipelineConfig::reference();
        cfg.faults = FaultTable::empty();

        let report = quiet_run(&cfg, 4).unwrap();

        assert_eq!(report.verdict, Verdict::Passed);
        assert_eq!(report.ranks.len(), 4);
        assert!(report.ranks.iter().all(|r| r.gate_passed && r.contributed));

        let coordinator = report.coordinator.expect("coordinator must report");
        assert!(coordinator.passed);
        assert_eq!(coordinator.final_array, pipeline::expected_output(&cfg));
    }

    #[test]
    fn test_clean_run_with_small_geometry() {
        let cfg = PipelineConfig {
            partition_len: 3,
            required_size: 2,
            coordinator: 0,
            gate_mode: GateMode::Local,
            faults: FaultTable::empty(),
        };

        let report = quiet_run(&cfg, 2).unwrap();

        assert_eq!(report.verdict, Verdict::Passed);
        let coordinator = report.coordinator.unwrap();
        assert_eq!(coordinator.final_array.len(), cfg.total_len());
        assert_eq!(coordinator.final_array, pipeline::expected_output(&cfg));
    }

    #[test]
    fn test_local_gate_divergence_is_reported_as_fault() {
        // The reference faults under the local gate: rank 2 withholds while
        // the others gather. A real MPI job hangs here; the local group
        // turns it into an error.
        let mut cfg = PipelineConfig::reference();
        cfg.gate_mode = GateMode::Local;

        let err = run_local(&cfg, 4, Some(Duration::from_millis(200)), true).unwrap_err();

        let fault = err
            .downcast_ref::<GroupFault>()
            .expect("a group fault must surface");
        assert!(matches!(
            fault,
            GroupFault::RendezvousTimeout { .. } | GroupFault::CollectiveMismatch { .. }
        ));
    }

    #[test]
    fn test_agreed_gate_skips_the_gather_for_everyone() {
        let mut cfg = PipelineConfig::reference();
        cfg.gate_mode = GateMode::Agreed;

        let report = quiet_run(&cfg, 4).unwrap();

        assert_eq!(report.verdict, Verdict::Skipped);
        assert!(report.coordinator.is_none());
        assert!(report.ranks.iter().all(|r| !r.contributed));
        // Only the negative value trips the gate. The zero on rank 3 is
        // non-negative and sails through.
        assert!(!report.ranks[2].gate_passed);
        assert!(report.ranks[3].gate_passed);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["verdict"], "skipped");
    }

    #[test]
    fn test_zero_that_crosses_the_gate_poisons_the_finalize() {
        // Keep only the rank 3 override. Every gate passes, the gather
        // completes, and the coordinator divides by the smuggled zero.
        let mut cfg = PipelineConfig::reference();
        cfg.faults = FaultTable::empty();
        cfg.faults.insert(3, FaultOverride { index: 2, value: 0 });

        let result = thread::Builder::new()
            .name("poisoned-run".into())
            .spawn(move || quiet_run(&cfg, 4))
            .unwrap()
            .join();

        assert!(result.is_err(), "coordinator must die on the zero divisor");
    }

    #[test]
    fn test_wrong_group_size_aborts_with_config_code() {
        let cfg = PipelineConfig::reference();

        let err = quiet_run(&cfg, 3).unwrap_err();

        let fault = err
            .downcast_ref::<GroupFault>()
            .expect("a group fault must surface");
        assert_eq!(
            *fault,
            GroupFault::Aborted {
                code: CONFIG_ABORT_CODE
            }
        );
    }

    #[test]
    fn test_positive_corruption_passes_the_gate_but_fails_validation() {
        let mut cfg = PipelineConfig::reference();
        cfg.faults = FaultTable::empty();
        cfg.faults.insert(1, FaultOverride { index: 5, value: 7 });

        let report = quiet_run(&cfg, 4).unwrap();

        assert_eq!(report.verdict, Verdict::Failed);
        assert!(report.ranks.iter().all(|r| r.gate_passed && r.contributed));

        let coordinator = report.coordinator.unwrap();
        assert!(!coordinator.passed);
        // Rank 1's block starts at global index 20; 1024 / 7 == 146.
        assert_eq!(coordinator.final_array[25], 146);
        assert_eq!(coordinator.expected[25], 21);
    }
}
