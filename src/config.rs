use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the integrity-gate decision is turned into a gather decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Each rank decides for itself. Faithful to the original pipeline and
    /// deliberately hazardous: ranks that disagree diverge on entering the
    /// collective and the group deadlocks.
    Local,
    /// Collective logical AND of all local decisions before anyone enters
    /// the gather, so either all ranks gather or none do.
    Agreed,
}

impl GateMode {
    pub fn from_flag(flag: &str) -> Result<Self> {
        match flag {
            "local" => Ok(GateMode::Local),
            "agreed" => Ok(GateMode::Agreed),
            other => anyhow::bail!("unknown gate mode: {}", other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateMode::Local => "local",
            GateMode::Agreed => "agreed",
        }
    }
}

/// A single fault-injection action: after the local transform, store `value`
/// at `index` in the owning rank's partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultOverride {
    pub index: usize,
    pub value: i32,
}

/// Rank-indexed fault-injection policy. The reference table reproduces the
/// original adversarial data: rank 2 gets a negative element (fails the
/// gate), rank 3 gets a zero (passes the gate, poisons the final division).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultTable {
    overrides: BTreeMap<usize, FaultOverride>,
}

/// Default rank carrying the gate-failing override.
pub const FAULT_RANK_A: usize = 2;
/// Default rank carrying the division-poisoning override.
pub const FAULT_RANK_B: usize = 3;

impl FaultTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The original fault configuration: `2:2=-1` and `3:2=0`.
    pub fn reference() -> Self {
        let mut table = Self::empty();
        table.insert(FAULT_RANK_A, FaultOverride { index: 2, value: -1 });
        table.insert(FAULT_RANK_B, FaultOverride { index: 2, value: 0 });
        table
    }

    pub fn insert(&mut self, rank: usize, fault: FaultOverride) {
        self.overrides.insert(rank, fault);
    }

    pub fn override_for(&self, rank: usize) -> Option<&FaultOverride> {
        self.overrides.get(&rank)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Parse `RANK:INDEX=VALUE` specs from the command line.
    pub fn from_specs(specs: &[String]) -> Result<Self> {
        let pattern = Regex::new(r"^(\d+):(\d+)=(-?\d+)$").context("invalid fault-spec pattern")?;
        let mut table = Self::empty();
        for spec in specs {
            let caps = pattern
                .captures(spec)
                .with_context(|| format!("malformed fault spec '{}' (want RANK:INDEX=VALUE)", spec))?;
            let rank: usize = caps[1]
                .parse()
                .with_context(|| format!("fault spec '{}': bad rank", spec))?;
            let index: usize = caps[2]
                .parse()
                .with_context(|| format!("fault spec '{}': bad index", spec))?;
            let value: i32 = caps[3]
                .parse()
                .with_context(|| format!("fault spec '{}': bad value", spec))?;
            table.insert(rank, FaultOverride { index, value });
        }
        Ok(table)
    }

    /// Resolve the table implied by the CLI flags: `--no-faults` clears it,
    /// explicit `--fault` specs replace the default, otherwise the reference
    /// table applies.
    pub fn from_cli(specs: &[String], no_faults: bool) -> Result<Self> {
        if no_faults {
            Ok(Self::empty())
        } else if specs.is_empty() {
            Ok(Self::reference())
        } else {
            Self::from_specs(specs)
        }
    }
}

/// Everything the pipeline needs to know before any communication happens.
/// All participants must be constructed with an identical config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Elements per rank-local partition (`L`).
    pub partition_len: usize,
    /// Exact participant count the pipeline requires.
    pub required_size: usize,
    /// Rank that receives the gathered array and finalizes it.
    pub coordinator: usize,
    pub gate_mode: GateMode,
    pub faults: FaultTable,
}

impl PipelineConfig {
    /// The configuration the original exercise ships with.
    pub fn reference() -> Self {
        Self {
            partition_len: 20,
            required_size: 4,
            coordinator: 0,
            gate_mode: GateMode::Local,
            faults: FaultTable::reference(),
        }
    }

    /// Length of the gathered array.
    pub fn total_len(&self) -> usize {
        self.partition_len * self.required_size
    }

    /// Reject configs the pipeline cannot run: they are configuration
    /// faults, caught before any participant spawns.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.partition_len == 0 {
            anyhow::bail!("partition length must be at least 1");
        }
        if self.required_size == 0 {
            anyhow::bail!("required participant count must be at least 1");
        }
        if self.coordinator >= self.required_size {
            anyhow::bail!(
                "coordinator rank {} is outside the group of {}",
                self.coordinator,
                self.required_size
            );
        }
        for (rank, fault) in &self.faults.overrides {
            if fault.index >= self.partition_len {
                anyhow::bail!(
                    "fault for rank {} targets index {} but partitions have {} elements",
                    rank,
                    fault.index,
                    self.partition_len
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_table_matches_original() {
        let table = FaultTable::reference();
        assert_eq!(
            table.override_for(FAULT_RANK_A),
            Some(&FaultOverride { index: 2, value: -1 })
        );
        assert_eq!(
            table.override_for(FAULT_RANK_B),
            Some(&FaultOverride { index: 2, value: 0 })
        );
        assert_eq!(table.override_for(0), None);
        assert_eq!(table.override_for(1), None);
    }

    #[test]
    fn test_parse_fault_specs() {
        let specs = vec!["2:2=-1".to_string(), "3:2=0".to_string()];
        let table = FaultTable::from_specs(&specs).unwrap();
        assert_eq!(table, FaultTable::reference());
    }

    #[test]
    fn test_parse_rejects_malformed_specs() {
        for bad in ["", "2", "2:2", "2:2=", "2=2:1", "a:2=0", "2:b=0", "2:2=x", "-1:2=0"] {
            let specs = vec![bad.to_string()];
            assert!(
                FaultTable::from_specs(&specs).is_err(),
                "spec '{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_from_cli_precedence() {
        let explicit = vec!["1:0=7".to_string()];
        assert!(FaultTable::from_cli(&explicit, true).unwrap().is_empty());
        assert_eq!(FaultTable::from_cli(&[], false).unwrap(), FaultTable::reference());
        let table = FaultTable::from_cli(&explicit, false).unwrap();
        assert_eq!(table.override_for(1), Some(&FaultOverride { index: 0, value: 7 }));
        assert_eq!(table.override_for(FAULT_RANK_A), None);
    }

    #[test]
    fn test_gate_mode_flags() {
        assert_eq!(GateMode::from_flag("local").unwrap(), GateMode::Local);
        assert_eq!(GateMode::from_flag("agreed").unwrap(), GateMode::Agreed);
        assert!(GateMode::from_flag("both").is_err());
    }

    #[test]
    fn test_ensure_valid_rejects_bad_configs() {
        let mut cfg = PipelineConfig::reference();
        assert!(cfg.ensure_valid().is_ok());

        cfg.partition_len = 0;
        assert!(cfg.ensure_valid().is_err());

        cfg = PipelineConfig::reference();
        cfg.coordinator = 4;
        assert!(cfg.ensure_valid().is_err());

        cfg = PipelineConfig::reference();
        cfg.faults.insert(0, FaultOverride { index: 20, value: 1 });
        assert!(cfg.ensure_valid().is_err());
    }
}
