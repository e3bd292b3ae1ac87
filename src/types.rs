use crate::config::PipelineConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a single rank saw and did during one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankReport {
    pub rank: usize,
    pub input: Vec<i32>,
    pub transformed: Vec<i32>,
    pub gate_passed: bool,
    pub contributed: bool,
}

/// The coordinator's view after the gather: the finalized array and whether
/// it matched the clean-run expectation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorReport {
    pub final_array: Vec<i32>,
    pub expected: Vec<i32>,
    pub passed: bool,
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Final array matched the clean-run expectation
    Passed,
    /// Final array was assembled but diverged from the expectation
    Failed,
    /// The gather never happened, so there was nothing to validate
    Skipped,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed => "PASSED",
            Verdict::Failed => "FAILED",
            Verdict::Skipped => "SKIPPED",
        }
    }
}

/// Complete run report
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub config: PipelineConfig,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub verdict: Verdict,
    pub ranks: Vec<RankReport>,
    pub coordinator: Option<CoordinatorReport>,
}

/// Accumulated run state while rank threads are still being joined
#[derive(Debug)]
pub struct RunState {
    pub started_at: DateTime<Utc>,
    pub ranks: Vec<RankReport>,
    pub coordinator: Option<CoordinatorReport>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ranks: Vec::new(),
            coordinator: None,
        }
    }

    pub fn record(&mut self, rank: RankReport, coordinator: Option<CoordinatorReport>) {
        self.ranks.push(rank);
        if coordinator.is_some() {
            self.coordinator = coordinator;
        }
    }

    pub fn into_report(self, config: &PipelineConfig) -> RunReport {
        let finished_at = Utc::now();
        let duration_seconds = (finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;

        let mut ranks = self.ranks;
        ranks.sort_by_key(|r| r.rank);

        let verdict = match &self.coordinator {
            Some(report) if report.passed => Verdict::Passed,
            Some(_) => Verdict::Failed,
            None => Verdict::Skipped,
        };

        RunReport {
            config: config.clone(),
            started_at: self.started_at,
            finished_at,
            duration_seconds,
            verdict,
            ranks,
            coordinator: self.coordinator,
        }
    }
}
