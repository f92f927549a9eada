use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Bin,
    Stencil,
    Build,
    Pair,
    Angle,
    Comm,
    Integrate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Bin => "bin",
            Stage::Stencil => "stencil",
            Stage::Build => "build",
            Stage::Pair => "pair",
            Stage::Angle => "angle",
            Stage::Comm => "comm",
            Stage::Integrate => "integrate",
        };
        f.write_str(name)
    }
}

/// Receives per-stage wall-clock timings. Passed explicitly to whatever is timed.
pub trait MetricsSink: Sync {
    fn record(&self, stage: Stage, elapsed: Duration);
}

/// Discards every timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetrics;

impl MetricsSink for NoMetrics {
    #[inline]
    fn record(&self, _stage: Stage, _elapsed: Duration) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StageTiming {
    pub total: Duration,
    pub calls: u64,
}

/// Accumulated totals and call counts per stage.
#[derive(Debug, Default)]
pub struct TimingTable {
    stages: Mutex<BTreeMap<Stage, StageTiming>>,
}

impl TimingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the table in stage order.
    pub fn snapshot(&self) -> Vec<(Stage, StageTiming)> {
        match self.stages.lock() {
            Ok(stages) => stages.iter().map(|(s, t)| (*s, *t)).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|(s, t)| (*s, *t))
                .collect(),
        }
    }

    pub fn get(&self, stage: Stage) -> Option<StageTiming> {
        self.snapshot()
            .into_iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, t)| t)
    }
}

impl MetricsSink for TimingTable {
    fn record(&self, stage: Stage, elapsed: Duration) {
        let mut stages = match self.stages.lock() {
            Ok(stages) => stages,
            Err(poisoned) => {
                warn!("Timing table lock was poisoned; continuing with its last state.");
                poisoned.into_inner()
            }
        };
        let entry = stages.entry(stage).or_default();
        entry.total += elapsed;
        entry.calls += 1;
    }
}

/// Runs `f` and records its wall-clock time under `stage`.
#[inline]
pub fn timed<M, T>(metrics: &M, stage: Stage, f: impl FnOnce() -> T) -> T
where
    M: MetricsSink + ?Sized,
{
    let start = Instant::now();
    let result = f();
    metrics.record(stage, start.elapsed());
    result
}
