// ===== synthforge/src/pooler.rs =====
//! Background aggregator: merges the newest snapshots of many independent
//! engines into one capacity-bounded archive, and the migration source that
//! reads that archive back into a running engine.
//!
//! The pooler is the sole writer of the archive but shares no lock with its
//! readers; conflicts are handled by bounded retry on the write side and
//! treat-parse-failure-as-empty on the read side.

use crate::api::{Genotype, MigrationSource};
use crate::config::PoolParams;
use crate::error::SynthResult;
use crate::individual::Individual;
use crate::pareto::{self, MetricRanges};
use crate::population::dedup_by_signature;
use crate::problem::Problem;
use crate::state::{latest_snapshot, load_json, save_json_with_retry, SynthState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Payload of the pooled archive file; written via the same serialize
/// contract as generation snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "G: Serialize", deserialize = "G: DeserializeOwned"))]
pub struct PoolArchive<G> {
    /// Aggregation pass that produced this archive.
    pub pass: u64,
    pub individuals: Vec<Individual<G>>,
}

/// Where the pooler finds its engine output directories.
#[derive(Debug, Clone)]
pub enum PoolSources {
    /// Fixed list given at launch.
    Static(Vec<PathBuf>),
    /// A text file holding one directory per line, re-read every pass so it
    /// can be edited while the pooler runs.
    File(PathBuf),
}

pub struct Pooler<G: Genotype> {
    problem: Problem,
    params: PoolParams,
    sources: PoolSources,
    archive_path: PathBuf,
    passes: u64,
    _genotype: PhantomData<fn() -> G>,
}

impl<G: Genotype> Pooler<G> {
    pub fn new(
        problem: Problem,
        params: PoolParams,
        sources: PoolSources,
        archive_path: impl Into<PathBuf>,
    ) -> SynthResult<Self> {
        problem.validate()?;
        params.validate()?;
        Ok(Self {
            problem,
            params,
            sources,
            archive_path: archive_path.into(),
            passes: 0,
            _genotype: PhantomData,
        })
    }

    /// Polls until killed, or runs a single pass in one-shot mode.
    pub fn run(&mut self) -> SynthResult<()> {
        loop {
            let merged_sources = self.pass()?;
            if self.params.one_shot {
                return Ok(());
            }
            let mut sleep = Duration::from_secs(self.params.pool_interval_secs);
            if merged_sources == 0 {
                // Never spin tightly on an empty source list.
                sleep = sleep.max(Duration::from_secs(self.params.pool_floor_secs));
            }
            std::thread::sleep(sleep);
        }
    }

    /// One aggregation pass. Per-source failures are logged and skipped;
    /// only an archive write that stays broken past the retry ceiling is an
    /// error. Returns how many sources contributed.
    pub fn pass(&mut self) -> SynthResult<usize> {
        let dirs = self.current_sources();
        let per_source_cap = (self.params.pool_capacity / 3).max(1);

        let mut merged: Vec<Individual<G>> = Vec::new();
        let mut contributed = 0;
        for dir in &dirs {
            let inds = match self.load_source(dir) {
                Some(inds) => inds,
                None => continue,
            };
            // Cap any one source's influence on the pool.
            let inds = dedup_by_signature(&self.problem, inds);
            let cap = per_source_cap.min(inds.len());
            let ranges = MetricRanges::compute(&self.problem, inds.iter());
            let best = pareto::select_n(&self.problem, inds, cap, &ranges);
            debug!(source = %dir.display(), kept = best.len(), "source merged");
            merged.extend(best);
            contributed += 1;
        }

        let merged = dedup_by_signature(&self.problem, merged);
        let ranges = MetricRanges::compute(&self.problem, merged.iter());
        let cap = self.params.pool_capacity.min(merged.len());
        let individuals = pareto::select_n(&self.problem, merged, cap, &ranges);

        self.passes += 1;
        let archive = PoolArchive {
            pass: self.passes,
            individuals,
        };
        save_json_with_retry(
            &self.archive_path,
            &archive,
            self.params.write_retries,
            Duration::from_millis(200),
        )?;
        info!(
            pass = self.passes,
            sources = contributed,
            pooled = archive.individuals.len(),
            "aggregation pass complete"
        );
        Ok(contributed)
    }

    /// The source list as of right now; a vanished or unreadable sources
    /// file simply yields nothing this pass.
    fn current_sources(&self) -> Vec<PathBuf> {
        match &self.sources {
            PoolSources::Static(dirs) => dirs.clone(),
            PoolSources::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(PathBuf::from)
                    .collect(),
                Err(e) => {
                    warn!(file = %path.display(), "sources file unreadable: {}", e);
                    Vec::new()
                }
            },
        }
    }

    /// Best-effort load of one source's newest snapshot. Missing directory,
    /// no snapshots yet, or a mid-write/corrupt file all skip the source for
    /// this pass only.
    fn load_source(&self, dir: &Path) -> Option<Vec<Individual<G>>> {
        let (generation, path) = match latest_snapshot(dir) {
            Some(found) => found,
            None => {
                debug!(source = %dir.display(), "no snapshot; skipped");
                return None;
            }
        };
        match load_json::<SynthState<G>>(&path) {
            Ok(state) => {
                debug!(source = %dir.display(), generation, "snapshot loaded");
                Some(state.population.all_individuals().cloned().collect())
            }
            Err(e) => {
                warn!(snapshot = %path.display(), "unreadable snapshot skipped: {}", e);
                None
            }
        }
    }
}

/// Migration source backed by the pooled archive. Any read or parse failure
/// means "no migrants this generation", never an error: the archive may be
/// mid-write, missing, or pooling may simply be disabled.
pub struct PoolMigration<G> {
    path: PathBuf,
    rng: fastrand::Rng,
    _genotype: PhantomData<fn() -> G>,
}

impl<G> PoolMigration<G> {
    pub fn new(path: impl Into<PathBuf>, seed: Option<u64>) -> Self {
        Self {
            path: path.into(),
            rng: match seed {
                Some(s) => fastrand::Rng::with_seed(s),
                None => fastrand::Rng::new(),
            },
            _genotype: PhantomData,
        }
    }
}

impl<G: Genotype> MigrationSource<G> for PoolMigration<G> {
    fn retrieve_migrants(&mut self, count: usize) -> Vec<Individual<G>> {
        let archive: PoolArchive<G> = match load_json(&self.path) {
            Ok(a) => a,
            Err(e) => {
                debug!(archive = %self.path.display(), "no migrants: {}", e);
                return Vec::new();
            }
        };
        // Random sample without replacement.
        let mut indices: Vec<usize> = (0..archive.individuals.len()).collect();
        self.rng.shuffle(&mut indices);
        indices.truncate(count);
        let mut slots: Vec<Option<Individual<G>>> =
            archive.individuals.into_iter().map(Some).collect();
        indices
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect()
    }
}
