// ===== synthforge/src/state.rs =====
//! Snapshot persistence: one atomically written, generation-numbered file
//! per generation, plus the shared serialize/deserialize contract the pooled
//! archive reuses.

use crate::config::StrategyParams;
use crate::error::{SynthError, SynthResult};
use crate::population::AgeLayeredPopulation;
use crate::problem::Problem;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Owns the monotonic individual-id counter and the evaluation counters.
/// Injected wherever ids are issued; never a global.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    next_id: u64,
    /// Individuals ever evaluated; drives the global stop condition.
    pub total_individuals: u64,
    /// Oracle calls per analysis id.
    pub eval_calls: BTreeMap<String, u64>,
}

impl Registry {
    pub fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn record_call(&mut self, analysis: &str) {
        *self.eval_calls.entry(analysis.to_string()).or_default() += 1;
    }

    pub fn record_individual(&mut self) {
        self.total_individuals += 1;
    }
}

/// Serializable snapshot of the full search state. Owned by exactly one
/// engine at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "G: Serialize", deserialize = "G: DeserializeOwned"))]
pub struct SynthState<G> {
    pub problem: Problem,
    pub strategy: StrategyParams,
    pub population: AgeLayeredPopulation<G>,
    pub generation: u64,
    pub registry: Registry,
}

impl<G> SynthState<G> {
    pub fn new(problem: Problem, strategy: StrategyParams) -> SynthResult<Self> {
        problem.validate()?;
        strategy.validate()?;
        Ok(Self {
            problem,
            strategy,
            population: AgeLayeredPopulation::new(),
            generation: 0,
            registry: Registry::default(),
        })
    }

    /// Structural checks applied when resuming from disk.
    pub fn validate(&self) -> SynthResult<()> {
        self.problem.validate()?;
        self.strategy.validate()?;
        let n = self.strategy.num_inds_per_layer;
        if self.population.num_layers() > self.strategy.max_age_layers {
            return Err(SynthError::Validation(format!(
                "snapshot has {} layers, strategy allows {}",
                self.population.num_layers(),
                self.strategy.max_age_layers
            )));
        }
        for (i, layer) in self.population.layers().iter().enumerate() {
            if layer.is_empty() {
                return Err(SynthError::Validation(format!("layer {} is empty", i)));
            }
            if layer.len() > 4 * n {
                return Err(SynthError::Validation(format!(
                    "layer {} holds {} individuals, more than the working-set bound {}",
                    i,
                    layer.len(),
                    4 * n
                )));
            }
        }
        Ok(())
    }
}

impl<G: Serialize + DeserializeOwned> SynthState<G> {
    /// Writes this generation's snapshot to its own numbered file.
    pub fn save(&self, dir: impl AsRef<Path>) -> SynthResult<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(snapshot_filename(self.generation));
        save_json(&path, self)?;
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>) -> SynthResult<Self> {
        let state: Self = load_json(path.as_ref())?;
        state.validate()?;
        Ok(state)
    }

    /// Resumes from the newest snapshot in `dir`; `Ok(None)` when the
    /// directory holds no snapshots yet.
    pub fn resume(dir: impl AsRef<Path>) -> SynthResult<Option<Self>> {
        match latest_snapshot(dir.as_ref()) {
            Some((_, path)) => Ok(Some(Self::load(path)?)),
            None => Ok(None),
        }
    }
}

pub fn snapshot_filename(generation: u64) -> String {
    format!("state_{:06}.json", generation)
}

/// Newest snapshot by the generation number embedded in the filename.
/// Filesystem modification time is not universally reliable, so it is never
/// consulted.
pub fn latest_snapshot(dir: &Path) -> Option<(u64, PathBuf)> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut best: Option<(u64, PathBuf)> = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let gen = name
            .strip_prefix("state_")
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|s| s.parse::<u64>().ok());
        if let Some(gen) = gen {
            if best.as_ref().map(|(g, _)| gen > *g).unwrap_or(true) {
                best = Some((gen, entry.path()));
            }
        }
    }
    best
}

/// The one serialize contract for snapshot and archive files. Writes to a
/// sibling temp file and renames it over the target, so readers never see a
/// partial file from us.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> SynthResult<()> {
    let text = serde_json::to_string(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> SynthResult<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write with bounded retry: transient renames-over-open-file conflicts on
/// some platforms resolve after a short delay. Surfaced only past the
/// ceiling.
pub fn save_json_with_retry<T: Serialize>(
    path: &Path,
    value: &T,
    attempts: usize,
    delay: Duration,
) -> SynthResult<()> {
    let mut last: Option<SynthError> = None;
    for attempt in 0..attempts.max(1) {
        match save_json(path, value) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(path = %path.display(), attempt, "archive write conflict: {}", e);
                last = Some(e);
                std::thread::sleep(delay);
            }
        }
    }
    Err(last.unwrap_or_else(|| SynthError::Validation("write retry without attempts".into())))
}
