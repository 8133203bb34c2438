// ===== synthforge/src/config.rs =====
use crate::error::{SynthError, SynthResult};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Search strategy knobs. These persist inside every snapshot so a restarted
/// engine resumes with the configuration it was launched with.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    /// Parent-set size N per age layer; working sets hold up to 2N.
    #[arg(long, default_value_t = 20)]
    pub num_inds_per_layer: usize,

    #[arg(long, default_value_t = 10)]
    pub max_age_layers: usize,

    /// Generations between layer births; also scales per-layer age ceilings.
    #[arg(long, default_value_t = 20)]
    pub age_gap: u32,

    /// Global stop: total individuals ever evaluated.
    #[arg(long, default_value_t = 100_000)]
    pub max_individuals: u64,

    #[arg(long, default_value_t = 0.75)]
    pub crossover_prob: f64,

    /// Scale of the variation operator's perturbations.
    #[arg(long, default_value_t = 0.1)]
    pub mutation_intensity: f64,

    /// Fraction of a layer requested as migrants, clamped to [1, N/2].
    /// Zero disables migration.
    #[arg(long, default_value_t = 0.1)]
    pub migration_rate: f64,

    /// Attempts at producing a unique, not-bad child pair before the engine
    /// substitutes fresh parents.
    #[arg(long, default_value_t = 16)]
    pub variation_retries: usize,

    /// Advisory ceiling for whoever constructs the oracle; persisted with
    /// the snapshot but never enforced by the engine itself. The built-in
    /// demo oracle returns instantly and ignores it.
    #[arg(long, default_value_t = 300)]
    pub eval_timeout_secs: u64,

    /// Per-metric weight overrides: "gain=2.0,area=0.5".
    #[arg(long, default_value = "")]
    pub metric_weights: String,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            num_inds_per_layer: 20,
            max_age_layers: 10,
            age_gap: 20,
            max_individuals: 100_000,
            crossover_prob: 0.75,
            mutation_intensity: 0.1,
            migration_rate: 0.1,
            variation_retries: 16,
            eval_timeout_secs: 300,
            metric_weights: String::new(),
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> SynthResult<()> {
        if self.num_inds_per_layer < 2 {
            return Err(SynthError::Config(
                "num_inds_per_layer must be at least 2".into(),
            ));
        }
        if self.max_age_layers == 0 {
            return Err(SynthError::Config("max_age_layers must be positive".into()));
        }
        if self.age_gap == 0 {
            return Err(SynthError::Config("age_gap must be positive".into()));
        }
        for (name, v) in [
            ("crossover_prob", self.crossover_prob),
            ("migration_rate", self.migration_rate),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(SynthError::Config(format!("{} must be in [0, 1]", name)));
            }
        }
        if self.mutation_intensity < 0.0 || !self.mutation_intensity.is_finite() {
            return Err(SynthError::Config(
                "mutation_intensity must be non-negative".into(),
            ));
        }
        if self.variation_retries == 0 {
            return Err(SynthError::Config(
                "variation_retries must be positive".into(),
            ));
        }
        self.get_metric_weights()?;
        Ok(())
    }

    /// Parses "name=weight,..." into a map. Empty string means no overrides.
    pub fn get_metric_weights(&self) -> SynthResult<BTreeMap<String, f64>> {
        let mut out = BTreeMap::new();
        for part in self.metric_weights.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, value) = part.split_once('=').ok_or_else(|| {
                SynthError::Config(format!("metric weight '{}' is not name=value", part))
            })?;
            let w: f64 = value.trim().parse().map_err(|_| {
                SynthError::Config(format!("invalid weight in metric_weights: '{}'", value))
            })?;
            out.insert(name.trim().to_string(), w);
        }
        Ok(out)
    }
}

/// Pooler knobs.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolParams {
    /// Capacity of the merged archive; each source contributes at most a
    /// third of this.
    #[arg(long, default_value_t = 90)]
    pub pool_capacity: usize,

    #[arg(long, default_value_t = 30)]
    pub pool_interval_secs: u64,

    /// Minimum sleep when a pass found no usable sources.
    #[arg(long, default_value_t = 5)]
    pub pool_floor_secs: u64,

    /// Aggregate once and exit instead of polling.
    #[arg(long, default_value_t = false)]
    pub one_shot: bool,

    /// Attempts at writing the archive before giving up on a pass.
    #[arg(long, default_value_t = 3)]
    pub write_retries: usize,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            pool_capacity: 90,
            pool_interval_secs: 30,
            pool_floor_secs: 5,
            one_shot: false,
            write_retries: 3,
        }
    }
}

impl PoolParams {
    pub fn validate(&self) -> SynthResult<()> {
        if self.pool_capacity == 0 {
            return Err(SynthError::Config("pool_capacity must be positive".into()));
        }
        if self.write_retries == 0 {
            return Err(SynthError::Config("write_retries must be positive".into()));
        }
        Ok(())
    }
}
