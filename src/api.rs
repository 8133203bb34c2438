// ===== synthforge/src/api.rs =====
//! The seams where caller-owned collaborators plug into the engine: the
//! evaluation oracle, the genotype variation operators, and the migrant
//! source.

use crate::individual::Individual;
use crate::metric::MetricValue;
use crate::problem::{Analysis, EnvPoint};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

/// Anything serializable and cloneable can act as a genotype; the engine
/// never looks inside it.
pub trait Genotype: Clone + Send + Serialize + DeserializeOwned + 'static {}

impl<T: Clone + Send + Serialize + DeserializeOwned + 'static> Genotype for T {}

/// The external oracle. `evaluate` blocks until it returns values or BAD;
/// timeout and process handling are the oracle's own responsibility. The
/// engine never retries a (genotype, analysis, env point) triple.
pub trait Evaluator<G: Genotype> {
    /// Every metric name this oracle can produce, across all analyses.
    /// Checked against the problem at engine construction.
    fn provided_metrics(&self) -> Vec<String>;

    /// Measured values per metric for one analysis at one environment
    /// point. `None` is BAD: the measurement failed and the value will
    /// never be retried.
    fn evaluate(
        &mut self,
        genotype: &G,
        analysis: &Analysis,
        point: &EnvPoint,
    ) -> BTreeMap<String, MetricValue>;
}

/// Caller-supplied genotype construction and recombination.
pub trait Variation<G: Genotype> {
    /// A fresh random genotype for founders.
    fn random(&mut self, rng: &mut fastrand::Rng) -> G;

    /// Two children from two parents (crossover plus mutation, per the
    /// caller's own operators and rates).
    fn spawn(&mut self, a: &G, b: &G, rng: &mut fastrand::Rng) -> (G, G);
}

/// Reads a shared pooled archive opaquely. Returning fewer migrants than
/// requested, or none at all, is legitimate and never fatal: absence, a
/// parse conflict with a concurrent writer, or disabled migration all just
/// skip migration this generation.
pub trait MigrationSource<G: Genotype> {
    fn retrieve_migrants(&mut self, count: usize) -> Vec<Individual<G>>;
}

/// Migration disabled.
pub struct NoMigration;

impl<G: Genotype> MigrationSource<G> for NoMigration {
    fn retrieve_migrants(&mut self, _count: usize) -> Vec<Individual<G>> {
        Vec::new()
    }
}

/// Tagged outcome of the short-circuiting evaluation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStatus {
    Ok,
    Bad,
}

impl EvalStatus {
    pub fn is_bad(self) -> bool {
        self == EvalStatus::Bad
    }
}
