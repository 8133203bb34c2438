// ===== synthforge/src/individual.rs =====
use crate::metric::{Metric, MetricValue};
use crate::problem::Problem;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One candidate: genotype, cached oracle results, and search bookkeeping.
///
/// Rank and crowding distance are working values of the current generation;
/// they are recomputed on every sort and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "G: Serialize", deserialize = "G: DeserializeOwned"))]
pub struct Individual<G> {
    pub id: u64,
    pub genotype: G,
    /// 0 for founders, max(parents) + 1 for offspring.
    pub genetic_age: u32,
    /// Metric name -> measured values, one per evaluated env point,
    /// in evaluation order. `None` is the BAD sentinel.
    values: BTreeMap<String, Vec<MetricValue>>,
    /// (analysis id, env point index) pairs already sent to the oracle.
    /// Re-requesting a cached pair is a no-op.
    evaluated: BTreeSet<(String, usize)>,
    force_bad: bool,

    #[serde(skip)]
    pub rank: usize,
    #[serde(skip)]
    pub crowding: f64,
}

impl<G> Individual<G> {
    pub fn new(id: u64, genotype: G, genetic_age: u32) -> Self {
        Self {
            id,
            genotype,
            genetic_age,
            values: BTreeMap::new(),
            evaluated: BTreeSet::new(),
            force_bad: false,
            rank: 0,
            crowding: 0.0,
        }
    }

    pub fn is_pair_evaluated(&self, analysis: &str, point: usize) -> bool {
        self.evaluated.contains(&(analysis.to_string(), point))
    }

    /// Caches one oracle result. Idempotent per (analysis, point).
    /// Non-finite values (NaN, ±inf) are coerced to the BAD sentinel; they
    /// carry no usable margin or violation distance.
    pub fn record(
        &mut self,
        analysis: &str,
        point: usize,
        results: BTreeMap<String, MetricValue>,
    ) {
        if !self.evaluated.insert((analysis.to_string(), point)) {
            return;
        }
        for (metric, value) in results {
            let value = value.filter(|v| v.is_finite());
            self.values.entry(metric).or_default().push(value);
        }
    }

    /// Marks the individual bad outright, short-circuiting any remaining
    /// evaluation once a prerequisite metric has already failed.
    pub fn force_bad(&mut self) {
        self.force_bad = true;
    }

    pub fn is_bad(&self) -> bool {
        self.force_bad || self.values.values().any(|vs| vs.iter().any(|v| v.is_none()))
    }

    pub fn worst_case_metric_value(&self, metric: &Metric) -> MetricValue {
        let values = self.values.get(&metric.name)?;
        metric.worst_case(values)
    }

    /// Exactly the per-metric conjunction: feasible iff every metric is
    /// feasible at its worst case. The force-bad flag does not enter here;
    /// a force-marked individual always has a BAD worst case on the metric
    /// that failed, which is infeasible on its own.
    pub fn is_feasible(&self, problem: &Problem) -> bool {
        problem
            .metrics
            .iter()
            .all(|m| m.is_feasible(self.worst_case_metric_value(m)))
    }

    /// Sum of weighted constraint violations across all metrics; the scalar
    /// used to order infeasible individuals against each other.
    pub fn weighted_violation(&self, problem: &Problem) -> f64 {
        problem
            .metrics
            .iter()
            .map(|m| m.weight * m.constraint_violation(self.worst_case_metric_value(m)))
            .sum()
    }

    /// Canonical rendering of all worst-case metric values. Two individuals
    /// with equal signatures are duplicates regardless of genotype.
    pub fn performance_signature(&self, problem: &Problem) -> String {
        let mut parts = Vec::with_capacity(problem.metrics.len());
        for m in &problem.metrics {
            match self.worst_case_metric_value(m) {
                Some(v) => parts.push(format!("{}={:.6e}", m.name, v)),
                None => parts.push(format!("{}=BAD", m.name)),
            }
        }
        parts.join(";")
    }
}
