// ===== synthforge/src/pareto.rs =====
//! Nondominated sorting and crowding-distance assignment.
//!
//! The sort works on a pass-scoped arena of index vectors; nothing but the
//! rank and crowding scalars survives on the individuals themselves.

use crate::individual::Individual;
use crate::metric::MetricValue;
use crate::problem::Problem;
use std::collections::BTreeMap;

/// Global per-metric (min, max) over the set under consideration. Stabilizes
/// the crowding-distance scale across layers.
#[derive(Debug, Clone, Default)]
pub struct MetricRanges {
    ranges: BTreeMap<String, (f64, f64)>,
}

impl MetricRanges {
    pub fn compute<'a, G: 'a, I>(problem: &Problem, inds: I) -> Self
    where
        I: IntoIterator<Item = &'a Individual<G>>,
    {
        let mut ranges: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for ind in inds {
            for m in &problem.metrics {
                if let Some(v) = ind.worst_case_metric_value(m) {
                    let e = ranges.entry(m.name.clone()).or_insert((v, v));
                    e.0 = e.0.min(v);
                    e.1 = e.1.max(v);
                }
            }
        }
        Self { ranges }
    }

    pub fn get(&self, metric: &str) -> Option<(f64, f64)> {
        self.ranges.get(metric).copied()
    }
}

/// Early-exit caps for the sort; selection and reporting both work off
/// partial results.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortLimits {
    pub max_individuals: Option<usize>,
    pub max_layers: Option<usize>,
}

struct Scored {
    values: Vec<MetricValue>,
    feasible: bool,
    violation: f64,
}

/// Constrained domination: a feasible individual beats an infeasible one;
/// two feasible individuals compare metric-wise; two infeasible individuals
/// compare by their weighted violation sums (the only place weights enter).
fn dominates(problem: &Problem, a: &Scored, b: &Scored) -> bool {
    match (a.feasible, b.feasible) {
        (true, false) => true,
        (false, true) => false,
        (false, false) => a.violation < b.violation,
        (true, true) => {
            let mut strictly_better = false;
            for (i, m) in problem.metrics.iter().enumerate() {
                if m.is_better(b.values[i], a.values[i]) {
                    return false;
                }
                if m.is_better(a.values[i], b.values[i]) {
                    strictly_better = true;
                }
            }
            strictly_better
        }
    }
}

/// Peels the population into Pareto layers: every member of layer k is
/// dominated by at least one member of some earlier layer and by none within
/// its own. Returns index layers into `inds`.
pub fn nondominated_sort<G>(
    problem: &Problem,
    inds: &[Individual<G>],
    limits: SortLimits,
) -> Vec<Vec<usize>> {
    let n = inds.len();
    if n == 0 {
        return Vec::new();
    }

    let scored: Vec<Scored> = inds
        .iter()
        .map(|ind| Scored {
            values: problem
                .metrics
                .iter()
                .map(|m| ind.worst_case_metric_value(m))
                .collect(),
            feasible: ind.is_feasible(problem),
            violation: ind.weighted_violation(problem),
        })
        .collect();

    // Pairwise domination counts; O(n^2 * metrics) is fine at population
    // sizes of hundreds.
    let mut dominated: Vec<Vec<u32>> = vec![Vec::new(); n];
    let mut count = vec![0u32; n];
    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(problem, &scored[i], &scored[j]) {
                dominated[i].push(j as u32);
                count[j] += 1;
            } else if dominates(problem, &scored[j], &scored[i]) {
                dominated[j].push(i as u32);
                count[i] += 1;
            }
        }
    }

    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| count[i] == 0).collect();
    let mut taken = 0;

    while !current.is_empty() {
        taken += current.len();
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated[i] {
                let j = j as usize;
                count[j] -= 1;
                if count[j] == 0 {
                    next.push(j);
                }
            }
        }
        layers.push(current);
        if let Some(max) = limits.max_individuals {
            if taken >= max {
                break;
            }
        }
        if let Some(max) = limits.max_layers {
            if layers.len() >= max {
                break;
            }
        }
        current = next;
    }
    layers
}

/// Crowding distances for one mutually nondominated layer, scaled by the
/// global ranges. Boundary individuals per metric get +inf; interior ones
/// accumulate normalized neighbor gaps. Degenerate metrics contribute
/// nothing.
pub fn crowding_distances<G>(
    problem: &Problem,
    inds: &[Individual<G>],
    layer: &[usize],
    ranges: &MetricRanges,
) -> Vec<f64> {
    crowding_with(problem, layer, ranges, |idx, m| {
        inds[idx].worst_case_metric_value(m)
    })
}

fn crowding_with(
    problem: &Problem,
    layer: &[usize],
    ranges: &MetricRanges,
    value: impl Fn(usize, &crate::metric::Metric) -> MetricValue,
) -> Vec<f64> {
    let mut dist = vec![0.0f64; layer.len()];
    for m in &problem.metrics {
        let (lo, hi) = match ranges.get(&m.name) {
            Some(r) => r,
            None => continue,
        };
        if hi <= lo {
            continue;
        }
        // Positions in `layer` that carry a number for this metric.
        let mut order: Vec<(usize, f64)> = layer
            .iter()
            .enumerate()
            .filter_map(|(pos, &idx)| value(idx, m).map(|v| (pos, v)))
            .collect();
        if order.len() < 2 {
            continue;
        }
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        dist[order[0].0] = f64::INFINITY;
        dist[order[order.len() - 1].0] = f64::INFINITY;
        for k in 1..order.len() - 1 {
            dist[order[k].0] += (order[k + 1].1 - order[k - 1].1).abs() / (hi - lo);
        }
    }
    dist
}

/// NSGA-II style reduction: walk sorted layers, assigning rank and crowding
/// as visited; whole layers are taken while they fit, the overflow layer is
/// filled by descending crowding distance (id as deterministic tie-break).
/// Consumes the pool and returns exactly `min(n, pool.len())` individuals.
pub fn select_n<G>(
    problem: &Problem,
    pool: Vec<Individual<G>>,
    n: usize,
    ranges: &MetricRanges,
) -> Vec<Individual<G>> {
    let layers = nondominated_sort(
        problem,
        &pool,
        SortLimits {
            max_individuals: Some(n),
            max_layers: None,
        },
    );

    let mut crowding: Vec<f64> = vec![0.0; pool.len()];
    for layer in &layers {
        let dists = crowding_distances(problem, &pool, layer, ranges);
        for (pos, &idx) in layer.iter().enumerate() {
            crowding[idx] = dists[pos];
        }
    }
    let ids: Vec<u64> = pool.iter().map(|i| i.id).collect();
    let mut slots: Vec<Option<Individual<G>>> = pool.into_iter().map(Some).collect();

    let mut selected: Vec<Individual<G>> = Vec::with_capacity(n);
    for (r, layer) in layers.iter().enumerate() {
        let remaining = n - selected.len();
        let chosen: Vec<usize> = if layer.len() <= remaining {
            layer.clone()
        } else {
            let mut by_crowding = layer.clone();
            by_crowding.sort_by(|&a, &b| {
                crowding[b]
                    .total_cmp(&crowding[a])
                    .then_with(|| ids[a].cmp(&ids[b]))
            });
            by_crowding.truncate(remaining);
            by_crowding
        };
        for idx in chosen {
            if let Some(mut ind) = slots[idx].take() {
                ind.rank = r;
                ind.crowding = crowding[idx];
                selected.push(ind);
            }
        }
        if selected.len() >= n {
            break;
        }
    }
    selected
}
