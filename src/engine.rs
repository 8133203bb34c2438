// ===== synthforge/src/engine.rs =====
//! One engine drives one search: selection, variation, migration, aging,
//! persistence. Strictly single-threaded and synchronous; the only blocking
//! operation is the caller-owned oracle call.

use crate::api::{EvalStatus, Evaluator, Genotype, MigrationSource, NoMigration, Variation};
use crate::error::{SynthError, SynthResult};
use crate::individual::Individual;
use crate::pareto::{self, MetricRanges, SortLimits};
use crate::population::dedup_by_signature;
use crate::state::SynthState;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Migrants requested per generation: proportional to layer size, clamped
/// to [1, N/2] whenever migration is requested at all.
pub fn migrant_request_count(layer_size: usize, migration_rate: f64) -> usize {
    ((layer_size as f64 * migration_rate).round() as usize)
        .min(layer_size / 2)
        .max(1)
}

pub struct SynthEngine<G: Genotype, E: Evaluator<G>, V: Variation<G>> {
    state: SynthState<G>,
    evaluator: E,
    variation: V,
    migration: Box<dyn MigrationSource<G>>,
    out_dir: PathBuf,
    rng: fastrand::Rng,
}

impl<G: Genotype, E: Evaluator<G>, V: Variation<G>> SynthEngine<G, E, V> {
    /// Fails fast on structural errors: invalid strategy, invalid problem,
    /// weight overrides naming unknown metrics, or a metric-set mismatch
    /// between problem and evaluator.
    pub fn new(
        mut state: SynthState<G>,
        evaluator: E,
        variation: V,
        out_dir: impl Into<PathBuf>,
        seed: Option<u64>,
    ) -> SynthResult<Self> {
        state.strategy.validate()?;
        state.problem.validate()?;
        let overrides = state.strategy.get_metric_weights()?;
        state.problem.apply_weight_overrides(&overrides)?;

        let provided: BTreeSet<String> = evaluator.provided_metrics().into_iter().collect();
        for m in &state.problem.metrics {
            if !provided.contains(&m.name) {
                return Err(SynthError::Config(format!(
                    "evaluator does not provide metric '{}'",
                    m.name
                )));
            }
        }

        let rng = match seed {
            Some(s) => fastrand::Rng::with_seed(s),
            None => fastrand::Rng::new(),
        };
        Ok(Self {
            state,
            evaluator,
            variation,
            migration: Box::new(NoMigration),
            out_dir: out_dir.into(),
            rng,
        })
    }

    pub fn with_migration(mut self, source: Box<dyn MigrationSource<G>>) -> Self {
        self.migration = source;
        self
    }

    pub fn state(&self) -> &SynthState<G> {
        &self.state
    }

    /// Runs generations until the total-individuals ceiling is reached.
    pub fn run(&mut self) -> SynthResult<()> {
        self.ensure_initialized()?;
        while self.step()? {}
        info!(
            generation = self.state.generation,
            total = self.state.registry.total_individuals,
            "stop condition reached"
        );
        Ok(())
    }

    /// One generation. Returns whether the search should continue.
    pub fn step(&mut self) -> SynthResult<bool> {
        self.ensure_initialized()?;
        let gen = self.state.generation;
        let age_gap = self.state.strategy.age_gap;
        let n = self.state.strategy.num_inds_per_layer;

        if gen > 0 && gen % age_gap as u64 == 0 {
            self.state
                .population
                .layer_birth(self.state.strategy.max_age_layers);
            let mut taken = BTreeSet::new();
            let founders = self.fill_founders(n, &mut taken);
            self.state.population.set_layer(0, founders);
            info!(
                generation = gen,
                layers = self.state.population.num_layers(),
                "layer birth"
            );
        }

        self.pull_migrants();

        // Global per-metric ranges over the full multi-layer population keep
        // the crowding-distance scale stable across layers.
        let ranges = MetricRanges::compute(
            &self.state.problem,
            self.state.population.all_individuals(),
        );

        let num_layers = self.state.population.num_layers();
        let mut elders_from_below: Vec<Individual<G>> = Vec::new();
        for i in 0..num_layers {
            let (candidates, elders) =
                self.state
                    .population
                    .candidate_parents(i, &self.state.problem, age_gap);
            let mut parents = pareto::select_n(&self.state.problem, candidates, n, &ranges);
            for p in &mut parents {
                p.genetic_age += 1;
            }
            let mut taken: BTreeSet<String> = parents
                .iter()
                .map(|p| p.performance_signature(&self.state.problem))
                .collect();
            let children = self.breed(&parents, &mut taken)?;

            let mut members = parents;
            members.extend(children);
            members.extend(std::mem::take(&mut elders_from_below));
            let members = dedup_by_signature(&self.state.problem, members);
            self.state.population.set_layer(i, members);
            elders_from_below = elders;
        }
        if !elders_from_below.is_empty() {
            debug!(
                count = elders_from_below.len(),
                "elders above the top layer dropped"
            );
        }

        self.state.generation += 1;
        let path = self.state.save(&self.out_dir)?;
        debug!(snapshot = %path.display(), "persisted");
        info!(
            generation = self.state.generation,
            total = self.state.registry.total_individuals,
            layers = self.state.population.num_layers(),
            "generation complete"
        );
        Ok(self.state.registry.total_individuals < self.state.strategy.max_individuals)
    }

    /// Current nondominated front across all layers, for reporting.
    pub fn front(&self) -> Vec<Individual<G>> {
        let all: Vec<Individual<G>> = self.state.population.all_individuals().cloned().collect();
        let layers = pareto::nondominated_sort(
            &self.state.problem,
            &all,
            SortLimits {
                max_individuals: None,
                max_layers: Some(1),
            },
        );
        match layers.into_iter().next() {
            Some(front) => front.into_iter().map(|i| all[i].clone()).collect(),
            None => Vec::new(),
        }
    }

    fn ensure_initialized(&mut self) -> SynthResult<()> {
        if self.state.population.num_layers() > 0 {
            return Ok(());
        }
        self.state
            .population
            .layer_birth(self.state.strategy.max_age_layers);
        let n = self.state.strategy.num_inds_per_layer;
        let mut taken = BTreeSet::new();
        let founders = self.fill_founders(n, &mut taken);
        self.state.population.set_layer(0, founders);
        let path = self.state.save(&self.out_dir)?;
        info!(
            founders = n,
            snapshot = %path.display(),
            "population initialized"
        );
        Ok(())
    }

    /// Short-circuiting evaluation pipeline: runs analyses in order, stops
    /// as soon as any metric of a completed analysis comes back BAD, and
    /// marks the whole individual bad rather than spending further oracle
    /// calls on it. Idempotent per (analysis, env point) pair.
    fn evaluate(&mut self, ind: &mut Individual<G>) -> EvalStatus {
        let SynthState {
            problem, registry, ..
        } = &mut self.state;
        let mut called = false;
        for analysis in &problem.analyses {
            for (idx, point) in analysis.env_points.iter().enumerate() {
                if ind.is_pair_evaluated(&analysis.id, idx) {
                    continue;
                }
                let results = self.evaluator.evaluate(&ind.genotype, analysis, point);
                registry.record_call(&analysis.id);
                called = true;
                ind.record(&analysis.id, idx, results);
            }
            let bad = problem
                .metrics_for(&analysis.id)
                .any(|m| ind.worst_case_metric_value(m).is_none());
            if bad {
                ind.force_bad();
                if called {
                    registry.record_individual();
                }
                return EvalStatus::Bad;
            }
        }
        if called {
            registry.record_individual();
        }
        EvalStatus::Ok
    }

    fn spawn_founder(&mut self) -> Individual<G> {
        let id = self.state.registry.fresh_id();
        let genotype = self.variation.random(&mut self.rng);
        let mut ind = Individual::new(id, genotype, 0);
        self.evaluate(&mut ind);
        ind
    }

    /// Fresh random founders with performance signatures unique against
    /// `taken`. After the retry ceiling the last attempt is accepted as-is
    /// so initialization always terminates.
    fn fill_founders(
        &mut self,
        count: usize,
        taken: &mut BTreeSet<String>,
    ) -> Vec<Individual<G>> {
        let retries = self.state.strategy.variation_retries;
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let mut accepted = false;
            for _ in 0..retries {
                let ind = self.spawn_founder();
                if ind.is_bad() {
                    continue;
                }
                let sig = ind.performance_signature(&self.state.problem);
                if taken.insert(sig) {
                    out.push(ind);
                    accepted = true;
                    break;
                }
            }
            if !accepted {
                warn!("no unique feasible founder within retry ceiling; accepting last draw");
                let ind = self.spawn_founder();
                taken.insert(ind.performance_signature(&self.state.problem));
                out.push(ind);
            }
        }
        out
    }

    /// Child set Q of size N. Parent pairs are redrawn after each failed
    /// attempt; when the retry ceiling is exhausted the engine substitutes
    /// fresh founders instead of looping forever.
    fn breed(
        &mut self,
        parents: &[Individual<G>],
        taken: &mut BTreeSet<String>,
    ) -> SynthResult<Vec<Individual<G>>> {
        let n = self.state.strategy.num_inds_per_layer;
        let mut children: Vec<Individual<G>> = Vec::with_capacity(n + 1);
        while children.len() < n {
            match self.try_spawn_pair(parents, taken) {
                Ok((a, b)) => {
                    children.push(a);
                    children.push(b);
                }
                Err(SynthError::VariationExhausted(attempts)) => {
                    warn!(attempts, "variation exhausted; substituting fresh founders");
                    let fresh = self.fill_founders(1, taken);
                    children.extend(fresh);
                }
                Err(e) => return Err(e),
            }
        }
        children.truncate(n);
        Ok(children)
    }

    /// One bounded attempt series at a valid child pair: both children must
    /// evaluate not-bad and carry signatures distinct from each other and
    /// from everything already accepted or in the parent pool.
    fn try_spawn_pair(
        &mut self,
        parents: &[Individual<G>],
        taken: &mut BTreeSet<String>,
    ) -> SynthResult<(Individual<G>, Individual<G>)> {
        let retries = self.state.strategy.variation_retries;
        if parents.len() < 2 {
            return Err(SynthError::VariationExhausted(0));
        }
        for _ in 0..retries {
            let i = self.rng.usize(0..parents.len());
            let mut j = self.rng.usize(0..parents.len());
            while j == i {
                j = self.rng.usize(0..parents.len());
            }
            let (pa, pb) = (&parents[i], &parents[j]);
            let age = pa.genetic_age.max(pb.genetic_age) + 1;
            let (ga, gb) = self
                .variation
                .spawn(&pa.genotype, &pb.genotype, &mut self.rng);

            let mut ca = Individual::new(self.state.registry.fresh_id(), ga, age);
            let mut cb = Individual::new(self.state.registry.fresh_id(), gb, age);
            if self.evaluate(&mut ca).is_bad() || self.evaluate(&mut cb).is_bad() {
                continue;
            }
            let sa = ca.performance_signature(&self.state.problem);
            let sb = cb.performance_signature(&self.state.problem);
            if sa == sb || taken.contains(&sa) || taken.contains(&sb) {
                continue;
            }
            taken.insert(sa);
            taken.insert(sb);
            return Ok((ca, cb));
        }
        Err(SynthError::VariationExhausted(retries))
    }

    fn pull_migrants(&mut self) {
        let rate = self.state.strategy.migration_rate;
        if rate <= 0.0 {
            return;
        }
        // With a single active layer there is no eligible destination:
        // migrants never enter layer 0.
        if self.state.population.num_layers() <= 1 {
            return;
        }
        let n = self.state.strategy.num_inds_per_layer;
        let count = migrant_request_count(n, rate);
        let migrants = self.migration.retrieve_migrants(count);
        if migrants.is_empty() {
            return;
        }
        let mut inserted = 0;
        let age_gap = self.state.strategy.age_gap;
        let SynthState {
            problem,
            population,
            ..
        } = &mut self.state;
        for m in migrants {
            if population.insert_migrant(m, problem, age_gap) {
                inserted += 1;
            }
        }
        debug!(inserted, requested = count, "migration");
    }
}
