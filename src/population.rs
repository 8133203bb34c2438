// ===== synthforge/src/population.rs =====
use crate::individual::Individual;
use crate::problem::Problem;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Age ceiling for a non-top layer: quadratic growth, so low layers churn
/// and explore while high layers stabilize and exploit.
pub fn max_age_for_layer(layer: usize, age_gap: u32) -> u32 {
    ((layer * layer + 1) as u32) * age_gap
}

/// ALPS lifecycle container: an ordered sequence of age layers, layer 0
/// youngest. Capacity per layer is parents + offspring (2N).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "G: Serialize", deserialize = "G: DeserializeOwned"))]
pub struct AgeLayeredPopulation<G> {
    layers: Vec<Vec<Individual<G>>>,
}

impl<G> Default for AgeLayeredPopulation<G> {
    fn default() -> Self {
        Self { layers: Vec::new() }
    }
}

impl<G> AgeLayeredPopulation<G> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, i: usize) -> &[Individual<G>] {
        &self.layers[i]
    }

    pub fn layers(&self) -> &[Vec<Individual<G>>] {
        &self.layers
    }

    pub fn set_layer(&mut self, i: usize, members: Vec<Individual<G>>) {
        self.layers[i] = members;
    }

    pub fn all_individuals(&self) -> impl Iterator<Item = &Individual<G>> {
        self.layers.iter().flatten()
    }

    pub fn total_len(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Whether `genetic_age` may enter `layer` for one more generation.
    /// The top active layer carries no ceiling.
    pub fn admits(&self, layer: usize, genetic_age: u32, age_gap: u32) -> bool {
        layer + 1 == self.layers.len() || genetic_age + 1 <= max_age_for_layer(layer, age_gap)
    }

    /// Layer birth, run every `age_gap` generations: grow a new top layer
    /// while below the cap, push layer 0's members up into layer 1 for one
    /// last chance to compete, and leave layer 0 empty for fresh founders.
    pub fn layer_birth(&mut self, max_layers: usize) {
        if self.layers.is_empty() {
            self.layers.push(Vec::new());
            return;
        }
        if self.layers.len() < max_layers {
            self.layers.push(Vec::new());
        }
        if self.layers.len() >= 2 {
            let demoted = std::mem::take(&mut self.layers[0]);
            self.layers[1].extend(demoted);
        } else {
            self.layers[0].clear();
        }
    }

    /// Places a migrant into the lowest layer its age admits, skipping the
    /// whole insertion when that would be layer 0: mature migrants must not
    /// evict founders before those get a fair competitive chance. Duplicate
    /// performance signatures within the target layer are rejected.
    pub fn insert_migrant(&mut self, ind: Individual<G>, problem: &Problem, age_gap: u32) -> bool {
        let target = (0..self.layers.len()).find(|&i| self.admits(i, ind.genetic_age, age_gap));
        let target = match target {
            Some(0) | None => {
                debug!(id = ind.id, age = ind.genetic_age, "migrant skipped");
                return false;
            }
            Some(i) => i,
        };
        let sig = ind.performance_signature(problem);
        let dup = self.layers[target]
            .iter()
            .any(|m| m.performance_signature(problem) == sig);
        if dup {
            return false;
        }
        self.layers[target].push(ind);
        true
    }
}

impl<G: Clone> AgeLayeredPopulation<G> {
    /// Splits the current members of `layer` by the admission rule, then
    /// extends the admitted set with the layer below's members whose
    /// signature is not already present. Returns (candidate parents, elders
    /// bound for the layer above).
    pub fn candidate_parents(
        &self,
        layer: usize,
        problem: &Problem,
        age_gap: u32,
    ) -> (Vec<Individual<G>>, Vec<Individual<G>>) {
        let mut candidates: Vec<Individual<G>> = Vec::new();
        let mut elders: Vec<Individual<G>> = Vec::new();
        for ind in &self.layers[layer] {
            if self.admits(layer, ind.genetic_age, age_gap) {
                candidates.push(ind.clone());
            } else {
                elders.push(ind.clone());
            }
        }
        if layer > 0 {
            let mut seen: BTreeSet<String> = candidates
                .iter()
                .map(|c| c.performance_signature(problem))
                .collect();
            for ind in &self.layers[layer - 1] {
                let sig = ind.performance_signature(problem);
                if seen.insert(sig) {
                    candidates.push(ind.clone());
                }
            }
        }
        (candidates, elders)
    }
}

/// Drops later duplicates by performance signature, preserving order.
pub fn dedup_by_signature<G>(problem: &Problem, members: Vec<Individual<G>>) -> Vec<Individual<G>> {
    let mut seen = BTreeSet::new();
    members
        .into_iter()
        .filter(|ind| seen.insert(ind.performance_signature(problem)))
        .collect()
}
