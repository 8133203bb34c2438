// ===== synthforge/tests/engine_tests.rs =====
use std::collections::{BTreeMap, BTreeSet};
use synthforge::api::{Evaluator, Variation};
use synthforge::config::StrategyParams;
use synthforge::engine::{migrant_request_count, SynthEngine};
use synthforge::metric::{Metric, MetricValue};
use synthforge::problem::{Analysis, EnvPoint, Problem};
use synthforge::state::{latest_snapshot, SynthState};

fn toy_problem() -> Problem {
    let analyses = vec![Analysis {
        id: "an".into(),
        env_points: vec![EnvPoint {
            id: "nom".into(),
            params: BTreeMap::new(),
        }],
    }];
    let metrics = vec![
        Metric::minimize("m1", "an", 10.0, true).unwrap(),
        Metric::maximize("m2", "an", 5.0, true).unwrap(),
    ];
    Problem::new("toy", metrics, analyses).unwrap()
}

fn toy_strategy() -> StrategyParams {
    StrategyParams {
        num_inds_per_layer: 4,
        max_age_layers: 3,
        age_gap: 3,
        max_individuals: 40,
        migration_rate: 0.0,
        variation_retries: 8,
        ..StrategyParams::default()
    }
}

/// Anti-correlated pair of metrics: every feasible genotype trades m1
/// against m2, so fronts stay wide and signatures stay distinct.
struct ToyEval;

impl Evaluator<Vec<f64>> for ToyEval {
    fn provided_metrics(&self) -> Vec<String> {
        vec!["m1".into(), "m2".into()]
    }

    fn evaluate(
        &mut self,
        genotype: &Vec<f64>,
        _analysis: &Analysis,
        _point: &EnvPoint,
    ) -> BTreeMap<String, MetricValue> {
        let s: f64 = genotype.iter().map(|x| x.abs()).sum();
        BTreeMap::from([
            ("m1".to_string(), Some(s)),
            ("m2".to_string(), Some(12.0 - s)),
        ])
    }
}

struct ToyVar;

impl Variation<Vec<f64>> for ToyVar {
    fn random(&mut self, rng: &mut fastrand::Rng) -> Vec<f64> {
        (0..3).map(|_| rng.f64() * 2.0 - 1.0).collect()
    }

    fn spawn(&mut self, a: &Vec<f64>, b: &Vec<f64>, rng: &mut fastrand::Rng) -> (Vec<f64>, Vec<f64>) {
        let blend = |x: f64, y: f64, rng: &mut fastrand::Rng| {
            let w = rng.f64();
            w * x + (1.0 - w) * y + (rng.f64() - 0.5) * 0.05
        };
        let ca = a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| blend(x, y, rng))
            .collect();
        let cb = a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| blend(y, x, rng))
            .collect();
        (ca, cb)
    }
}

fn toy_engine(dir: &std::path::Path) -> SynthEngine<Vec<f64>, ToyEval, ToyVar> {
    let state = SynthState::new(toy_problem(), toy_strategy()).unwrap();
    SynthEngine::new(state, ToyEval, ToyVar, dir, Some(7)).unwrap()
}

#[test]
fn migrant_request_count_clamps() {
    assert_eq!(migrant_request_count(10, 0.15), 2);
    assert_eq!(migrant_request_count(10, 1.0), 5);
    assert_eq!(migrant_request_count(100, 0.001), 1);
    assert_eq!(migrant_request_count(3, 0.9), 1);
}

#[test]
fn constructor_rejects_unprovided_metric() {
    let analyses = vec![Analysis {
        id: "an".into(),
        env_points: vec![EnvPoint {
            id: "nom".into(),
            params: BTreeMap::new(),
        }],
    }];
    let metrics = vec![
        Metric::minimize("m1", "an", 10.0, true).unwrap(),
        Metric::minimize("area", "an", 1.0, false).unwrap(),
    ];
    let problem = Problem::new("toy", metrics, analyses).unwrap();
    let state = SynthState::new(problem, toy_strategy()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    assert!(SynthEngine::new(state, ToyEval, ToyVar, dir.path(), Some(7)).is_err());
}

#[test]
fn step_advances_one_generation_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = toy_engine(dir.path());

    assert!(engine.step().unwrap());
    assert_eq!(engine.state().generation, 1);
    assert!(engine.state().registry.total_individuals > 0);

    // Generation 0 snapshot from initialization plus generation 1.
    let (latest, _) = latest_snapshot(dir.path()).unwrap();
    assert_eq!(latest, 1);
    assert!(dir.path().join("state_000000.json").exists());
}

#[test]
fn layer_birth_on_age_gap_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = toy_engine(dir.path());

    for _ in 0..3 {
        engine.step().unwrap();
    }
    assert_eq!(engine.state().generation, 3);
    assert_eq!(engine.state().population.num_layers(), 1);

    // The step leaving generation 3 opens layer 1.
    engine.step().unwrap();
    assert_eq!(engine.state().population.num_layers(), 2);
    assert!(!engine.state().population.layer(1).is_empty());
}

#[test]
fn run_stops_at_individual_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = toy_engine(dir.path());
    engine.run().unwrap();

    let state = engine.state();
    assert!(state.registry.total_individuals >= state.strategy.max_individuals);
    assert!(state.generation >= 1);
    assert!(state.validate().is_ok());

    // Layer populations hold pairwise distinct performance signatures.
    for layer in state.population.layers() {
        let sigs: BTreeSet<String> = layer
            .iter()
            .map(|i| i.performance_signature(&state.problem))
            .collect();
        assert_eq!(sigs.len(), layer.len());
    }

    // The front is non-empty and entirely feasible for this oracle.
    let front = engine.front();
    assert!(!front.is_empty());
    assert!(front.iter().all(|i| i.is_feasible(&engine.state().problem)));
}

#[test]
fn finished_run_resumes_from_newest_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = toy_engine(dir.path());
    engine.run().unwrap();
    let generation = engine.state().generation;
    let total = engine.state().population.total_len();

    let resumed: SynthState<Vec<f64>> = SynthState::resume(dir.path()).unwrap().unwrap();
    assert_eq!(resumed.generation, generation);
    assert_eq!(resumed.population.total_len(), total);
}

/// Oracle whose first analysis always fails; the second analysis must never
/// be charged an evaluation.
struct FirstAnalysisBad;

impl Evaluator<Vec<f64>> for FirstAnalysisBad {
    fn provided_metrics(&self) -> Vec<String> {
        vec!["m1".into(), "m2".into()]
    }

    fn evaluate(
        &mut self,
        _genotype: &Vec<f64>,
        analysis: &Analysis,
        _point: &EnvPoint,
    ) -> BTreeMap<String, MetricValue> {
        match analysis.id.as_str() {
            "a1" => BTreeMap::from([("m1".to_string(), None)]),
            _ => BTreeMap::from([("m2".to_string(), Some(1.0))]),
        }
    }
}

#[test]
fn bad_analysis_short_circuits_later_analyses() {
    let analyses = vec![
        Analysis {
            id: "a1".into(),
            env_points: vec![EnvPoint {
                id: "nom".into(),
                params: BTreeMap::new(),
            }],
        },
        Analysis {
            id: "a2".into(),
            env_points: vec![EnvPoint {
                id: "nom".into(),
                params: BTreeMap::new(),
            }],
        },
    ];
    let metrics = vec![
        Metric::minimize("m1", "a1", 10.0, false).unwrap(),
        Metric::minimize("m2", "a2", 10.0, false).unwrap(),
    ];
    let problem = Problem::new("toy", metrics, analyses).unwrap();
    let state = SynthState::new(problem, toy_strategy()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut engine = SynthEngine::new(state, FirstAnalysisBad, ToyVar, dir.path(), Some(7)).unwrap();

    engine.step().unwrap();
    let calls = &engine.state().registry.eval_calls;
    assert!(calls.get("a1").copied().unwrap_or(0) > 0);
    assert_eq!(calls.get("a2"), None);
    assert!(engine
        .state()
        .population
        .all_individuals()
        .all(|i| i.is_bad()));
}
