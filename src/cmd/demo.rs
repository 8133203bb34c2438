// ===== synthforge/src/cmd/demo.rs =====
//! Built-in demo problem: a numeric genotype scored by a synthetic oracle
//! with a temperature-drifted hot corner. Gain rewards large coefficients,
//! ripple punishes them, so the two metrics trade off along a real front.

use std::collections::BTreeMap;
use synthforge::api::{Evaluator, Variation};
use synthforge::error::SynthResult;
use synthforge::metric::{Metric, MetricValue};
use synthforge::problem::{Analysis, EnvPoint, Problem};

pub fn demo_problem() -> SynthResult<Problem> {
    let analyses = vec![Analysis {
        id: "perf".into(),
        env_points: vec![
            EnvPoint {
                id: "typ".into(),
                params: BTreeMap::from([("temp".into(), 27.0)]),
            },
            EnvPoint {
                id: "hot".into(),
                params: BTreeMap::from([("temp".into(), 85.0)]),
            },
        ],
    }];
    let metrics = vec![
        Metric::maximize("gain", "perf", 10.0, true)?,
        Metric::minimize("ripple", "perf", 1.0, true)?,
        Metric::in_range("offset", "perf", -0.5, 0.5)?,
    ];
    Problem::new("demo", metrics, analyses)
}

pub struct DemoEvaluator;

impl Evaluator<Vec<f64>> for DemoEvaluator {
    fn provided_metrics(&self) -> Vec<String> {
        vec!["gain".into(), "ripple".into(), "offset".into()]
    }

    fn evaluate(
        &mut self,
        genotype: &Vec<f64>,
        _analysis: &Analysis,
        point: &EnvPoint,
    ) -> BTreeMap<String, MetricValue> {
        let t = point.params.get("temp").copied().unwrap_or(27.0);
        let drift = 1.0 + (t - 27.0) / 400.0;

        let dims = genotype.len().max(1) as f64;
        let sum_abs: f64 = genotype.iter().map(|x| x.abs()).sum();
        let mean = genotype.iter().sum::<f64>() / dims;

        BTreeMap::from([
            ("gain".to_string(), Some((12.0 + sum_abs) / drift)),
            ("ripple".to_string(), Some(sum_abs / dims * 2.0 * drift)),
            ("offset".to_string(), Some(mean * drift)),
        ])
    }
}

pub struct DemoVariation {
    pub dims: usize,
    pub crossover_prob: f64,
    pub intensity: f64,
}

impl Variation<Vec<f64>> for DemoVariation {
    fn random(&mut self, rng: &mut fastrand::Rng) -> Vec<f64> {
        (0..self.dims).map(|_| rng.f64() * 2.0 - 1.0).collect()
    }

    fn spawn(
        &mut self,
        a: &Vec<f64>,
        b: &Vec<f64>,
        rng: &mut fastrand::Rng,
    ) -> (Vec<f64>, Vec<f64>) {
        let mut ca = a.clone();
        let mut cb = b.clone();
        if rng.f64() < self.crossover_prob {
            for k in 0..ca.len().min(cb.len()) {
                if rng.bool() {
                    std::mem::swap(&mut ca[k], &mut cb[k]);
                }
            }
        }
        for child in [&mut ca, &mut cb] {
            for x in child.iter_mut() {
                if rng.f64() < 0.5 {
                    *x += (rng.f64() * 2.0 - 1.0) * self.intensity;
                }
            }
        }
        (ca, cb)
    }
}
