// ===== synthforge/tests/individual_tests.rs =====
use std::collections::BTreeMap;
use synthforge::individual::Individual;
use synthforge::metric::Metric;
use synthforge::problem::{Analysis, EnvPoint, Problem};

fn problem() -> Problem {
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
    Problem::new("p", metrics, analyses).unwrap()
}

fn ind(m1: Option<f64>, m2: Option<f64>) -> Individual<Vec<f64>> {
    let mut i = Individual::new(0, vec![], 0);
    i.record(
        "an",
        0,
        BTreeMap::from([("m1".to_string(), m1), ("m2".to_string(), m2)]),
    );
    i
}

fn per_metric_feasible(i: &Individual<Vec<f64>>, problem: &Problem) -> bool {
    problem
        .metrics
        .iter()
        .all(|m| m.is_feasible(i.worst_case_metric_value(m)))
}

#[test]
fn feasibility_is_the_per_metric_conjunction() {
    let problem = problem();
    for i in [
        ind(Some(2.0), Some(8.0)),
        ind(Some(11.0), Some(8.0)),
        ind(Some(2.0), None),
        ind(None, None),
    ] {
        assert_eq!(i.is_feasible(&problem), per_metric_feasible(&i, &problem));
    }
}

#[test]
fn force_bad_does_not_break_the_feasibility_equation() {
    let problem = problem();
    let mut i = ind(Some(2.0), Some(8.0));
    i.force_bad();
    // Bad for selection purposes, but feasibility stays the conjunction of
    // the cached worst cases.
    assert!(i.is_bad());
    assert_eq!(i.is_feasible(&problem), per_metric_feasible(&i, &problem));
    assert!(i.is_feasible(&problem));
}

#[test]
fn non_finite_oracle_values_become_bad() {
    let problem = problem();
    for poisoned in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let i = ind(Some(poisoned), Some(8.0));
        assert!(i.is_bad());
        assert_eq!(i.worst_case_metric_value(&problem.metrics[0]), None);
        // A poisoned value must never look "less violated" than a real
        // infeasible number.
        assert!(i.weighted_violation(&problem).is_infinite());
        assert!(i
            .performance_signature(&problem)
            .starts_with("m1=BAD"));
    }
}

#[test]
fn record_is_idempotent_per_pair() {
    let mut i = ind(Some(2.0), Some(8.0));
    assert!(i.is_pair_evaluated("an", 0));
    i.record(
        "an",
        0,
        BTreeMap::from([("m1".to_string(), Some(99.0)), ("m2".to_string(), Some(99.0))]),
    );
    let problem = problem();
    assert_eq!(i.worst_case_metric_value(&problem.metrics[0]), Some(2.0));
}
