// ===== synthforge/benches/sort_bench.rs =====
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::collections::BTreeMap;
use std::hint::black_box;
use synthforge::individual::Individual;
use synthforge::metric::Metric;
use synthforge::pareto::{nondominated_sort, select_n, MetricRanges, SortLimits};
use synthforge::problem::{Analysis, EnvPoint, Problem};

fn setup_problem() -> Problem {
    let analyses = vec![Analysis {
        id: "perf".into(),
        env_points: vec![EnvPoint {
            id: "nom".into(),
            params: BTreeMap::new(),
        }],
    }];
    let metrics = vec![
        Metric::minimize("power", "perf", 50.0, true).unwrap(),
        Metric::maximize("gain", "perf", 5.0, true).unwrap(),
        Metric::in_range("offset", "perf", -1.0, 1.0).unwrap(),
    ];
    Problem::new("bench", metrics, analyses).unwrap()
}

fn setup_population(problem: &Problem, count: usize) -> Vec<Individual<Vec<f64>>> {
    let mut rng = fastrand::Rng::with_seed(42);
    (0..count as u64)
        .map(|id| {
            let mut ind = Individual::new(id, vec![], 0);
            let power = rng.f64() * 60.0;
            let gain = rng.f64() * 12.0;
            let offset = rng.f64() * 3.0 - 1.5;
            ind.record(
                "perf",
                0,
                BTreeMap::from([
                    ("power".to_string(), Some(power)),
                    ("gain".to_string(), Some(gain)),
                    ("offset".to_string(), Some(offset)),
                ]),
            );
            ind
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let problem = setup_problem();
    let inds = setup_population(&problem, 400);
    let ranges = MetricRanges::compute(&problem, inds.iter());

    c.bench_function("nondominated_sort (400 inds, 3 metrics)", |b| {
        b.iter(|| nondominated_sort(black_box(&problem), black_box(&inds), SortLimits::default()))
    });

    c.bench_function("nondominated_sort capped at 100", |b| {
        b.iter(|| {
            nondominated_sort(
                black_box(&problem),
                black_box(&inds),
                SortLimits {
                    max_individuals: Some(100),
                    max_layers: None,
                },
            )
        })
    });

    c.bench_function("select_n 400 -> 100", |b| {
        b.iter_batched(
            || inds.clone(),
            |pool| select_n(black_box(&problem), pool, 100, &ranges),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
