// ===== synthforge/tests/pooler_tests.rs =====
use std::collections::BTreeMap;
use std::path::Path;
use synthforge::api::MigrationSource;
use synthforge::config::{PoolParams, StrategyParams};
use synthforge::individual::Individual;
use synthforge::metric::Metric;
use synthforge::pooler::{PoolArchive, PoolMigration, PoolSources, Pooler};
use synthforge::problem::{Analysis, EnvPoint, Problem};
use synthforge::state::{load_json, SynthState};

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

fn ind(id: u64, m1: f64, m2: f64) -> Individual<Vec<f64>> {
    let mut i = Individual::new(id, vec![m1], 0);
    i.record(
        "an",
        0,
        BTreeMap::from([("m1".to_string(), Some(m1)), ("m2".to_string(), Some(m2))]),
    );
    i
}

/// Writes a snapshot of `count` mutually nondominated individuals into `dir`.
fn write_source(dir: &Path, count: usize) {
    let mut state = SynthState::new(
        problem(),
        StrategyParams {
            num_inds_per_layer: 20,
            ..StrategyParams::default()
        },
    )
    .unwrap();
    state.population.layer_birth(10);
    let inds: Vec<_> = (0..count as u64)
        .map(|k| ind(k, 0.1 * k as f64, 20.0 - 0.1 * k as f64))
        .collect();
    state.population.set_layer(0, inds);
    state.generation = 5;
    state.save(dir).unwrap();
}

fn params(capacity: usize) -> PoolParams {
    PoolParams {
        pool_capacity: capacity,
        one_shot: true,
        ..PoolParams::default()
    }
}

#[test]
fn pass_merges_valid_sources_and_skips_missing_ones() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), 50);
    let missing = dir.path().join("never-written");

    let archive_path = dir.path().join("pool.json");
    let sources = PoolSources::Static(vec![dir.path().to_path_buf(), missing]);
    let mut pooler: Pooler<Vec<f64>> =
        Pooler::new(problem(), params(150), sources, &archive_path).unwrap();

    assert_eq!(pooler.pass().unwrap(), 1);
    let archive: PoolArchive<Vec<f64>> = load_json(&archive_path).unwrap();
    assert_eq!(archive.pass, 1);
    // Per-source cap is a third of capacity: all 50 fit under 150 / 3.
    assert_eq!(archive.individuals.len(), 50);
}

#[test]
fn per_source_cap_limits_contribution() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), 50);

    let archive_path = dir.path().join("pool.json");
    let sources = PoolSources::Static(vec![dir.path().to_path_buf()]);
    let mut pooler: Pooler<Vec<f64>> =
        Pooler::new(problem(), params(30), sources, &archive_path).unwrap();

    pooler.pass().unwrap();
    let archive: PoolArchive<Vec<f64>> = load_json(&archive_path).unwrap();
    assert_eq!(archive.individuals.len(), 10);
}

#[test]
fn one_shot_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), 5);
    let archive_path = dir.path().join("pool.json");
    let sources = PoolSources::Static(vec![dir.path().to_path_buf()]);
    let mut pooler: Pooler<Vec<f64>> =
        Pooler::new(problem(), params(90), sources, &archive_path).unwrap();
    pooler.run().unwrap();
    assert!(archive_path.exists());
}

#[test]
fn corrupt_snapshot_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("state_000001.json"), "definitely not json").unwrap();

    let archive_path = dir.path().join("pool.json");
    let sources = PoolSources::Static(vec![dir.path().to_path_buf()]);
    let mut pooler: Pooler<Vec<f64>> =
        Pooler::new(problem(), params(90), sources, &archive_path).unwrap();

    assert_eq!(pooler.pass().unwrap(), 0);
    let archive: PoolArchive<Vec<f64>> = load_json(&archive_path).unwrap();
    assert!(archive.individuals.is_empty());
}

#[test]
fn sources_file_is_parsed_with_comments() {
    let dir = tempfile::tempdir().unwrap();
    let source_dir = dir.path().join("engine-a");
    std::fs::create_dir_all(&source_dir).unwrap();
    write_source(&source_dir, 5);

    let list = dir.path().join("sources.txt");
    std::fs::write(
        &list,
        format!("# engines under test\n\n{}\n", source_dir.display()),
    )
    .unwrap();

    let archive_path = dir.path().join("pool.json");
    let mut pooler: Pooler<Vec<f64>> =
        Pooler::new(problem(), params(90), PoolSources::File(list), &archive_path).unwrap();
    assert_eq!(pooler.pass().unwrap(), 1);
}

#[test]
fn duplicate_signatures_across_sources_collapse() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    std::fs::create_dir_all(&a).unwrap();
    std::fs::create_dir_all(&b).unwrap();
    // Identical performance signatures in both sources.
    write_source(&a, 8);
    write_source(&b, 8);

    let archive_path = dir.path().join("pool.json");
    let sources = PoolSources::Static(vec![a, b]);
    let mut pooler: Pooler<Vec<f64>> =
        Pooler::new(problem(), params(90), sources, &archive_path).unwrap();

    assert_eq!(pooler.pass().unwrap(), 2);
    let archive: PoolArchive<Vec<f64>> = load_json(&archive_path).unwrap();
    assert_eq!(archive.individuals.len(), 8);
}

#[test]
fn migration_source_reads_archive_and_tolerates_absence() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("pool.json");

    let mut missing: PoolMigration<Vec<f64>> = PoolMigration::new(&archive_path, Some(1));
    assert!(missing.retrieve_migrants(5).is_empty());

    write_source(dir.path(), 20);
    let sources = PoolSources::Static(vec![dir.path().to_path_buf()]);
    let mut pooler: Pooler<Vec<f64>> =
        Pooler::new(problem(), params(90), sources, &archive_path).unwrap();
    pooler.pass().unwrap();

    let mut migration: PoolMigration<Vec<f64>> = PoolMigration::new(&archive_path, Some(1));
    assert_eq!(migration.retrieve_migrants(5).len(), 5);
    // Requests beyond the archive return what exists.
    assert_eq!(migration.retrieve_migrants(1_000).len(), 20);
}

#[test]
fn garbage_archive_yields_no_migrants() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("pool.json");
    std::fs::write(&archive_path, "{ half a json").unwrap();

    let mut migration: PoolMigration<Vec<f64>> = PoolMigration::new(&archive_path, None);
    assert!(migration.retrieve_migrants(3).is_empty());
}
