// ===== synthforge/src/cmd/run.rs =====
use crate::cmd::demo;
use crate::reports;
use clap::Args;
use std::path::PathBuf;
use synthforge::config::StrategyParams;
use synthforge::engine::SynthEngine;
use synthforge::error::SynthResult;
use synthforge::pooler::PoolMigration;
use synthforge::problem::Problem;
use synthforge::state::SynthState;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub strategy: StrategyParams,

    /// Output directory for generation snapshots.
    #[arg(short = 'o', long, default_value = "runs/engine")]
    pub out_dir: PathBuf,

    /// Problem definition JSON. Defaults to the built-in demo problem;
    /// custom problems must stick to the demo oracle's metric names.
    #[arg(short = 'p', long)]
    pub problem: Option<PathBuf>,

    /// Pooled archive to pull migrants from.
    #[arg(long)]
    pub pool: Option<PathBuf>,

    /// Resume from the newest snapshot in the output directory.
    #[arg(long, default_value_t = false)]
    pub resume: bool,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,

    /// Demo genotype dimension.
    #[arg(long, default_value_t = 8)]
    pub dims: usize,
}

pub fn run(args: RunArgs) -> SynthResult<()> {
    let problem = match &args.problem {
        Some(path) => Problem::load_from_file(path)?,
        None => demo::demo_problem()?,
    };

    let state = if args.resume {
        match SynthState::resume(&args.out_dir)? {
            Some(state) => {
                info!(
                    generation = state.generation,
                    "resuming from snapshot; CLI strategy flags ignored"
                );
                state
            }
            None => SynthState::new(problem, args.strategy.clone())?,
        }
    } else {
        SynthState::new(problem, args.strategy.clone())?
    };

    let variation = demo::DemoVariation {
        dims: args.dims,
        crossover_prob: state.strategy.crossover_prob,
        intensity: state.strategy.mutation_intensity,
    };
    let mut engine = SynthEngine::new(
        state,
        demo::DemoEvaluator,
        variation,
        &args.out_dir,
        args.seed,
    )?;
    if let Some(pool) = &args.pool {
        engine = engine.with_migration(Box::new(PoolMigration::new(pool, args.seed)));
    }

    engine.run()?;

    let front = engine.front();
    reports::print_front(&engine.state().problem, &front);
    Ok(())
}
