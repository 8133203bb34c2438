// ===== synthforge/src/cmd/pool.rs =====
use crate::cmd::demo;
use clap::Args;
use std::path::PathBuf;
use synthforge::config::PoolParams;
use synthforge::error::SynthResult;
use synthforge::pooler::{PoolSources, Pooler};
use synthforge::problem::Problem;

#[derive(Args, Debug, Clone)]
pub struct PoolArgs {
    #[command(flatten)]
    pub params: PoolParams,

    /// Engine output directories to aggregate (repeatable).
    #[arg(short = 's', long = "source")]
    pub sources: Vec<PathBuf>,

    /// Text file listing one source directory per line, re-read every pass.
    #[arg(long)]
    pub sources_file: Option<PathBuf>,

    /// Pooled archive path.
    #[arg(short = 'a', long, default_value = "runs/pool.json")]
    pub archive: PathBuf,

    /// Problem definition JSON; defaults to the built-in demo problem.
    #[arg(short = 'p', long)]
    pub problem: Option<PathBuf>,
}

pub fn run(args: PoolArgs) -> SynthResult<()> {
    let problem = match &args.problem {
        Some(path) => Problem::load_from_file(path)?,
        None => demo::demo_problem()?,
    };
    let sources = match args.sources_file {
        Some(file) => PoolSources::File(file),
        None => PoolSources::Static(args.sources),
    };
    let mut pooler: Pooler<Vec<f64>> = Pooler::new(problem, args.params, sources, &args.archive)?;
    pooler.run()
}
