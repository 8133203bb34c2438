// ===== synthforge/src/main.rs =====
use clap::{Parser, Subcommand};
use std::process;
use tracing::Level;

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one search engine, emitting generation snapshots.
    Run(cmd::run::RunArgs),
    /// Aggregate engine snapshots into a shared pooled archive.
    Pool(cmd::pool::PoolArgs),
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let result = match cli.command {
        Commands::Run(args) => cmd::run::run(args),
        Commands::Pool(args) => cmd::pool::run(args),
    };

    if let Err(e) = result {
        eprintln!("\n❌ FATAL: {}", e);
        process::exit(1);
    }
}
