pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod individual;
pub mod metric;
pub mod pareto;
pub mod pooler;
pub mod population;
pub mod problem;
pub mod state;
