pub mod demo;
pub mod pool;
pub mod run;
