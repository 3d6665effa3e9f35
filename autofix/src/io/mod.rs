//! I/O helpers for the pipeline.

pub mod cache;
pub mod config;
pub mod gateway;
pub mod model;
pub mod process;
pub mod project;
pub mod prompt;
pub mod test_runner;
