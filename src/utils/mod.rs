//! Configuration and logging setup

pub mod config;
pub mod logging;

pub use config::{ConfigError, EngineConfig, SolverConfig};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
