//! Engine configuration
//!
//! Configuration is a JSON document; every field is optional and falls back
//! to the engine defaults. Command-line flags are applied on top by the
//! server binary.

use crate::algorithms::{InitialGuessSolver, Refiner};
use crate::api::formatting::OutputFormat;
use crate::core::{
    DEFAULT_BEACONS_PATH, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_ITERATIONS, DEFAULT_TICK_INTERVAL,
    DEGENERACY_TOLERANCE, GRADIENT_TOLERANCE, INITIAL_DAMPING, MAX_DAMPING, RESIDUAL_TOLERANCE,
    SINGULARITY_TOLERANCE, STEP_TOLERANCE,
};
use crate::utils::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file I/O error
    #[error("cannot access configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// JSON serialization/deserialization error
    #[error("invalid configuration JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Invalid parameter value
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Numerical parameters of the seed solver and the refiner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub max_iterations: u32,
    pub residual_tolerance: f64,
    pub step_tolerance: f64,
    pub gradient_tolerance: f64,
    pub initial_damping: f64,
    pub max_damping: f64,
    pub singularity_tolerance: f64,
    pub degeneracy_tolerance: f64,
    /// Seed from a later beacon triple when the first one is degenerate
    pub seed_fallback: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            residual_tolerance: RESIDUAL_TOLERANCE,
            step_tolerance: STEP_TOLERANCE,
            gradient_tolerance: GRADIENT_TOLERANCE,
            initial_damping: INITIAL_DAMPING,
            max_damping: MAX_DAMPING,
            singularity_tolerance: SINGULARITY_TOLERANCE,
            degeneracy_tolerance: DEGENERACY_TOLERANCE,
            seed_fallback: false,
        }
    }
}

impl SolverConfig {
    pub fn refiner(&self) -> Refiner {
        Refiner {
            max_iterations: self.max_iterations,
            residual_tolerance: self.residual_tolerance,
            step_tolerance: self.step_tolerance,
            gradient_tolerance: self.gradient_tolerance,
            initial_damping: self.initial_damping,
            max_damping: self.max_damping,
            singularity_tolerance: self.singularity_tolerance,
        }
    }

    pub fn initial_guess(&self) -> InitialGuessSolver {
        InitialGuessSolver {
            tolerance: self.degeneracy_tolerance,
            fallback: self.seed_fallback,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(invalid("solver.max_iterations", self.max_iterations, "must be at least 1"));
        }

        let tolerances = [
            ("solver.residual_tolerance", self.residual_tolerance),
            ("solver.step_tolerance", self.step_tolerance),
            ("solver.gradient_tolerance", self.gradient_tolerance),
            ("solver.initial_damping", self.initial_damping),
            ("solver.max_damping", self.max_damping),
            ("solver.singularity_tolerance", self.singularity_tolerance),
            ("solver.degeneracy_tolerance", self.degeneracy_tolerance),
        ];
        for (parameter, value) in tolerances {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(parameter, value, "must be positive and finite"));
            }
        }

        if self.max_damping < self.initial_damping {
            return Err(invalid("solver.max_damping", self.max_damping, "must not be below solver.initial_damping"));
        }

        Ok(())
    }
}

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Beacon table (`beacon_id,pos_x,pos_y`)
    pub beacons_path: PathBuf,
    /// Time between position computations (milliseconds)
    pub tick_interval_ms: u64,
    /// Address of the line-oriented update listener
    pub listen_addr: String,
    pub solver: SolverConfig,
    pub logging: LogConfig,
    /// Rendering of estimates and errors
    pub output: OutputFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            beacons_path: PathBuf::from(DEFAULT_BEACONS_PATH),
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            solver: SolverConfig::default(),
            logging: LogConfig::default(),
            output: OutputFormat::Text,
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", self.tick_interval_ms, "must be at least 1"));
        }
        if self.listen_addr.trim().is_empty() {
            return Err(invalid("listen_addr", &self.listen_addr, "must not be empty"));
        }
        self.solver.validate()
    }
}

fn invalid(parameter: &'static str, value: impl ToString, reason: &'static str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::logging::{LogFormat, LogLevel};

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(5));
        assert_eq!(config.listen_addr, "127.0.0.1:8765");
        assert_eq!(config.solver.max_iterations, 100);
        assert!(!config.solver.seed_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "tick_interval_ms": 250, "solver": { "max_iterations": 20, "seed_fallback": true } }"#,
        )
        .unwrap();

        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.solver.max_iterations, 20);
        assert!(config.solver.seed_fallback);
        assert_eq!(config.solver.residual_tolerance, RESIDUAL_TOLERANCE);
        assert_eq!(config.beacons_path, PathBuf::from("beacon-config.csv"));
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.output, OutputFormat::Text);
    }

    #[test]
    fn test_solver_config_builds_solvers() {
        let solver = SolverConfig {
            max_iterations: 7,
            seed_fallback: true,
            ..SolverConfig::default()
        };
        assert_eq!(solver.refiner().max_iterations, 7);
        assert!(solver.initial_guess().fallback);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = EngineConfig::from_json(r#"{ "tick_interval_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { parameter: "tick_interval_ms", .. }));
    }

    #[test]
    fn test_rejects_bad_tolerances() {
        let err = EngineConfig::from_json(r#"{ "solver": { "residual_tolerance": -1.0 } }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter { parameter: "solver.residual_tolerance", .. }
        ));

        let err = EngineConfig::from_json(r#"{ "solver": { "initial_damping": 10.0, "max_damping": 1.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { parameter: "solver.max_damping", .. }));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigError::Serialization(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let mut config = EngineConfig::default();
        config.tick_interval_ms = 1000;
        config.logging.format = LogFormat::Json;
        config.output = OutputFormat::Json;
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.tick_interval_ms, 1000);
        assert_eq!(loaded.logging.format, LogFormat::Json);
        assert_eq!(loaded.output, OutputFormat::Json);
        assert_eq!(loaded.solver, config.solver);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::from_file("/nonexistent/engine.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
