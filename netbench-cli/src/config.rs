//! Configuration loading from netbench.toml
//!
//! The file is discovered by walking up from the current directory. Every
//! field has a default, so an empty or missing file is a valid configuration.

use netbench_core::{DEFAULT_SAMPLE_COUNT, EngineConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for by [`NetbenchConfig::discover`].
pub const CONFIG_FILE: &str = "netbench.toml";

/// Errors from loading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },
    /// A duration string could not be understood.
    #[error("invalid duration '{0}'")]
    Duration(String),
}

/// Netbench configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetbenchConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Suite selection and measurement budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Suite to run when none is named on the command line
    #[serde(default)]
    pub default_suite: Option<String>,
    /// Run every registered suite when none is named
    #[serde(default)]
    pub run_all: bool,
    /// Warmup duration (e.g. "3s")
    #[serde(default = "default_warmup")]
    pub warmup_time: String,
    /// Measurement duration (e.g. "5s")
    #[serde(default = "default_measurement")]
    pub measurement_time: String,
    /// Fixed sample count: no warmup, exactly N iterations
    #[serde(default)]
    pub samples: Option<u64>,
    /// Minimum measurement iterations
    #[serde(default)]
    pub min_iterations: Option<u64>,
    /// Maximum measurement iterations
    #[serde(default)]
    pub max_iterations: Option<u64>,
    /// Batched samples per suite
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    /// Core to pin the benchmark thread to
    #[serde(default)]
    pub pin_cpu: Option<usize>,
    /// Record allocations per iteration (needs `TrackingAllocator`)
    #[serde(default)]
    pub track_allocations: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_suite: None,
            run_all: false,
            warmup_time: default_warmup(),
            measurement_time: default_measurement(),
            samples: None,
            min_iterations: None,
            max_iterations: None,
            sample_count: default_sample_count(),
            pin_cpu: None,
            track_allocations: false,
        }
    }
}

fn default_warmup() -> String {
    "3s".to_string()
}
fn default_measurement() -> String {
    "5s".to_string()
}
fn default_sample_count() -> usize {
    DEFAULT_SAMPLE_COUNT
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
    /// Directory for reports written without an explicit path
    #[serde(default = "default_output_dir")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            directory: default_output_dir(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}
fn default_output_dir() -> String {
    "target/netbench".to_string()
}

impl NetbenchConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find and load `netbench.toml` from the current directory upwards.
    pub fn discover() -> Result<Option<Self>, ConfigError> {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(dir),
            Err(_) => Ok(None),
        }
    }

    /// Find and load `netbench.toml` from `start` upwards.
    pub fn discover_from(start: impl Into<PathBuf>) -> Result<Option<Self>, ConfigError> {
        let mut dir = start.into();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Self::load(&candidate).map(Some);
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Engine budgets described by the `[runner]` section.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let runner = &self.runner;
        let mut config = match runner.samples {
            Some(n) => EngineConfig::fixed_samples(n),
            None => EngineConfig {
                warmup_time_ns: parse_duration(&runner.warmup_time)?,
                measurement_time_ns: parse_duration(&runner.measurement_time)?,
                min_iterations: runner.min_iterations,
                max_iterations: runner.max_iterations,
                ..EngineConfig::default()
            },
        };
        config.sample_count = runner.sample_count;
        config.pin_cpu = runner.pin_cpu;
        config.track_allocations = runner.track_allocations;
        Ok(config)
    }

    /// Commented default configuration file.
    pub fn default_toml() -> String {
        r#"# Netbench Configuration

[runner]
# Suite to run when none is given on the command line (uncomment to enable)
# default_suite = "discovery"
# Run every registered suite when none is given
run_all = false
# Warmup duration before measurement
warmup_time = "3s"
# Measurement duration
measurement_time = "5s"
# Fixed sample count: skip warmup, run exactly N iterations (uncomment to enable)
# samples = 50
# Iteration bounds (uncomment to enable)
# min_iterations = 100
# max_iterations = 1000000
# Batched samples per suite
sample_count = 100
# Pin the benchmark thread to a core (uncomment to enable)
# pin_cpu = 2
# Record allocations per iteration (the binary must install TrackingAllocator)
track_allocations = false

[output]
# Default output format: human or json
format = "human"
# Directory for reports
directory = "target/netbench"
"#
        .to_string()
    }
}

/// Parse a duration string ("3s", "500ms", "2m", "100us", "1.5s") into
/// nanoseconds. A bare number means seconds.
pub fn parse_duration(s: &str) -> Result<u64, ConfigError> {
    let s = s.trim();
    let split = s.find(|c: char| c.is_alphabetic()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| ConfigError::Duration(s.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Duration(s.to_string()));
    }

    let scale: f64 = match unit.to_ascii_lowercase().as_str() {
        "ns" => 1.0,
        "us" => 1e3,
        "ms" => 1e6,
        "" | "s" => 1e9,
        "m" | "min" => 60e9,
        _ => return Err(ConfigError::Duration(s.to_string())),
    };

    Ok((value * scale) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = NetbenchConfig::default();
        assert_eq!(config.runner.warmup_time, "3s");
        assert_eq!(config.runner.measurement_time, "5s");
        assert!(config.runner.default_suite.is_none());
        assert!(!config.runner.run_all);
        assert_eq!(config.output.format, "human");
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("3s").unwrap(), 3_000_000_000);
        assert_eq!(parse_duration("500ms").unwrap(), 500_000_000);
        assert_eq!(parse_duration("100us").unwrap(), 100_000);
        assert_eq!(parse_duration("1000ns").unwrap(), 1000);
        assert_eq!(parse_duration("2m").unwrap(), 120_000_000_000);
        assert_eq!(parse_duration("1.5s").unwrap(), 1_500_000_000);
        assert_eq!(parse_duration("4").unwrap(), 4_000_000_000);
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("3h").is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: NetbenchConfig = toml::from_str(
            r#"
            [runner]
            default_suite = "kdf"
            warmup_time = "1s"
            "#,
        )
        .unwrap();

        assert_eq!(config.runner.default_suite.as_deref(), Some("kdf"));
        assert_eq!(config.runner.measurement_time, "5s");
        assert_eq!(config.output.directory, "target/netbench");
    }

    #[test]
    fn default_toml_parses() {
        let config: NetbenchConfig = toml::from_str(&NetbenchConfig::default_toml()).unwrap();
        assert_eq!(config.runner.warmup_time, "3s");
        assert_eq!(config.runner.sample_count, 100);
        assert!(!config.runner.track_allocations);
    }

    #[test]
    fn samples_switch_to_fixed_mode() {
        let mut config = NetbenchConfig::default();
        config.runner.samples = Some(25);
        config.runner.pin_cpu = Some(1);

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.warmup_time_ns, 0);
        assert_eq!(engine.min_iterations, Some(25));
        assert_eq!(engine.max_iterations, Some(25));
        assert_eq!(engine.pin_cpu, Some(1));
    }

    #[test]
    fn bad_duration_in_file_is_reported() {
        let mut config = NetbenchConfig::default();
        config.runner.warmup_time = "soon".into();
        assert!(matches!(
            config.engine_config(),
            Err(ConfigError::Duration(_))
        ));
    }

    #[test]
    fn discover_walks_up() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE),
            "[runner]\nrun_all = true\n",
        )
        .unwrap();

        let config = NetbenchConfig::discover_from(&nested).unwrap().unwrap();
        assert!(config.runner.run_all);
    }

    #[test]
    fn discover_surfaces_parse_errors() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(CONFIG_FILE), "[runner\n").unwrap();

        assert!(matches!(
            NetbenchConfig::discover_from(root.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
