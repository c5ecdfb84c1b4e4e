#![warn(missing_docs)]
//! Netbench CLI Library
//!
//! Command-line front end for benchmark binaries. A binary builds its
//! [`SuiteRegistry`] (explicitly, or from `suite!` declarations via
//! [`run`]) and hands it over; the CLI picks the suite(s) to run, drives the
//! [`Launcher`] and reports the results.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     let mut registry = SuiteRegistry::new();
//!     registry.register("kdf", kdf::run)?;
//!     netbench_cli::run_with_registry(registry, Some("kdf"))
//! }
//! ```

mod config;
mod launcher;
mod report;

pub use config::*;
pub use launcher::{ExecutionResult, Launcher, SuiteRun};
pub use report::{
    OutputFormat, Report, ReportMeta, ReportSummary, SuiteReport, SuiteStatus, build_report,
    format_duration, format_human_output, render,
};

use clap::{Parser, Subcommand};
use netbench_core::{BencherEngine, EngineConfig, SuiteError, SuiteRegistry};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Netbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "netbench")]
#[command(author, version, about = "Netbench - network stack micro-benchmarks")]
pub struct Cli {
    /// Optional subcommand; defaults to running suites
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Suite to run (defaults to the configured or built-in default suite)
    pub suite: Option<String>,

    /// Run every registered suite in registration order
    #[arg(long, conflicts_with = "suite")]
    pub all: bool,

    /// Output format: human, json
    #[arg(long)]
    pub format: Option<String>,

    /// Output file (stdout if not specified). A bare file name is placed in
    /// the configured output directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Warmup time in seconds
    #[arg(long)]
    pub warmup: Option<u64>,

    /// Measurement time in seconds
    #[arg(long)]
    pub measurement: Option<u64>,

    /// Fixed sample count mode: skip warmup, run exactly N iterations
    #[arg(long, short = 'n')]
    pub samples: Option<u64>,

    /// Record allocations per iteration (the binary must install `TrackingAllocator`)
    #[arg(long)]
    pub track_allocations: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: absorb cargo bench's --bench flag
    #[arg(long, hide = true)]
    pub bench: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List registered suites
    List,
    /// Run suites (default)
    Run,
}

/// Which suites a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A single named suite
    One(String),
    /// Every registered suite
    All,
}

impl Selection {
    /// Resolve from, in order: the command-line suite, `--all`,
    /// `runner.run_all`, `runner.default_suite`, the binary's default.
    /// With none of those, every suite runs.
    pub fn resolve(cli: &Cli, config: &RunnerConfig, builtin_default: Option<&str>) -> Self {
        if let Some(name) = &cli.suite {
            return Selection::One(name.clone());
        }
        if cli.all || config.run_all {
            return Selection::All;
        }
        config
            .default_suite
            .as_deref()
            .or(builtin_default)
            .map(|name| Selection::One(name.to_string()))
            .unwrap_or(Selection::All)
    }
}

/// Collect `suite!` declarations into a registry and run the CLI.
///
/// Call this from a benchmark binary's `main()`.
pub fn run() -> anyhow::Result<()> {
    let registry = SuiteRegistry::discover()?;
    run_with_registry(registry, None)
}

/// Parse the command line and run against an explicitly built registry.
///
/// `default_suite` is what runs when neither the command line nor
/// `netbench.toml` selects anything.
pub fn run_with_registry(
    registry: SuiteRegistry,
    default_suite: Option<&str>,
) -> anyhow::Result<()> {
    run_with_cli(Cli::parse(), &registry, default_suite)
}

/// Run with pre-parsed arguments.
pub fn run_with_cli(
    cli: Cli,
    registry: &SuiteRegistry,
    default_suite: Option<&str>,
) -> anyhow::Result<()> {
    let filter = if cli.verbose {
        "netbench=debug"
    } else {
        "netbench=info"
    };
    // A subscriber may already be installed by the host binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = match NetbenchConfig::discover() {
        Ok(found) => found.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "ignoring unreadable {}", CONFIG_FILE);
            NetbenchConfig::default()
        }
    };

    if cli.command == Some(Commands::List) {
        print!("{}", format_suite_list(registry));
        return Ok(());
    }

    let engine = build_engine_config(&cli, &config)?;
    let start = Instant::now();
    let results = execute(&cli, &config, registry, default_suite, engine.clone())?;
    let total_duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    let report = build_report(&results, &engine, total_duration_ms);
    let format: OutputFormat = cli
        .format
        .as_deref()
        .unwrap_or(&config.output.format)
        .parse()
        .map_err(anyhow::Error::msg)?;
    let output = render(&report, format)?;

    if let Some(ref path) = cli.output {
        let path = report_path(path, &config.output);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, output)?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    let failed = failed_suites(&results);
    if !failed.is_empty() {
        eprintln!("\nFailed suite(s): {}", failed.join(", "));
        std::process::exit(1);
    }

    Ok(())
}

/// Run the selected suite(s) and return their results in run order.
///
/// An unknown single suite is returned as an error, because nothing ran.
pub fn execute(
    cli: &Cli,
    config: &NetbenchConfig,
    registry: &SuiteRegistry,
    default_suite: Option<&str>,
    engine: EngineConfig,
) -> anyhow::Result<Vec<ExecutionResult>> {
    let selection = Selection::resolve(cli, &config.runner, default_suite);
    debug!(?selection, suites = registry.len(), "resolved selection");

    let launcher = Launcher::new(registry, BencherEngine::new(engine))
        .with_progress(selection == Selection::All);

    match selection {
        // Only a missing suite aborts; execution failures are reported.
        Selection::One(name) => match launcher.run_one(&name) {
            Err(err @ SuiteError::SuiteNotFound { .. }) => Err(err.into()),
            result => Ok(vec![result]),
        },
        Selection::All => Ok(launcher.run_all()),
    }
}

/// Layer command-line budgets over `netbench.toml`.
pub fn build_engine_config(cli: &Cli, config: &NetbenchConfig) -> anyhow::Result<EngineConfig> {
    let mut engine = config.engine_config()?;
    engine.track_allocations |= cli.track_allocations;

    if let Some(n) = cli.samples {
        return Ok(EngineConfig {
            sample_count: engine.sample_count,
            pin_cpu: engine.pin_cpu,
            track_allocations: engine.track_allocations,
            ..EngineConfig::fixed_samples(n)
        });
    }
    if let Some(secs) = cli.warmup {
        engine.warmup_time_ns = seconds_to_ns("--warmup", secs)?;
    }
    if let Some(secs) = cli.measurement {
        engine.measurement_time_ns = seconds_to_ns("--measurement", secs)?;
    }
    Ok(engine)
}

fn seconds_to_ns(flag: &str, secs: u64) -> anyhow::Result<u64> {
    secs.checked_mul(1_000_000_000)
        .ok_or_else(|| anyhow::anyhow!("{flag} {secs}s does not fit in a u64 of nanoseconds"))
}

/// Where a report requested as `path` is written.
pub fn report_path(path: &Path, output: &OutputConfig) -> PathBuf {
    let bare = path.parent().is_none_or(|p| p.as_os_str().is_empty());
    if bare && !path.is_absolute() {
        Path::new(&output.directory).join(path)
    } else {
        path.to_path_buf()
    }
}

/// Names of the suites whose run failed, in run order.
pub fn failed_suites(results: &[ExecutionResult]) -> Vec<&str> {
    results
        .iter()
        .filter_map(|r| r.as_ref().err().map(|e| e.suite_name()))
        .collect()
}

/// Listing printed by the `list` subcommand.
pub fn format_suite_list(registry: &SuiteRegistry) -> String {
    let mut out = String::from("Netbench Suites:\n");
    for suite in registry.iter() {
        if suite.description().is_empty() {
            out.push_str(&format!("├── {}\n", suite.name()));
        } else {
            out.push_str(&format!("├── {} - {}\n", suite.name(), suite.description()));
        }
    }
    out.push_str(&format!("{} suites registered.\n", registry.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use netbench_core::{Bencher, BenchmarkSuite, SuiteResult};

    fn ok(b: &mut Bencher) -> SuiteResult {
        b.iter(|| std::hint::black_box(3u64).pow(2));
        Ok(())
    }

    fn broken(b: &mut Bencher) -> SuiteResult {
        b.iter(|| 0u8);
        Err("socket closed".into())
    }

    fn registry() -> SuiteRegistry {
        let mut registry = SuiteRegistry::new();
        registry
            .insert(BenchmarkSuite::new("kdf", ok).with_description("key derivation"))
            .unwrap();
        registry.register("ecdh", ok).unwrap();
        registry.register("handshake", broken).unwrap();
        registry
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("netbench").chain(args.iter().copied()))
    }

    fn run(args: &[&str], default_suite: Option<&str>) -> anyhow::Result<Vec<ExecutionResult>> {
        let cli = cli(args);
        let config = NetbenchConfig::default();
        let engine = build_engine_config(&cli, &config)?;
        execute(&cli, &config, &registry(), default_suite, engine)
    }

    #[test]
    fn positional_suite_wins() {
        let config = RunnerConfig {
            default_suite: Some("kdf".into()),
            run_all: true,
            ..RunnerConfig::default()
        };
        assert_eq!(
            Selection::resolve(&cli(&["ecdh"]), &config, Some("discovery")),
            Selection::One("ecdh".into())
        );
    }

    #[test]
    fn selection_fallbacks() {
        let mut config = RunnerConfig::default();
        assert_eq!(
            Selection::resolve(&cli(&[]), &config, Some("discovery")),
            Selection::One("discovery".into())
        );
        assert_eq!(Selection::resolve(&cli(&[]), &config, None), Selection::All);
        assert_eq!(
            Selection::resolve(&cli(&["--all"]), &config, Some("discovery")),
            Selection::All
        );

        config.default_suite = Some("kdf".into());
        assert_eq!(
            Selection::resolve(&cli(&[]), &config, Some("discovery")),
            Selection::One("kdf".into())
        );

        config.run_all = true;
        assert_eq!(Selection::resolve(&cli(&[]), &config, None), Selection::All);
    }

    #[test]
    fn list_is_a_subcommand() {
        let cli = cli(&["list"]);
        assert_eq!(cli.command, Some(Commands::List));
        assert!(cli.suite.is_none());
    }

    #[test]
    fn single_suite_runs() {
        let results = run(&["ecdh", "-n", "5"], None).unwrap();
        assert_eq!(results.len(), 1);
        let run = results[0].as_ref().unwrap();
        assert_eq!(run.suite, "ecdh");
        assert_eq!(run.measurement.iterations, 5);
    }

    #[test]
    fn unknown_suite_aborts_with_valid_names() {
        let err = run(&["discovery", "-n", "5"], None).unwrap_err();
        let err = err.downcast::<SuiteError>().unwrap();
        assert_eq!(
            err,
            SuiteError::SuiteNotFound {
                name: "discovery".into(),
                available: vec!["kdf".into(), "ecdh".into(), "handshake".into()],
            }
        );
    }

    #[test]
    fn failing_single_suite_is_reported_not_raised() {
        let results = run(&["handshake", "-n", "5"], None).unwrap();
        assert_eq!(failed_suites(&results), vec!["handshake"]);
    }

    #[test]
    fn run_all_collects_every_result() {
        let results = run(&["--all", "-n", "5"], Some("kdf")).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert_eq!(failed_suites(&results), vec!["handshake"]);
    }

    #[test]
    fn cli_budgets_override_config() {
        let config = NetbenchConfig::default();

        let args = cli(&["--warmup", "1", "--measurement", "2"]);
        let engine = build_engine_config(&args, &config).unwrap();
        assert_eq!(engine.warmup_time_ns, 1_000_000_000);
        assert_eq!(engine.measurement_time_ns, 2_000_000_000);

        let engine = build_engine_config(&cli(&["-n", "9"]), &config).unwrap();
        assert_eq!(engine, EngineConfig::fixed_samples(9));

        let engine = build_engine_config(&cli(&["-n", "9", "--track-allocations"]), &config);
        assert!(engine.unwrap().track_allocations);
    }

    #[test]
    fn oversized_budgets_are_rejected() {
        let config = NetbenchConfig::default();

        let err = build_engine_config(&cli(&["--warmup", "18446744074"]), &config).unwrap_err();
        assert!(err.to_string().contains("--warmup"));
        assert!(build_engine_config(&cli(&["--measurement", "18446744074"]), &config).is_err());

        let engine = build_engine_config(&cli(&["--warmup", "18446744073"]), &config).unwrap();
        assert_eq!(engine.warmup_time_ns, 18_446_744_073_000_000_000);
    }

    #[test]
    fn bare_report_names_land_in_output_directory() {
        let output = OutputConfig::default();
        assert_eq!(
            report_path(Path::new("report.json"), &output),
            PathBuf::from("target/netbench/report.json")
        );
        assert_eq!(
            report_path(Path::new("out/report.json"), &output),
            PathBuf::from("out/report.json")
        );
    }

    #[test]
    fn suite_list_in_registration_order() {
        let listing = format_suite_list(&registry());
        assert_eq!(
            listing,
            "Netbench Suites:\n├── kdf - key derivation\n├── ecdh\n├── handshake\n3 suites registered.\n"
        );
    }
}
