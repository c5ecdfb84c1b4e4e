//! Run Reports
//!
//! Turns launcher results into a serializable [`Report`] and renders it as
//! JSON or as human-readable terminal output.

use crate::launcher::ExecutionResult;
use chrono::{DateTime, Utc};
use netbench_core::{EngineConfig, Measurement, SuiteError};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable terminal output
    Human,
    /// Pretty-printed JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Complete record of one harness invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report metadata
    pub meta: ReportMeta,
    /// Per-suite results in run order
    pub results: Vec<SuiteReport>,
    /// Totals over all results
    pub summary: ReportSummary,
}

/// Where and how the run happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Netbench version
    pub version: String,
    /// When the report was generated
    pub timestamp: DateTime<Utc>,
    /// Operating system
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// Logical cores available
    pub cpu_cores: u32,
    /// Warmup budget in nanoseconds
    pub warmup_time_ns: u64,
    /// Measurement budget in nanoseconds
    pub measurement_time_ns: u64,
}

/// Whether a suite produced a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteStatus {
    /// Suite completed and was measured
    Passed,
    /// Suite raised an error or panicked
    Failed,
}

/// Per-suite entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite: String,
    /// Outcome
    pub status: SuiteStatus,
    /// Wall time of the whole run, warmup included
    pub duration_ns: u64,
    /// Mean sample time
    pub mean_ns: Option<f64>,
    /// Fastest sample
    pub min_ns: Option<u64>,
    /// Slowest sample
    pub max_ns: Option<u64>,
    /// Operations per second at the mean
    pub throughput_ops_sec: Option<f64>,
    /// Mean bytes allocated per iteration, when tracked
    #[serde(default)]
    pub alloc_bytes: Option<f64>,
    /// Mean allocations per iteration, when tracked
    #[serde(default)]
    pub alloc_count: Option<f64>,
    /// Raw measurement for passed suites
    pub measurement: Option<Measurement>,
    /// Failure cause for failed suites
    pub failure: Option<String>,
}

/// Totals over all suites in the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Suites attempted
    pub total: usize,
    /// Suites that passed
    pub passed: usize,
    /// Suites that failed
    pub failed: usize,
    /// Wall time of the whole run in milliseconds
    pub total_duration_ms: f64,
}

impl ReportSummary {
    /// Whether every suite passed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Assemble a report from launcher results, keeping their order.
pub fn build_report(
    results: &[ExecutionResult],
    engine: &EngineConfig,
    total_duration_ms: f64,
) -> Report {
    let mut summary = ReportSummary {
        total: results.len(),
        total_duration_ms,
        ..Default::default()
    };

    let entries = results
        .iter()
        .map(|result| match result {
            Ok(run) => {
                summary.passed += 1;
                SuiteReport {
                    suite: run.suite.clone(),
                    status: SuiteStatus::Passed,
                    duration_ns: run.duration_ns,
                    mean_ns: run.measurement.mean_ns(),
                    min_ns: run.measurement.min_ns(),
                    max_ns: run.measurement.max_ns(),
                    throughput_ops_sec: run.measurement.throughput_ops_sec(),
                    alloc_bytes: run.measurement.mean_alloc_bytes(),
                    alloc_count: run.measurement.mean_alloc_count(),
                    measurement: Some(run.measurement.clone()),
                    failure: None,
                }
            }
            Err(err) => {
                summary.failed += 1;
                SuiteReport {
                    suite: err.suite_name().to_string(),
                    status: SuiteStatus::Failed,
                    duration_ns: 0,
                    mean_ns: None,
                    min_ns: None,
                    max_ns: None,
                    throughput_ops_sec: None,
                    alloc_bytes: None,
                    alloc_count: None,
                    measurement: None,
                    failure: Some(failure_text(err)),
                }
            }
        })
        .collect();

    Report {
        meta: ReportMeta {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_cores: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            warmup_time_ns: engine.warmup_time_ns,
            measurement_time_ns: engine.measurement_time_ns,
        },
        results: entries,
        summary,
    }
}

fn failure_text(err: &SuiteError) -> String {
    match err {
        SuiteError::SuiteExecution { cause, .. } => cause.clone(),
        other => other.to_string(),
    }
}

/// Render the report in `format`.
pub fn render(report: &Report, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report),
        OutputFormat::Human => Ok(format_human_output(report)),
    }
}

/// Render nanoseconds with a readable unit.
pub fn format_duration(ns: f64) -> String {
    if ns < 1_000.0 {
        format!("{:.2} ns", ns)
    } else if ns < 1_000_000.0 {
        format!("{:.2} us", ns / 1_000.0)
    } else if ns < 1_000_000_000.0 {
        format!("{:.2} ms", ns / 1_000_000.0)
    } else {
        format!("{:.2} s", ns / 1_000_000_000.0)
    }
}

/// Terminal rendering of a report.
pub fn format_human_output(report: &Report) -> String {
    let mut out = String::new();

    out.push('\n');
    out.push_str("Netbench Results\n");
    out.push_str(&"=".repeat(60));
    out.push_str("\n\n");

    for result in &report.results {
        match result.status {
            SuiteStatus::Passed => {
                let _ = writeln!(out, "  ✓ {}", result.suite);
                if let (Some(mean), Some(min), Some(max)) =
                    (result.mean_ns, result.min_ns, result.max_ns)
                {
                    let _ = writeln!(
                        out,
                        "      mean: {}  min: {}  max: {}",
                        format_duration(mean),
                        format_duration(min as f64),
                        format_duration(max as f64)
                    );
                }
                if let Some(m) = &result.measurement {
                    let _ = writeln!(
                        out,
                        "      samples: {}  iterations: {}  warmup: {}",
                        m.samples.len(),
                        m.iterations,
                        m.warmup_iterations
                    );
                }
                if let Some(throughput) = result.throughput_ops_sec {
                    let _ = writeln!(out, "      throughput: {:.2} ops/sec", throughput);
                }
                if let (Some(bytes), Some(count)) = (result.alloc_bytes, result.alloc_count) {
                    let _ = writeln!(
                        out,
                        "      allocations: {:.0} B in {:.1} allocs per iteration",
                        bytes, count
                    );
                }
            }
            SuiteStatus::Failed => {
                let _ = writeln!(out, "  ✗ {}", result.suite);
                if let Some(failure) = &result.failure {
                    let _ = writeln!(out, "      error: {}", failure);
                }
            }
        }
        out.push('\n');
    }

    out.push_str(&"-".repeat(60));
    out.push('\n');
    let _ = writeln!(
        out,
        "{} suites: {} passed, {} failed ({:.0} ms)",
        report.summary.total,
        report.summary.passed,
        report.summary.failed,
        report.summary.total_duration_ms
    );

    out
}
