//! Benchmark Launcher
//!
//! Resolves suite names against a [`SuiteRegistry`] and hands the suites to a
//! [`MeasurementEngine`], one at a time.
//!
//! ## Failure policy
//!
//! - Unknown name: [`SuiteError::SuiteNotFound`], the engine is never called.
//! - Runner error or panic: [`SuiteError::SuiteExecution`], reported, not retried.
//! - `run_all` collects every result and never stops at the first failure.

use indicatif::{ProgressBar, ProgressStyle};
use netbench_core::{
    BencherEngine, BenchmarkSuite, Measurement, MeasurementEngine, SuiteError, SuiteRegistry,
    Timer,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A suite that ran to completion.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteRun {
    /// Suite name
    pub suite: String,
    /// What the engine measured
    pub measurement: Measurement,
    /// Wall time of the whole engine run, warmup included
    pub duration_ns: u64,
}

/// Outcome of launching one suite.
pub type ExecutionResult = Result<SuiteRun, SuiteError>;

/// Runs registered suites through a measurement engine.
pub struct Launcher<'r, E = BencherEngine> {
    registry: &'r SuiteRegistry,
    engine: E,
    progress: bool,
}

impl<'r> Launcher<'r, BencherEngine> {
    /// Launcher using the default engine.
    pub fn with_default_engine(registry: &'r SuiteRegistry) -> Self {
        Self::new(registry, BencherEngine::default())
    }
}

impl<'r, E: MeasurementEngine> Launcher<'r, E> {
    /// Launcher over `registry` measuring with `engine`.
    pub fn new(registry: &'r SuiteRegistry, engine: E) -> Self {
        Self {
            registry,
            engine,
            progress: false,
        }
    }

    /// Draw a progress bar during [`Launcher::run_all`].
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Registry the launcher resolves names against.
    pub fn registry(&self) -> &SuiteRegistry {
        self.registry
    }

    /// Run the suite registered under `name`.
    pub fn run_one(&self, name: &str) -> ExecutionResult {
        let suite = self.registry.lookup(name)?;
        self.launch(suite)
    }

    /// Run every registered suite in registration order, one after another.
    pub fn run_all(&self) -> Vec<ExecutionResult> {
        let names = self.registry.list_names();
        let pb = self.progress_bar(names.len() as u64);

        let mut results = Vec::with_capacity(names.len());
        for name in &names {
            pb.set_message(name.clone());
            results.push(self.run_one(name));
            pb.inc(1);
        }
        pb.finish_with_message("complete");

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(total = results.len(), failed, "all suites attempted");
        results
    }

    fn launch(&self, suite: &BenchmarkSuite) -> ExecutionResult {
        info!(suite = suite.name(), "running suite");
        let timer = Timer::start();
        let outcome = self.engine.measure(suite);
        let duration_ns = timer.stop().nanos;

        match outcome {
            Ok(measurement) => {
                debug!(suite = suite.name(), duration_ns, "suite completed");
                Ok(SuiteRun {
                    suite: suite.name().to_string(),
                    measurement,
                    duration_ns,
                })
            }
            Err(cause) => {
                warn!(suite = suite.name(), %cause, "suite failed");
                Err(SuiteError::SuiteExecution {
                    name: suite.name().to_string(),
                    cause,
                })
            }
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netbench_core::{Bencher, Sample, SuiteResult};
    use std::cell::RefCell;

    /// Engine that records calls and fails suites whose runner errors.
    #[derive(Default)]
    struct RecordingEngine {
        calls: RefCell<Vec<String>>,
    }

    impl MeasurementEngine for RecordingEngine {
        fn measure(&self, suite: &BenchmarkSuite) -> Result<Measurement, String> {
            self.calls.borrow_mut().push(suite.name().to_string());
            let mut bencher = Bencher::new();
            suite.run(&mut bencher).map_err(|e| e.to_string())?;
            Ok(Measurement {
                samples: vec![Sample {
                    duration_nanos: 10,
                    ..Sample::default()
                }],
                iterations: bencher.iteration_count(),
                total_time_ns: 10,
                ..Measurement::default()
            })
        }
    }

    fn ok(b: &mut Bencher) -> SuiteResult {
        b.iter(|| 1u64);
        Ok(())
    }

    fn broken(_: &mut Bencher) -> SuiteResult {
        Err("handshake rejected".into())
    }

    fn registry(entries: &[(&str, fn(&mut Bencher) -> SuiteResult)]) -> SuiteRegistry {
        let mut registry = SuiteRegistry::new();
        for (name, runner) in entries {
            registry.register(*name, *runner).unwrap();
        }
        registry
    }

    #[test]
    fn run_one_tags_result_with_suite_name() {
        let registry = registry(&[("kdf", ok), ("ecdh", ok)]);
        let launcher = Launcher::new(&registry, RecordingEngine::default());

        let run = launcher.run_one("ecdh").unwrap();
        assert_eq!(run.suite, "ecdh");
        assert_eq!(run.measurement.iterations, 1);
    }

    #[test]
    fn missing_suite_never_reaches_engine() {
        let registry = registry(&[("kdf", ok), ("ecdh", ok)]);
        let launcher = Launcher::new(&registry, RecordingEngine::default());

        let err = launcher.run_one("discovery").unwrap_err();
        assert_eq!(
            err,
            SuiteError::SuiteNotFound {
                name: "discovery".into(),
                available: vec!["kdf".into(), "ecdh".into()],
            }
        );
        assert!(launcher.engine.calls.borrow().is_empty());
    }

    #[test]
    fn runner_failure_is_wrapped_with_name() {
        let registry = registry(&[("handshake", broken)]);
        let launcher = Launcher::new(&registry, RecordingEngine::default());

        let err = launcher.run_one("handshake").unwrap_err();
        assert_eq!(
            err,
            SuiteError::SuiteExecution {
                name: "handshake".into(),
                cause: "handshake rejected".into(),
            }
        );
    }

    #[test]
    fn run_all_continues_past_failures() {
        let registry = registry(&[("a", ok), ("b", broken), ("c", ok)]);
        let launcher = Launcher::new(&registry, RecordingEngine::default());

        let results = launcher.run_all();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().suite, "a");
        assert_eq!(results[1].as_ref().unwrap_err().suite_name(), "b");
        assert_eq!(results[2].as_ref().unwrap().suite, "c");
        assert_eq!(*launcher.engine.calls.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn run_all_on_empty_registry() {
        let registry = SuiteRegistry::new();
        let launcher = Launcher::new(&registry, RecordingEngine::default()).with_progress(true);
        assert!(launcher.run_all().is_empty());
    }
}
