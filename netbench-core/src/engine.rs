//! Measurement Engine
//!
//! The launcher hands a suite to a [`MeasurementEngine`] and gets back either
//! a [`Measurement`] or the cause of the failure. [`BencherEngine`] is the
//! default engine: a warmup phase sizes sample batches, then the measurement
//! phase fills them until the sample target or the time budget is reached.
//!
//! ```text
//! runner ──► warmup (raw timings) ──► start_measurement ──► batched samples ──► Measurement
//! ```

use crate::bencher::{Bencher, DEFAULT_SAMPLE_COUNT, Measurement};
use crate::error::{RunnerError, SuiteResult};
use crate::measure::{Timer, pin_to_cpu};
use crate::suite::BenchmarkSuite;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// Executes one suite and returns its measurement or the failure cause.
pub trait MeasurementEngine {
    /// Run `suite` to completion. Blocks for the whole run.
    fn measure(&self, suite: &BenchmarkSuite) -> Result<Measurement, String>;
}

/// Time budgets and iteration bounds for [`BencherEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Warmup budget in nanoseconds
    pub warmup_time_ns: u64,
    /// Measurement budget in nanoseconds
    pub measurement_time_ns: u64,
    /// Measurement iterations required before stopping
    pub min_iterations: Option<u64>,
    /// Hard cap on measurement iterations
    pub max_iterations: Option<u64>,
    /// Samples to collect
    pub sample_count: usize,
    /// Core to pin the measuring thread to
    pub pin_cpu: Option<usize>,
    /// Record per-iteration allocations (needs `TrackingAllocator`)
    pub track_allocations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            warmup_time_ns: 3_000_000_000,
            measurement_time_ns: 5_000_000_000,
            min_iterations: None,
            max_iterations: None,
            sample_count: DEFAULT_SAMPLE_COUNT,
            pin_cpu: None,
            track_allocations: false,
        }
    }
}

impl EngineConfig {
    /// Fixed-count mode: no warmup, exactly `n` measured iterations.
    pub fn fixed_samples(n: u64) -> Self {
        Self {
            warmup_time_ns: 0,
            measurement_time_ns: 0,
            min_iterations: Some(n),
            max_iterations: Some(n),
            ..Self::default()
        }
    }
}

/// Default in-process engine built on [`Bencher`].
#[derive(Debug, Clone, Default)]
pub struct BencherEngine {
    config: EngineConfig,
}

impl BencherEngine {
    /// Engine with the given budgets.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl MeasurementEngine for BencherEngine {
    fn measure(&self, suite: &BenchmarkSuite) -> Result<Measurement, String> {
        if let Some(cpu) = self.config.pin_cpu {
            if let Err(e) = pin_to_cpu(cpu) {
                warn!(cpu, error = %e, "could not pin benchmark thread");
            }
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            run_measurement_loop(&self.config, |b| suite.run(b))
        }));

        match outcome {
            Ok(Ok(measurement)) => {
                debug!(
                    suite = suite.name(),
                    samples = measurement.samples.len(),
                    iterations = measurement.iterations,
                    "measurement finished"
                );
                Ok(measurement)
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }
}

/// Warmup, then measure until the sample target or time budget is met.
///
/// The loop always honours `min_iterations` and never exceeds
/// `max_iterations` (raised to `min_iterations` when smaller), even when a
/// runner records several iterations per call. The first runner error ends
/// the loop.
pub fn run_measurement_loop<F>(
    config: &EngineConfig,
    mut runner: F,
) -> Result<Measurement, RunnerError>
where
    F: FnMut(&mut Bencher) -> SuiteResult,
{
    let mut bencher = Bencher::with_sample_count(config.sample_count)
        .with_allocation_tracking(config.track_allocations);

    let warmup = Timer::start();
    while warmup.elapsed_ns() < config.warmup_time_ns as u128 {
        runner(&mut bencher)?;
    }

    bencher.start_measurement(config.measurement_time_ns);

    let baseline = bencher.iteration_count();
    let min_iterations = config.min_iterations.unwrap_or(0);
    let max_iterations = config.max_iterations.unwrap_or(u64::MAX).max(min_iterations);
    bencher.set_iteration_limit(baseline.checked_add(max_iterations));
    let measure = Timer::start();

    loop {
        let done = bencher.iteration_count().saturating_sub(baseline);
        if done >= max_iterations {
            break;
        }

        let out_of_time = measure.elapsed_ns() >= config.measurement_time_ns as u128;
        if done >= min_iterations && (bencher.has_enough_samples() || out_of_time) {
            break;
        }

        let before = bencher.iteration_count();
        runner(&mut bencher)?;
        if bencher.iteration_count() == before {
            return Err("suite runner did not call any Bencher::iter method".into());
        }
    }

    Ok(bencher.finish())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hint::black_box;

    fn quick() -> EngineConfig {
        EngineConfig::fixed_samples(20)
    }

    #[test]
    fn fixed_samples_run_exact_iterations() {
        let measurement = run_measurement_loop(&quick(), |b| {
            b.iter(|| black_box(42u64).wrapping_mul(17));
            Ok(())
        })
        .unwrap();

        assert_eq!(measurement.iterations, 20);
        assert_eq!(measurement.samples.len(), 20);
    }

    #[test]
    fn min_iterations_win_over_smaller_max() {
        let config = EngineConfig {
            warmup_time_ns: 0,
            measurement_time_ns: 0,
            min_iterations: Some(200),
            max_iterations: Some(50),
            ..EngineConfig::default()
        };
        let measurement = run_measurement_loop(&config, |b| {
            b.iter(|| 7u64);
            Ok(())
        })
        .unwrap();

        assert_eq!(measurement.iterations, 200);
    }

    #[test]
    fn fixed_samples_cap_batched_runners() {
        let measurement = run_measurement_loop(&EngineConfig::fixed_samples(5), |b| {
            b.iter_batched(64, || 1u64, |x| *x + 1);
            Ok(())
        })
        .unwrap();

        assert_eq!(measurement.iterations, 5);
        assert_eq!(measurement.samples.len(), 1);
    }

    #[test]
    fn fixed_samples_cap_runners_with_several_iters() {
        let measurement = run_measurement_loop(&EngineConfig::fixed_samples(7), |b| {
            for _ in 0..3 {
                b.iter(|| 2u64);
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(measurement.iterations, 7);
        assert_eq!(measurement.samples.len(), 7);
    }

    #[test]
    fn runner_error_ends_the_loop() {
        let mut calls = 0;
        let err = run_measurement_loop(&quick(), |b| {
            calls += 1;
            b.iter(|| 1u8);
            if calls == 3 {
                return Err("peer table exhausted".into());
            }
            Ok(())
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "peer table exhausted");
        assert_eq!(calls, 3);
    }

    #[test]
    fn idle_runner_is_an_error() {
        let err = run_measurement_loop(&quick(), |_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("Bencher::iter"));
    }

    #[test]
    fn engine_reports_panics_as_cause() {
        let suite = BenchmarkSuite::new("panics", |b: &mut Bencher| {
            b.iter(|| 1u8);
            panic!("frame too large");
        });

        let cause = BencherEngine::new(quick()).measure(&suite).unwrap_err();
        assert_eq!(cause, "frame too large");
    }

    #[test]
    fn engine_returns_measurement() {
        let suite = BenchmarkSuite::new("ok", |b: &mut Bencher| {
            b.iter_batched(4, || vec![0u8; 32], |v| v.len());
            Ok(())
        });

        let measurement = BencherEngine::new(quick()).measure(&suite).unwrap();
        assert_eq!(measurement.iterations, 20);
        assert!(measurement.mean_ns().is_some());
    }
}
