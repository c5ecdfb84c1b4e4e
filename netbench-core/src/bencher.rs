//! Bencher - the iteration API handed to suite runners
//!
//! A runner performs its workload through one of the `iter*` methods. The
//! engine calls the runner repeatedly: first in the warmup phase, where raw
//! iteration times are kept to size the batches, then in the measurement
//! phase, where iterations are averaged into batched samples.

use crate::allocator::{current_allocation, reset_allocation_counter};
use crate::measure::{Elapsed, Timer};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::hint::black_box;

/// Samples collected when the engine does not ask for a specific count.
pub const DEFAULT_SAMPLE_COUNT: usize = 100;

/// Lower bound on the sample target.
pub const MIN_SAMPLE_COUNT: usize = 10;

/// One batched sample: the averages of `iters_per_sample` iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Mean iteration time in nanoseconds
    pub duration_nanos: u64,
    /// Mean hardware ticks per iteration
    pub cpu_cycles: u64,
    /// Mean bytes allocated per iteration (0 unless tracking)
    #[serde(default)]
    pub alloc_bytes: u64,
    /// Mean allocations per iteration (0 unless tracking)
    #[serde(default)]
    pub alloc_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Warmup,
    Measure,
}

#[derive(Debug, Default)]
struct Batch {
    nanos: u64,
    cycles: u64,
    alloc_bytes: u64,
    alloc_count: u64,
    iters: u64,
}

/// Time, ticks and allocations of one recorded iteration.
#[derive(Debug, Clone, Copy, Default)]
struct Observation {
    elapsed: Elapsed,
    alloc_bytes: u64,
    alloc_count: u64,
}

/// Everything one engine run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Measurement {
    /// Batched samples from the measurement phase
    pub samples: Vec<Sample>,
    /// Iterations in the measurement phase
    pub iterations: u64,
    /// Iterations spent warming up, not sampled
    #[serde(default)]
    pub warmup_iterations: u64,
    /// Sum of sample durations
    pub total_time_ns: u64,
    /// Whether allocation counters were read
    #[serde(default)]
    pub allocations_tracked: bool,
}

impl Measurement {
    /// Mean of the sample durations, `None` without samples.
    pub fn mean_ns(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.total_time_ns as f64 / self.samples.len() as f64)
    }

    /// Fastest sample.
    pub fn min_ns(&self) -> Option<u64> {
        self.samples.iter().map(|s| s.duration_nanos).min()
    }

    /// Slowest sample.
    pub fn max_ns(&self) -> Option<u64> {
        self.samples.iter().map(|s| s.duration_nanos).max()
    }

    /// Operations per second derived from the mean.
    pub fn throughput_ops_sec(&self) -> Option<f64> {
        self.mean_ns()
            .filter(|mean| *mean > 0.0)
            .map(|mean| 1_000_000_000.0 / mean)
    }

    /// Mean bytes allocated per iteration, `None` when not tracked.
    pub fn mean_alloc_bytes(&self) -> Option<f64> {
        self.mean_of(|s| s.alloc_bytes)
    }

    /// Mean allocations per iteration, `None` when not tracked.
    pub fn mean_alloc_count(&self) -> Option<f64> {
        self.mean_of(|s| s.alloc_count)
    }

    fn mean_of(&self, field: impl Fn(&Sample) -> u64) -> Option<f64> {
        if !self.allocations_tracked || self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().map(field).sum();
        Some(sum as f64 / self.samples.len() as f64)
    }
}

/// Iteration driver passed to every suite runner.
pub struct Bencher {
    phase: Phase,
    target_samples: usize,
    iters_per_sample: u64,
    total_iterations: u64,
    warmup_iterations: u64,
    iteration_limit: Option<u64>,
    track_allocations: bool,
    warmup_nanos: Vec<u64>,
    batch: Batch,
    samples: Vec<Sample>,
    runtime: Option<tokio::runtime::Runtime>,
}

impl Default for Bencher {
    fn default() -> Self {
        Self::new()
    }
}

impl Bencher {
    /// Bencher targeting [`DEFAULT_SAMPLE_COUNT`] samples.
    pub fn new() -> Self {
        Self::with_sample_count(DEFAULT_SAMPLE_COUNT)
    }

    /// Bencher targeting `target_samples` samples (at least [`MIN_SAMPLE_COUNT`]).
    pub fn with_sample_count(target_samples: usize) -> Self {
        let target_samples = target_samples.max(MIN_SAMPLE_COUNT);
        Self {
            phase: Phase::Warmup,
            target_samples,
            iters_per_sample: 1,
            total_iterations: 0,
            warmup_iterations: 0,
            iteration_limit: None,
            track_allocations: false,
            warmup_nanos: Vec::with_capacity(1024),
            batch: Batch::default(),
            samples: Vec::with_capacity(target_samples),
            runtime: None,
        }
    }

    /// Read [`current_allocation`] around every iteration.
    ///
    /// Counts stay 0 unless [`TrackingAllocator`](crate::TrackingAllocator)
    /// is installed as the global allocator.
    pub fn with_allocation_tracking(mut self, track: bool) -> Self {
        self.track_allocations = track;
        self
    }

    /// Cap on [`Bencher::iteration_count`]. Once reached, `iter*` calls do
    /// nothing and batches shrink to fit.
    pub fn set_iteration_limit(&mut self, limit: Option<u64>) {
        self.iteration_limit = limit;
    }

    /// Iterations left before the limit.
    fn remaining(&self) -> u64 {
        self.iteration_limit
            .map_or(u64::MAX, |limit| limit.saturating_sub(self.total_iterations))
    }

    #[inline]
    fn alloc_begin(&self) {
        if self.track_allocations {
            reset_allocation_counter();
        }
    }

    #[inline]
    fn alloc_end(&self) -> (u64, u64) {
        if self.track_allocations {
            current_allocation()
        } else {
            (0, 0)
        }
    }

    /// Time one call of `f`.
    #[inline]
    pub fn iter<T, F>(&mut self, mut f: F)
    where
        F: FnMut() -> T,
    {
        if self.remaining() == 0 {
            return;
        }
        self.alloc_begin();
        let timer = Timer::start();
        black_box(f());
        let elapsed = timer.stop();
        let (alloc_bytes, alloc_count) = self.alloc_end();
        self.record(Observation {
            elapsed,
            alloc_bytes,
            alloc_count,
        });
    }

    /// Run `setup` untimed, then time `routine` on its output.
    #[inline]
    pub fn iter_with_setup<I, R, S, F>(&mut self, mut setup: S, mut routine: F)
    where
        S: FnMut() -> I,
        F: FnMut(I) -> R,
    {
        if self.remaining() == 0 {
            return;
        }
        let input = setup();
        self.alloc_begin();
        let timer = Timer::start();
        black_box(routine(input));
        let elapsed = timer.stop();
        let (alloc_bytes, alloc_count) = self.alloc_end();
        self.record(Observation {
            elapsed,
            alloc_bytes,
            alloc_count,
        });
    }

    /// Time `batch_size` calls of `routine` against one setup value and
    /// record the per-call average. Suited to operations too fast to time
    /// individually. The batch is cut short at the iteration limit.
    #[inline]
    pub fn iter_batched<I, R, S, F>(&mut self, batch_size: u64, mut setup: S, mut routine: F)
    where
        S: FnMut() -> I,
        F: FnMut(&I) -> R,
    {
        let batch_size = batch_size.max(1).min(self.remaining());
        if batch_size == 0 {
            return;
        }
        let input = setup();
        self.alloc_begin();
        let timer = Timer::start();
        for _ in 0..batch_size {
            black_box(routine(black_box(&input)));
        }
        let total = timer.stop();
        let (alloc_bytes, alloc_count) = self.alloc_end();

        let per_call = |v: u64| (v as f64 / batch_size as f64).round() as u64;
        self.total_iterations += batch_size - 1;
        self.record(Observation {
            elapsed: Elapsed {
                nanos: per_call(total.nanos),
                cycles: per_call(total.cycles),
            },
            alloc_bytes: per_call(alloc_bytes),
            alloc_count: per_call(alloc_count),
        });
    }

    /// Time one future produced by `f`.
    ///
    /// Inside a multi-threaded tokio runtime the future is driven on the
    /// current handle; otherwise a current-thread runtime is built once and
    /// cached on the bencher.
    pub fn iter_async<T, F, Fut>(&mut self, mut f: F) -> std::io::Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.remaining() == 0 {
            return Ok(());
        }
        if tokio::runtime::Handle::try_current().is_err() && self.runtime.is_none() {
            self.runtime = Some(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?,
            );
        }

        self.alloc_begin();
        let elapsed = match tokio::runtime::Handle::try_current() {
            Ok(handle) => tokio::task::block_in_place(|| {
                let timer = Timer::start();
                black_box(handle.block_on(f()));
                timer.stop()
            }),
            Err(_) => {
                let Some(rt) = self.runtime.as_ref() else {
                    return Ok(());
                };
                let timer = Timer::start();
                black_box(rt.block_on(f()));
                timer.stop()
            }
        };
        let (alloc_bytes, alloc_count) = self.alloc_end();
        self.record(Observation {
            elapsed,
            alloc_bytes,
            alloc_count,
        });
        Ok(())
    }

    #[inline]
    fn record(&mut self, obs: Observation) {
        self.total_iterations += 1;

        match self.phase {
            Phase::Warmup => self.warmup_nanos.push(obs.elapsed.nanos),
            Phase::Measure => {
                self.batch.nanos += obs.elapsed.nanos;
                self.batch.cycles += obs.elapsed.cycles;
                self.batch.alloc_bytes += obs.alloc_bytes;
                self.batch.alloc_count += obs.alloc_count;
                self.batch.iters += 1;
                if self.batch.iters >= self.iters_per_sample {
                    self.flush_batch();
                }
            }
        }
    }

    fn flush_batch(&mut self) {
        let batch = std::mem::take(&mut self.batch);
        if batch.iters == 0 || self.samples.len() >= self.target_samples {
            return;
        }
        self.samples.push(Sample {
            duration_nanos: batch.nanos / batch.iters,
            cpu_cycles: batch.cycles / batch.iters,
            alloc_bytes: batch.alloc_bytes / batch.iters,
            alloc_count: batch.alloc_count / batch.iters,
        });
    }

    /// Mean warmup iteration time, if any warmup iterations ran.
    pub fn estimated_iter_time_ns(&self) -> Option<u64> {
        if self.warmup_nanos.is_empty() {
            return None;
        }
        Some(self.warmup_nanos.iter().sum::<u64>() / self.warmup_nanos.len() as u64)
    }

    /// Leave warmup and size batches so `target_samples` fill `measurement_time_ns`.
    pub fn start_measurement(&mut self, measurement_time_ns: u64) {
        self.iters_per_sample = match self.estimated_iter_time_ns() {
            Some(iter_ns) if iter_ns > 0 => {
                (measurement_time_ns / self.target_samples as u64 / iter_ns).max(1)
            }
            _ => 1,
        };
        self.phase = Phase::Measure;
        self.warmup_iterations = self.total_iterations;
        self.warmup_nanos = Vec::new();
        self.batch = Batch::default();
    }

    /// Override the batch size chosen by [`Bencher::start_measurement`].
    pub fn set_iters_per_sample(&mut self, iters: u64) {
        self.iters_per_sample = iters.max(1);
    }

    /// Whether the sample target is reached.
    pub fn has_enough_samples(&self) -> bool {
        self.samples.len() >= self.target_samples
    }

    /// Samples collected so far.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Iterations recorded so far, warmup included.
    pub fn iteration_count(&self) -> u64 {
        self.total_iterations
    }

    /// Flush the partial batch and hand back the measurement.
    pub fn finish(mut self) -> Measurement {
        self.flush_batch();
        let total_time_ns = self.samples.iter().map(|s| s.duration_nanos).sum();
        let warmup_iterations = match self.phase {
            Phase::Warmup => self.total_iterations,
            Phase::Measure => self.warmup_iterations,
        };
        Measurement {
            samples: self.samples,
            iterations: self.total_iterations - warmup_iterations,
            warmup_iterations,
            total_time_ns,
            allocations_tracked: self.track_allocations,
        }
    }
}
