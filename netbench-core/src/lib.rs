#![warn(missing_docs)]
//! Netbench Core
//!
//! Leaf types of the benchmark harness:
//! - [`SuiteRegistry`]: name-keyed set of [`BenchmarkSuite`]s
//! - [`Bencher`]: iteration API handed to suite runners
//! - [`MeasurementEngine`] and the default [`BencherEngine`]
//! - [`SuiteError`]: duplicate, not-found and execution failures
//! - [`TrackingAllocator`]: opt-in per-iteration allocation counting

mod allocator;
mod bencher;
mod engine;
mod error;
mod measure;
mod registry;
mod suite;

pub use allocator::{TrackingAllocator, current_allocation, reset_allocation_counter};
pub use bencher::{Bencher, DEFAULT_SAMPLE_COUNT, MIN_SAMPLE_COUNT, Measurement, Sample};
pub use engine::{BencherEngine, EngineConfig, MeasurementEngine, run_measurement_loop};
pub use error::{RunnerError, SuiteError, SuiteResult};
pub use measure::{Elapsed, HAS_CYCLE_COUNTER, Timer, pin_to_cpu};
pub use registry::SuiteRegistry;
pub use suite::{BenchmarkSuite, SuiteDef, SuiteRunner};

/// Keeps `inventory` entries alive under LTO.
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || for _ in inventory::iter::<SuiteDef> {};
