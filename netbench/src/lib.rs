#![warn(missing_docs)]
//! # Netbench
//!
//! Micro-benchmark harness for a peer-to-peer network stack.
//!
//! Suites (handshake, key derivation, key agreement, frame codecs, peer
//! discovery, ...) are registered by name in a [`SuiteRegistry`]. The
//! launcher selects one suite, or all of them in registration order, and
//! runs each through a measurement engine, one at a time.
//!
//! ## Registering explicitly
//!
//! ```ignore
//! use netbench::prelude::*;
//!
//! fn kdf(b: &mut Bencher) -> SuiteResult {
//!     b.iter(|| derive_keys());
//!     Ok(())
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut registry = SuiteRegistry::new();
//!     registry.register("kdf", kdf)?;
//!     netbench::run_with_registry(registry, Some("kdf"))
//! }
//! ```
//!
//! ## Declaring with `suite!`
//!
//! ```ignore
//! netbench::suite!("kdf", kdf, "concat KDF over SHA-256");
//!
//! fn main() -> anyhow::Result<()> {
//!     netbench::run()
//! }
//! ```

pub use netbench_core::{
    Bencher, BencherEngine, BenchmarkSuite, EngineConfig, Measurement, MeasurementEngine,
    RunnerError, Sample, SuiteDef, SuiteError, SuiteRegistry, SuiteResult, SuiteRunner,
    TrackingAllocator, current_allocation, reset_allocation_counter,
};

pub use netbench_cli::{
    Cli, ExecutionResult, Launcher, NetbenchConfig, Report, Selection, SuiteRun, execute, run,
    run_with_cli, run_with_registry,
};

/// Internal re-exports for macro use
#[doc(hidden)]
pub mod internal {
    pub use inventory;
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Bencher, SuiteError, SuiteRegistry, SuiteResult, suite};
}

/// Declare a suite for [`SuiteRegistry::discover`].
///
/// Declaring registers nothing by itself; the suite joins a registry only
/// when `discover()` runs.
///
/// ```ignore
/// netbench::suite!("discovery", discovery::run, "closest-peer lookup");
/// ```
#[macro_export]
macro_rules! suite {
    ($name:literal, $runner:path) => {
        $crate::suite!($name, $runner, "");
    };
    ($name:literal, $runner:path, $description:literal) => {
        $crate::internal::inventory::submit! {
            $crate::SuiteDef {
                name: $name,
                description: $description,
                runner: $runner,
                file: file!(),
                line: line!(),
                module_path: module_path!(),
            }
        }
    };
}
