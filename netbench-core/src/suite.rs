//! Benchmark suite definitions
//!
//! A [`BenchmarkSuite`] is what the registry stores: a name, a description
//! and a shared runner. A [`SuiteDef`] is the static form collected by
//! `inventory`; declaring one has no effect until
//! [`SuiteRegistry::discover`](crate::SuiteRegistry::discover) turns it into
//! a registration.

use crate::bencher::Bencher;
use crate::error::SuiteResult;
use std::fmt;
use std::sync::Arc;

/// Shared, thread-safe suite workload.
pub type SuiteRunner = Arc<dyn Fn(&mut Bencher) -> SuiteResult + Send + Sync>;

/// A named unit of benchmarked work.
#[derive(Clone)]
pub struct BenchmarkSuite {
    name: String,
    description: String,
    runner: SuiteRunner,
}

impl BenchmarkSuite {
    /// Build a suite from a name and a runner.
    pub fn new<F>(name: impl Into<String>, runner: F) -> Self
    where
        F: Fn(&mut Bencher) -> SuiteResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            runner: Arc::new(runner),
        }
    }

    /// Attach a one-line description shown by `list`.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Unique suite name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, empty when none was given.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Invoke the runner once against `bencher`.
    pub fn run(&self, bencher: &mut Bencher) -> SuiteResult {
        (self.runner)(bencher)
    }
}

impl fmt::Debug for BenchmarkSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkSuite")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Static suite declaration, submitted with the `suite!` macro.
#[derive(Debug, Clone)]
pub struct SuiteDef {
    /// Unique suite name
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Workload
    pub runner: fn(&mut Bencher) -> SuiteResult,
    /// Declaring source file
    pub file: &'static str,
    /// Declaring source line
    pub line: u32,
    /// Declaring module
    pub module_path: &'static str,
}

impl From<&SuiteDef> for BenchmarkSuite {
    fn from(def: &SuiteDef) -> Self {
        BenchmarkSuite::new(def.name, def.runner).with_description(def.description)
    }
}

inventory::collect!(SuiteDef);
