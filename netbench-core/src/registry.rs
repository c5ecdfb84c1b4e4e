//! Suite Registry
//!
//! Holds every known suite keyed by name. Names are unique and keep their
//! registration order, which is the order `run_all` uses. The registry is
//! populated once before any run and only read afterwards.

use crate::bencher::Bencher;
use crate::error::{SuiteError, SuiteResult};
use crate::suite::{BenchmarkSuite, SuiteDef};
use std::collections::HashMap;
use tracing::debug;

/// Name-keyed set of benchmark suites.
#[derive(Debug, Default, Clone)]
pub struct SuiteRegistry {
    suites: Vec<BenchmarkSuite>,
    index: HashMap<String, usize>,
}

impl SuiteRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every suite declared with `suite!` in this binary.
    ///
    /// Declarations are registered sorted by name so the order does not
    /// depend on link order.
    pub fn discover() -> Result<Self, SuiteError> {
        let mut defs: Vec<&'static SuiteDef> = inventory::iter::<SuiteDef>.into_iter().collect();
        defs.sort_by_key(|def| def.name);

        let mut registry = Self::new();
        for def in defs {
            debug!(suite = def.name, file = def.file, line = def.line, "discovered suite");
            registry.insert(BenchmarkSuite::from(def))?;
        }
        Ok(registry)
    }

    /// Register `runner` under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, runner: F) -> Result<(), SuiteError>
    where
        F: Fn(&mut Bencher) -> SuiteResult + Send + Sync + 'static,
    {
        self.insert(BenchmarkSuite::new(name, runner))
    }

    /// Register a fully built suite. Leaves the registry untouched on a
    /// duplicate name.
    pub fn insert(&mut self, suite: BenchmarkSuite) -> Result<(), SuiteError> {
        if self.index.contains_key(suite.name()) {
            return Err(SuiteError::DuplicateSuite {
                name: suite.name().to_string(),
            });
        }

        debug!(suite = suite.name(), "registered suite");
        self.index.insert(suite.name().to_string(), self.suites.len());
        self.suites.push(suite);
        Ok(())
    }

    /// Suite registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<&BenchmarkSuite, SuiteError> {
        self.index
            .get(name)
            .map(|&idx| &self.suites[idx])
            .ok_or_else(|| SuiteError::SuiteNotFound {
                name: name.to_string(),
                available: self.list_names(),
            })
    }

    /// Registered names in registration order.
    pub fn list_names(&self) -> Vec<String> {
        self.suites.iter().map(|s| s.name().to_string()).collect()
    }

    /// Registered suites in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BenchmarkSuite> {
        self.suites.iter()
    }

    /// Number of registered suites.
    pub fn len(&self) -> usize {
        self.suites.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}
