//! Network-stack benchmarks
//!
//! Runs one suite (default `discovery`), or all of them with `--all`.
//! Pass `--track-allocations` to report per-iteration allocations.

#[global_allocator]
static GLOBAL: netbench::TrackingAllocator = netbench::TrackingAllocator;

fn main() -> anyhow::Result<()> {
    let registry = netbench_demos::registry()?;
    netbench::run_with_registry(registry, Some(netbench_demos::DEFAULT_SUITE))
}
