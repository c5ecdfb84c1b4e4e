//! Network-stack benchmark suites
//!
//! Representative workloads for the layers of a peer-to-peer transport,
//! registered by name and driven by netbench. The `network-benchmarks`
//! binary runs `discovery` unless told otherwise:
//!
//! ```sh
//! cargo run --release -p netbench-demos --bin network-benchmarks
//! cargo run --release -p netbench-demos --bin network-benchmarks -- kdf
//! cargo run --release -p netbench-demos --bin network-benchmarks -- --all
//! cargo run --release -p netbench-demos --bin network-benchmarks -- list
//! ```
//!
//! | Suite | Workload |
//! |-------|----------|
//! | `handshake` | Auth/ack exchange deriving session secrets |
//! | `kdf` | Concatenation KDF over SHA-256 |
//! | `ecdh` | Finite-field Diffie-Hellman mod 2^61-1, standing in for ECDH |
//! | `out_flow` | Packets split and sent to a writer task |
//! | `in_flow` | Frame streams received and merged into packets |
//! | `frame_encoder` | Single frame encoding |
//! | `frame_merger` | Frame stream decoding and reassembly |
//! | `packet_splitter` | Packet splitting into frames |
//! | `discovery` | Closest-node lookup in a Kademlia table |

pub mod crypto;
pub mod discovery;
pub mod wire;

use netbench::{BenchmarkSuite, SuiteError, SuiteRegistry};

/// Suite the binary runs when none is selected.
pub const DEFAULT_SUITE: &str = "discovery";

/// Register every suite in its canonical order.
pub fn register_all(registry: &mut SuiteRegistry) -> Result<(), SuiteError> {
    let suites = [
        BenchmarkSuite::new("handshake", crypto::handshake_suite)
            .with_description("auth/ack exchange deriving session secrets"),
        BenchmarkSuite::new("kdf", crypto::kdf).with_description("concatenation KDF over SHA-256"),
        BenchmarkSuite::new("ecdh", crypto::ecdh)
            .with_description("finite-field Diffie-Hellman mod 2^61-1 (stand-in for ECDH)"),
        BenchmarkSuite::new("out_flow", wire::out_flow)
            .with_description("packets split and sent to a writer task"),
        BenchmarkSuite::new("in_flow", wire::in_flow)
            .with_description("frame streams received and merged into packets"),
        BenchmarkSuite::new("frame_encoder", wire::frame_encoder)
            .with_description("single frame encoding"),
        BenchmarkSuite::new("frame_merger", wire::frame_merger)
            .with_description("frame stream decoding and reassembly"),
        BenchmarkSuite::new("packet_splitter", wire::packet_splitter)
            .with_description("packet splitting into frames"),
        BenchmarkSuite::new("discovery", discovery::discovery)
            .with_description("closest-node lookup in a Kademlia table"),
    ];

    for suite in suites {
        registry.insert(suite)?;
    }
    Ok(())
}

/// Registry holding every suite.
pub fn registry() -> Result<SuiteRegistry, SuiteError> {
    let mut registry = SuiteRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netbench::{BencherEngine, EngineConfig, Launcher};

    #[test]
    fn suites_in_canonical_order() {
        let registry = registry().unwrap();
        assert_eq!(
            registry.list_names(),
            vec![
                "handshake",
                "kdf",
                "ecdh",
                "out_flow",
                "in_flow",
                "frame_encoder",
                "frame_merger",
                "packet_splitter",
                "discovery",
            ]
        );
        assert!(registry.lookup(DEFAULT_SUITE).is_ok());
        assert!(
            registry
                .lookup("ecdh")
                .unwrap()
                .description()
                .contains("finite-field")
        );
    }

    #[test]
    fn registering_twice_is_a_duplicate() {
        let mut registry = registry().unwrap();
        assert_eq!(
            register_all(&mut registry),
            Err(SuiteError::DuplicateSuite {
                name: "handshake".into()
            })
        );
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn every_suite_runs() {
        let registry = registry().unwrap();
        let launcher = Launcher::new(&registry, BencherEngine::new(EngineConfig::fixed_samples(3)));

        for result in launcher.run_all() {
            let run = result.unwrap();
            assert_eq!(run.measurement.iterations, 3, "{}", run.suite);
        }
    }
}
