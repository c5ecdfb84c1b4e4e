//! Peer discovery workload
//!
//! A Kademlia-style node table: node ids are SHA-256 digests, distance is
//! XOR, and nodes live in buckets indexed by log distance from the local id.

use netbench::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use std::hint::black_box;

/// Node id length in bytes.
pub const ID_LEN: usize = 32;

/// Entries per bucket.
pub const BUCKET_SIZE: usize = 16;

/// Number of buckets, one per bit of the id.
pub const BUCKET_COUNT: usize = ID_LEN * 8;

/// Nodes returned by a lookup.
pub const LOOKUP_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; ID_LEN]);

impl NodeId {
    /// Id derived from a node's public key.
    pub fn from_public_key(key: &[u8]) -> Self {
        Self(Sha256::digest(key).into())
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        let mut key = [0u8; 64];
        rng.fill(&mut key[..]);
        Self::from_public_key(&key)
    }

    pub fn distance(&self, other: &NodeId) -> [u8; ID_LEN] {
        let mut out = [0u8; ID_LEN];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a ^ b;
        }
        out
    }

    /// Index of the highest differing bit, `None` for the same id.
    pub fn log_distance(&self, other: &NodeId) -> Option<usize> {
        let distance = self.distance(other);
        let (byte, value) = distance.iter().enumerate().find(|(_, b)| **b != 0)?;
        Some((ID_LEN - byte) * 8 - value.leading_zeros() as usize - 1)
    }
}

/// Routing table around a local id.
#[derive(Debug, Clone)]
pub struct NodeTable {
    local: NodeId,
    buckets: Vec<Vec<NodeId>>,
}

impl NodeTable {
    pub fn new(local: NodeId) -> Self {
        Self {
            local,
            buckets: vec![Vec::new(); BUCKET_COUNT],
        }
    }

    pub fn local(&self) -> NodeId {
        self.local
    }

    /// Add `node` unless it is the local id, already present, or its bucket
    /// is full. Returns whether it was added.
    pub fn add(&mut self, node: NodeId) -> bool {
        let Some(index) = self.local.log_distance(&node) else {
            return false;
        };
        let bucket = &mut self.buckets[index];
        if bucket.len() >= BUCKET_SIZE || bucket.contains(&node) {
            return false;
        }
        bucket.push(node);
        true
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` known nodes closest to `target`, nearest first.
    pub fn closest(&self, target: &NodeId, k: usize) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.buckets.iter().flatten().copied().collect();
        nodes.sort_unstable_by_key(|node| node.distance(target));
        nodes.truncate(k);
        nodes
    }
}

fn populated_table(rng: &mut ChaCha8Rng, nodes: usize) -> NodeTable {
    let mut table = NodeTable::new(NodeId::random(rng));
    for _ in 0..nodes {
        table.add(NodeId::random(rng));
    }
    table
}

pub(crate) fn discovery(b: &mut Bencher) -> SuiteResult {
    let mut rng = ChaCha8Rng::seed_from_u64(0xD15C);
    let table = populated_table(&mut rng, 4096);
    if table.is_empty() {
        return Err("node table is empty".into());
    }

    b.iter_with_setup(
        || NodeId::random(&mut rng),
        |target| table.closest(black_box(&target), LOOKUP_SIZE),
    );
    Ok(())
}
