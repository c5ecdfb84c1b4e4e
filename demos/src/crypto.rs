//! Key agreement and key derivation workloads
//!
//! Key agreement is a finite-field Diffie-Hellman over the Mersenne prime
//! 2^61 - 1. It has the same shape as the elliptic-curve exchange a real
//! transport uses (private scalar, public value, shared secret) and a
//! comparable per-operation cost profile for benchmarking, but it is not a
//! secure group.

use netbench::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use std::hint::black_box;

/// Group modulus, 2^61 - 1.
pub const MODULUS: u64 = (1 << 61) - 1;

/// Group generator.
pub const GENERATOR: u64 = 37;

/// Length of each derived session secret.
pub const SECRET_LEN: usize = 32;

fn mul_mod(a: u64, b: u64) -> u64 {
    ((a as u128 * b as u128) % MODULUS as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64) -> u64 {
    let mut acc = 1;
    base %= MODULUS;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base);
        }
        base = mul_mod(base, base);
        exp >>= 1;
    }
    acc
}

/// A private scalar and its public value.
#[derive(Debug, Clone, Copy)]
pub struct KeyPair {
    secret: u64,
    pub public: u64,
}

impl KeyPair {
    pub fn generate(rng: &mut impl Rng) -> Self {
        let secret = rng.gen_range(2..MODULUS - 1);
        Self {
            secret,
            public: pow_mod(GENERATOR, secret),
        }
    }

    /// Shared secret with the holder of `peer_public`.
    pub fn agree(&self, peer_public: u64) -> Result<[u8; 8], CryptoError> {
        if peer_public <= 1 || peer_public >= MODULUS - 1 {
            return Err(CryptoError::InvalidPublicKey(peer_public));
        }
        Ok(pow_mod(peer_public, self.secret).to_be_bytes())
    }
}

/// Failures while agreeing keys or completing a handshake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("public value {0} is outside the group")]
    InvalidPublicKey(u64),
    #[error("auth message MAC mismatch")]
    MacMismatch,
}

/// Concatenation KDF over SHA-256: `H(counter || z || info)` blocks,
/// counter starting at 1, truncated to `len` bytes.
pub fn concat_kdf(z: &[u8], info: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len.div_ceil(32) * 32);
    let mut counter: u32 = 1;
    while out.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(z);
        hasher.update(info);
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(len);
    out
}

/// Secrets both sides hold once the handshake completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secrets {
    pub aes: [u8; SECRET_LEN],
    pub mac: [u8; SECRET_LEN],
}

fn hash(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// One side of the handshake.
#[derive(Debug, Clone)]
pub struct Peer {
    identity: KeyPair,
    ephemeral: KeyPair,
    nonce: [u8; 32],
}

/// Auth or ack message: public values, nonce and a MAC binding them to the
/// static shared secret.
#[derive(Debug, Clone)]
pub struct HandshakeMessage {
    pub identity: u64,
    pub ephemeral: u64,
    pub nonce: [u8; 32],
    pub mac: [u8; 32],
}

impl Peer {
    pub fn generate(rng: &mut impl Rng) -> Self {
        let mut nonce = [0u8; 32];
        rng.fill(&mut nonce);
        Self {
            identity: KeyPair::generate(rng),
            ephemeral: KeyPair::generate(rng),
            nonce,
        }
    }

    pub fn identity(&self) -> u64 {
        self.identity.public
    }

    /// Message addressed to the peer with identity `remote`.
    pub fn message(&self, remote: u64) -> Result<HandshakeMessage, CryptoError> {
        let shared = self.identity.agree(remote)?;
        let key = concat_kdf(&shared, b"auth", SECRET_LEN);
        Ok(HandshakeMessage {
            identity: self.identity.public,
            ephemeral: self.ephemeral.public,
            nonce: self.nonce,
            mac: hash(&[&key, &self.ephemeral.public.to_be_bytes(), &self.nonce]),
        })
    }

    /// Check `remote`'s message and derive session secrets.
    ///
    /// `initiator` orders the nonces so both sides derive the same secrets.
    pub fn complete(
        &self,
        remote: &HandshakeMessage,
        initiator: bool,
    ) -> Result<Secrets, CryptoError> {
        let shared = self.identity.agree(remote.identity)?;
        let key = concat_kdf(&shared, b"auth", SECRET_LEN);
        let expected = hash(&[&key, &remote.ephemeral.to_be_bytes(), &remote.nonce]);
        if expected != remote.mac {
            return Err(CryptoError::MacMismatch);
        }

        let ephemeral = self.ephemeral.agree(remote.ephemeral)?;
        let (first, second) = if initiator {
            (&remote.nonce, &self.nonce)
        } else {
            (&self.nonce, &remote.nonce)
        };
        let shared_secret = hash(&[&ephemeral, &hash(&[first, second])]);
        let aes = hash(&[&ephemeral, &shared_secret]);
        let mac = hash(&[&ephemeral, &aes]);
        Ok(Secrets { aes, mac })
    }
}

/// Full auth/ack exchange between two peers.
pub fn handshake(initiator: &Peer, recipient: &Peer) -> Result<(Secrets, Secrets), CryptoError> {
    let auth = initiator.message(recipient.identity())?;
    let ack = recipient.message(initiator.identity())?;
    let recipient_secrets = recipient.complete(&auth, false)?;
    let initiator_secrets = initiator.complete(&ack, true)?;
    Ok((initiator_secrets, recipient_secrets))
}

pub(crate) fn kdf(b: &mut Bencher) -> SuiteResult {
    let z = [0x5Au8; 32];
    b.iter(|| concat_kdf(black_box(&z), b"netbench", 2 * SECRET_LEN));
    Ok(())
}

pub(crate) fn ecdh(b: &mut Bencher) -> SuiteResult {
    let mut rng = ChaCha8Rng::seed_from_u64(0xEC);
    let local = KeyPair::generate(&mut rng);
    let remote = KeyPair::generate(&mut rng).public;
    let mut result = Ok([0u8; 8]);
    b.iter(|| result = local.agree(black_box(remote)));
    result?;
    Ok(())
}

pub(crate) fn handshake_suite(b: &mut Bencher) -> SuiteResult {
    let mut rng = ChaCha8Rng::seed_from_u64(0x4A5);
    let initiator = Peer::generate(&mut rng);
    let recipient = Peer::generate(&mut rng);
    let mut result = Ok(());
    b.iter(|| {
        result = handshake(&initiator, &recipient).and_then(|(i, r)| {
            if i == r {
                Ok(())
            } else {
                Err(CryptoError::MacMismatch)
            }
        });
    });
    result?;
    Ok(())
}
