//! Invertible Pseudorandom Function (spec component D).
//!
//! `Iprf::forward` maps `{0..domain-1} -> {0..range-1}`; `Iprf::inverse`
//! returns every domain point that forward-maps to a given range point.
//! Built from a Swap-or-Not PRP (Morris-Rogaway, eprint 2013/560) composed
//! with a recursive binomial-split bucketing tree that assigns each of the
//! `domain` permuted points to one of `range` buckets ("balls into bins").
//!
//! Forward and inverse walk the same tree and call
//! [`crate::binomial::binomial_sample`] with the same `(count, num, denom,
//! seed)` at every node, so they agree on every split by construction: there
//! is exactly one `seed -> L` mapping in the crate, defined in `binomial.rs`.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::binomial::binomial_sample;
use crate::prf::PrfKey128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IprfError {
    #[error("domain must be greater than zero")]
    InvalidDomain,
    #[error("range must be greater than zero")]
    InvalidRange,
    #[error("x={x} is out of domain [0, {domain})")]
    OutOfDomain { x: u64, domain: u64 },
    #[error("y={y} is out of range [0, {range})")]
    OutOfRange { y: u64, range: u64 },
    #[error("HKDF expand failed: output too long for the given PRK")]
    KeyDerivation,
}

/// Derive a 16-byte iPRF key from a master secret and a context label.
/// HKDF-SHA256, deterministic, domain-separated by `context`: the same
/// `(master_secret, context)` pair always yields the same key, and distinct
/// contexts yield independent keys even under the same master secret.
pub fn derive_iprf_key(master_secret: &[u8], context: &[u8]) -> Result<PrfKey128, IprfError> {
    let hk = Hkdf::<Sha256>::new(None, master_secret);
    let mut okm = [0u8; 16];
    hk.expand(context, &mut okm)
        .map_err(|_| IprfError::KeyDerivation)?;
    Ok(PrfKey128::from_bytes(okm))
}

/// Swap-or-Not small-domain PRP. Each round is an involution, so the
/// inverse runs the same rounds in reverse order.
struct SwapOrNot {
    cipher: Aes128,
    domain: u64,
    num_rounds: usize,
}

impl SwapOrNot {
    fn new(key: PrfKey128, domain: u64) -> Self {
        let cipher = Aes128::new(GenericArray::from_slice(key.as_bytes()));
        // ~6 * log2(N) rounds for full security against all N queries.
        let num_rounds = ((domain as f64).log2().ceil() as usize) * 6 + 6;
        Self {
            cipher,
            domain,
            num_rounds,
        }
    }

    fn derive_round_key(&self, round: usize) -> u64 {
        let mut input = [0u8; 16];
        input[0..8].copy_from_slice(&(round as u64).to_be_bytes());
        input[8..16].copy_from_slice(&self.domain.to_be_bytes());
        let mut block = GenericArray::clone_from_slice(&input);
        self.cipher.encrypt_block(&mut block);
        u64::from_be_bytes(block[0..8].try_into().unwrap()) % self.domain
    }

    fn prf_bit(&self, round: usize, canonical: u64) -> bool {
        let mut input = [0u8; 16];
        input[0..8].copy_from_slice(&(round as u64 | 0x8000_0000_0000_0000).to_be_bytes());
        input[8..16].copy_from_slice(&canonical.to_be_bytes());
        let mut block = GenericArray::clone_from_slice(&input);
        self.cipher.encrypt_block(&mut block);
        (block[0] & 1) == 1
    }

    fn round(&self, round_num: usize, x: u64) -> u64 {
        let k_i = self.derive_round_key(round_num);
        let partner = (k_i + self.domain - (x % self.domain)) % self.domain;
        let canonical = x.max(partner);
        if self.prf_bit(round_num, canonical) {
            partner
        } else {
            x
        }
    }

    fn forward(&self, x: u64) -> u64 {
        let mut val = x;
        for round in 0..self.num_rounds {
            val = self.round(round, val);
        }
        val
    }

    fn inverse(&self, y: u64) -> u64 {
        let mut val = y;
        for round in (0..self.num_rounds).rev() {
            val = self.round(round, val);
        }
        val
    }
}

/// Full collision-resistant node identity for the bucketing tree: binds
/// `(low, high, original_n)` into a 32-byte digest. Bit-packing this into a
/// single 64-bit word is not safe (two distinct nodes could collide), so
/// this returns the whole SHA-256 output rather than truncating it.
fn encode_node(low: u64, high: u64, original_n: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(low.to_be_bytes());
    hasher.update(high.to_be_bytes());
    hasher.update(original_n.to_be_bytes());
    hasher.finalize().into()
}

/// Invertible PRF: `forward = S(k_pmns, P(k_prp, x))`, `inverse = {P^-1(z) :
/// z in S^-1(y)}`. `P` is the Swap-or-Not PRP; `S` is the binomial-split
/// bucketing tree over the permuted domain.
pub struct Iprf {
    key: PrfKey128,
    prp: SwapOrNot,
    domain: u64,
    range: u64,
}

impl Iprf {
    pub fn new(key: PrfKey128, domain: u64, range: u64) -> Result<Self, IprfError> {
        if domain == 0 {
            return Err(IprfError::InvalidDomain);
        }
        if range == 0 {
            return Err(IprfError::InvalidRange);
        }

        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(b"prp");
        let prp_key_hash = hasher.finalize();
        let prp_key = PrfKey128::from_slice(&prp_key_hash[0..16]).expect("16-byte slice");

        Ok(Self {
            key,
            prp: SwapOrNot::new(prp_key, domain),
            domain,
            range,
        })
    }

    pub fn domain(&self) -> u64 {
        self.domain
    }

    pub fn range(&self) -> u64 {
        self.range
    }

    /// `P(x)` then trace which bucket the permuted point lands in.
    pub fn forward(&self, x: u64) -> Result<u64, IprfError> {
        if x >= self.domain {
            return Err(IprfError::OutOfDomain { x, domain: self.domain });
        }
        let permuted = self.prp.forward(x);
        Ok(self.trace_ball(permuted, self.domain, self.range))
    }

    /// Every `x` with `forward(x) == y`: find the bucket's preimage range
    /// under `S`, then apply `P^-1` to each point in it.
    pub fn inverse(&self, y: u64) -> Result<Vec<u64>, IprfError> {
        if y >= self.range {
            return Err(IprfError::OutOfRange { y, range: self.range });
        }
        let preimages = self.trace_ball_inverse(y, self.domain, self.range);
        Ok(preimages.into_iter().map(|z| self.prp.inverse(z)).collect())
    }

    /// Seed a node's binomial split from its collision-resistant identity
    /// mixed with the iPRF key. Node identity (32 bytes) and derived seed
    /// (64 bits) are deliberately kept separate: only the former needs to be
    /// collision-free.
    fn node_seed(&self, low: u64, high: u64) -> u64 {
        let node_id = encode_node(low, high, self.domain);
        let mut hasher = Sha256::new();
        hasher.update(self.key.as_bytes());
        hasher.update(b"node-seed");
        hasher.update(node_id);
        let digest = hasher.finalize();
        u64::from_be_bytes(digest[0..8].try_into().unwrap())
    }

    /// Walk the tree from the root bucket range `[0, m-1]` down to a single
    /// bucket, using an explicit loop rather than recursion: each node
    /// compares `ball_index` against the binomial-sampled left-subtree ball
    /// count and narrows `[low, high]` accordingly.
    fn trace_ball(&self, x_prime: u64, n: u64, m: u64) -> u64 {
        if m == 1 {
            return 0;
        }

        let mut low = 0u64;
        let mut high = m - 1;
        let mut ball_count = n;
        let mut ball_index = x_prime;

        while low < high {
            let mid = (low + high) / 2;
            let left_bins = mid - low + 1;
            let total_bins = high - low + 1;

            let seed = self.node_seed(low, high);
            let left_count = binomial_sample(ball_count, left_bins, total_bins, seed);

            if ball_index < left_count {
                high = mid;
                ball_count = left_count;
            } else {
                low = mid + 1;
                ball_index -= left_count;
                ball_count -= left_count;
            }
        }
        low
    }

    /// Mirror of `trace_ball`: instead of following one ball down to its
    /// bucket, narrows down to the contiguous range of permuted domain
    /// points that fall into bucket `y`.
    fn trace_ball_inverse(&self, y: u64, n: u64, m: u64) -> Vec<u64> {
        if m == 1 {
            return (0..n).collect();
        }

        let mut low = 0u64;
        let mut high = m - 1;
        let mut ball_count = n;
        let mut ball_start = 0u64;

        while low < high {
            let mid = (low + high) / 2;
            let left_bins = mid - low + 1;
            let total_bins = high - low + 1;

            let seed = self.node_seed(low, high);
            let left_count = binomial_sample(ball_count, left_bins, total_bins, seed);

            if y <= mid {
                high = mid;
                ball_count = left_count;
            } else {
                low = mid + 1;
                ball_start += left_count;
                ball_count -= left_count;
            }
        }

        (ball_start..ball_start + ball_count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PrfKey128 {
        PrfKey128::from_bytes([byte; 16])
    }

    #[test]
    fn swap_or_not_is_involutive() {
        let prp = SwapOrNot::new(key(0), 1000);
        for x in 0..100 {
            let y = prp.forward(x);
            assert_eq!(prp.inverse(y), x, "PRP inverse failed for x={x}");
        }
    }

    #[test]
    fn swap_or_not_is_a_permutation() {
        let prp = SwapOrNot::new(key(1), 100);
        let mut outputs: Vec<u64> = (0..100).map(|x| prp.forward(x)).collect();
        outputs.sort_unstable();
        outputs.dedup();
        assert_eq!(outputs.len(), 100);
    }

    #[test]
    fn forward_and_inverse_agree() {
        let iprf = Iprf::new(key(2), 1000, 100).unwrap();
        for x in 0..50u64 {
            let y = iprf.forward(x).unwrap();
            let preimages = iprf.inverse(y).unwrap();
            assert!(
                preimages.contains(&x),
                "inverse(forward({x})={y}) does not contain {x}: {preimages:?}"
            );
        }
    }

    #[test]
    fn inverse_is_a_partition_of_the_domain() {
        let iprf = Iprf::new(key(3), 500, 37).unwrap();
        let mut covered: Vec<u64> = (0..37).flat_map(|y| iprf.inverse(y).unwrap()).collect();
        covered.sort_unstable();
        let expected: Vec<u64> = (0..500).collect();
        assert_eq!(covered, expected);
    }

    #[test]
    fn out_of_domain_is_rejected() {
        let iprf = Iprf::new(key(4), 10, 5).unwrap();
        assert_eq!(iprf.forward(10), Err(IprfError::OutOfDomain { x: 10, domain: 10 }));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let iprf = Iprf::new(key(5), 10, 5).unwrap();
        assert_eq!(iprf.inverse(5), Err(IprfError::OutOfRange { y: 5, range: 5 }));
    }

    #[test]
    fn zero_domain_or_range_is_rejected() {
        assert_eq!(Iprf::new(key(6), 0, 5).unwrap_err(), IprfError::InvalidDomain);
        assert_eq!(Iprf::new(key(6), 5, 0).unwrap_err(), IprfError::InvalidRange);
    }

    #[test]
    fn single_bucket_range_maps_everything_to_zero() {
        let iprf = Iprf::new(key(7), 200, 1).unwrap();
        for x in 0..200 {
            assert_eq!(iprf.forward(x).unwrap(), 0);
        }
        let preimages = iprf.inverse(0).unwrap();
        assert_eq!(preimages.len(), 200);
    }

    #[test]
    fn encode_node_does_not_collide_across_inputs() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for n in [100_000u64, 1_000_000, 10_000_000] {
            for low in [0u64, 1, 2, n / 2] {
                for high in [n / 2, n - 1, n] {
                    seen.insert(encode_node(low, high, n));
                }
            }
        }
        // 32-byte digests over distinct (low, high, n) triples: no collisions.
        let expected_distinct_triples = {
            let mut triples = HashSet::new();
            for n in [100_000u64, 1_000_000, 10_000_000] {
                for low in [0u64, 1, 2, n / 2] {
                    for high in [n / 2, n - 1, n] {
                        triples.insert((low, high, n));
                    }
                }
            }
            triples.len()
        };
        assert_eq!(seen.len(), expected_distinct_triples);
    }

    #[test]
    fn derive_iprf_key_is_deterministic_and_context_separated() {
        let a = derive_iprf_key(b"master-secret", b"ctx-a").unwrap();
        let b = derive_iprf_key(b"master-secret", b"ctx-a").unwrap();
        let c = derive_iprf_key(b"master-secret", b"ctx-b").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn bucket_sizes_sum_to_domain() {
        let iprf = Iprf::new(key(8), 10_000, 64).unwrap();
        let total: u64 = (0..64).map(|y| iprf.inverse(y).unwrap().len() as u64).sum();
        assert_eq!(total, 10_000);
    }
}
