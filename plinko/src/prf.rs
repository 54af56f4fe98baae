//! Keyed 128-bit block PRF (spec component A).
//!
//! A single AES-128 block, no padding, no chaining. Never expose this as a
//! general-purpose encryption API — it exists only to turn a key plus a
//! small integer into a pseudorandom 64-bit word.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

/// A 16-byte PRF key. Immutable once constructed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PrfKey128([u8; 16]);

impl PrfKey128 {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns `None` if `bytes` is not exactly 16 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl std::fmt::Debug for PrfKey128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrfKey128(..)")
    }
}

/// Keyed AES-128 single-block PRF, `F_k(x) -> 16 bytes`.
pub struct Prf {
    cipher: Aes128,
}

impl Prf {
    pub fn new(key: &PrfKey128) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key.as_bytes())),
        }
    }

    /// Evaluate the PRF on an arbitrary 16-byte block.
    pub fn eval_block(&self, block: [u8; 16]) -> [u8; 16] {
        let mut b = GenericArray::clone_from_slice(&block);
        self.cipher.encrypt_block(&mut b);
        b.into()
    }

    /// Evaluate the PRF on a scalar: the scalar is placed big-endian in the
    /// low 8 bytes of the input block, the high 8 bytes are zero. The
    /// leading 8 bytes of the output, read big-endian, are the pseudorandom
    /// word (spec §4.A).
    pub fn eval_u64(&self, x: u64) -> u64 {
        let mut block = [0u8; 16];
        block[8..16].copy_from_slice(&x.to_be_bytes());
        let out = self.eval_block(block);
        u64::from_be_bytes(out[0..8].try_into().unwrap())
    }

    /// `prf_eval_mod(x, m) = msb64(F_k(x)) mod m`, `0` if `m == 0` (spec §4.C).
    pub fn eval_mod(&self, x: u64, m: u64) -> u64 {
        if m == 0 {
            return 0;
        }
        self.eval_u64(x) % m
    }
}
