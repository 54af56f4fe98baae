//! Pseudorandom Set expansion (spec component C).
//!
//! `PRSet` draws one index per chunk from a keyed PRF. Stateless apart from
//! its key; every call to `expand` is pure and infallible for valid
//! `set_size`/`chunk_size`.

use crate::prf::{Prf, PrfKey128};

pub struct PRSet {
    prf: Prf,
}

impl PRSet {
    pub fn new(key: &PrfKey128) -> Self {
        Self { prf: Prf::new(key) }
    }

    /// `offset_i = prf_eval_mod(i, chunk_size)`, emits `i * chunk_size + offset_i`
    /// for `i` in `0..set_size`. Modulo bias from the `mod chunk_size`
    /// reduction is accepted, not corrected by rejection sampling (spec §9
    /// open question, resolved in DESIGN.md).
    pub fn expand(&self, set_size: u64, chunk_size: u64) -> Vec<u64> {
        (0..set_size)
            .map(|i| {
                let offset = self.prf.eval_mod(i, chunk_size);
                i * chunk_size + offset
            })
            .collect()
    }
}
