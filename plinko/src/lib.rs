//! Plinko PIR library: core cryptographic primitives and query engine.
//!
//! - `prf`: keyed AES-128 single-block PRF (component A)
//! - `db`: database loading and PIR parameter derivation (component B)
//! - `prset`: pseudorandom set expansion (component C)
//! - `iprf`: invertible PRF, Swap-or-Not PRP + binomial bucketing tree (component D)
//! - `binomial`: shared binomial sampler backing the iPRF's tree
//! - `constant_time`: data-oblivious helpers for the binomial sampler's CT path
//! - `engine`: plaintext / set-parity / full-set / health query operations (component E)

pub mod binomial;
pub mod constant_time;
pub mod db;
pub mod engine;
pub mod iprf;
pub mod prf;
pub mod prset;
