//! Keyed pseudo-random source.
//!
//! Every draw is a pure function of `(seed, key)`: the pair is hashed with
//! SHA-256 and the digest seeds a fresh ChaCha8 stream. There is no shared
//! RNG state, so call order never changes what a key returns.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::arithmetic::SCALE;

/// Stateless keyed random source bound to a master seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedRng {
    seed: u64,
}

impl KeyedRng {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive the stream for a key. Same `(seed, key)` always yields the same stream.
    fn stream(&self, key: &str) -> ChaCha8Rng {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(b"/");
        hasher.update(key.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        ChaCha8Rng::from_seed(digest)
    }

    /// Uniform real in `[0, 1)`.
    pub fn uniform(&self, key: &str) -> f64 {
        self.stream(key).gen::<f64>()
    }

    /// Uniform fixed-point value in `[0, SCALE)`.
    pub fn roll(&self, key: &str) -> i64 {
        self.stream(key).gen_range(0..SCALE)
    }

    /// True with probability `p_fp / SCALE`.
    pub fn chance(&self, key: &str, p_fp: i64) -> bool {
        if p_fp <= 0 {
            return false;
        }
        if p_fp >= SCALE {
            return true;
        }
        self.roll(key) < p_fp
    }

    /// Uniform integer in `[low, high]` (inclusive). Returns `low` if the range is empty.
    pub fn integer(&self, low: i64, high: i64, key: &str) -> i64 {
        if high <= low {
            return low;
        }
        self.stream(key).gen_range(low..=high)
    }

    /// Pick one element uniformly. `None` on an empty slice.
    pub fn pick_one<'a, T>(&self, items: &'a [T], key: &str) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.stream(key).gen_range(0..items.len());
        items.get(idx)
    }

    /// Weighted index draw over non-negative integer weights.
    /// `None` if every weight is zero or the slice is empty.
    pub fn weighted_index(&self, weights: &[i64], key: &str) -> Option<usize> {
        let total: i64 = weights.iter().map(|w| (*w).max(0)).sum();
        if total <= 0 {
            return None;
        }
        let mut target = self.stream(key).gen_range(0..total);
        for (i, w) in weights.iter().enumerate() {
            let w = (*w).max(0);
            if target < w {
                return Some(i);
            }
            target -= w;
        }
        None
    }

    /// A key-scoped view for callers that make several related draws.
    pub fn draw(&self, key: impl Into<String>) -> Draw {
        Draw {
            rng: *self,
            key: key.into(),
        }
    }
}

/// Key-scoped view over a `KeyedRng`.
///
/// The base key is used as-is for the primary draw; related draws append
/// a suffix as `<key>_<suffix>`.
#[derive(Debug, Clone)]
pub struct Draw {
    rng: KeyedRng,
    key: String,
}

impl Draw {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn rng(&self) -> &KeyedRng {
        &self.rng
    }

    fn sub_key(&self, suffix: &str) -> String {
        format!("{}_{}", self.key, suffix)
    }

    /// Primary chance draw on the base key.
    pub fn chance(&self, p_fp: i64) -> bool {
        self.rng.chance(&self.key, p_fp)
    }

    pub fn chance_for(&self, suffix: &str, p_fp: i64) -> bool {
        self.rng.chance(&self.sub_key(suffix), p_fp)
    }

    pub fn integer(&self, suffix: &str, low: i64, high: i64) -> i64 {
        self.rng.integer(low, high, &self.sub_key(suffix))
    }

    pub fn pick_one<'a, T>(&self, suffix: &str, items: &'a [T]) -> Option<&'a T> {
        self.rng.pick_one(items, &self.sub_key(suffix))
    }

    pub fn weighted_index(&self, suffix: &str, weights: &[i64]) -> Option<usize> {
        self.rng.weighted_index(weights, &self.sub_key(suffix))
    }

    /// Nested scope: `<key>_<suffix>` becomes the new base key.
    pub fn sub(&self, suffix: &str) -> Draw {
        Draw {
            rng: self.rng,
            key: self.sub_key(suffix),
        }
    }
}
