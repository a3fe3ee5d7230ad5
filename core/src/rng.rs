//! Deterministic random number generation for synthetic datasets.
//!
//! RULE: synthetic data never touches a platform RNG. Every draw comes from
//! a `DatasetRng` derived from the user's seed, so the same seed always
//! produces the same households.
//!
//! Each stream is seeded from (seed XOR stream_index * golden ratio). Adding
//! a stream never changes the draws of existing ones.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

pub struct DatasetRng {
    inner: Pcg64Mcg,
}

impl DatasetRng {
    pub fn new(seed: u64, stream: RngStream) -> Self {
        let derived_seed = seed ^ ((stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self { inner: Pcg64Mcg::seed_from_u64(derived_seed) }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform float in [lo, hi).
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Log-normal draw with the given median and log-space spread.
    /// Box-Muller on two uniforms.
    pub fn log_normal(&mut self, median: f64, sigma: f64) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        median * (sigma * z).exp()
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries. Only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngStream {
    Households   = 0,
    Earnings     = 1,
    Pensions     = 2,
    OtherIncome  = 3,
}
