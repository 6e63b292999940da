//! Zipf-distributed integer sampler over a closed token range.
//!
//! Uses the Gray et al. rejection-free method (as popularised by YCSB):
//! the zeta constants are computed once and every draw costs one uniform
//! sample. Rank 0 (the most popular value) maps to `min`. With `scramble`
//! set, ranks are permuted by an FNV hash so popular values spread across the
//! range instead of clustering at `min`.

use crate::hash::fnv1a_u64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZipfError {
    #[error("min ({min}) must not exceed max ({max})")]
    EmptyRange { min: u32, max: u32 },
    #[error("theta must be in (0, 1), got {0}")]
    InvalidTheta(f64),
}

#[derive(Debug, Clone)]
pub struct ZipfSampler {
    min: u32,
    items: u64,
    theta: f64,
    alpha: f64,
    zeta_n: f64,
    eta: f64,
    /// Threshold for rank 1: `1 + 0.5^theta`.
    half_pow_theta: f64,
    scramble: bool,
    rng: ChaCha8Rng,
}

impl ZipfSampler {
    pub fn new(min: u32, max: u32, theta: f64, scramble: bool, seed: u64) -> Result<Self, ZipfError> {
        if min > max {
            return Err(ZipfError::EmptyRange { min, max });
        }
        if !(theta > 0.0 && theta < 1.0) {
            return Err(ZipfError::InvalidTheta(theta));
        }
        let items = (max - min) as u64 + 1;
        let zeta_2 = zeta(2, theta);
        let zeta_n = zeta(items, theta);
        let eta = if items > 1 {
            (1.0 - (2.0 / items as f64).powf(1.0 - theta)) / (1.0 - zeta_2 / zeta_n)
        } else {
            0.0
        };
        Ok(Self {
            min,
            items,
            theta,
            alpha: 1.0 / (1.0 - theta),
            zeta_n,
            eta,
            half_pow_theta: 1.0 + 0.5f64.powf(theta),
            scramble,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Draw the next value in `[min, max]`.
    pub fn sample(&mut self) -> u32 {
        let mut rank = self.next_rank();
        if self.scramble {
            rank = fnv1a_u64(rank) % self.items;
        }
        self.min + rank as u32
    }

    fn next_rank(&mut self) -> u64 {
        if self.items == 1 {
            return 0;
        }
        let u: f64 = self.rng.gen();
        let uz = u * self.zeta_n;
        if uz < 1.0 {
            return 0;
        }
        if uz < self.half_pow_theta {
            return 1;
        }
        let rank = (self.items as f64 * (self.eta * u - self.eta + 1.0).powf(self.alpha)) as u64;
        rank.min(self.items - 1)
    }
}

/// Generalised harmonic number: sum of `1 / i^theta` for `i` in `1..=n`.
fn zeta(n: u64, theta: f64) -> f64 {
    (1..=n).map(|i| 1.0 / (i as f64).powf(theta)).sum()
}
