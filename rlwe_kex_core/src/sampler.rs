//! Polynomial sampling over an injected random source.
//!
//! Coefficients are drawn uniformly. This stands in for a seeded/Gaussian
//! sampler and is not suitable for real key material.

use rand::Rng;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::ring::{Polynomial, RingParams};

/// Coefficient range for the structural polynomial `a`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralRange {
    /// `[0, q]`, including `q` itself. Matches existing peers.
    #[default]
    Inclusive,
    /// `[0, q)`.
    HalfOpen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sampler {
    params: RingParams,
    range: StructuralRange,
}

impl Sampler {
    pub fn new(params: RingParams) -> Self {
        Self {
            params,
            range: StructuralRange::default(),
        }
    }

    pub fn with_range(mut self, range: StructuralRange) -> Self {
        self.range = range;
        self
    }

    pub fn params(&self) -> RingParams {
        self.params
    }

    pub fn range(&self) -> StructuralRange {
        self.range
    }

    /// Samples the public structural polynomial `a`.
    pub fn uniform_structural<R: Rng + ?Sized>(&self, rng: &mut R) -> Polynomial {
        let q = self.params.modulus;
        let dist = match self.range {
            StructuralRange::Inclusive => Uniform::new_inclusive(0, q),
            StructuralRange::HalfOpen => Uniform::new(0, q),
        };
        self.sample_with(&dist, rng)
    }

    /// Samples a small polynomial with coefficients in `{-b, ..., b}`.
    pub fn uniform_small<R: Rng + ?Sized>(&self, rng: &mut R) -> Polynomial {
        let b = self.params.bound;
        let dist = Uniform::new_inclusive(-b, b);
        self.sample_with(&dist, rng)
    }

    fn sample_with<R: Rng + ?Sized>(&self, dist: &Uniform<i64>, rng: &mut R) -> Polynomial {
        let coeffs = (0..self.params.degree)
            .map(|_| dist.sample(rng))
            .collect::<Vec<_>>();
        Polynomial::from_coeffs(coeffs)
    }
}
