//! Arithmetic in the quotient ring used by the key exchange.
//!
//! Degree reduction folds every term of degree `i >= n` *additively* into
//! index `i mod n`. This is not the negacyclic `x^n = -1` convention of
//! textbook RLWE, and peers running the additive variant depend on it.

use serde::{Deserialize, Serialize};

use crate::error::KexError;

/// Largest accepted modulus.
pub const MAX_MODULUS: i64 = 1 << 24;
/// Largest accepted ring degree.
pub const MAX_DEGREE: usize = 1 << 16;
/// Default small-coefficient bound.
pub const DEFAULT_BOUND: i64 = 5;

/// Parameters `(q, n, b)` shared read-only by both parties of an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingParams {
    pub modulus: i64,
    pub degree: usize,
    pub bound: i64,
}

impl RingParams {
    pub fn new(modulus: i64, degree: usize, bound: i64) -> Result<Self, KexError> {
        if modulus < 2 || modulus % 2 == 0 || modulus > MAX_MODULUS {
            return Err(KexError::InvalidModulus { modulus });
        }
        if degree == 0 || degree > MAX_DEGREE {
            return Err(KexError::InvalidDimension { degree });
        }
        if bound < 0 || bound >= modulus {
            return Err(KexError::InvalidBound { bound });
        }
        Ok(Self {
            modulus,
            degree,
            bound,
        })
    }

    pub fn check_degree(&self, poly: &Polynomial, context: &'static str) -> Result<(), KexError> {
        if poly.len() != self.degree {
            return Err(KexError::DimensionMismatch {
                context,
                expected: self.degree,
                found: poly.len(),
            });
        }
        Ok(())
    }

    /// `(q-1)/2`, the largest centered coefficient.
    pub fn half_modulus(&self) -> i64 {
        (self.modulus - 1) / 2
    }

    pub fn reduce(&self, value: i64, modulus: i64) -> i64 {
        value.rem_euclid(modulus)
    }

    pub fn center(&self, value: i64) -> i64 {
        if value > self.half_modulus() {
            value - self.modulus
        } else {
            value
        }
    }

    /// Coefficient-wise sum followed by coefficient reduction mod `q`.
    pub fn add(&self, lhs: &Polynomial, rhs: &Polynomial) -> Polynomial {
        let len = lhs.len().max(rhs.len());
        let coeffs = (0..len)
            .map(|i| self.reduce_wide(i128::from(lhs.coeff(i)) + i128::from(rhs.coeff(i))))
            .collect::<Vec<_>>();
        self.reduce_coefficients(&Polynomial::from_coeffs(coeffs), self.modulus)
    }

    /// Full product, then degree reduction, then coefficient reduction mod `q`.
    pub fn multiply(&self, lhs: &Polynomial, rhs: &Polynomial) -> Polynomial {
        if lhs.is_empty() || rhs.is_empty() {
            return Polynomial::zero(self.degree);
        }
        // Terms are reduced mod q as they accumulate; the fold below is
        // still congruent and every partial sum stays far inside i64.
        let mut product = vec![0i64; lhs.len() + rhs.len() - 1];
        for (i, &a) in lhs.coeffs().iter().enumerate() {
            if a == 0 {
                continue;
            }
            for (j, &b) in rhs.coeffs().iter().enumerate() {
                product[i + j] += self.reduce_wide(i128::from(a) * i128::from(b));
            }
        }
        let folded = self.reduce_degree(&Polynomial::from_coeffs(product));
        self.reduce_coefficients(&folded, self.modulus)
    }

    /// Folds terms of degree `>= n` back into `[0, n)` by additive wraparound.
    pub fn reduce_degree(&self, poly: &Polynomial) -> Polynomial {
        let n = self.degree;
        let mut folded = vec![0i64; n];
        for (i, &c) in poly.coeffs().iter().enumerate() {
            folded[i % n] += c;
        }
        Polynomial::from_coeffs(folded)
    }

    /// Reduces each coefficient into `[0, modulus)` and then centers it
    /// against `q`, so the result lies in `[-(q-1)/2, (q-1)/2]`.
    pub fn reduce_coefficients(&self, poly: &Polynomial, modulus: i64) -> Polynomial {
        let coeffs = poly
            .coeffs()
            .iter()
            .map(|&c| self.center(self.reduce(c, modulus)))
            .collect();
        Polynomial::from_coeffs(coeffs)
    }

    /// Multiplies every coefficient by `factor` and reduces mod `q`.
    pub fn scale(&self, poly: &Polynomial, factor: i64) -> Polynomial {
        let coeffs = poly
            .coeffs()
            .iter()
            .map(|&c| self.reduce_wide(i128::from(c) * i128::from(factor)))
            .collect::<Vec<_>>();
        self.reduce_coefficients(&Polynomial::from_coeffs(coeffs), self.modulus)
    }

    /// `value mod q` in `[0, q)`, for sums and products that may exceed `i64`.
    fn reduce_wide(&self, value: i128) -> i64 {
        // q <= MAX_MODULUS, so the residue always fits.
        value.rem_euclid(i128::from(self.modulus)) as i64
    }
}

/// Dense coefficient vector, index = exponent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polynomial {
    coeffs: Vec<i64>,
}

impl Polynomial {
    pub fn zero(len: usize) -> Self {
        Self {
            coeffs: vec![0; len],
        }
    }

    pub fn from_coeffs(coeffs: Vec<i64>) -> Self {
        Self { coeffs }
    }

    pub fn coeffs(&self) -> &[i64] {
        &self.coeffs
    }

    /// Coefficient at `index`, zero past the end.
    pub fn coeff(&self, index: usize) -> i64 {
        self.coeffs.get(index).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub(crate) fn coeffs_mut(&mut self) -> &mut Vec<i64> {
        &mut self.coeffs
    }
}

impl From<Vec<i64>> for Polynomial {
    fn from(coeffs: Vec<i64>) -> Self {
        Self::from_coeffs(coeffs)
    }
}
