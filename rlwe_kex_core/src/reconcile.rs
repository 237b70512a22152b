//! Signal generation and mod-2 reconciliation.

use blake3::Hasher;
use serde::{Deserialize, Deserializer, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::KexError;
use crate::ring::{Polynomial, RingParams};

pub const DERIVED_KEY_BYTES: usize = 32;
pub const CONFIRMATION_TAG_BYTES: usize = 32;

const KEY_LABEL: &[u8] = b"rlwe-kex::key";
const CONFIRM_LABEL: &[u8] = b"rlwe-kex::confirm";

/// Signal bit per coefficient: `0` when `-(q-1)/4 <= k_i <= (q-1)/4`, `1` otherwise.
///
/// The bound is compared as `4|k_i| <= q-1` so it stays exact when
/// `(q-1)/4` is not an integer.
pub fn signal(params: &RingParams, k: &Polynomial) -> Polynomial {
    let limit = (params.modulus - 1) as u128;
    let bits = k
        .coeffs()
        .iter()
        .map(|&c| {
            if 4 * u128::from(c.unsigned_abs()) <= limit {
                0
            } else {
                1
            }
        })
        .collect();
    Polynomial::from_coeffs(bits)
}

/// Checks that `w` is a 0/1 polynomial of the ring degree.
pub fn validate_signal(params: &RingParams, w: &Polynomial) -> Result<(), KexError> {
    params.check_degree(w, "signal")?;
    if let Some((index, &value)) = w
        .coeffs()
        .iter()
        .enumerate()
        .find(|&(_, &v)| v != 0 && v != 1)
    {
        return Err(KexError::InvalidSignal { index, value });
    }
    Ok(())
}

/// `key_i = center((k_i + w_i * (q-1)/2) mod q) mod 2`, taken non-negative.
pub fn mod2_reconcile(params: &RingParams, k: &Polynomial, w: &Polynomial) -> KeyStream {
    let shifted = params.add(k, &params.scale(w, params.half_modulus()));
    let bits = shifted
        .coeffs()
        .iter()
        .map(|&c| c.rem_euclid(2) as u8)
        .collect();
    KeyStream { bits }
}

/// Reconciled key material, one bit per ring coefficient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyStream {
    bits: Vec<u8>,
}

impl<'de> Deserialize<'de> for KeyStream {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            bits: Vec<u8>,
        }
        let helper = Helper::deserialize(deserializer)?;
        KeyStream::from_bits(helper.bits).map_err(serde::de::Error::custom)
    }
}

impl KeyStream {
    /// Rejects any entry other than 0 or 1.
    pub fn from_bits(bits: Vec<u8>) -> Result<Self, KexError> {
        if let Some((index, &value)) = bits.iter().enumerate().find(|&(_, &b)| b > 1) {
            return Err(KexError::InvalidKeyBit { index, value });
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of positions where the two streams disagree.
    pub fn hamming_distance(&self, other: &KeyStream) -> usize {
        let differing = self
            .bits
            .iter()
            .zip(other.bits.iter())
            .filter(|(a, b)| a != b)
            .count();
        differing + self.bits.len().abs_diff(other.bits.len())
    }

    /// Packs bits LSB-first into bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.bits.len().div_ceil(8)];
        for (i, &bit) in self.bits.iter().enumerate() {
            out[i / 8] |= (bit & 1) << (i % 8);
        }
        out
    }

    /// Symmetric key bound to `context`.
    pub fn derive_key(&self, context: &[u8]) -> Zeroizing<[u8; DERIVED_KEY_BYTES]> {
        let packed = Zeroizing::new(self.to_bytes());
        let mut hasher = Hasher::new();
        hasher.update(KEY_LABEL);
        hasher.update(&(context.len() as u64).to_le_bytes());
        hasher.update(context);
        hasher.update(&(self.bits.len() as u64).to_le_bytes());
        hasher.update(&packed);
        let digest = hasher.finalize();
        let mut key = Zeroizing::new([0u8; DERIVED_KEY_BYTES]);
        key.copy_from_slice(&digest.as_bytes()[..DERIVED_KEY_BYTES]);
        key
    }

    /// Tag a peer can compare against its own to confirm agreement.
    pub fn confirmation_tag(&self, context: &[u8]) -> [u8; CONFIRMATION_TAG_BYTES] {
        let key = self.derive_key(context);
        let mut hasher = Hasher::new_keyed(&key);
        hasher.update(CONFIRM_LABEL);
        hasher.update(context);
        *hasher.finalize().as_bytes()
    }
}

impl Drop for KeyStream {
    fn drop(&mut self) {
        self.bits.zeroize();
    }
}
