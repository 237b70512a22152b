//! One participant of the exchange, as a typestate machine.
//!
//! Every protocol step consumes the party and returns it in the next
//! state, so calling steps out of order does not compile:
//!
//! ```text
//! Constructed -> PublicComputed -> PrivateComputed -> [SignalGenerated] -> Reconciled
//! ```

use std::fmt;

use log::debug;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::KexError;
use crate::reconcile::{KeyStream, mod2_reconcile, signal, validate_signal};
use crate::ring::{Polynomial, RingParams};
use crate::sampler::Sampler;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Constructed,
    PublicComputed,
    PrivateComputed,
    SignalGenerated,
    Reconciled,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Constructed => "constructed",
            Stage::PublicComputed => "public-computed",
            Stage::PrivateComputed => "private-computed",
            Stage::SignalGenerated => "signal-generated",
            Stage::Reconciled => "reconciled",
        };
        f.write_str(name)
    }
}

pub trait PartyState {
    const STAGE: Stage;
}

#[derive(Debug)]
pub struct Constructed;

#[derive(Debug)]
pub struct PublicComputed {
    p: Polynomial,
}

#[derive(Debug)]
pub struct PrivateComputed {
    p: Polynomial,
    k: Polynomial,
}

#[derive(Debug)]
pub struct SignalGenerated {
    p: Polynomial,
    k: Polynomial,
    w: Polynomial,
}

#[derive(Debug)]
pub struct Reconciled {
    p: Polynomial,
    k: Polynomial,
    w: Option<Polynomial>,
    key_stream: KeyStream,
}

impl PartyState for Constructed {
    const STAGE: Stage = Stage::Constructed;
}
impl PartyState for PublicComputed {
    const STAGE: Stage = Stage::PublicComputed;
}
impl PartyState for PrivateComputed {
    const STAGE: Stage = Stage::PrivateComputed;
}
impl PartyState for SignalGenerated {
    const STAGE: Stage = Stage::SignalGenerated;
}
impl PartyState for Reconciled {
    const STAGE: Stage = Stage::Reconciled;
}

/// States that already hold the public value `p`.
pub trait HasPublic: PartyState {
    fn public(&self) -> &Polynomial;
}

/// States that already hold the private value `k`.
pub trait HasPrivate: HasPublic {
    fn private(&self) -> &Polynomial;
}

impl HasPublic for PublicComputed {
    fn public(&self) -> &Polynomial {
        &self.p
    }
}
impl HasPublic for PrivateComputed {
    fn public(&self) -> &Polynomial {
        &self.p
    }
}
impl HasPublic for SignalGenerated {
    fn public(&self) -> &Polynomial {
        &self.p
    }
}
impl HasPublic for Reconciled {
    fn public(&self) -> &Polynomial {
        &self.p
    }
}
impl HasPrivate for PrivateComputed {
    fn private(&self) -> &Polynomial {
        &self.k
    }
}
impl HasPrivate for SignalGenerated {
    fn private(&self) -> &Polynomial {
        &self.k
    }
}
impl HasPrivate for Reconciled {
    fn private(&self) -> &Polynomial {
        &self.k
    }
}

/// Private small polynomials, wiped on drop.
struct Secrets {
    e: Polynomial,
    e1: Polynomial,
    s: Polynomial,
}

impl Drop for Secrets {
    fn drop(&mut self) {
        self.e.coeffs_mut().zeroize();
        self.e1.coeffs_mut().zeroize();
        self.s.coeffs_mut().zeroize();
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secrets(..)")
    }
}

/// What `calculate_public` hands to the counterpart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicValue {
    pub public: Polynomial,
    pub structural: Polynomial,
}

#[derive(Debug)]
pub struct Party<S> {
    params: RingParams,
    a: Polynomial,
    secrets: Secrets,
    state: S,
}

impl<S: PartyState> Party<S> {
    pub fn params(&self) -> RingParams {
        self.params
    }

    pub fn structural(&self) -> &Polynomial {
        &self.a
    }

    pub fn stage(&self) -> Stage {
        S::STAGE
    }

    fn advance<T: PartyState>(self, step: impl FnOnce(S) -> T) -> Party<T> {
        debug!(
            "party {} -> {} (q={}, n={})",
            S::STAGE,
            T::STAGE,
            self.params.modulus,
            self.params.degree
        );
        Party {
            params: self.params,
            a: self.a,
            secrets: self.secrets,
            state: step(self.state),
        }
    }
}

impl<S: HasPublic> Party<S> {
    pub fn public_value(&self) -> &Polynomial {
        self.state.public()
    }
}

impl<S: HasPrivate> Party<S> {
    /// The approximately shared value `k`. Never sent over the wire.
    pub fn private_value(&self) -> &Polynomial {
        self.state.private()
    }
}

impl Party<Constructed> {
    /// Starts a party with a freshly sampled structural polynomial.
    pub fn new<R: CryptoRng + RngCore>(sampler: &Sampler, rng: &mut R) -> Self {
        let a = sampler.uniform_structural(rng);
        Self::sample_secrets(sampler, a, rng)
    }

    /// Starts a party that adopts the counterpart's structural polynomial.
    pub fn with_structural<R: CryptoRng + RngCore>(
        sampler: &Sampler,
        structural: Polynomial,
        rng: &mut R,
    ) -> Result<Self, KexError> {
        let expected = sampler.params().degree;
        if structural.len() != expected {
            return Err(KexError::StructuralMismatch {
                expected,
                found: structural.len(),
            });
        }
        Ok(Self::sample_secrets(sampler, structural, rng))
    }

    /// Builds a party from explicit polynomials, e.g. for fixed test vectors.
    pub fn from_parts(
        params: RingParams,
        structural: Polynomial,
        e: Polynomial,
        e1: Polynomial,
        s: Polynomial,
    ) -> Result<Self, KexError> {
        let expected = params.degree;
        if structural.len() != expected {
            return Err(KexError::StructuralMismatch {
                expected,
                found: structural.len(),
            });
        }
        params.check_degree(&e, "e")?;
        params.check_degree(&e1, "e1")?;
        params.check_degree(&s, "s")?;
        Ok(Self {
            params,
            a: structural,
            secrets: Secrets { e, e1, s },
            state: Constructed,
        })
    }

    fn sample_secrets<R: CryptoRng + RngCore>(
        sampler: &Sampler,
        a: Polynomial,
        rng: &mut R,
    ) -> Self {
        let e = sampler.uniform_small(rng);
        let e1 = sampler.uniform_small(rng);
        let s = sampler.uniform_small(rng);
        Self {
            params: sampler.params(),
            a,
            secrets: Secrets { e, e1, s },
            state: Constructed,
        }
    }

    /// `p = (a * s mod q) + 2e`. Returns `p` together with `a` for forwarding.
    pub fn calculate_public(self) -> (Party<PublicComputed>, PublicValue) {
        let ring = self.params;
        let p = ring.add(
            &ring.multiply(&self.a, &self.secrets.s),
            &ring.scale(&self.secrets.e, 2),
        );
        let value = PublicValue {
            public: p.clone(),
            structural: self.a.clone(),
        };
        (self.advance(|_| PublicComputed { p }), value)
    }
}

impl Party<PublicComputed> {
    /// `k = (p' * s mod q) + 2e1` where `p'` is the counterpart's public value.
    pub fn calculate_private(
        self,
        counterpart_public: &Polynomial,
    ) -> Result<Party<PrivateComputed>, KexError> {
        let ring = self.params;
        ring.check_degree(counterpart_public, "counterpart public value")?;
        let k = ring.add(
            &ring.multiply(counterpart_public, &self.secrets.s),
            &ring.scale(&self.secrets.e1, 2),
        );
        Ok(self.advance(|PublicComputed { p }| PrivateComputed { p, k }))
    }
}

impl Party<PrivateComputed> {
    /// Makes this party the signal initiator.
    pub fn generate_signal(self) -> (Party<SignalGenerated>, Polynomial) {
        let w = signal(&self.params, &self.state.k);
        let out = w.clone();
        (
            self.advance(|PrivateComputed { p, k }| SignalGenerated { p, k, w }),
            out,
        )
    }

    /// Reconciles using the signal received from the initiator.
    pub fn reconcile_key(self, signal: &Polynomial) -> Result<Party<Reconciled>, KexError> {
        validate_signal(&self.params, signal)?;
        let key_stream = mod2_reconcile(&self.params, &self.state.k, signal);
        Ok(self.advance(|PrivateComputed { p, k }| Reconciled {
            p,
            k,
            w: None,
            key_stream,
        }))
    }
}

impl Party<SignalGenerated> {
    pub fn signal(&self) -> &Polynomial {
        &self.state.w
    }

    /// Reconciles using this party's own signal.
    pub fn reconcile_key(self) -> Party<Reconciled> {
        let key_stream = mod2_reconcile(&self.params, &self.state.k, &self.state.w);
        self.advance(|SignalGenerated { p, k, w }| Reconciled {
            p,
            k,
            w: Some(w),
            key_stream,
        })
    }
}

impl Party<Reconciled> {
    pub fn key_stream(&self) -> &KeyStream {
        &self.state.key_stream
    }

    /// The signal, if this party generated it.
    pub fn signal(&self) -> Option<&Polynomial> {
        self.state.w.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::derive_rng;

    fn reference_sampler() -> Sampler {
        Sampler::new(RingParams::new(3079, 32, 5).unwrap())
    }

    #[test]
    fn second_party_adopts_structural() {
        let sampler = reference_sampler();
        let mut rng = derive_rng(b"party-structural");
        let alice = Party::new(&sampler, &mut rng);
        let bob = Party::with_structural(&sampler, alice.structural().clone(), &mut rng).unwrap();
        assert_eq!(alice.structural(), bob.structural());
        assert_eq!(bob.stage(), Stage::Constructed);
    }

    #[test]
    fn structural_length_is_checked() {
        let sampler = reference_sampler();
        let mut rng = derive_rng(b"party-mismatch");
        let err = Party::with_structural(&sampler, Polynomial::zero(31), &mut rng).unwrap_err();
        assert!(matches!(
            err,
            KexError::StructuralMismatch {
                expected: 32,
                found: 31
            }
        ));
    }

    #[test]
    fn public_value_is_centered() {
        let sampler = reference_sampler();
        let mut rng = derive_rng(b"party-public");
        let (alice, value) = Party::new(&sampler, &mut rng).calculate_public();
        assert_eq!(alice.stage(), Stage::PublicComputed);
        assert_eq!(alice.public_value(), &value.public);
        assert_eq!(alice.structural(), &value.structural);
        assert!(value.public.coeffs().iter().all(|c| c.abs() <= 1539));
    }

    #[test]
    fn counterpart_public_length_is_checked() {
        let sampler = reference_sampler();
        let mut rng = derive_rng(b"party-private");
        let (alice, _) = Party::new(&sampler, &mut rng).calculate_public();
        let err = alice.calculate_private(&Polynomial::zero(8)).unwrap_err();
        assert!(matches!(err, KexError::DimensionMismatch { found: 8, .. }));
    }

    #[test]
    fn both_parties_reconcile_to_same_stream() {
        let sampler = reference_sampler();
        let mut rng = derive_rng(b"party-agree");
        let alice = Party::new(&sampler, &mut rng);
        let bob = Party::with_structural(&sampler, alice.structural().clone(), &mut rng).unwrap();
        let (alice, alice_pub) = alice.calculate_public();
        let (bob, bob_pub) = bob.calculate_public();
        let alice = alice.calculate_private(&bob_pub.public).unwrap();
        let bob = bob.calculate_private(&alice_pub.public).unwrap();
        let (alice, w) = alice.generate_signal();
        assert_eq!(alice.signal(), &w);
        let alice = alice.reconcile_key();
        let bob = bob.reconcile_key(&w).unwrap();
        assert_eq!(alice.key_stream(), bob.key_stream());
        assert_eq!(alice.key_stream().len(), 32);
        assert_eq!(alice.signal(), Some(&w));
        assert_eq!(bob.signal(), None);
        assert_eq!(bob.stage(), Stage::Reconciled);
    }
}
