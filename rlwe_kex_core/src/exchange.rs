//! In-process orchestration of both parties.
//!
//! Call order is fixed: construct Alice, construct Bob on Alice's `a`, both
//! publish, each computes its private value from the other's public value,
//! Alice signals, both reconcile.

use log::{debug, info};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::KexError;
use crate::party::{Party, Reconciled};
use crate::reconcile::KeyStream;
use crate::ring::{Polynomial, RingParams};
use crate::sampler::Sampler;
use crate::versioning::{TRANSCRIPT_VERSION, expect_version};

#[derive(Debug)]
pub struct ExchangeOutcome {
    pub alice: Party<Reconciled>,
    pub bob: Party<Reconciled>,
}

impl ExchangeOutcome {
    pub fn agreed(&self) -> bool {
        self.alice.key_stream() == self.bob.key_stream()
    }

    pub fn mismatched_bits(&self) -> usize {
        self.alice
            .key_stream()
            .hamming_distance(self.bob.key_stream())
    }

    /// Everything that crossed the wire plus both resulting key streams.
    pub fn transcript(&self) -> ExchangeTranscript {
        ExchangeTranscript {
            version: TRANSCRIPT_VERSION,
            params: self.alice.params(),
            structural: self.alice.structural().clone(),
            alice_public: self.alice.public_value().clone(),
            bob_public: self.bob.public_value().clone(),
            signal: self.alice.signal().cloned().unwrap_or_default(),
            alice_key: self.alice.key_stream().clone(),
            bob_key: self.bob.key_stream().clone(),
            agreed: self.agreed(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExchangeTranscript {
    pub version: u16,
    pub params: RingParams,
    pub structural: Polynomial,
    pub alice_public: Polynomial,
    pub bob_public: Polynomial,
    pub signal: Polynomial,
    pub alice_key: KeyStream,
    pub bob_key: KeyStream,
    pub agreed: bool,
}

impl<'de> Deserialize<'de> for ExchangeTranscript {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            version: u16,
            params: RingParams,
            structural: Polynomial,
            alice_public: Polynomial,
            bob_public: Polynomial,
            signal: Polynomial,
            alice_key: KeyStream,
            bob_key: KeyStream,
            agreed: bool,
        }
        let helper = Helper::deserialize(deserializer)?;
        expect_version::<D::Error>(helper.version, TRANSCRIPT_VERSION, "ExchangeTranscript")?;
        Ok(Self {
            version: helper.version,
            params: helper.params,
            structural: helper.structural,
            alice_public: helper.alice_public,
            bob_public: helper.bob_public,
            signal: helper.signal,
            alice_key: helper.alice_key,
            bob_key: helper.bob_key,
            agreed: helper.agreed,
        })
    }
}

/// Runs one full exchange, Alice acting as signal initiator.
pub fn run_exchange<R: CryptoRng + RngCore>(
    sampler: &Sampler,
    rng: &mut R,
) -> Result<ExchangeOutcome, KexError> {
    let alice = Party::new(sampler, rng);
    let bob = Party::with_structural(sampler, alice.structural().clone(), rng)?;

    let (alice, alice_value) = alice.calculate_public();
    let (bob, bob_value) = bob.calculate_public();

    let alice = alice.calculate_private(&bob_value.public)?;
    let bob = bob.calculate_private(&alice_value.public)?;

    let (alice, signal) = alice.generate_signal();
    let alice = alice.reconcile_key();
    let bob = bob.reconcile_key(&signal)?;

    let outcome = ExchangeOutcome { alice, bob };
    debug!(
        "exchange q={} n={} agreed={} mismatched_bits={}",
        sampler.params().modulus,
        sampler.params().degree,
        outcome.agreed(),
        outcome.mismatched_bits()
    );
    Ok(outcome)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementReport {
    pub trials: u64,
    pub agreements: u64,
    /// Total disagreeing key bits over all failed trials.
    pub mismatched_bits: u64,
}

impl AgreementReport {
    pub fn failures(&self) -> u64 {
        self.trials - self.agreements
    }

    pub fn agreement_rate(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        self.agreements as f64 / self.trials as f64
    }
}

/// Repeats independent exchanges and counts how often the key streams match.
pub fn agreement_trials<R: CryptoRng + RngCore>(
    sampler: &Sampler,
    trials: u64,
    rng: &mut R,
) -> Result<AgreementReport, KexError> {
    let mut report = AgreementReport::default();
    for _ in 0..trials {
        let outcome = run_exchange(sampler, rng)?;
        report.trials += 1;
        if outcome.agreed() {
            report.agreements += 1;
        } else {
            report.mismatched_bits += outcome.mismatched_bits() as u64;
        }
    }
    info!(
        "agreement trials={} agreements={} rate={:.4}",
        report.trials,
        report.agreements,
        report.agreement_rate()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::derive_rng;

    fn reference() -> Sampler {
        Sampler::new(RingParams::new(3079, 32, 5).unwrap())
    }

    #[test]
    fn transcript_reflects_exchange() {
        let mut rng = derive_rng(b"exchange-transcript");
        let outcome = run_exchange(&reference(), &mut rng).unwrap();
        let transcript = outcome.transcript();
        assert_eq!(transcript.params, reference().params());
        assert_eq!(&transcript.alice_key, outcome.alice.key_stream());
        assert_eq!(Some(&transcript.signal), outcome.alice.signal());
        assert_eq!(transcript.agreed, outcome.agreed());
        assert!(transcript.signal.coeffs().iter().all(|&b| b == 0 || b == 1));
    }

    #[test]
    fn transcript_json_checks_version() {
        let mut rng = derive_rng(b"exchange-json");
        let transcript = run_exchange(&reference(), &mut rng).unwrap().transcript();
        let mut value = serde_json::to_value(&transcript).unwrap();
        let parsed: ExchangeTranscript = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(parsed, transcript);
        value["version"] = serde_json::json!(7);
        assert!(serde_json::from_value::<ExchangeTranscript>(value).is_err());
    }

    #[test]
    fn report_rates() {
        let report = AgreementReport {
            trials: 10,
            agreements: 9,
            mismatched_bits: 2,
        };
        assert_eq!(report.failures(), 1);
        assert!((report.agreement_rate() - 0.9).abs() < 1e-12);
        assert_eq!(AgreementReport::default().agreement_rate(), 0.0);
    }
}
