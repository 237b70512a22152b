//! Runtime-checked wrapper around [`Party`] for callers that drive the
//! protocol from incoming messages rather than straight-line code.
//!
//! Out-of-order calls are rejected with
//! [`KexError::ProtocolOrderViolation`] and leave the session untouched.

use rand_core::{CryptoRng, RngCore};

use crate::error::KexError;
use crate::party::{
    Constructed, Party, PrivateComputed, PublicComputed, PublicValue, Reconciled,
    SignalGenerated, Stage,
};
use crate::reconcile::{KeyStream, validate_signal};
use crate::ring::Polynomial;
use crate::sampler::Sampler;

#[derive(Debug)]
enum SessionState {
    Constructed(Party<Constructed>),
    PublicComputed(Party<PublicComputed>),
    PrivateComputed(Party<PrivateComputed>),
    SignalGenerated(Party<SignalGenerated>),
    Reconciled(Party<Reconciled>),
}

impl SessionState {
    fn stage(&self) -> Stage {
        match self {
            SessionState::Constructed(p) => p.stage(),
            SessionState::PublicComputed(p) => p.stage(),
            SessionState::PrivateComputed(p) => p.stage(),
            SessionState::SignalGenerated(p) => p.stage(),
            SessionState::Reconciled(p) => p.stage(),
        }
    }
}

#[derive(Debug)]
pub struct PartySession {
    state: Option<SessionState>,
}

impl PartySession {
    pub fn new<R: CryptoRng + RngCore>(sampler: &Sampler, rng: &mut R) -> Self {
        Self::from_party(Party::new(sampler, rng))
    }

    pub fn with_structural<R: CryptoRng + RngCore>(
        sampler: &Sampler,
        structural: Polynomial,
        rng: &mut R,
    ) -> Result<Self, KexError> {
        Ok(Self::from_party(Party::with_structural(
            sampler, structural, rng,
        )?))
    }

    pub fn from_party(party: Party<Constructed>) -> Self {
        Self {
            state: Some(SessionState::Constructed(party)),
        }
    }

    /// Current stage, or `None` if an earlier transition failed midway.
    pub fn stage(&self) -> Option<Stage> {
        self.state.as_ref().map(SessionState::stage)
    }

    pub fn calculate_public(&mut self) -> Result<PublicValue, KexError> {
        const OP: &str = "calculate_public";
        match self.take(OP)? {
            SessionState::Constructed(party) => {
                let (next, value) = party.calculate_public();
                self.state = Some(SessionState::PublicComputed(next));
                Ok(value)
            }
            other => Err(self.reject(other, OP)),
        }
    }

    pub fn calculate_private(&mut self, counterpart_public: &Polynomial) -> Result<(), KexError> {
        const OP: &str = "calculate_private";
        match self.take(OP)? {
            SessionState::PublicComputed(party) => {
                if let Err(err) = party
                    .params()
                    .check_degree(counterpart_public, "counterpart public value")
                {
                    self.state = Some(SessionState::PublicComputed(party));
                    return Err(err);
                }
                let next = party.calculate_private(counterpart_public)?;
                self.state = Some(SessionState::PrivateComputed(next));
                Ok(())
            }
            other => Err(self.reject(other, OP)),
        }
    }

    pub fn generate_signal(&mut self) -> Result<Polynomial, KexError> {
        const OP: &str = "generate_signal";
        match self.take(OP)? {
            SessionState::PrivateComputed(party) => {
                let (next, w) = party.generate_signal();
                self.state = Some(SessionState::SignalGenerated(next));
                Ok(w)
            }
            other => Err(self.reject(other, OP)),
        }
    }

    /// With `None`, reconciles with this party's own signal (initiator).
    /// With `Some(w)`, reconciles with the initiator's signal (receiver).
    pub fn reconcile_key(&mut self, signal: Option<&Polynomial>) -> Result<&KeyStream, KexError> {
        const OP: &str = "reconcile_key";
        let next = match (self.take(OP)?, signal) {
            (SessionState::SignalGenerated(party), None) => party.reconcile_key(),
            (SessionState::PrivateComputed(party), Some(w)) => {
                if let Err(err) = validate_signal(&party.params(), w) {
                    self.state = Some(SessionState::PrivateComputed(party));
                    return Err(err);
                }
                party.reconcile_key(w)?
            }
            (other, _) => return Err(self.reject(other, OP)),
        };
        self.state = Some(SessionState::Reconciled(next));
        self.key_stream()
            .ok_or(KexError::SessionPoisoned { operation: OP })
    }

    pub fn public_value(&self) -> Option<&Polynomial> {
        match self.state.as_ref()? {
            SessionState::Constructed(_) => None,
            SessionState::PublicComputed(p) => Some(p.public_value()),
            SessionState::PrivateComputed(p) => Some(p.public_value()),
            SessionState::SignalGenerated(p) => Some(p.public_value()),
            SessionState::Reconciled(p) => Some(p.public_value()),
        }
    }

    pub fn key_stream(&self) -> Option<&KeyStream> {
        match self.state.as_ref()? {
            SessionState::Reconciled(p) => Some(p.key_stream()),
            _ => None,
        }
    }

    fn take(&mut self, operation: &'static str) -> Result<SessionState, KexError> {
        self.state
            .take()
            .ok_or(KexError::SessionPoisoned { operation })
    }

    fn reject(&mut self, state: SessionState, operation: &'static str) -> KexError {
        let stage = state.stage();
        self.state = Some(state);
        KexError::ProtocolOrderViolation { operation, stage }
    }
}
