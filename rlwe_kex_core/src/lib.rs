//! Two-party Ring-LWE key exchange with mod-2 reconciliation.
//!
//! Sampling is plain uniform sampling and the ring uses additive
//! wraparound; the implementation favors clarity and should **not** be
//! used for production security.

pub mod aead;
pub mod error;
pub mod exchange;
pub mod party;
pub mod preset;
pub mod protocol;
pub mod reconcile;
pub mod ring;
pub mod rng;
pub mod sampler;
pub mod session;
pub mod versioning;

pub use crate::aead::{SealedMessage, open, seal};
pub use crate::error::KexError;
pub use crate::exchange::{
    AgreementReport, ExchangeOutcome, ExchangeTranscript, agreement_trials, run_exchange,
};
pub use crate::party::{
    Constructed, Party, PrivateComputed, PublicComputed, PublicValue, Reconciled,
    SignalGenerated, Stage,
};
pub use crate::preset::{KexPreset, ParameterSet, all_presets, kex_preset};
pub use crate::protocol::{
    ChannelTransport, KexMessage, PartyOutcome, Role, Transport, channel_pair, run_initiator,
    run_responder,
};
pub use crate::reconcile::{KeyStream, mod2_reconcile, signal};
pub use crate::ring::{Polynomial, RingParams};
pub use crate::rng::{SecureRng, derive_rng, derive_trial_rng, secure_rng};
pub use crate::sampler::{Sampler, StructuralRange};
pub use crate::session::PartySession;
pub use crate::versioning::*;
