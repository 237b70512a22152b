//! Message-driven exchange between two parties over an ordered transport.
//!
//! The initiator samples `a`, publishes first and generates the signal.
//! Both sides finish with a key-confirmation tag so each learns whether
//! reconciliation agreed.

use std::sync::mpsc::{Receiver, Sender, channel};

use log::{debug, info, warn};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::KexError;
use crate::party::Party;
use crate::reconcile::{CONFIRMATION_TAG_BYTES, KeyStream};
use crate::ring::Polynomial;
use crate::sampler::Sampler;
use crate::versioning::{KEX_MESSAGE_VERSION, expect_version};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KexMessage {
    /// A public value; the initiator also forwards the structural polynomial.
    Public {
        version: u16,
        public: Polynomial,
        structural: Option<Polynomial>,
    },
    Signal {
        version: u16,
        signal: Polynomial,
    },
    Confirm {
        version: u16,
        tag: [u8; CONFIRMATION_TAG_BYTES],
    },
}

impl<'de> Deserialize<'de> for KexMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(tag = "type", rename_all = "snake_case")]
        enum Helper {
            Public {
                version: u16,
                public: Polynomial,
                structural: Option<Polynomial>,
            },
            Signal {
                version: u16,
                signal: Polynomial,
            },
            Confirm {
                version: u16,
                tag: [u8; CONFIRMATION_TAG_BYTES],
            },
        }
        let message = match Helper::deserialize(deserializer)? {
            Helper::Public {
                version,
                public,
                structural,
            } => KexMessage::Public {
                version,
                public,
                structural,
            },
            Helper::Signal { version, signal } => KexMessage::Signal { version, signal },
            Helper::Confirm { version, tag } => KexMessage::Confirm { version, tag },
        };
        expect_version::<D::Error>(message.version(), KEX_MESSAGE_VERSION, message.kind())?;
        Ok(message)
    }
}

impl KexMessage {
    pub fn public(public: Polynomial, structural: Option<Polynomial>) -> Self {
        KexMessage::Public {
            version: KEX_MESSAGE_VERSION,
            public,
            structural,
        }
    }

    pub fn signal(signal: Polynomial) -> Self {
        KexMessage::Signal {
            version: KEX_MESSAGE_VERSION,
            signal,
        }
    }

    pub fn confirm(tag: [u8; CONFIRMATION_TAG_BYTES]) -> Self {
        KexMessage::Confirm {
            version: KEX_MESSAGE_VERSION,
            tag,
        }
    }

    pub fn version(&self) -> u16 {
        match self {
            KexMessage::Public { version, .. }
            | KexMessage::Signal { version, .. }
            | KexMessage::Confirm { version, .. } => *version,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            KexMessage::Public { .. } => "public",
            KexMessage::Signal { .. } => "signal",
            KexMessage::Confirm { .. } => "confirm",
        }
    }
}

/// Ordered, reliable delivery of protocol messages.
pub trait Transport {
    fn send(&mut self, message: KexMessage) -> Result<(), KexError>;
    /// Blocks until the next message arrives.
    fn recv(&mut self) -> Result<KexMessage, KexError>;
}

/// In-memory transport that moves JSON-encoded messages over std channels.
#[derive(Debug)]
pub struct ChannelTransport {
    outgoing: Sender<Vec<u8>>,
    incoming: Receiver<Vec<u8>>,
}

/// Two connected endpoints.
pub fn channel_pair() -> (ChannelTransport, ChannelTransport) {
    let (a_tx, b_rx) = channel();
    let (b_tx, a_rx) = channel();
    (
        ChannelTransport {
            outgoing: a_tx,
            incoming: a_rx,
        },
        ChannelTransport {
            outgoing: b_tx,
            incoming: b_rx,
        },
    )
}

impl Transport for ChannelTransport {
    fn send(&mut self, message: KexMessage) -> Result<(), KexError> {
        let bytes = serde_json::to_vec(&message)?;
        self.outgoing
            .send(bytes)
            .map_err(|_| KexError::TransportClosed)
    }

    fn recv(&mut self) -> Result<KexMessage, KexError> {
        let bytes = self.incoming.recv().map_err(|_| KexError::TransportClosed)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug)]
pub struct PartyOutcome {
    pub role: Role,
    pub key_stream: KeyStream,
    pub signal: Polynomial,
    /// Whether the peer's confirmation tag matched ours.
    pub confirmed: bool,
}

/// Runs the initiating side: samples `a`, publishes, signals, reconciles.
pub fn run_initiator<R, T>(
    sampler: &Sampler,
    rng: &mut R,
    transport: &mut T,
    context: &[u8],
) -> Result<PartyOutcome, KexError>
where
    R: CryptoRng + RngCore,
    T: Transport + ?Sized,
{
    let (party, value) = Party::new(sampler, rng).calculate_public();
    transport.send(KexMessage::public(value.public, Some(value.structural)))?;

    let peer_public = match transport.recv()? {
        KexMessage::Public { public, .. } => public,
        other => return Err(unexpected("public", &other)),
    };
    let (party, signal) = party.calculate_private(&peer_public)?.generate_signal();
    transport.send(KexMessage::signal(signal.clone()))?;
    let party = party.reconcile_key();
    debug!("initiator reconciled {} bits", party.key_stream().len());

    let tag = party.key_stream().confirmation_tag(context);
    transport.send(KexMessage::confirm(tag))?;
    let confirmed = match transport.recv()? {
        KexMessage::Confirm { tag: peer_tag, .. } => peer_tag == tag,
        other => return Err(unexpected("confirm", &other)),
    };
    log_confirmation(Role::Initiator, confirmed);
    Ok(PartyOutcome {
        role: Role::Initiator,
        key_stream: party.key_stream().clone(),
        signal,
        confirmed,
    })
}

/// Runs the responding side: adopts `a`, publishes, reconciles with the signal.
pub fn run_responder<R, T>(
    sampler: &Sampler,
    rng: &mut R,
    transport: &mut T,
    context: &[u8],
) -> Result<PartyOutcome, KexError>
where
    R: CryptoRng + RngCore,
    T: Transport + ?Sized,
{
    let (peer_public, structural) = match transport.recv()? {
        KexMessage::Public {
            public,
            structural: Some(structural),
            ..
        } => (public, structural),
        KexMessage::Public {
            structural: None, ..
        } => {
            return Err(KexError::StructuralMismatch {
                expected: sampler.params().degree,
                found: 0,
            });
        }
        other => return Err(unexpected("public", &other)),
    };
    let (party, value) = Party::with_structural(sampler, structural, rng)?.calculate_public();
    transport.send(KexMessage::public(value.public, None))?;
    let party = party.calculate_private(&peer_public)?;

    let signal = match transport.recv()? {
        KexMessage::Signal { signal, .. } => signal,
        other => return Err(unexpected("signal", &other)),
    };
    let party = party.reconcile_key(&signal)?;
    debug!("responder reconciled {} bits", party.key_stream().len());

    let tag = party.key_stream().confirmation_tag(context);
    let confirmed = match transport.recv()? {
        KexMessage::Confirm { tag: peer_tag, .. } => peer_tag == tag,
        other => return Err(unexpected("confirm", &other)),
    };
    transport.send(KexMessage::confirm(tag))?;
    log_confirmation(Role::Responder, confirmed);
    Ok(PartyOutcome {
        role: Role::Responder,
        key_stream: party.key_stream().clone(),
        signal,
        confirmed,
    })
}

fn unexpected(expected: &'static str, found: &KexMessage) -> KexError {
    KexError::UnexpectedMessage {
        expected,
        found: found.kind(),
    }
}

fn log_confirmation(role: Role, confirmed: bool) {
    if confirmed {
        info!("{:?} key confirmation succeeded", role);
    } else {
        warn!("{:?} key confirmation failed: key streams differ", role);
    }
}
