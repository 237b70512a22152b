use thiserror::Error;

use crate::party::Stage;

#[derive(Debug, Error)]
pub enum KexError {
    #[error("invalid modulus {modulus}: must be odd, greater than 1 and at most 2^24")]
    InvalidModulus { modulus: i64 },

    #[error("invalid ring degree {degree}: must be in 1..=65536")]
    InvalidDimension { degree: usize },

    #[error("invalid small-coefficient bound {bound}: must satisfy 0 <= b < q")]
    InvalidBound { bound: i64 },

    #[error("{operation} is not allowed while the party is {stage}")]
    ProtocolOrderViolation {
        operation: &'static str,
        stage: Stage,
    },

    #[error("{operation} failed: party session was lost in an earlier failed transition")]
    SessionPoisoned { operation: &'static str },

    #[error("structural polynomial has {found} coefficients, ring degree is {expected}")]
    StructuralMismatch { expected: usize, found: usize },

    #[error("{context} has {found} coefficients, ring degree is {expected}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("signal coefficient {index} is {value}, expected 0 or 1")]
    InvalidSignal { index: usize, value: i64 },

    #[error("key stream bit {index} is {value}, expected 0 or 1")]
    InvalidKeyBit { index: usize, value: u8 },

    #[error("serialization version mismatch for {context}: expected {expected}, found {found}")]
    VersionMismatch {
        context: &'static str,
        expected: u16,
        found: u16,
    },

    #[error("unexpected message: expected {expected}, found {found}")]
    UnexpectedMessage {
        expected: &'static str,
        found: &'static str,
    },

    #[error("message codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("transport closed before the exchange completed")]
    TransportClosed,

    #[error("AEAD operation failed")]
    AeadError,
}
