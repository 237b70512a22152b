//! Sealing application data under a key derived from a reconciled key stream.

use blake3::Hasher;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce, Tag, aead::AeadInPlace};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::KexError;
use crate::reconcile::{DERIVED_KEY_BYTES, KeyStream};
use crate::versioning::{SEALED_MESSAGE_VERSION, expect_version};

pub const AEAD_NONCE_BYTES: usize = 12;
pub const AEAD_TAG_BYTES: usize = 16;

const SEAL_CONTEXT_LABEL: &[u8] = b"rlwe-kex::seal";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SealedMessage {
    pub version: u16,
    pub counter: u64,
    pub nonce: [u8; AEAD_NONCE_BYTES],
    pub ciphertext: Vec<u8>,
    pub aad: Vec<u8>,
}

impl<'de> Deserialize<'de> for SealedMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            version: u16,
            counter: u64,
            nonce: [u8; AEAD_NONCE_BYTES],
            ciphertext: Vec<u8>,
            aad: Vec<u8>,
        }
        let helper = Helper::deserialize(deserializer)?;
        expect_version::<D::Error>(helper.version, SEALED_MESSAGE_VERSION, "SealedMessage")?;
        Ok(Self {
            version: helper.version,
            counter: helper.counter,
            nonce: helper.nonce,
            ciphertext: helper.ciphertext,
            aad: helper.aad,
        })
    }
}

/// Encrypts `plaintext` under the key both parties derive from `key_stream`.
///
/// `counter` must not repeat for the same key stream and context.
pub fn seal(
    key_stream: &KeyStream,
    context: &[u8],
    counter: u64,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<SealedMessage, KexError> {
    let key = key_stream.derive_key(&seal_context(context));
    let nonce = derive_nonce(context, counter);
    let ciphertext = encrypt_aead(&key, &nonce, plaintext, aad)?;
    Ok(SealedMessage {
        version: SEALED_MESSAGE_VERSION,
        counter,
        nonce,
        ciphertext,
        aad: aad.to_vec(),
    })
}

pub fn open(
    key_stream: &KeyStream,
    context: &[u8],
    sealed: &SealedMessage,
) -> Result<Vec<u8>, KexError> {
    if sealed.version != SEALED_MESSAGE_VERSION {
        return Err(KexError::VersionMismatch {
            context: "SealedMessage",
            expected: SEALED_MESSAGE_VERSION,
            found: sealed.version,
        });
    }
    if sealed.nonce != derive_nonce(context, sealed.counter) {
        return Err(KexError::AeadError);
    }
    let key = key_stream.derive_key(&seal_context(context));
    decrypt_aead(&key, &sealed.nonce, &sealed.ciphertext, &sealed.aad)
}

pub fn encrypt_aead(
    key: &[u8; DERIVED_KEY_BYTES],
    nonce: &[u8; AEAD_NONCE_BYTES],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, KexError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut out = Vec::with_capacity(plaintext.len() + AEAD_TAG_BYTES);
    out.extend_from_slice(plaintext);
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut out)
        .map_err(|_| KexError::AeadError)?;
    out.extend_from_slice(tag.as_slice());
    Ok(out)
}

pub fn decrypt_aead(
    key: &[u8; DERIVED_KEY_BYTES],
    nonce: &[u8; AEAD_NONCE_BYTES],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, KexError> {
    if ciphertext.len() < AEAD_TAG_BYTES {
        return Err(KexError::AeadError);
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let (body, tag_bytes) = ciphertext.split_at(ciphertext.len() - AEAD_TAG_BYTES);
    let mut out = body.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            aad,
            &mut out,
            Tag::from_slice(tag_bytes),
        )
        .map_err(|_| KexError::AeadError)?;
    Ok(out)
}

fn seal_context(context: &[u8]) -> Vec<u8> {
    let mut out = SEAL_CONTEXT_LABEL.to_vec();
    out.extend_from_slice(context);
    out
}

fn derive_nonce(context: &[u8], counter: u64) -> [u8; AEAD_NONCE_BYTES] {
    let mut hasher = Hasher::new();
    hasher.update(SEAL_CONTEXT_LABEL);
    hasher.update(&counter.to_le_bytes());
    hasher.update(context);
    let digest = hasher.finalize();
    let mut nonce = [0u8; AEAD_NONCE_BYTES];
    nonce.copy_from_slice(&digest.as_bytes()[..AEAD_NONCE_BYTES]);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(bits: &[u8]) -> KeyStream {
        KeyStream::from_bits(bits.to_vec()).unwrap()
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = stream(&[1, 0, 1, 1, 0, 0, 1, 0]);
        let sealed = seal(&key, b"ctx", 0, b"hello", b"aad").unwrap();
        assert_eq!(open(&key, b"ctx", &sealed).unwrap(), b"hello");
    }

    #[test]
    fn different_stream_cannot_open() {
        let sealed = seal(&stream(&[1, 0, 1, 1]), b"ctx", 3, b"hello", b"").unwrap();
        let err = open(&stream(&[1, 0, 1, 0]), b"ctx", &sealed).unwrap_err();
        assert!(matches!(err, KexError::AeadError));
    }

    #[test]
    fn tampered_aad_is_rejected() {
        let key = stream(&[0, 1, 1, 0]);
        let mut sealed = seal(&key, b"ctx", 1, b"hello", b"aad").unwrap();
        sealed.aad = b"other".to_vec();
        assert!(matches!(
            open(&key, b"ctx", &sealed),
            Err(KexError::AeadError)
        ));
    }

    #[test]
    fn sealed_message_json_checks_version() {
        let key = stream(&[1, 1, 0, 0]);
        let sealed = seal(&key, b"ctx", 2, b"data", b"").unwrap();
        let mut value = serde_json::to_value(&sealed).unwrap();
        assert_eq!(serde_json::from_value::<SealedMessage>(value.clone()).unwrap(), sealed);
        value["version"] = serde_json::json!(9);
        assert!(serde_json::from_value::<SealedMessage>(value).is_err());
    }
}
