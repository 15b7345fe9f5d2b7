//! Encryption and signing of stored tickets
//!
//! Encoded tickets are sealed with ChaCha20-Poly1305 and the sealed bytes are
//! signed with Ed25519, so a node only accepts tickets written by a node that
//! shares both keys. Storage keys become SHA-512 digests of the ticket id.

use crate::errors::{RecoveryHint, RegistryError, Result};
use cas_config::CryptoProperties;
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha512};
use std::fmt;
use tracing::warn;

const SIGNATURE_LEN: usize = 64;
const NONCE_LEN: usize = 12;

pub struct TicketCipher {
    aead: ChaCha20Poly1305,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl TicketCipher {
    pub fn new(encryption_key: [u8; 32], signing_key: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&signing_key);
        Self {
            aead: ChaCha20Poly1305::new(Key::from_slice(&encryption_key)),
            verifying_key: signing_key.verifying_key(),
            signing_key,
        }
    }

    /// Cipher with fresh random keys; tickets do not survive a restart
    pub fn generate() -> Self {
        let encryption_key = ChaCha20Poly1305::generate_key(&mut OsRng);
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self {
            aead: ChaCha20Poly1305::new(&encryption_key),
            verifying_key: signing_key.verifying_key(),
            signing_key,
        }
    }

    /// Build the cipher from configuration; `None` when crypto is disabled.
    ///
    /// Missing keys are generated with a warning since other nodes cannot
    /// read tickets sealed with them.
    pub fn from_properties(properties: &CryptoProperties) -> Result<Option<Self>> {
        if !properties.enabled {
            return Ok(None);
        }
        let encryption_key = match &properties.encryption_key {
            Some(hex_key) => decode_key("encryption", hex_key)?,
            None => {
                warn!("no ticket encryption key configured; generated a random key for this node");
                random_key()
            }
        };
        let signing_key = match &properties.signing_key {
            Some(hex_key) => decode_key("signing", hex_key)?,
            None => {
                warn!("no ticket signing key configured; generated a random key for this node");
                random_key()
            }
        };
        Ok(Some(Self::new(encryption_key, signing_key)))
    }

    /// Storage key of a ticket id
    pub fn digest_id(id: &str) -> String {
        hex::encode(Sha512::digest(id.as_bytes()))
    }

    /// Seal and sign: `signature || nonce || ciphertext`
    pub fn encode(&self, key: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext =
            self.aead
                .encrypt(&nonce, plaintext)
                .map_err(|e| RegistryError::Cryptographic {
                    operation: "encryption",
                    details: format!("{key}: {e}"),
                    recovery_hint: RecoveryHint::CheckKeys,
                })?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);

        let signature = self.signing_key.sign(&sealed);
        let mut out = Vec::with_capacity(SIGNATURE_LEN + sealed.len());
        out.extend_from_slice(&signature.to_bytes());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Verify then open bytes produced by [`TicketCipher::encode`]
    pub fn decode(&self, key: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        if bytes.len() < SIGNATURE_LEN + NONCE_LEN {
            return Err(RegistryError::Corruption {
                key: key.to_string(),
                reason: "sealed ticket is too short".to_string(),
                recovery_hint: RecoveryHint::Evict,
            });
        }
        let (signature_bytes, sealed) = bytes.split_at(SIGNATURE_LEN);
        let signature =
            Signature::from_slice(signature_bytes).map_err(|e| RegistryError::SignatureVerification {
                key: key.to_string(),
                reason: e.to_string(),
                recovery_hint: RecoveryHint::Evict,
            })?;
        self.verifying_key
            .verify(sealed, &signature)
            .map_err(|e| RegistryError::SignatureVerification {
                key: key.to_string(),
                reason: e.to_string(),
                recovery_hint: RecoveryHint::CheckKeys,
            })?;

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.aead
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| RegistryError::Cryptographic {
                operation: "decryption",
                details: format!("{key}: {e}"),
                recovery_hint: RecoveryHint::CheckKeys,
            })
    }
}

impl fmt::Debug for TicketCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketCipher")
            .field("verifying_key", &hex::encode(self.verifying_key.to_bytes()))
            .finish_non_exhaustive()
    }
}

fn decode_key(name: &str, hex_key: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_key).map_err(|e| RegistryError::Configuration {
        message: format!("ticket {name} key is not valid hex: {e}"),
        recovery_hint: RecoveryHint::CheckKeys,
    })?;
    bytes.try_into().map_err(|bytes: Vec<u8>| RegistryError::Configuration {
        message: format!("ticket {name} key must be 32 bytes, got {}", bytes.len()),
        recovery_hint: RecoveryHint::CheckKeys,
    })
}

fn random_key() -> [u8; 32] {
    use rand::RngCore;
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sealed_bytes_round_trip() {
        let cipher = TicketCipher::generate();
        let sealed = cipher.encode("TGT-1", b"ticket body").unwrap();
        assert_ne!(&sealed[SIGNATURE_LEN + NONCE_LEN..], b"ticket body");
        assert_eq!(cipher.decode("TGT-1", &sealed).unwrap(), b"ticket body");
    }

    #[test]
    fn test_tampering_fails_signature() {
        let cipher = TicketCipher::generate();
        let mut sealed = cipher.encode("TGT-1", b"ticket body").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 1;
        let err = cipher.decode("TGT-1", &sealed).unwrap_err();
        assert!(matches!(err, RegistryError::SignatureVerification { .. }));
    }

    #[test]
    fn test_foreign_keys_are_rejected() {
        let writer = TicketCipher::generate();
        let reader = TicketCipher::generate();
        let sealed = writer.encode("TGT-1", b"ticket body").unwrap();
        assert!(reader.decode("TGT-1", &sealed).is_err());
    }

    #[test]
    fn test_shared_configured_keys_interoperate() {
        let properties = CryptoProperties {
            enabled: true,
            encryption_key: Some("11".repeat(32)),
            signing_key: Some("22".repeat(32)),
        };
        let node_a = TicketCipher::from_properties(&properties).unwrap().unwrap();
        let node_b = TicketCipher::from_properties(&properties).unwrap().unwrap();
        let sealed = node_a.encode("ST-1", b"shared").unwrap();
        assert_eq!(node_b.decode("ST-1", &sealed).unwrap(), b"shared");
    }

    #[test]
    fn test_disabled_and_invalid_properties() {
        assert!(TicketCipher::from_properties(&CryptoProperties::default())
            .unwrap()
            .is_none());

        let short = CryptoProperties {
            enabled: true,
            encryption_key: Some("abcd".to_string()),
            signing_key: None,
        };
        assert!(TicketCipher::from_properties(&short).is_err());
    }

    #[test]
    fn test_digest_id_is_sha512_hex() {
        let digest = TicketCipher::digest_id("TGT-1");
        assert_eq!(digest.len(), 128);
        assert_eq!(digest, TicketCipher::digest_id("TGT-1"));
        assert_ne!(digest, TicketCipher::digest_id("TGT-2"));
    }
}
