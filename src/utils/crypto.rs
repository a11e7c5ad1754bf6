use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;

/// AES-256-GCM sealing for secrets kept at rest (OAuth tokens).
///
/// Output layout is `base64(nonce || ciphertext)`; every call draws a fresh nonce.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; 32],
}

impl TokenCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| Error::Config(format!("TOKEN_ENCRYPTION_KEY is not base64: {}", e)))?;
        let key: [u8; 32] = raw.try_into().map_err(|bytes: Vec<u8>| {
            Error::Config(format!(
                "TOKEN_ENCRYPTION_KEY must decode to 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::new(key))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Crypto(format!("encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    pub fn decrypt(&self, sealed: &str) -> Result<Vec<u8>> {
        let raw = BASE64
            .decode(sealed)
            .map_err(|e| Error::Crypto(format!("sealed value is not base64: {}", e)))?;
        if raw.len() <= NONCE_LEN {
            return Err(Error::Crypto("sealed value is truncated".to_string()));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| Error::Crypto(format!("decryption failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> TokenCipher {
        TokenCipher::new([7u8; 32])
    }

    #[test]
    fn sealed_tokens_open_with_the_same_key() {
        let sealed = cipher().encrypt(b"ya29.access-token").unwrap();
        assert!(!sealed.contains("ya29"));
        assert_eq!(cipher().decrypt(&sealed).unwrap(), b"ya29.access-token");
    }

    #[test]
    fn nonces_differ_between_writes() {
        let a = cipher().encrypt(b"same").unwrap();
        let b = cipher().encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let sealed = cipher().encrypt(b"secret").unwrap();
        let other = TokenCipher::new([9u8; 32]);
        assert!(matches!(other.decrypt(&sealed), Err(Error::Crypto(_))));
    }

    #[test]
    fn key_must_be_32_bytes() {
        let short = BASE64.encode([1u8; 16]);
        assert!(matches!(TokenCipher::from_base64(&short), Err(Error::Config(_))));
        let ok = BASE64.encode([1u8; 32]);
        assert!(TokenCipher::from_base64(&ok).is_ok());
    }
}
