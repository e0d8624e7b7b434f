//! Authenticated encryption for opaque state tokens.
//!
//! Token layout is `base64url(nonce (12 bytes) || ciphertext)`. The key is
//! derived once from the server secret with HKDF-SHA256.

use base64ct::{Base64UrlUnpadded, Encoding};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::error::{AuthError, AuthResult};

const KEY_SALT: &[u8] = b"token_salt";
const KEY_INFO: &[u8] = b"oauth-gate:state-token:v1";
const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct Encryptor {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor").finish_non_exhaustive()
    }
}

impl Encryptor {
    /// Derive the cipher key from the server secret.
    ///
    /// # Errors
    /// Returns `EmptyParams` for an empty secret.
    pub fn new(secret: &SecretString) -> AuthResult<Self> {
        let secret = secret.expose_secret();
        if secret.is_empty() {
            return Err(AuthError::EmptyParams(
                "state token secret is required".to_string(),
            ));
        }

        let hk = Hkdf::<Sha256>::new(Some(KEY_SALT), secret.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(KEY_INFO, &mut okm)
            .map_err(|e| AuthError::Unexpected(format!("key derivation failed: {e}")))?;

        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&okm)),
        })
    }

    /// Encrypt and encode `plaintext` into a URL-safe token.
    ///
    /// # Errors
    /// Returns `InvalidPayload` if the cipher rejects the input.
    pub fn encrypt(&self, plaintext: &[u8]) -> AuthResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| AuthError::Unexpected(format!("failed to generate nonce: {e}")))?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| AuthError::InvalidPayload)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(Base64UrlUnpadded::encode_string(&sealed))
    }

    /// Decode and decrypt a token produced by [`Encryptor::encrypt`].
    ///
    /// # Errors
    /// Returns `InvalidPayload` for malformed input or a failed integrity check.
    pub fn decrypt(&self, token: &str) -> AuthResult<Vec<u8>> {
        let sealed = Base64UrlUnpadded::decode_vec(token.trim())
            .map_err(|_| AuthError::InvalidPayload)?;

        if sealed.len() <= NONCE_LEN {
            return Err(AuthError::InvalidPayload);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| AuthError::InvalidPayload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor(secret: &str) -> Encryptor {
        match Encryptor::new(&SecretString::from(secret.to_string())) {
            Ok(encryptor) => encryptor,
            Err(err) => panic!("failed to build encryptor: {err}"),
        }
    }

    #[test]
    fn round_trip_arbitrary_payloads() {
        let encryptor = encryptor("super-secret");
        let payloads: [&[u8]; 4] = [
            b"",
            b"STATE_TOKEN:GOOGLE:1700000000:0123456789abcdef0123456789abcdef",
            &[0u8, 255, 1, 254, 127, 128],
            &[42u8; 1024],
        ];
        for payload in payloads {
            let token = encryptor.encrypt(payload).unwrap_or_default();
            assert!(!token.is_empty());
            assert_eq!(encryptor.decrypt(&token).ok().as_deref(), Some(payload));
        }
    }

    #[test]
    fn tokens_are_url_safe_and_randomized() {
        let encryptor = encryptor("super-secret");
        let first = encryptor.encrypt(b"same").unwrap_or_default();
        let second = encryptor.encrypt(b"same").unwrap_or_default();
        assert_ne!(first, second);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let encryptor = encryptor("super-secret");
        let token = encryptor.encrypt(b"payload").unwrap_or_default();
        let mut chars: Vec<char> = token.chars().collect();
        let middle = chars.len() / 2;
        chars[middle] = if chars[middle] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        assert_eq!(encryptor.decrypt(&tampered), Err(AuthError::InvalidPayload));
    }

    #[test]
    fn other_secret_cannot_decrypt() {
        let token = encryptor("one").encrypt(b"payload").unwrap_or_default();
        assert_eq!(
            encryptor("two").decrypt(&token),
            Err(AuthError::InvalidPayload)
        );
    }

    #[test]
    fn garbage_is_rejected() {
        let encryptor = encryptor("super-secret");
        assert_eq!(encryptor.decrypt(""), Err(AuthError::InvalidPayload));
        assert_eq!(encryptor.decrypt("not base64!"), Err(AuthError::InvalidPayload));
        assert_eq!(encryptor.decrypt("AAAA"), Err(AuthError::InvalidPayload));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let result = Encryptor::new(&SecretString::from(String::new()));
        assert!(matches!(result, Err(AuthError::EmptyParams(_))));
    }
}
