use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// `code_challenge_method` sent with every authorization request.
pub const CHALLENGE_METHOD: &str = "S256";

const VERIFIER_MIN_LEN: usize = 43;
const VERIFIER_MAX_LEN: usize = 128;

/// PKCE verifier together with its S256 challenge.
///
/// The verifier stays on the device until the code exchange; only the
/// challenge travels in the authorization URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    /// Generates a fresh verifier (48 random bytes, 64 base64url characters).
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 48];
        rand::rng().fill(&mut bytes[..]);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Wraps an externally generated verifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthProvider`] if the verifier is not 43-128 unreserved
    /// characters (RFC 7636 §4.1).
    pub fn from_verifier(verifier: impl Into<String>) -> Result<Self, Error> {
        let verifier = verifier.into();
        let valid_len = (VERIFIER_MIN_LEN..=VERIFIER_MAX_LEN).contains(&verifier.len());
        let valid_chars = verifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'));
        if !valid_len || !valid_chars {
            return Err(Error::AuthProvider("invalid PKCE code verifier".into()));
        }
        let challenge = challenge_for(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }

    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

/// `BASE64URL(SHA256(verifier))`
fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Random CSRF `state` value (16 bytes, 22 base64url characters).
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_verifier_shape() {
        let pkce = Pkce::generate();
        assert_eq!(pkce.verifier().len(), 64);
        assert!(
            pkce.verifier()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "verifier should be URL-safe: {}",
            pkce.verifier()
        );
        assert_eq!(pkce.challenge().len(), 43);
    }

    #[test]
    fn test_generated_pairs_differ() {
        assert_ne!(Pkce::generate(), Pkce::generate());
    }

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk").unwrap();
        assert_eq!(
            pkce.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_from_verifier_rejects_short_or_reserved() {
        assert!(Pkce::from_verifier("too-short").is_err());
        let with_space = format!("{} ", "a".repeat(50));
        assert!(Pkce::from_verifier(with_space).is_err());
        assert!(Pkce::from_verifier("a".repeat(129)).is_err());
        assert!(Pkce::from_verifier("a~b.c".repeat(10)).is_ok());
    }

    #[test]
    fn test_state_length_and_uniqueness() {
        let s1 = generate_state();
        assert_eq!(s1.len(), 22);
        assert_ne!(s1, generate_state());
    }
}
