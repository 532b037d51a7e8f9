//! Secret Sealing
//!
//! Encrypts GitHub Actions secrets with the repository public key.
//! The secrets API only accepts values encrypted as a libsodium sealed
//! box against the per-repository key, base64 encoded.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::{aead::OsRng, PublicKey};
use serde::Serialize;

use crate::error::{Error, Result};

/// Sealed box overhead in bytes (ephemeral public key + MAC)
pub const SEAL_OVERHEAD: usize = 48;

/// A secret value encrypted for upload, in the shape the upsert
/// endpoint expects as its request body
#[derive(Debug, Clone, Serialize)]
pub struct SealedSecret {
    /// Base64-encoded sealed box ciphertext
    pub encrypted_value: String,

    /// Identifier of the public key the value was sealed with
    pub key_id: String,
}

/// Encrypt a secret value with a repository public key.
///
/// # Arguments
/// - `name`: Secret name, used only for error reporting
/// - `public_key`: Base64-encoded 32-byte key from the public-key endpoint
/// - `plaintext`: The secret value
///
/// # Errors
/// Returns [`Error::Seal`] if the key is not valid base64, has the wrong
/// length, or encryption fails. These are precondition failures and are
/// never worth retrying.
pub fn seal(name: &str, public_key: &str, plaintext: &str) -> Result<String> {
    let key_bytes = STANDARD
        .decode(public_key.trim())
        .map_err(|e| Error::seal(name, format!("public key is not valid base64: {e}")))?;

    let key_bytes: [u8; 32] = key_bytes.try_into().map_err(|v: Vec<u8>| {
        Error::seal(name, format!("public key is {} bytes, expected 32", v.len()))
    })?;

    let key = PublicKey::from(key_bytes);
    let ciphertext = key
        .seal(&mut OsRng, plaintext.as_bytes())
        .map_err(|_| Error::seal(name, "sealed box encryption failed"))?;

    Ok(STANDARD.encode(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_box::SecretKey;

    fn test_key() -> (String, SecretKey) {
        let secret = SecretKey::generate(&mut OsRng);
        let public = STANDARD.encode(secret.public_key().as_bytes());
        (public, secret)
    }

    #[test]
    fn test_seal_round_trip() {
        let (public, secret) = test_key();
        let sealed = seal("PYPI_TOKEN", &public, "hunter2").unwrap();

        let ciphertext = STANDARD.decode(sealed).unwrap();
        let opened = secret.unseal(&ciphertext).unwrap();
        assert_eq!(opened, b"hunter2");
    }

    #[test]
    fn test_seal_output_has_fixed_overhead() {
        let (public, _) = test_key();
        let sealed = seal("TOKEN", &public, "some-value").unwrap();
        let ciphertext = STANDARD.decode(sealed).unwrap();
        assert_eq!(ciphertext.len(), "some-value".len() + SEAL_OVERHEAD);
    }

    #[test]
    fn test_seal_rejects_invalid_base64_key() {
        let result = seal("TOKEN", "not-valid-base64!!!", "value");
        assert!(matches!(result, Err(Error::Seal { .. })));
    }

    #[test]
    fn test_seal_rejects_wrong_key_length() {
        let short_key = STANDARD.encode([0u8; 16]);
        let result = seal("TOKEN", &short_key, "value");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("expected 32"));
    }

    #[test]
    fn test_seal_errors_name_the_secret() {
        let result = seal("ANACONDA_TOKEN", "%%%", "value");
        assert!(result.unwrap_err().to_string().contains("ANACONDA_TOKEN"));
    }
}
