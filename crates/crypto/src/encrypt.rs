use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, AeadInPlace, KeyInit},
    aes::Aes256,
    AesGcm,
};
use rand::RngCore;

use crate::key_derivation::{generate_salt, KeyDerivation};
use crate::{CryptoError, HEADER_SIZE, IV_LEN, SALT_LEN};

/// AES-256-GCM with a 16-byte IV, as laid out in the plain envelope.
pub(crate) type EnvelopeCipher = AesGcm<Aes256, U16>;

/// Seal plaintext into the plain envelope.
///
/// The key is derived from `password` with PBKDF2-HMAC-SHA512 over a fresh
/// salt, and the IV is drawn fresh as well, so sealing the same input twice
/// never reuses a key/IV pair. Output layout:
/// `salt(64) | iv(16) | tag(16) | ciphertext`.
pub fn seal(plaintext: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
    let salt = generate_salt();
    let key = KeyDerivation::default().derive(password.as_bytes(), &salt)?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = EnvelopeCipher::new_from_slice(&key)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut output = Vec::with_capacity(HEADER_SIZE + plaintext.len());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&iv);
    // Tag placeholder, filled in once the ciphertext is computed.
    output.resize(HEADER_SIZE, 0);
    output.extend_from_slice(plaintext);

    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut output[HEADER_SIZE..])
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    output[SALT_LEN + IV_LEN..HEADER_SIZE].copy_from_slice(&tag);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_length() {
        let encrypted = seal(b"hello world", "pw").unwrap();
        assert_eq!(encrypted.len(), HEADER_SIZE + 11);

        let empty = seal(b"", "pw").unwrap();
        assert_eq!(empty.len(), HEADER_SIZE);
    }

    #[test]
    fn test_encrypt_different_each_time() {
        let plaintext = b"hello world";
        let enc1 = seal(plaintext, "pw").unwrap();
        let enc2 = seal(plaintext, "pw").unwrap();
        // Fresh salt and IV on every call
        assert_ne!(enc1[..SALT_LEN], enc2[..SALT_LEN]);
        assert_ne!(enc1[SALT_LEN..SALT_LEN + IV_LEN], enc2[SALT_LEN..SALT_LEN + IV_LEN]);
        assert_ne!(enc1[HEADER_SIZE..], enc2[HEADER_SIZE..]);
    }

    #[test]
    fn test_ciphertext_does_not_contain_plaintext() {
        let plaintext = b"a very recognisable plaintext string";
        let encrypted = seal(plaintext, "pw").unwrap();
        assert!(!encrypted
            .windows(plaintext.len())
            .any(|w| w == plaintext.as_slice()));
    }
}
