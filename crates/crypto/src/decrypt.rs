use aes_gcm::aead::{generic_array::GenericArray, AeadInPlace, KeyInit};

use crate::encrypt::EnvelopeCipher;
use crate::key_derivation::KeyDerivation;
use crate::{CryptoError, HEADER_SIZE, IV_LEN, SALT_LEN, TAG_LEN};

struct ParsedEnvelope<'a> {
    salt: &'a [u8],
    iv: &'a [u8],
    tag: &'a [u8],
    ciphertext: &'a [u8],
}

fn parse_envelope(data: &[u8]) -> Result<ParsedEnvelope<'_>, CryptoError> {
    if data.len() < HEADER_SIZE {
        return Err(CryptoError::Format(format!(
            "envelope too short: {} bytes, need at least {HEADER_SIZE}",
            data.len()
        )));
    }

    let (salt, rest) = data.split_at(SALT_LEN);
    let (iv, rest) = rest.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    Ok(ParsedEnvelope {
        salt,
        iv,
        tag,
        ciphertext,
    })
}

/// Open a plain envelope produced by [`crate::encrypt::seal`].
///
/// The tag is verified before anything is returned; on failure the caller
/// gets [`CryptoError::Authentication`] and no plaintext.
pub fn open(envelope: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
    let parsed = parse_envelope(envelope)?;

    let key = KeyDerivation::default().derive(password.as_bytes(), parsed.salt)?;
    let cipher = EnvelopeCipher::new_from_slice(&key)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    let mut buffer = parsed.ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(parsed.iv),
            b"",
            &mut buffer,
            GenericArray::from_slice(parsed.tag),
        )
        .map_err(|_| CryptoError::Authentication)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encrypt::seal;

    #[test]
    fn test_roundtrip() {
        let plaintext = b"hello world, this is a test of envelope encryption";
        let encrypted = seal(plaintext, "correct horse").unwrap();
        let decrypted = open(&encrypted, "correct horse").unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_roundtrip_empty() {
        let encrypted = seal(b"", "pw").unwrap();
        assert_eq!(open(&encrypted, "pw").unwrap(), b"");
    }

    #[test]
    fn test_wrong_password_fails() {
        let encrypted = seal(b"secret data", "p1").unwrap();
        assert!(matches!(
            open(&encrypted, "p2"),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_truncated_header_is_format_error() {
        assert!(matches!(
            open(&[0u8; HEADER_SIZE - 1], "pw"),
            Err(CryptoError::Format(_))
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails_authentication() {
        let encrypted = seal(b"0123456789", "pw").unwrap();
        let truncated = &encrypted[..encrypted.len() - 1];
        assert!(matches!(
            open(truncated, "pw"),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_any_flipped_bit_in_tag_or_ciphertext_is_detected() {
        let encrypted = seal(b"tamper me", "pw").unwrap();
        let tag_start = SALT_LEN + IV_LEN;
        for byte in tag_start..encrypted.len() {
            let bit = byte % 8;
            let mut tampered = encrypted.clone();
            tampered[byte] ^= 1 << bit;
            assert!(
                matches!(open(&tampered, "pw"), Err(CryptoError::Authentication)),
                "flip at byte {byte} bit {bit} went unnoticed"
            );
        }
    }

    #[test]
    fn test_flipped_salt_or_iv_is_detected() {
        let encrypted = seal(b"tamper me", "pw").unwrap();
        for byte in [0, SALT_LEN - 1, SALT_LEN, SALT_LEN + IV_LEN - 1] {
            let mut tampered = encrypted.clone();
            tampered[byte] ^= 0x80;
            assert!(matches!(
                open(&tampered, "pw"),
                Err(CryptoError::Authentication)
            ));
        }
    }
}
