//! Obfuscated envelope.
//!
//! Disguises a sealed blob as an archive so that naive content scanning on
//! the storage side does not classify it as ciphertext:
//!
//! ```text
//! signature(30) | padding(3 * payload) | nonce(12) | tag(16) | ciphertext | noise(1024)
//! \___________ payload = nonce + tag + ciphertext ___________/
//! ```
//!
//! The padding boundary is not stored. The decoder recovers it from the total
//! length: `payload = (len - 30 - 1024) / 4`, which is exact because the
//! encoder always pads by three times the payload. Buffers where the division
//! is not exact are rejected rather than sliced at a guessed offset.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use rand::RngCore;

use crate::key_derivation::KeyDerivation;
use crate::{CryptoError, TAG_LEN};

/// A ZIP local file header, so the blob starts like a deflated archive entry.
pub const FAKE_SIGNATURE: [u8; 30] = [
    0x50, 0x4b, 0x03, 0x04, // local file header magic
    0x14, 0x00, // version needed to extract
    0x00, 0x00, // flags
    0x08, 0x00, // deflate
    0x6d, 0x9a, // mod time
    0x57, 0x5b, // mod date
    0x3c, 0x1f, 0x9e, 0x42, // crc-32
    0x00, 0x10, 0x00, 0x00, // compressed size
    0x00, 0x40, 0x00, 0x00, // uncompressed size
    0x00, 0x00, // file name length
    0x00, 0x00, // extra field length
];

pub const NONCE_LEN: usize = 12;
pub const PADDING_MULTIPLIER: usize = 3;
pub const TRAILING_NOISE_LEN: usize = 1024;

const PAYLOAD_OVERHEAD: usize = NONCE_LEN + TAG_LEN;
const FIXED_OVERHEAD: usize = FAKE_SIGNATURE.len() + TRAILING_NOISE_LEN;

/// Smallest valid obfuscated blob (empty plaintext).
pub const MIN_OBFUSCATED_LEN: usize = FIXED_OVERHEAD + (PADDING_MULTIPLIER + 1) * PAYLOAD_OVERHEAD;

/// Total blob size for a plaintext of `plaintext_len` bytes.
pub fn sealed_len(plaintext_len: usize) -> usize {
    FIXED_OVERHEAD + (PADDING_MULTIPLIER + 1) * (PAYLOAD_OVERHEAD + plaintext_len)
}

fn cipher_for(password: &str) -> Result<Aes256Gcm, CryptoError> {
    let key = KeyDerivation::Sha256.derive(password.as_bytes(), &[])?;
    Aes256Gcm::new_from_slice(&key).map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))
}

/// Seal plaintext into the obfuscated envelope.
pub fn obfuscated_seal(plaintext: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(password)?;
    let mut rng = rand::thread_rng();

    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let payload_len = PAYLOAD_OVERHEAD + plaintext.len();
    let padding_len = payload_len * PADDING_MULTIPLIER;

    let mut output = Vec::with_capacity(sealed_len(plaintext.len()));
    output.extend_from_slice(&FAKE_SIGNATURE);

    let padding_start = output.len();
    output.resize(padding_start + padding_len, 0);
    rng.fill_bytes(&mut output[padding_start..]);

    output.extend_from_slice(&nonce);
    let tag_start = output.len();
    let ciphertext_start = tag_start + TAG_LEN;
    output.resize(ciphertext_start, 0);
    output.extend_from_slice(plaintext);

    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut output[ciphertext_start..])
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    output[tag_start..ciphertext_start].copy_from_slice(&tag);

    let noise_start = output.len();
    output.resize(noise_start + TRAILING_NOISE_LEN, 0);
    rng.fill_bytes(&mut output[noise_start..]);

    Ok(output)
}

/// Open a blob produced by [`obfuscated_seal`].
pub fn obfuscated_open(blob: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < MIN_OBFUSCATED_LEN {
        return Err(CryptoError::Format(format!(
            "obfuscated blob too short: {} bytes, need at least {MIN_OBFUSCATED_LEN}",
            blob.len()
        )));
    }

    if blob[..FAKE_SIGNATURE.len()] != FAKE_SIGNATURE {
        return Err(CryptoError::Format("missing archive signature".into()));
    }

    let framed = blob.len() - FIXED_OVERHEAD;
    if framed % (PADDING_MULTIPLIER + 1) != 0 {
        return Err(CryptoError::Format(format!(
            "padding boundary does not align: {framed} framed bytes"
        )));
    }

    let payload_len = framed / (PADDING_MULTIPLIER + 1);
    let payload_start = FAKE_SIGNATURE.len() + payload_len * PADDING_MULTIPLIER;
    let payload = &blob[payload_start..payload_start + payload_len];

    let (nonce, rest) = payload.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let cipher = cipher_for(password)?;
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| CryptoError::Authentication)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_various_sizes() {
        for size in [0usize, 1, 7, 10, 255, 4096] {
            let plaintext: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let sealed = obfuscated_seal(&plaintext, "pw").unwrap();
            assert_eq!(sealed.len(), sealed_len(size));
            assert_eq!(obfuscated_open(&sealed, "pw").unwrap(), plaintext);
        }
    }

    #[test]
    fn test_signature_always_leads() {
        for size in [0usize, 1, 1000] {
            let sealed = obfuscated_seal(&vec![0xAB; size], "pw").unwrap();
            assert_eq!(sealed[..30], FAKE_SIGNATURE);
        }
    }

    #[test]
    fn test_empty_plaintext_has_minimum_length() {
        let sealed = obfuscated_seal(b"", "pw").unwrap();
        assert_eq!(sealed.len(), MIN_OBFUSCATED_LEN);
        assert_eq!(MIN_OBFUSCATED_LEN, 30 + 1024 + 4 * 28);
    }

    #[test]
    fn test_wrong_password_fails() {
        let sealed = obfuscated_seal(b"secret", "p1").unwrap();
        assert!(matches!(
            obfuscated_open(&sealed, "p2"),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_tampered_payload_is_detected() {
        let plaintext = b"helloworld";
        let sealed = obfuscated_seal(plaintext, "pw").unwrap();
        let payload_len = PAYLOAD_OVERHEAD + plaintext.len();
        let payload_start = FAKE_SIGNATURE.len() + payload_len * PADDING_MULTIPLIER;
        // Tag and ciphertext bytes
        for byte in payload_start + NONCE_LEN..payload_start + payload_len {
            let mut tampered = sealed.clone();
            tampered[byte] ^= 1 << (byte % 8);
            assert!(matches!(
                obfuscated_open(&tampered, "pw"),
                Err(CryptoError::Authentication)
            ));
        }
    }

    #[test]
    fn test_padding_and_noise_are_not_authenticated() {
        let sealed = obfuscated_seal(b"abc", "pw").unwrap();
        let mut altered = sealed.clone();
        altered[FAKE_SIGNATURE.len()] ^= 0xFF;
        let last = altered.len() - 1;
        altered[last] ^= 0xFF;
        assert_eq!(obfuscated_open(&altered, "pw").unwrap(), b"abc");
    }

    #[test]
    fn test_misaligned_length_is_rejected() {
        let mut sealed = obfuscated_seal(b"abc", "pw").unwrap();
        sealed.push(0);
        assert!(matches!(
            obfuscated_open(&sealed, "pw"),
            Err(CryptoError::Format(_))
        ));
    }

    #[test]
    fn test_short_blob_is_rejected() {
        let sealed = obfuscated_seal(b"", "pw").unwrap();
        assert!(matches!(
            obfuscated_open(&sealed[..sealed.len() - 4], "pw"),
            Err(CryptoError::Format(_))
        ));
    }

    #[test]
    fn test_missing_signature_is_rejected() {
        let mut sealed = obfuscated_seal(b"abc", "pw").unwrap();
        sealed[0] = b'X';
        assert!(matches!(
            obfuscated_open(&sealed, "pw"),
            Err(CryptoError::Format(_))
        ));
    }
}
