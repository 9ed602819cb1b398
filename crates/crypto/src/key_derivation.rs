use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

use crate::{CryptoError, SALT_LEN};

/// AES-256 key size.
pub const KEY_LEN: usize = 32;

/// Iteration count used for the salted plain envelope.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// How a per-file password becomes an AES-256 key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivation {
    /// PBKDF2-HMAC-SHA512 over the password and a per-encryption salt.
    Pbkdf2Sha512 { iterations: u32 },
    /// SHA-256 of the password. The salt is ignored.
    Sha256,
}

impl Default for KeyDerivation {
    fn default() -> Self {
        KeyDerivation::Pbkdf2Sha512 {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

impl KeyDerivation {
    pub fn derive(&self, password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
        let mut key = [0u8; KEY_LEN];
        match *self {
            KeyDerivation::Pbkdf2Sha512 { iterations } => {
                if iterations == 0 {
                    return Err(CryptoError::KeyDerivationFailed(
                        "iteration count must be positive".into(),
                    ));
                }
                pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut key);
            }
            KeyDerivation::Sha256 => {
                key.copy_from_slice(&Sha256::digest(password));
            }
        }
        Ok(key)
    }
}

/// Generate a random 64-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
