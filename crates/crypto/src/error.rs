use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// The authentication tag did not verify: wrong password, corrupted or
    /// truncated blob. No plaintext is ever returned in this case.
    #[error("authentication failed: wrong password or corrupted data")]
    Authentication,

    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("invalid envelope: {0}")]
    Format(String),
}
