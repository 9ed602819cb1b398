pub mod decrypt;
pub mod encrypt;
pub mod key_derivation;
pub mod obfuscate;
pub mod password;

mod error;
pub use error::CryptoError;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Plain envelope layout: salt(64) + iv(16) + tag(16) + ciphertext.
pub const SALT_LEN: usize = 64;
pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

/// Header size of the plain envelope: salt(64) + iv(16) + tag(16) = 96 bytes
pub const HEADER_SIZE: usize = SALT_LEN + IV_LEN + TAG_LEN;

/// Which envelope layout a blob was sealed with.
///
/// Stored next to each file's metadata so that a blob is always opened with
/// the layout it was written in, regardless of the server's current default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeFormat {
    #[default]
    Plain,
    Obfuscated,
}

impl EnvelopeFormat {
    pub fn seal(self, plaintext: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
        match self {
            EnvelopeFormat::Plain => encrypt::seal(plaintext, password),
            EnvelopeFormat::Obfuscated => obfuscate::obfuscated_seal(plaintext, password),
        }
    }

    pub fn open(self, blob: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
        match self {
            EnvelopeFormat::Plain => decrypt::open(blob, password),
            EnvelopeFormat::Obfuscated => obfuscate::obfuscated_open(blob, password),
        }
    }

    /// Size of the sealed blob for a plaintext of `plaintext_len` bytes.
    pub fn sealed_len(self, plaintext_len: usize) -> usize {
        match self {
            EnvelopeFormat::Plain => HEADER_SIZE + plaintext_len,
            EnvelopeFormat::Obfuscated => obfuscate::sealed_len(plaintext_len),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeFormat::Plain => "plain",
            EnvelopeFormat::Obfuscated => "obfuscated",
        }
    }
}

impl fmt::Display for EnvelopeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvelopeFormat {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(EnvelopeFormat::Plain),
            "obfuscated" => Ok(EnvelopeFormat::Obfuscated),
            other => Err(CryptoError::Format(format!(
                "unknown envelope format: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dispatch_roundtrip() {
        for format in [EnvelopeFormat::Plain, EnvelopeFormat::Obfuscated] {
            let sealed = format.seal(b"dispatch", "pw").unwrap();
            assert_eq!(sealed.len(), format.sealed_len(8));
            assert_eq!(format.open(&sealed, "pw").unwrap(), b"dispatch");
        }
    }

    #[test]
    fn test_formats_are_not_interchangeable() {
        let sealed = EnvelopeFormat::Obfuscated.seal(b"abc", "pw").unwrap();
        assert!(EnvelopeFormat::Plain.open(&sealed, "pw").is_err());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("plain".parse::<EnvelopeFormat>().unwrap(), EnvelopeFormat::Plain);
        assert_eq!(
            " Obfuscated ".parse::<EnvelopeFormat>().unwrap(),
            EnvelopeFormat::Obfuscated
        );
        assert!("zip".parse::<EnvelopeFormat>().is_err());
    }

    #[test]
    fn test_format_serde_is_lowercase() {
        let json = serde_json::to_string(&EnvelopeFormat::Obfuscated).unwrap();
        assert_eq!(json, "\"obfuscated\"");
        let back: EnvelopeFormat = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(back, EnvelopeFormat::Plain);
    }
}
