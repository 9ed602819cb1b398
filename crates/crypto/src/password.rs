use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Random bytes behind each generated password.
pub const PASSWORD_ENTROPY_BYTES: usize = 24;

/// Generate a fresh per-file password: 24 random bytes, base64url without padding.
pub fn generate_password() -> String {
    let mut bytes = [0u8; PASSWORD_ENTROPY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_shape() {
        let password = generate_password();
        assert_eq!(password.len(), 32);
        assert!(password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_passwords_differ() {
        assert_ne!(generate_password(), generate_password());
    }
}
