use proptest::prelude::*;

use driveseal_crypto::decrypt::open;
use driveseal_crypto::encrypt::seal;
use driveseal_crypto::obfuscate::{obfuscated_open, obfuscated_seal, FAKE_SIGNATURE};
use driveseal_crypto::{CryptoError, EnvelopeFormat};

proptest! {
    // Each plain case runs two 100k-iteration key derivations.
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_plain_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2048), password in ".{0,40}") {
        let sealed = seal(&data, &password).unwrap();
        prop_assert_eq!(sealed.len(), EnvelopeFormat::Plain.sealed_len(data.len()));
        prop_assert_eq!(open(&sealed, &password).unwrap(), data);
    }

    #[test]
    fn prop_plain_other_password_fails(data in proptest::collection::vec(any::<u8>(), 0..256), password in "[a-z]{1,16}") {
        let sealed = seal(&data, &password).unwrap();
        let other = format!("{password}x");
        prop_assert!(matches!(open(&sealed, &other), Err(CryptoError::Authentication)));
    }
}

proptest! {
    #[test]
    fn prop_obfuscated_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..4096), password in ".{0,40}") {
        let sealed = obfuscated_seal(&data, &password).unwrap();
        prop_assert_eq!(&sealed[..FAKE_SIGNATURE.len()], &FAKE_SIGNATURE[..]);
        prop_assert_eq!(sealed.len(), EnvelopeFormat::Obfuscated.sealed_len(data.len()));
        prop_assert_eq!(obfuscated_open(&sealed, &password).unwrap(), data);
    }

    #[test]
    fn prop_obfuscated_rejects_misaligned_length(data in proptest::collection::vec(any::<u8>(), 0..512), extra in 1usize..4) {
        let mut sealed = obfuscated_seal(&data, "pw").unwrap();
        sealed.extend(std::iter::repeat(0u8).take(extra));
        prop_assert!(matches!(obfuscated_open(&sealed, "pw"), Err(CryptoError::Format(_))));
    }
}
