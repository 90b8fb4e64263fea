mod config;
mod de;
mod ser;
mod types;

pub use self::config::*;
pub use self::types::*;

#[cfg(test)]
mod tests {
    use chrono::{SubsecRound, TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::errors::Error;
    use crate::packet::{PublicKey, SecretKey};
    use crate::ser::Serialize;
    use crate::types::{
        KeyId, KeyTrait, KeyVersion, Mpi, PlainSecretParams, PublicKeyTrait, SecretParams,
        SignatureBytes, Version,
    };

    fn sig_roundtrip(sig: &Signature) {
        let bytes = sig.to_bytes().unwrap();
        let back = Signature::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(&back, sig);
    }

    #[test]
    fn test_signature_roundtrip_v4() {
        let mut config = SignatureConfig::v4(
            SignatureType::Binary,
            PublicKeyAlgorithm::RSA,
            HashAlgorithm::SHA256,
        );
        config.hashed_subpackets = vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            )),
            Subpacket::regular(SubpacketData::KeyFlags(0b0000_0011.into())),
            Subpacket::critical(SubpacketData::IssuerFingerprint(
                KeyVersion::V4,
                vec![0xaa; 20],
            )),
        ];
        config.unhashed_subpackets = vec![Subpacket::regular(SubpacketData::Issuer(
            KeyId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
        ))];

        let sig = Signature::new(
            Version::New,
            config,
            [0xab, 0xcd],
            SignatureBytes::Mpis(vec![Mpi::from_slice(&[0x11; 64])]),
        );

        sig_roundtrip(&sig);
    }

    #[test]
    fn test_signature_roundtrip_v6() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut config = SignatureConfig::v6(
            &mut rng,
            SignatureType::Binary,
            PublicKeyAlgorithm::Ed25519,
            HashAlgorithm::SHA512,
        )
        .unwrap();
        assert_eq!(config.salt.len(), 32);

        config.hashed_subpackets = vec![Subpacket::regular(
            SubpacketData::SignatureCreationTime(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        )];

        let sig = Signature::new(
            Version::New,
            config,
            [0x01, 0x02],
            SignatureBytes::Native(vec![0x44; 64]),
        );

        sig_roundtrip(&sig);
    }

    #[test]
    fn test_subpacket_roundtrip_unknown_critical() {
        let sub = Subpacket::critical(SubpacketData::Other(100, vec![1, 2, 3]));
        let bytes = sub.to_bytes().unwrap();
        // type octet carries the critical bit
        assert_eq!(bytes[1], 100 | 0x80);
    }

    fn test_key(rng: &mut ChaCha8Rng) -> SecretKey {
        let (public_params, plain) = crate::crypto::eddsa::generate_key_legacy(rng);
        let details = PublicKey::new(
            Version::New,
            KeyVersion::V4,
            PublicKeyAlgorithm::EdDSALegacy,
            Utc::now().trunc_subsecs(0),
            public_params,
        )
        .unwrap();

        SecretKey::new(details, SecretParams::Plain(plain)).unwrap()
    }

    #[test]
    fn test_sign_and_verify_binary() {
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let key = test_key(&mut rng);

        let config = SignatureConfig::from_key(&mut rng, &key, SignatureType::Binary).unwrap();
        let sig = config.sign(&key, "", b"the message").unwrap();

        sig.verify(&key, b"the message").unwrap();
        assert!(sig.verify(&key, b"not the message").is_err());
    }

    #[test]
    fn test_digest_prefix_matches() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let key = test_key(&mut rng);

        let config = SignatureConfig::from_key(&mut rng, &key, SignatureType::Binary).unwrap();
        let digest = config.calculate_digest(b"data").unwrap();
        let sig = config.sign(&key, "", b"data").unwrap();

        assert_eq!(&digest[0..2], &sig.signed_hash_value);
    }

    #[test]
    fn test_wrong_key_rejected_by_issuer_check() {
        let mut rng = ChaCha8Rng::seed_from_u64(24);
        let key = test_key(&mut rng);
        let other = test_key(&mut rng);

        let config = SignatureConfig::from_key(&mut rng, &key, SignatureType::Binary).unwrap();
        let sig = config.sign(&key, "", b"data").unwrap();

        let err = sig.verify(&other, b"data").unwrap_err();
        assert!(matches!(err, Error::SignatureError(_)));
    }

    #[test]
    fn test_critical_unknown_subpacket_fails_verification() {
        let mut rng = ChaCha8Rng::seed_from_u64(25);
        let key = test_key(&mut rng);

        let mut config =
            SignatureConfig::from_key(&mut rng, &key, SignatureType::Binary).unwrap();
        config
            .hashed_subpackets
            .push(Subpacket::critical(SubpacketData::Other(110, vec![0])));
        let sig = config.sign(&key, "", b"data").unwrap();

        let err = sig.verify(&key, b"data").unwrap_err();
        assert!(matches!(err, Error::SignatureError(_)));
    }

    #[test]
    fn test_v6_sign_verify_with_salt() {
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        let (public_params, plain) = crate::crypto::eddsa::generate_key(&mut rng);
        let details = PublicKey::new(
            Version::New,
            KeyVersion::V6,
            PublicKeyAlgorithm::Ed25519,
            Utc::now().trunc_subsecs(0),
            public_params,
        )
        .unwrap();
        let key = SecretKey::new(details, SecretParams::Plain(plain)).unwrap();

        let config = SignatureConfig::from_key(&mut rng, &key, SignatureType::Binary).unwrap();
        assert_eq!(config.version, SignatureVersion::V6);

        let sig = config.sign(&key, "", b"salted payload").unwrap();
        sig.verify(&key, b"salted payload").unwrap();

        // verify the fingerprint based issuer made it in
        assert_eq!(sig.issuer_fingerprint().unwrap(), key.fingerprint());
        assert!(sig.issuer().is_none());

        sig_roundtrip(&sig);
    }
}
