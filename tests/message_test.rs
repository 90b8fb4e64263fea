use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use opgp::composed::{
    CleartextSignedMessage, Deserializable, KeyType, Message, SecretKeyParamsBuilder, Seipd,
    SignedPublicKey, SignedSecretKey, StandaloneSignature, SubkeyParamsBuilder,
};
use opgp::crypto::aead::AeadAlgorithm;
use opgp::crypto::sym::SymmetricKeyAlgorithm;
use opgp::errors::Error;
use opgp::types::{CompressionAlgorithm, KeyVersion, PublicKeyTrait};

const MSG: &[u8] = b"hello openpgp";

fn test_key(rng: &mut ChaCha8Rng, version: KeyVersion) -> SignedSecretKey {
    let (primary, subkey) = match version {
        KeyVersion::V6 => (KeyType::Ed25519, KeyType::X25519),
        _ => (KeyType::Ed25519Legacy, KeyType::ECDH),
    };

    SecretKeyParamsBuilder::default()
        .key_type(primary)
        .version(version)
        .primary_user_id("Test <test@example.org>".into())
        .subkey(
            SubkeyParamsBuilder::default()
                .key_type(subkey)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
        .generate(rng)
        .expect("failed to generate key")
}

#[test]
fn test_encrypt_decrypt_with_key() {
    let _ = pretty_env_logger::try_init();
    let mut rng = ChaCha8Rng::seed_from_u64(200);
    let key = test_key(&mut rng, KeyVersion::V4);
    let public = SignedPublicKey::from(key.clone());

    let now = chrono::Utc::now();
    let recipients = public.encryption_keys(now);
    assert_eq!(recipients.len(), 1, "the ECDH subkey is selected");

    let encrypted = Message::new_literal_bytes("", MSG)
        .encrypt(
            &mut rng,
            &recipients,
            &[],
            SymmetricKeyAlgorithm::AES128,
            Seipd::V1,
        )
        .expect("failed to encrypt");

    // armor roundtrip uses the MESSAGE block type
    let armored = encrypted.to_armored_string(None).unwrap();
    assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----"));
    let parsed = Message::from_string(&armored).unwrap();

    let decrypted = parsed.decrypt(&[], &[(&key, "")]).expect("failed to decrypt");
    assert_eq!(decrypted.get_content().unwrap(), MSG);
}

#[test]
fn test_encrypt_decrypt_with_password_only() {
    let mut rng = ChaCha8Rng::seed_from_u64(201);

    let encrypted = Message::new_literal_bytes("", MSG)
        .encrypt(
            &mut rng,
            &[],
            &["secret"],
            SymmetricKeyAlgorithm::AES128,
            Seipd::V1,
        )
        .expect("failed to encrypt");

    let decrypted = encrypted
        .decrypt(&["secret"], &[])
        .expect("failed to decrypt");
    assert_eq!(decrypted.get_content().unwrap(), MSG);

    // a wrong password exhausts all candidates
    assert!(matches!(
        encrypted.decrypt(&["wrong"], &[]),
        Err(Error::SessionKeyDecryptionFailed)
    ));
}

#[test]
fn test_encrypt_decrypt_seipd_v2() {
    let mut rng = ChaCha8Rng::seed_from_u64(202);
    let key = test_key(&mut rng, KeyVersion::V6);
    let public = SignedPublicKey::from(key.clone());

    let now = chrono::Utc::now();
    let recipients = public.encryption_keys(now);

    for aead in [AeadAlgorithm::Eax, AeadAlgorithm::Ocb, AeadAlgorithm::Gcm] {
        let encrypted = Message::new_literal_bytes("", MSG)
            .encrypt(
                &mut rng,
                &recipients,
                &["backup-pass"],
                SymmetricKeyAlgorithm::AES256,
                Seipd::V2 {
                    aead,
                    chunk_size: 6,
                },
            )
            .expect("failed to encrypt");

        let via_key = encrypted.decrypt(&[], &[(&key, "")]).unwrap();
        assert_eq!(via_key.get_content().unwrap(), MSG, "{:?}", aead);

        let via_pw = encrypted.decrypt(&["backup-pass"], &[]).unwrap();
        assert_eq!(via_pw.get_content().unwrap(), MSG, "{:?}", aead);
    }
}

#[test]
fn test_decoy_recipient_is_not_tried() {
    let mut rng = ChaCha8Rng::seed_from_u64(203);
    let key = test_key(&mut rng, KeyVersion::V4);
    let decoy = test_key(&mut rng, KeyVersion::V4);
    let public = SignedPublicKey::from(key.clone());

    let now = chrono::Utc::now();
    let encrypted = Message::new_literal_bytes("", MSG)
        .encrypt(
            &mut rng,
            &public.encryption_keys(now),
            &[],
            SymmetricKeyAlgorithm::AES128,
            Seipd::V1,
        )
        .unwrap();

    // the decoy's key id matches no PKESK, so no unwrap is attempted for it
    let Message::Encrypted { esk, .. } = &encrypted else {
        panic!("expected an encrypted message");
    };
    let opgp::composed::Esk::PublicKeyEncryptedSessionKey(pkesk) = &esk[0] else {
        panic!("expected a PKESK");
    };
    for candidate in decoy.decryption_keys(None, now) {
        assert!(!pkesk.matches_key(&candidate));
    }

    // decryption succeeds with both keys supplied, the valid one selected
    let decrypted = encrypted
        .decrypt(&[], &[(&decoy, ""), (&key, "")])
        .expect("failed to decrypt");
    assert_eq!(decrypted.get_content().unwrap(), MSG);
}

#[test]
fn test_sign_and_verify() {
    let mut rng = ChaCha8Rng::seed_from_u64(204);
    let key = test_key(&mut rng, KeyVersion::V4);
    let public = SignedPublicKey::from(key.clone());

    let signed = Message::new_literal("", "signed content")
        .sign(&mut rng, &key.primary_key, "")
        .expect("failed to sign");

    assert!(signed.is_one_pass_signed());
    signed.verify(&public.primary_key).expect("verification failed");

    // roundtrip through the wire format
    let armored = signed.to_armored_string(None).unwrap();
    let parsed = Message::from_string(&armored).unwrap();
    parsed.verify(&public.primary_key).expect("verification failed");

    // a different key does not verify
    let other = test_key(&mut rng, KeyVersion::V4);
    assert!(parsed.verify(&other.primary_key).is_err());
}

#[test]
fn test_sign_detached() {
    let mut rng = ChaCha8Rng::seed_from_u64(205);
    let key = test_key(&mut rng, KeyVersion::V4);
    let public = SignedPublicKey::from(key.clone());

    let message = Message::new_literal_bytes("payload.bin", &[0x42; 1024]);
    let sig = message
        .sign_detached(&mut rng, &key.primary_key, "")
        .expect("failed to sign");

    let armored = sig.to_armored_string(None).unwrap();
    assert!(armored.starts_with("-----BEGIN PGP SIGNATURE-----"));

    let parsed = StandaloneSignature::from_string(&armored).unwrap();
    parsed.verify(&public.primary_key, &[0x42; 1024]).unwrap();

    // a flipped payload byte fails verification
    let mut tampered = [0x42; 1024];
    tampered[77] ^= 1;
    assert!(matches!(
        parsed.verify(&public.primary_key, &tampered),
        Err(Error::SignatureError(_))
    ));
}

#[test]
fn test_sign_with_v6_key() {
    let mut rng = ChaCha8Rng::seed_from_u64(206);
    let key = test_key(&mut rng, KeyVersion::V6);

    // lock the key the way a stored key would be
    let locked = key
        .lock(
            &mut rng,
            "pw",
            SymmetricKeyAlgorithm::AES128,
            Some(AeadAlgorithm::Ocb),
        )
        .unwrap();

    let payload = vec![0xa5u8; 1024];
    let message = Message::new_literal_bytes("data.bin", &payload);
    let sig = message
        .sign_detached(&mut rng, &locked.primary_key, "pw")
        .expect("failed to sign with locked key");

    let public = SignedPublicKey::from(key);
    sig.verify(&public.primary_key, &payload).unwrap();

    let mut tampered = payload;
    tampered[0] ^= 1;
    assert!(matches!(
        sig.verify(&public.primary_key, &tampered),
        Err(Error::SignatureError(_))
    ));
}

#[test]
fn test_compressed_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(207);

    let message = Message::new_literal_bytes("", &[0x61; 4096]);
    let compressed = message.compress(CompressionAlgorithm::ZLIB).unwrap();

    let encrypted = compressed
        .encrypt(
            &mut rng,
            &[],
            &["zip it"],
            SymmetricKeyAlgorithm::AES256,
            Seipd::V1,
        )
        .unwrap();

    // decrypt transparently decompresses
    let decrypted = encrypted.decrypt(&["zip it"], &[]).unwrap();
    assert_eq!(decrypted.get_content().unwrap(), vec![0x61; 4096]);
}

#[test]
fn test_cleartext_signature() {
    let mut rng = ChaCha8Rng::seed_from_u64(208);
    let key = test_key(&mut rng, KeyVersion::V4);
    let public = SignedPublicKey::from(key.clone());

    // trailing spaces on line 1 are stripped before hashing
    let text = "Line 1   \r\nLine 2\r\n";
    let msg = CleartextSignedMessage::sign(&mut rng, text, &key, "").unwrap();
    assert_eq!(msg.text(), "Line 1\nLine 2");

    msg.verify(&public.primary_key).expect("verification failed");

    let armored = msg.to_armored_string(None).unwrap();
    assert!(armored.starts_with("-----BEGIN PGP SIGNED MESSAGE-----"));
    assert!(armored.contains("Hash: "));

    let parsed = CleartextSignedMessage::from_string(&armored).unwrap();
    assert_eq!(parsed.text(), msg.text());
    parsed.verify(&public.primary_key).expect("verification failed");
}

#[test]
fn test_cleartext_with_dashes() {
    let mut rng = ChaCha8Rng::seed_from_u64(209);
    let key = test_key(&mut rng, KeyVersion::V4);
    let public = SignedPublicKey::from(key.clone());

    let text = "normal\n- dashed\n-----BEGIN PGP looks like armor";
    let msg = CleartextSignedMessage::sign(&mut rng, text, &key, "").unwrap();

    let armored = msg.to_armored_string(None).unwrap();
    assert!(armored.contains("\n- - dashed\n"));
    assert!(armored.contains("\n- -----BEGIN PGP looks like armor\n"));

    let parsed = CleartextSignedMessage::from_string(&armored).unwrap();
    assert_eq!(parsed.text(), text);
    parsed.verify(&public.primary_key).unwrap();
}

#[test]
fn test_encrypt_requires_a_recipient() {
    let mut rng = ChaCha8Rng::seed_from_u64(210);
    let res = Message::new_literal_bytes("", MSG).encrypt(
        &mut rng,
        &[],
        &[],
        SymmetricKeyAlgorithm::AES128,
        Seipd::V1,
    );
    assert!(res.is_err());
}

#[test]
fn test_empty_password_is_invalid() {
    let mut rng = ChaCha8Rng::seed_from_u64(211);
    let res = Message::new_literal_bytes("", MSG).encrypt(
        &mut rng,
        &[],
        &[""],
        SymmetricKeyAlgorithm::AES128,
        Seipd::V1,
    );
    assert!(matches!(res, Err(Error::InvalidArgument(_))));
}
