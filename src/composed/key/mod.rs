//! Key generation: assembling fresh packets into a signed transferable key.

use chrono::{DateTime, SubsecRound, Utc};
use derive_builder::Builder;
use log::debug;
use rand::{CryptoRng, Rng};

use crate::composed::signed_key::{
    SignedKeyDetails, SignedSecretKey, SignedSecretSubKey,
};
use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{
    self, KeyFlags, SignatureConfig, SignatureType, Subpacket, SubpacketData, UserId,
};
use crate::types::{
    CompressionAlgorithm, KeyVersion, PlainSecretParams, PublicParams, SecretParams, SignedUser,
    Version,
};

/// The key algorithms a fresh key can be generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Encryption & Signing with RSA and the given bitsize.
    Rsa(u32),
    /// Signing with Curve25519, legacy MPI encoding (v4 keys).
    Ed25519Legacy,
    /// Signing with Ed25519, native encoding (RFC 9580).
    Ed25519,
    /// Encrypting with Curve25519 via ECDH (v4 keys).
    ECDH,
    /// Encrypting with X25519, native encoding (RFC 9580).
    X25519,
}

impl KeyType {
    pub fn to_alg(self) -> PublicKeyAlgorithm {
        match self {
            KeyType::Rsa(_) => PublicKeyAlgorithm::RSA,
            KeyType::Ed25519Legacy => PublicKeyAlgorithm::EdDSALegacy,
            KeyType::Ed25519 => PublicKeyAlgorithm::Ed25519,
            KeyType::ECDH => PublicKeyAlgorithm::ECDH,
            KeyType::X25519 => PublicKeyAlgorithm::X25519,
        }
    }

    pub fn can_sign(self) -> bool {
        self.to_alg().can_sign()
    }

    pub fn generate<R: Rng + CryptoRng>(
        self,
        rng: &mut R,
    ) -> Result<(PublicParams, PlainSecretParams)> {
        match self {
            KeyType::Rsa(bit_size) => crate::crypto::rsa::generate_key(rng, bit_size as usize),
            KeyType::Ed25519Legacy => Ok(crate::crypto::eddsa::generate_key_legacy(rng)),
            KeyType::Ed25519 => Ok(crate::crypto::eddsa::generate_key(rng)),
            KeyType::ECDH => Ok(crate::crypto::ecdh::generate_key(rng)),
            KeyType::X25519 => Ok(crate::crypto::x25519::generate_key(rng)),
        }
    }

    /// The legacy curve25519 encodings are v4 only; the native encodings
    /// are required for v6 keys.
    pub(crate) fn check_version(self, version: KeyVersion) -> Result<()> {
        match (self, version) {
            (KeyType::Ed25519Legacy | KeyType::ECDH, KeyVersion::V6) => {
                Err(Error::InvalidArgument(format!(
                    "{:?} can not be used with v6 keys",
                    self
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "crate::errors::Error"))]
pub struct SecretKeyParams {
    key_type: KeyType,

    // -- Keyflags
    #[builder(default = "true")]
    can_create_certificates: bool,
    #[builder(default = "true")]
    can_sign: bool,
    #[builder(default)]
    can_encrypt: bool,

    // -- Preferences
    /// List of symmetric algorithms that indicate which algorithms the key
    /// holder prefers to use.
    #[builder(
        default = "vec![SymmetricKeyAlgorithm::AES256, SymmetricKeyAlgorithm::AES192, SymmetricKeyAlgorithm::AES128]"
    )]
    preferred_symmetric_algorithms: Vec<SymmetricKeyAlgorithm>,
    /// List of hash algorithms that indicate which algorithms the key
    /// holder prefers to use.
    #[builder(default = "vec![HashAlgorithm::SHA256, HashAlgorithm::SHA512]")]
    preferred_hash_algorithms: Vec<HashAlgorithm>,
    /// List of compression algorithms that indicate which algorithms the
    /// key holder prefers to use.
    #[builder(
        default = "vec![CompressionAlgorithm::Uncompressed, CompressionAlgorithm::ZIP, CompressionAlgorithm::ZLIB, CompressionAlgorithm::BZip2]"
    )]
    preferred_compression_algorithms: Vec<CompressionAlgorithm>,

    primary_user_id: String,
    #[builder(default)]
    user_ids: Vec<String>,

    #[builder(default)]
    passphrase: Option<String>,
    #[builder(default = "Utc::now().trunc_subsecs(0)")]
    created_at: DateTime<Utc>,
    #[builder(default)]
    version: KeyVersion,
    /// Seconds after creation at which the key expires, if any.
    #[builder(default)]
    expiration: Option<u32>,

    #[builder(default)]
    subkeys: Vec<SubkeyParams>,
}

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "crate::errors::Error"))]
pub struct SubkeyParams {
    key_type: KeyType,

    #[builder(default)]
    can_sign: bool,
    #[builder(default = "true")]
    can_encrypt: bool,
    #[builder(default)]
    expiration: Option<u32>,
}

impl SecretKeyParamsBuilder {
    fn validate(&self) -> std::result::Result<(), Error> {
        let version = self.version.unwrap_or_default();

        if let Some(key_type) = &self.key_type {
            key_type.check_version(version)?;

            if let KeyType::Rsa(size) = key_type {
                if *size < 2048 {
                    return Err(Error::InvalidArgument(
                        "keys with less than 2048 bits are considered insecure".into(),
                    ));
                }
            }

            if !key_type.can_sign() {
                return Err(Error::InvalidArgument(
                    "the primary key must be signing capable".into(),
                ));
            }
        }

        if let Some(subkeys) = &self.subkeys {
            for subkey in subkeys {
                subkey.key_type.check_version(version)?;
            }
        }

        Ok(())
    }

    pub fn user_id<V: Into<String>>(&mut self, value: V) -> &mut Self {
        match self.user_ids {
            Some(ref mut ids) => ids.push(value.into()),
            None => self.user_ids = Some(vec![value.into()]),
        }
        self
    }

    pub fn subkey(&mut self, value: SubkeyParams) -> &mut Self {
        match self.subkeys {
            Some(ref mut subkeys) => subkeys.push(value),
            None => self.subkeys = Some(vec![value]),
        }
        self
    }
}

impl SecretKeyParams {
    /// Generates the key material and signs the graph: one self
    /// certification per user id, a binding per subkey and, for v6 keys, a
    /// direct key signature carrying the preferences.
    pub fn generate<R: Rng + CryptoRng>(self, rng: &mut R) -> Result<SignedSecretKey> {
        let version = self.version;
        let (public_params, plain) = self.key_type.generate(rng)?;

        let primary_key = packet::SecretKey::new(
            packet::PublicKey::new(
                Version::New,
                version,
                self.key_type.to_alg(),
                self.created_at,
                public_params,
            )?,
            SecretParams::Plain(plain),
        )?;

        let mut primary_flags = KeyFlags::default();
        primary_flags.set_certify(self.can_create_certificates);
        primary_flags.set_sign(self.can_sign);
        primary_flags.set_encrypt_comms(self.can_encrypt);
        primary_flags.set_encrypt_storage(self.can_encrypt);

        // modification detection is always announced; v6 keys also announce
        // the AEAD based packet
        let features: Vec<u8> = match version {
            KeyVersion::V6 => vec![0x01 | 0x08],
            _ => vec![0x01],
        };

        let preference_subpackets = |config: &mut SignatureConfig| {
            config.hashed_subpackets.push(Subpacket::regular(
                SubpacketData::PreferredSymmetricAlgorithms(
                    self.preferred_symmetric_algorithms.clone(),
                ),
            ));
            config.hashed_subpackets.push(Subpacket::regular(
                SubpacketData::PreferredHashAlgorithms(self.preferred_hash_algorithms.clone()),
            ));
            config.hashed_subpackets.push(Subpacket::regular(
                SubpacketData::PreferredCompressionAlgorithms(
                    self.preferred_compression_algorithms.clone(),
                ),
            ));
            config
                .hashed_subpackets
                .push(Subpacket::regular(SubpacketData::Features(features.clone())));
            if let Some(expiry) = self.expiration {
                config
                    .hashed_subpackets
                    .push(Subpacket::regular(SubpacketData::KeyExpirationTime(expiry)));
            }
        };

        // -- user ids, the first one is primary
        let mut users = Vec::new();
        for (i, id) in std::iter::once(&self.primary_user_id)
            .chain(self.user_ids.iter())
            .enumerate()
        {
            let user_id = UserId::from_str(Version::New, id);

            let mut config =
                SignatureConfig::from_key(rng, &primary_key, SignatureType::CertGeneric)?;
            if i == 0 {
                config
                    .hashed_subpackets
                    .push(Subpacket::regular(SubpacketData::IsPrimary(true)));
            }
            config
                .hashed_subpackets
                .push(Subpacket::regular(SubpacketData::KeyFlags(primary_flags)));
            preference_subpackets(&mut config);

            let sig = config.sign_certification(&primary_key, "", &primary_key, &user_id)?;

            users.push(SignedUser {
                id: user_id,
                self_certifications: vec![sig],
                other_certifications: Vec::new(),
                revocation_certifications: Vec::new(),
            });
        }

        // -- v6 keys require a direct key signature holding the
        // preferences
        let mut direct_signatures = Vec::new();
        if version == KeyVersion::V6 {
            let mut config = SignatureConfig::from_key(rng, &primary_key, SignatureType::Key)?;
            config
                .hashed_subpackets
                .push(Subpacket::regular(SubpacketData::KeyFlags(primary_flags)));
            preference_subpackets(&mut config);

            direct_signatures.push(config.sign_key(&primary_key, "", &primary_key)?);
        }

        // -- subkeys with their binding signatures
        let mut secret_subkeys = Vec::new();
        for params in &self.subkeys {
            let (public_params, plain) = params.key_type.generate(rng)?;
            let subkey = packet::SecretSubkey::new(
                packet::PublicSubkey::new(
                    Version::New,
                    version,
                    params.key_type.to_alg(),
                    self.created_at,
                    public_params,
                )?,
                SecretParams::Plain(plain),
            )?;

            let mut flags = KeyFlags::default();
            flags.set_sign(params.can_sign);
            flags.set_encrypt_comms(params.can_encrypt);
            flags.set_encrypt_storage(params.can_encrypt);

            let mut config =
                SignatureConfig::from_key(rng, &primary_key, SignatureType::SubkeyBinding)?;
            config
                .hashed_subpackets
                .push(Subpacket::regular(SubpacketData::KeyFlags(flags)));
            if let Some(expiry) = params.expiration {
                config
                    .hashed_subpackets
                    .push(Subpacket::regular(SubpacketData::KeyExpirationTime(expiry)));
            }

            // signing capable subkeys embed a reverse binding made by the
            // subkey itself
            if params.can_sign {
                debug!("creating embedded primary key binding");
                let back_config =
                    SignatureConfig::from_key(rng, &subkey, SignatureType::KeyBinding)?;
                let back_sig =
                    back_config.sign_key_binding(&subkey, "", &primary_key, &subkey)?;
                config
                    .hashed_subpackets
                    .push(Subpacket::regular(SubpacketData::EmbeddedSignature(
                        Box::new(back_sig),
                    )));
            }

            let binding = config.sign_key_binding(&primary_key, "", &primary_key, &subkey)?;

            secret_subkeys.push(SignedSecretSubKey {
                key: subkey,
                binding_signatures: vec![binding],
                revocation_signatures: Vec::new(),
            });
        }

        let signed = SignedSecretKey::new(
            primary_key,
            SignedKeyDetails::new(Vec::new(), direct_signatures, users, Vec::new()),
            Vec::new(),
            secret_subkeys,
        );

        // -- passphrase protection, after all signatures are made
        match self.passphrase {
            Some(ref pw) => {
                let (sym, aead) = match version {
                    KeyVersion::V6 => (SymmetricKeyAlgorithm::AES256, Some(AeadAlgorithm::Ocb)),
                    _ => (SymmetricKeyAlgorithm::AES256, None),
                };
                signed.lock(rng, pw, sym, aead)
            }
            None => Ok(signed),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::composed::Deserializable;
    use crate::types::KeyTrait;

    #[test]
    fn test_key_gen_ed25519_legacy() {
        let mut rng = ChaCha8Rng::seed_from_u64(51);

        let params = SecretKeyParamsBuilder::default()
            .key_type(KeyType::Ed25519Legacy)
            .primary_user_id("Me <me@mail.com>".into())
            .subkey(
                SubkeyParamsBuilder::default()
                    .key_type(KeyType::ECDH)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let key = params.generate(&mut rng).expect("failed to generate key");
        key.verify().expect("invalid key");

        assert_eq!(key.secret_subkeys.len(), 1);
        assert!(key
            .decryption_keys(None, Utc::now())
            .first()
            .is_some());

        let armored = key.to_armored_string(None).unwrap();
        let parsed = SignedSecretKey::from_string(&armored).expect("failed to parse key");
        parsed.verify().expect("invalid parsed key");
        assert_eq!(parsed.key_id(), key.key_id());
    }

    #[test]
    fn test_key_gen_v6_requires_native_algorithms() {
        let res = SecretKeyParamsBuilder::default()
            .key_type(KeyType::Ed25519Legacy)
            .version(KeyVersion::V6)
            .primary_user_id("X <x@y>".into())
            .build();
        assert!(res.is_err());
    }

    #[test]
    fn test_key_gen_v6_ed25519() {
        let mut rng = ChaCha8Rng::seed_from_u64(52);

        let params = SecretKeyParamsBuilder::default()
            .key_type(KeyType::Ed25519)
            .version(KeyVersion::V6)
            .primary_user_id("Six <six@mail.com>".into())
            .subkey(
                SubkeyParamsBuilder::default()
                    .key_type(KeyType::X25519)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let key = params.generate(&mut rng).expect("failed to generate key");
        key.verify().expect("invalid key");

        // a v6 key must carry a direct key signature
        assert_eq!(key.details.direct_signatures.len(), 1);
        assert_eq!(key.fingerprint().len(), 32);
    }
}
