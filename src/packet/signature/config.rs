use byteorder::{BigEndian, ByteOrder};
use chrono::{SubsecRound, Utc};
use derive_builder::Builder;
use digest::DynDigest;
use rand::{CryptoRng, Rng};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::signature::{Signature, SignatureType, SignatureVersion, Subpacket, SubpacketData};
use crate::packet::CertificationTarget;
use crate::ser::Serialize;
use crate::types::{KeyTrait, KeyVersion, PublicKeyTrait, SecretKeyTrait, Version};

/// Everything that goes into a signature except the signature itself:
/// version, type, algorithms and the two subpacket areas. Building and
/// verification both hash exactly this data.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "crate::errors::Error"))]
pub struct SignatureConfig {
    #[builder(default = "SignatureVersion::V4")]
    pub version: SignatureVersion,
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    #[builder(default = "HashAlgorithm::SHA256")]
    pub hash_alg: HashAlgorithm,
    #[builder(default)]
    pub hashed_subpackets: Vec<Subpacket>,
    #[builder(default)]
    pub unhashed_subpackets: Vec<Subpacket>,
    /// Random salt, hashed ahead of the data. v6 only.
    #[builder(default)]
    pub salt: Vec<u8>,
}

impl SignatureConfig {
    pub fn v4(typ: SignatureType, pub_alg: PublicKeyAlgorithm, hash_alg: HashAlgorithm) -> Self {
        SignatureConfig {
            version: SignatureVersion::V4,
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets: Vec::new(),
            unhashed_subpackets: Vec::new(),
            salt: Vec::new(),
        }
    }

    pub fn v6<R: Rng + CryptoRng>(
        rng: &mut R,
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
    ) -> Result<Self> {
        let mut salt = vec![0u8; hash_alg.salt_size()?];
        rng.fill_bytes(&mut salt);

        Ok(SignatureConfig {
            version: SignatureVersion::V6,
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets: Vec::new(),
            unhashed_subpackets: Vec::new(),
            salt,
        })
    }

    /// A config matching the given signing key, preloaded with creation
    /// time and issuer subpackets.
    pub fn from_key<R: Rng + CryptoRng>(
        rng: &mut R,
        key: &(impl SecretKeyTrait + KeyTrait),
        typ: SignatureType,
    ) -> Result<Self> {
        let mut config = match key.version() {
            KeyVersion::V6 => Self::v6(rng, typ, key.algorithm(), HashAlgorithm::SHA512)?,
            _ => Self::v4(typ, key.algorithm(), HashAlgorithm::SHA256),
        };

        config.hashed_subpackets = vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc::now().trunc_subsecs(0),
            )),
            Subpacket::regular(SubpacketData::IssuerFingerprint(
                key.version(),
                key.fingerprint(),
            )),
        ];

        // v6 issuers reference the fingerprint only
        if key.version() <= KeyVersion::V4 {
            config.unhashed_subpackets =
                vec![Subpacket::regular(SubpacketData::Issuer(key.key_id()))];
        }

        Ok(config)
    }

    /// Serializes the hashed metadata (version through hashed subpackets)
    /// into the hasher, returning its length for the trailer.
    pub(crate) fn hash_signature_data(&self, hasher: &mut Box<dyn DynDigest>) -> Result<usize> {
        let mut subpackets = Vec::new();
        for packet in &self.hashed_subpackets {
            packet.to_writer(&mut subpackets)?;
        }

        let mut header = vec![
            self.version as u8,
            self.typ as u8,
            self.pub_alg.into(),
            self.hash_alg as u8,
        ];

        match self.version {
            SignatureVersion::V4 => {
                let mut len = [0u8; 2];
                BigEndian::write_u16(&mut len, subpackets.len() as u16);
                header.extend_from_slice(&len);
            }
            SignatureVersion::V6 => {
                let mut len = [0u8; 4];
                BigEndian::write_u32(&mut len, subpackets.len() as u32);
                header.extend_from_slice(&len);
            }
        }

        hasher.update(&header);
        hasher.update(&subpackets);

        Ok(header.len() + subpackets.len())
    }

    /// The final trailer: version, `0xFF` and the length of the hashed
    /// metadata.
    pub(crate) fn trailer(&self, len: usize) -> Vec<u8> {
        let mut trailer = vec![self.version as u8, 0xff, 0, 0, 0, 0];
        BigEndian::write_u32(&mut trailer[2..], len as u32);
        trailer
    }

    /// `H(salt? ‖ content ‖ metadata ‖ trailer)`
    pub(crate) fn calculate_digest(&self, content: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = self.hash_alg.new_hasher()?;

        if self.version == SignatureVersion::V6 {
            crate::ensure_eq!(
                self.salt.len(),
                self.hash_alg.salt_size()?,
                "invalid salt length"
            );
            hasher.update(&self.salt);
        }

        hasher.update(content);
        let len = self.hash_signature_data(&mut hasher)?;
        hasher.update(&self.trailer(len));

        Ok(hasher.finalize().to_vec())
    }

    /// Signs `content`, producing a complete signature packet.
    pub fn sign(
        self,
        key: &impl SecretKeyTrait,
        key_pw: &str,
        content: &[u8],
    ) -> Result<Signature> {
        let digest = self.calculate_digest(content)?;
        let signed_hash_value = [digest[0], digest[1]];
        let signature = key.create_signature(key_pw, self.hash_alg, &digest)?;

        Ok(Signature::new(
            Version::New,
            self,
            signed_hash_value,
            signature,
        ))
    }

    /// Signs a certification over `primary ‖ target`.
    pub fn sign_certification(
        self,
        key: &impl SecretKeyTrait,
        key_pw: &str,
        primary: &impl PublicKeyTrait,
        target: &impl CertificationTarget,
    ) -> Result<Signature> {
        let mut content = primary.to_signable_bytes()?;
        content.extend(target.to_certification_bytes()?);

        self.sign(key, key_pw, &content)
    }

    /// Signs directly over `target_key` (direct key signatures and key
    /// revocations).
    pub fn sign_key(
        self,
        key: &impl SecretKeyTrait,
        key_pw: &str,
        target_key: &impl PublicKeyTrait,
    ) -> Result<Signature> {
        let content = target_key.to_signable_bytes()?;
        self.sign(key, key_pw, &content)
    }

    /// Signs over `primary ‖ subkey` (subkey bindings and revocations, and
    /// the embedded primary key binding where the subkey is the signer).
    pub fn sign_key_binding(
        self,
        signer: &impl SecretKeyTrait,
        key_pw: &str,
        primary: &impl PublicKeyTrait,
        subkey: &impl PublicKeyTrait,
    ) -> Result<Signature> {
        let mut content = primary.to_signable_bytes()?;
        content.extend(subkey.to_signable_bytes()?);

        self.sign(signer, key_pw, &content)
    }
}
