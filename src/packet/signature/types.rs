use bitfield::bitfield;
use chrono::{DateTime, Duration, Utc};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::signature::SignatureConfig;
use crate::packet::CertificationTarget;
use crate::types::{
    CompressionAlgorithm, KeyId, KeyVersion, PublicKeyTrait, SignatureBytes, Tag, Version,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum SignatureVersion {
    V4 = 4,
    V6 = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    /// Signature of a binary document.
    /// This means the signer owns it, created it, or certifies that it
    /// has not been modified.
    Binary = 0x00,
    /// Signature of a canonical text document.
    /// The signature is calculated over the text data with its line
    /// endings converted to <CR><LF>.
    Text = 0x01,
    /// Standalone signature.
    /// This signature is a signature of only its own subpacket contents.
    Standalone = 0x02,
    /// Generic certification of a User ID and Public-Key packet.
    /// The issuer of this certification does not make any particular
    /// assertion as to how well the certifier has checked that the owner
    /// of the key is in fact the person described by the User ID.
    CertGeneric = 0x10,
    /// Persona certification of a User ID and Public-Key packet.
    /// The issuer of this certification has not done any verification of
    /// the claim that the owner of this key is the User ID specified.
    CertPersona = 0x11,
    /// Casual certification of a User ID and Public-Key packet.
    /// The issuer of this certification has done some casual verification
    /// of the claim of identity.
    CertCasual = 0x12,
    /// Positive certification of a User ID and Public-Key packet.
    /// The issuer of this certification has done substantial verification
    /// of the claim of identity.
    CertPositive = 0x13,
    /// Subkey Binding Signature.
    /// A statement by the top-level signing key that indicates that it
    /// owns the subkey. A signature that binds a signing subkey MUST have
    /// an Embedded Signature subpacket with a 0x19 signature made by the
    /// signing subkey on the primary key and subkey.
    SubkeyBinding = 0x18,
    /// Primary Key Binding Signature.
    /// A statement by a signing subkey, indicating that it is owned by
    /// the primary key and subkey.
    KeyBinding = 0x19,
    /// Signature directly on a key.
    /// It binds the information in the Signature subpackets to the key,
    /// and is appropriate for statements about the key itself rather than
    /// the binding between a key and a name.
    Key = 0x1F,
    /// Key revocation signature.
    /// The signature is calculated directly on the key being revoked. A
    /// revoked key is not to be used.
    KeyRevocation = 0x20,
    /// Subkey revocation signature.
    /// The signature is calculated directly on the subkey being revoked.
    SubkeyRevocation = 0x28,
    /// Certification revocation signature.
    /// This signature revokes an earlier User ID certification signature
    /// (signature class 0x10 through 0x13) or direct-key signature. It is
    /// computed over the same data as the certificate that it revokes.
    CertRevocation = 0x30,
    /// Timestamp signature.
    /// This signature is only meaningful for the timestamp contained in it.
    Timestamp = 0x40,
    /// Third-Party Confirmation signature.
    /// This signature is a signature over some other OpenPGP Signature
    /// packet(s). It is analogous to a notary seal on the signed data.
    ThirdParty = 0x50,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
/// Codes for revocation reasons
pub enum RevocationCode {
    /// No reason specified (key revocations or cert revocations)
    NoReason = 0,
    /// Key is superseded (key revocations)
    KeySuperseded = 1,
    /// Key material has been compromised (key revocations)
    KeyCompromised = 2,
    /// Key is retired and no longer used (key revocations)
    KeyRetired = 3,
    /// User ID information is no longer valid (cert revocations)
    CertUserIdInvalid = 32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationKey {
    pub class: u8,
    pub algorithm: PublicKeyAlgorithm,
    pub fingerprint: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notation {
    pub readable: bool,
    pub name: String,
    pub value: String,
}

bitfield! {
    #[derive(Default, Clone, Copy, PartialEq, Eq)]
    pub struct KeyFlags(u8);
    impl Debug;
    pub certify, set_certify: 0;
    pub sign, set_sign: 1;
    pub encrypt_comms, set_encrypt_comms: 2;
    pub encrypt_storage, set_encrypt_storage: 3;
    pub split_key, set_split_key: 4;
    pub authentication, set_authentication: 5;
    pub group_key, set_group_key: 7;
}

impl From<u8> for KeyFlags {
    fn from(v: u8) -> Self {
        KeyFlags(v)
    }
}

impl From<KeyFlags> for u8 {
    fn from(flags: KeyFlags) -> Self {
        flags.0
    }
}

/// A subpacket with its critical bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
}

impl Subpacket {
    pub fn regular(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: false,
            data,
        }
    }

    pub fn critical(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: true,
            data,
        }
    }
}

/// The contents of the different signature subpackets.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.2.3.7
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// Seconds after the creation time after which the signature expires.
    SignatureExpirationTime(u32),
    ExportableCertification(bool),
    TrustSignature(u8, u8),
    RegularExpression(String),
    Revocable(bool),
    /// Seconds after the key creation time after which the key expires.
    KeyExpirationTime(u32),
    PreferredSymmetricAlgorithms(Vec<SymmetricKeyAlgorithm>),
    RevocationKey(RevocationKey),
    Issuer(KeyId),
    NotationData(Notation),
    PreferredHashAlgorithms(Vec<HashAlgorithm>),
    PreferredCompressionAlgorithms(Vec<CompressionAlgorithm>),
    KeyServerPreferences(Vec<u8>),
    PreferredKeyServer(String),
    IsPrimary(bool),
    PolicyURI(String),
    KeyFlags(KeyFlags),
    SignersUserID(String),
    RevocationReason(RevocationCode, String),
    Features(Vec<u8>),
    SignatureTarget(PublicKeyAlgorithm, HashAlgorithm, Vec<u8>),
    EmbeddedSignature(Box<Signature>),
    IssuerFingerprint(KeyVersion, Vec<u8>),
    PreferredAead(Vec<(SymmetricKeyAlgorithm, AeadAlgorithm)>),
    /// Unrecognized subpacket, carried opaquely.
    Other(u8, Vec<u8>),
}

impl SubpacketData {
    pub fn typ(&self) -> u8 {
        match self {
            SubpacketData::SignatureCreationTime(_) => 2,
            SubpacketData::SignatureExpirationTime(_) => 3,
            SubpacketData::ExportableCertification(_) => 4,
            SubpacketData::TrustSignature(_, _) => 5,
            SubpacketData::RegularExpression(_) => 6,
            SubpacketData::Revocable(_) => 7,
            SubpacketData::KeyExpirationTime(_) => 9,
            SubpacketData::PreferredSymmetricAlgorithms(_) => 11,
            SubpacketData::RevocationKey(_) => 12,
            SubpacketData::Issuer(_) => 16,
            SubpacketData::NotationData(_) => 20,
            SubpacketData::PreferredHashAlgorithms(_) => 21,
            SubpacketData::PreferredCompressionAlgorithms(_) => 22,
            SubpacketData::KeyServerPreferences(_) => 23,
            SubpacketData::PreferredKeyServer(_) => 24,
            SubpacketData::IsPrimary(_) => 25,
            SubpacketData::PolicyURI(_) => 26,
            SubpacketData::KeyFlags(_) => 27,
            SubpacketData::SignersUserID(_) => 28,
            SubpacketData::RevocationReason(_, _) => 29,
            SubpacketData::Features(_) => 30,
            SubpacketData::SignatureTarget(_, _, _) => 31,
            SubpacketData::EmbeddedSignature(_) => 32,
            SubpacketData::IssuerFingerprint(_, _) => 33,
            SubpacketData::PreferredAead(_) => 39,
            SubpacketData::Other(typ, _) => *typ,
        }
    }
}

/// Signature Packet
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    packet_version: Version,
    pub config: SignatureConfig,
    /// The first two octets of the digest, stored for a quick sanity check.
    pub signed_hash_value: [u8; 2],
    pub signature: SignatureBytes,
}

impl Signature {
    pub fn new(
        packet_version: Version,
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: SignatureBytes,
    ) -> Self {
        Signature {
            packet_version,
            config,
            signed_hash_value,
            signature,
        }
    }

    pub fn packet_version(&self) -> Version {
        self.packet_version
    }

    pub fn tag(&self) -> Tag {
        Tag::Signature
    }

    pub fn typ(&self) -> SignatureType {
        self.config.typ
    }

    fn hashed_subpackets(&self) -> impl Iterator<Item = &SubpacketData> {
        self.config.hashed_subpackets.iter().map(|p| &p.data)
    }

    fn all_subpackets(&self) -> impl Iterator<Item = &SubpacketData> {
        self.config
            .hashed_subpackets
            .iter()
            .chain(self.config.unhashed_subpackets.iter())
            .map(|p| &p.data)
    }

    /// The time the signature was made, from the hashed area.
    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.hashed_subpackets().find_map(|p| match p {
            SubpacketData::SignatureCreationTime(t) => Some(t),
            _ => None,
        })
    }

    /// The issuer key id, from either area.
    pub fn issuer(&self) -> Option<&KeyId> {
        self.all_subpackets().find_map(|p| match p {
            SubpacketData::Issuer(id) => Some(id),
            _ => None,
        })
    }

    /// The issuer fingerprint, from the hashed area.
    pub fn issuer_fingerprint(&self) -> Option<&[u8]> {
        self.hashed_subpackets().find_map(|p| match p {
            SubpacketData::IssuerFingerprint(_, fp) => Some(&fp[..]),
            _ => None,
        })
    }

    /// Seconds after key creation at which the bound key expires.
    pub fn key_expiration_time(&self) -> Option<u32> {
        self.hashed_subpackets().find_map(|p| match p {
            SubpacketData::KeyExpirationTime(d) => Some(*d),
            _ => None,
        })
    }

    /// Seconds after signature creation at which it expires.
    pub fn signature_expiration_time(&self) -> Option<u32> {
        self.hashed_subpackets().find_map(|p| match p {
            SubpacketData::SignatureExpirationTime(d) => Some(*d),
            _ => None,
        })
    }

    pub fn key_flags(&self) -> KeyFlags {
        self.hashed_subpackets()
            .find_map(|p| match p {
                SubpacketData::KeyFlags(flags) => Some(*flags),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn is_primary(&self) -> bool {
        self.hashed_subpackets()
            .find_map(|p| match p {
                SubpacketData::IsPrimary(v) => Some(*v),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn preferred_symmetric_algs(&self) -> &[SymmetricKeyAlgorithm] {
        self.hashed_subpackets()
            .find_map(|p| match p {
                SubpacketData::PreferredSymmetricAlgorithms(algs) => Some(&algs[..]),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn preferred_hash_algs(&self) -> &[HashAlgorithm] {
        self.hashed_subpackets()
            .find_map(|p| match p {
                SubpacketData::PreferredHashAlgorithms(algs) => Some(&algs[..]),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn preferred_compression_algs(&self) -> &[CompressionAlgorithm] {
        self.hashed_subpackets()
            .find_map(|p| match p {
                SubpacketData::PreferredCompressionAlgorithms(algs) => Some(&algs[..]),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn features(&self) -> &[u8] {
        self.hashed_subpackets()
            .find_map(|p| match p {
                SubpacketData::Features(f) => Some(&f[..]),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn embedded_signature(&self) -> Option<&Signature> {
        self.all_subpackets().find_map(|p| match p {
            SubpacketData::EmbeddedSignature(sig) => Some(&**sig),
            _ => None,
        })
    }

    pub fn revocation_reason(&self) -> Option<(RevocationCode, &str)> {
        self.hashed_subpackets().find_map(|p| match p {
            SubpacketData::RevocationReason(code, reason) => Some((*code, reason.as_str())),
            _ => None,
        })
    }

    pub fn is_certification(&self) -> bool {
        matches!(
            self.typ(),
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
        )
    }

    /// Checks issuer, algorithm, time window and critical subpackets
    /// against the given signer at time `at`.
    fn check_constraints(&self, signer: &impl PublicKeyTrait, at: DateTime<Utc>) -> Result<()> {
        if let Some(issuer) = self.issuer() {
            if issuer != &signer.key_id() && !issuer.is_wildcard() {
                return Err(Error::SignatureError(format!(
                    "issuer key id mismatch: signature by {}, verifying with {}",
                    issuer,
                    signer.key_id()
                )));
            }
        }

        if let Some(fp) = self.issuer_fingerprint() {
            if fp != signer.fingerprint() {
                return Err(Error::SignatureError(
                    "issuer fingerprint mismatch".into(),
                ));
            }
        }

        if self.config.pub_alg != signer.algorithm() {
            return Err(Error::SignatureError(format!(
                "key algorithm mismatch: {:?} != {:?}",
                self.config.pub_alg,
                signer.algorithm()
            )));
        }

        if let Some(created) = self.created() {
            if created > &at {
                return Err(Error::SignatureError(
                    "signature created in the future".into(),
                ));
            }
            if let Some(expiration) = self.signature_expiration_time() {
                if *created + Duration::seconds(i64::from(expiration)) < at {
                    return Err(Error::SignatureError("signature expired".into()));
                }
            }
        } else if self.config.version == SignatureVersion::V4
            || self.config.version == SignatureVersion::V6
        {
            return Err(Error::SignatureError(
                "missing signature creation time".into(),
            ));
        }

        if let Some(unknown) = self
            .config
            .hashed_subpackets
            .iter()
            .find(|p| p.is_critical && matches!(p.data, SubpacketData::Other(_, _)))
        {
            return Err(Error::SignatureError(format!(
                "unknown critical subpacket {}",
                unknown.data.typ()
            )));
        }

        Ok(())
    }

    /// Recomputes the digest over `content`, checks the stored prefix and
    /// dispatches to the algorithm specific verification.
    fn verify_content(&self, signer: &impl PublicKeyTrait, content: &[u8]) -> Result<()> {
        self.check_constraints(signer, Utc::now())?;

        let digest = self.config.calculate_digest(content)?;
        if digest[0..2] != self.signed_hash_value {
            return Err(Error::SignatureError(
                "signed hash prefix does not match".into(),
            ));
        }

        signer.verify_signature(self.config.hash_alg, &digest, &self.signature)
    }

    /// Verifies a signature over document data. For text signatures the
    /// caller passes the canonicalized bytes.
    pub fn verify(&self, signer: &impl PublicKeyTrait, data: &[u8]) -> Result<()> {
        self.verify_content(signer, data)
    }

    /// Verifies a certification or certification revocation over
    /// `primary ‖ target`.
    pub fn verify_certification(
        &self,
        signer: &impl PublicKeyTrait,
        primary: &impl PublicKeyTrait,
        target: &impl CertificationTarget,
    ) -> Result<()> {
        let mut content = primary.to_signable_bytes()?;
        content.extend(target.to_certification_bytes()?);

        self.verify_content(signer, &content)
    }

    /// Verifies a direct key signature or key revocation, self issued.
    pub fn verify_key(&self, key: &impl PublicKeyTrait) -> Result<()> {
        self.verify_key_by(key, key)
    }

    /// Verifies a signature directly on `key`, issued by `signer`.
    pub fn verify_key_by(
        &self,
        signer: &impl PublicKeyTrait,
        key: &impl PublicKeyTrait,
    ) -> Result<()> {
        let content = key.to_signable_bytes()?;
        self.verify_content(signer, &content)
    }

    /// Verifies a subkey binding (or revocation, or embedded primary key
    /// binding) over `primary ‖ subkey`.
    pub fn verify_key_binding(
        &self,
        signer: &impl PublicKeyTrait,
        primary: &impl PublicKeyTrait,
        subkey: &impl PublicKeyTrait,
    ) -> Result<()> {
        let mut content = primary.to_signable_bytes()?;
        content.extend(subkey.to_signable_bytes()?);

        self.verify_content(signer, &content)
    }
}
