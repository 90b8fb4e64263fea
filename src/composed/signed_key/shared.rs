use std::collections::BTreeMap;
use std::io;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::composed::signed_key::{SignedPublicKey, SignedSecretKey};
use crate::errors::Result;
use crate::packet::{self, Signature, SignatureType};
use crate::ser::Serialize;
use crate::types::{KeyId, KeyTrait, PublicKeyTrait, SignedUser, SignedUserAttribute, Tag};

/// Shared details between secret and public keys: the signatures and users
/// hanging off the primary key.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedKeyDetails {
    pub revocation_signatures: Vec<Signature>,
    pub direct_signatures: Vec<Signature>,
    pub users: Vec<SignedUser>,
    pub user_attributes: Vec<SignedUserAttribute>,
}

impl SignedKeyDetails {
    pub fn new(
        revocation_signatures: Vec<Signature>,
        direct_signatures: Vec<Signature>,
        users: Vec<SignedUser>,
        user_attributes: Vec<SignedUserAttribute>,
    ) -> Self {
        let users = users
            .into_iter()
            .filter(|user| {
                if user.self_certifications.is_empty() && user.other_certifications.is_empty() {
                    warn!("ignoring unsigned {}", user.id.id());
                    false
                } else {
                    true
                }
            })
            .collect();

        let user_attributes = user_attributes
            .into_iter()
            .filter(|attr| {
                if attr.signatures.is_empty() {
                    warn!("ignoring unsigned user attribute");
                    false
                } else {
                    true
                }
            })
            .collect();

        SignedKeyDetails {
            revocation_signatures,
            direct_signatures,
            users,
            user_attributes,
        }
    }

    /// The key expiration, taken from the primary user self certification.
    pub fn expires_at(&self, key: &impl KeyTrait) -> Option<DateTime<Utc>> {
        let user = self
            .users
            .iter()
            .find(|u| u.is_primary())
            .or_else(|| self.users.first())?;

        let expiry = user
            .self_certifications
            .iter()
            .find_map(|sig| sig.key_expiration_time())?;

        Some(*key.created_at() + Duration::seconds(i64::from(expiry)))
    }

    fn verify_users(&self, key: &impl PublicKeyTrait) -> Result<()> {
        for user in &self.users {
            user.verify(key)?;
        }

        Ok(())
    }

    fn verify_attributes(&self, key: &impl PublicKeyTrait) -> Result<()> {
        for attr in &self.user_attributes {
            attr.verify(key)?;
        }

        Ok(())
    }

    fn verify_revocation_signatures(&self, key: &impl PublicKeyTrait) -> Result<()> {
        for sig in &self.revocation_signatures {
            // only self revocations can be checked here; revocations by
            // other keys need that key and are the caller's business
            if sig.issuer().map(|id| id == &key.key_id()).unwrap_or(true) {
                sig.verify_key(key)?;
            } else {
                debug!("skipping third party revocation by {:?}", sig.issuer());
            }
        }

        Ok(())
    }

    fn verify_direct_signatures(&self, key: &impl PublicKeyTrait) -> Result<()> {
        for sig in &self.direct_signatures {
            if sig.issuer().map(|id| id == &key.key_id()).unwrap_or(true) {
                sig.verify_key(key)?;
            } else {
                debug!("skipping third party direct signature by {:?}", sig.issuer());
            }
        }

        Ok(())
    }

    pub fn verify(&self, key: &impl PublicKeyTrait) -> Result<()> {
        crate::ensure!(!self.users.is_empty(), "missing user ids");

        self.verify_users(key)?;
        self.verify_attributes(key)?;
        self.verify_revocation_signatures(key)?;
        self.verify_direct_signatures(key)?;

        Ok(())
    }

    /// True if a valid self revocation exists that covers time `t`.
    pub fn is_revoked_at(&self, key: &impl PublicKeyTrait, t: DateTime<Utc>) -> bool {
        self.revocation_signatures.iter().any(|sig| {
            sig.typ() == SignatureType::KeyRevocation
                && sig.issuer().map(|id| id == &key.key_id()).unwrap_or(true)
                && sig.created().map(|c| *c <= t).unwrap_or(false)
                && sig.verify_key(key).is_ok()
        })
    }

    /// Whether any user id is usable at time `t`. The key graph is only
    /// valid when at least one is.
    pub fn has_valid_user_at(&self, key: &impl PublicKeyTrait, t: DateTime<Utc>) -> bool {
        self.users.iter().any(|user| user.is_valid_at(key, t))
    }
}

impl Serialize for SignedKeyDetails {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for sig in &self.revocation_signatures {
            packet::write_packet(writer, Tag::Signature, sig)?;
        }

        for sig in &self.direct_signatures {
            packet::write_packet(writer, Tag::Signature, sig)?;
        }

        for user in &self.users {
            user.to_writer(writer)?;
        }

        for attr in &self.user_attributes {
            attr.to_writer(writer)?;
        }

        Ok(())
    }
}

/// Either a signed public or secret key, as encountered when parsing mixed
/// keyrings.
#[derive(Debug, PartialEq, Eq, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum PublicOrSecret {
    Public(SignedPublicKey),
    Secret(SignedSecretKey),
}

impl PublicOrSecret {
    pub fn verify(&self) -> Result<()> {
        match self {
            PublicOrSecret::Public(k) => k.verify(),
            PublicOrSecret::Secret(k) => k.verify(),
        }
    }

    pub fn to_armored_writer(
        &self,
        writer: &mut impl io::Write,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Result<()> {
        match self {
            PublicOrSecret::Public(k) => k.to_armored_writer(writer, headers),
            PublicOrSecret::Secret(k) => k.to_armored_writer(writer, headers),
        }
    }

    pub fn to_armored_string(&self, headers: Option<&BTreeMap<String, String>>) -> Result<String> {
        match self {
            PublicOrSecret::Public(k) => k.to_armored_string(headers),
            PublicOrSecret::Secret(k) => k.to_armored_string(headers),
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, PublicOrSecret::Public(_))
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, PublicOrSecret::Secret(_))
    }
}

impl TryFrom<PublicOrSecret> for SignedSecretKey {
    type Error = crate::errors::Error;

    fn try_from(value: PublicOrSecret) -> Result<Self> {
        match value {
            PublicOrSecret::Secret(k) => Ok(k),
            PublicOrSecret::Public(_) => {
                Err(crate::format_err!("can not convert a public into a secret key"))
            }
        }
    }
}

impl TryFrom<PublicOrSecret> for SignedPublicKey {
    type Error = crate::errors::Error;

    fn try_from(value: PublicOrSecret) -> Result<Self> {
        match value {
            PublicOrSecret::Public(k) => Ok(k),
            PublicOrSecret::Secret(_) => {
                Err(crate::format_err!("can not convert a secret into a public key"))
            }
        }
    }
}

impl Serialize for PublicOrSecret {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicOrSecret::Public(k) => k.to_writer(writer),
            PublicOrSecret::Secret(k) => k.to_writer(writer),
        }
    }
}

impl KeyTrait for PublicOrSecret {
    fn version(&self) -> crate::types::KeyVersion {
        match self {
            PublicOrSecret::Public(k) => k.version(),
            PublicOrSecret::Secret(k) => k.version(),
        }
    }

    fn fingerprint(&self) -> Vec<u8> {
        match self {
            PublicOrSecret::Public(k) => k.fingerprint(),
            PublicOrSecret::Secret(k) => k.fingerprint(),
        }
    }

    fn key_id(&self) -> KeyId {
        match self {
            PublicOrSecret::Public(k) => k.key_id(),
            PublicOrSecret::Secret(k) => k.key_id(),
        }
    }

    fn algorithm(&self) -> crate::crypto::public_key::PublicKeyAlgorithm {
        match self {
            PublicOrSecret::Public(k) => k.algorithm(),
            PublicOrSecret::Secret(k) => k.algorithm(),
        }
    }

    fn created_at(&self) -> &DateTime<Utc> {
        match self {
            PublicOrSecret::Public(k) => k.created_at(),
            PublicOrSecret::Secret(k) => k.created_at(),
        }
    }
}
