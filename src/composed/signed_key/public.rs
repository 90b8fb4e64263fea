use std::collections::BTreeMap;
use std::io;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::armor;
use crate::composed::signed_key::{SignedKeyDetails, SignedSecretKey};
use crate::errors::Result;
use crate::packet::{self, Signature, SignatureType};
use crate::ser::Serialize;
use crate::types::{KeyId, KeyTrait, KeyVersion, PublicKeyTrait, Tag};

/// A validated-shape public key: primary key, its signatures and users,
/// and the bound subkeys. Certificate semantics are checked by `verify`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedPublicKey {
    pub primary_key: packet::PublicKey,
    pub details: SignedKeyDetails,
    pub public_subkeys: Vec<SignedPublicSubKey>,
}

/// A subkey with its binding and revocation signatures.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedPublicSubKey {
    pub key: packet::PublicSubkey,
    pub binding_signatures: Vec<Signature>,
    pub revocation_signatures: Vec<Signature>,
}

impl SignedPublicSubKey {
    /// Splits the signatures following a subkey packet.
    pub fn new(key: packet::PublicSubkey, signatures: Vec<Signature>) -> Self {
        let (revocation_signatures, binding_signatures) = signatures
            .into_iter()
            .partition(|sig| sig.typ() == SignatureType::SubkeyRevocation);

        SignedPublicSubKey {
            key,
            binding_signatures,
            revocation_signatures,
        }
    }

    /// Every subkey needs a binding that verifies against the primary;
    /// signing capable subkeys additionally need a valid embedded back
    /// signature by the subkey.
    pub fn verify(&self, primary: &impl PublicKeyTrait) -> Result<()> {
        crate::ensure!(
            !self.binding_signatures.is_empty(),
            "missing subkey binding signature"
        );

        let mut last_err = None;
        for sig in &self.binding_signatures {
            match self.verify_binding(primary, sig) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!("invalid binding signature: {:?}", err);
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.expect("at least one binding"))
    }

    fn verify_binding(&self, primary: &impl PublicKeyTrait, sig: &Signature) -> Result<()> {
        sig.verify_key_binding(primary, primary, &self.key)?;

        if sig.key_flags().sign() {
            let embedded = sig.embedded_signature().ok_or_else(|| {
                crate::format_err!("missing embedded signature for signing subkey")
            })?;
            crate::ensure_eq!(
                embedded.typ(),
                SignatureType::KeyBinding,
                "invalid embedded signature type"
            );
            embedded.verify_key_binding(&self.key, primary, &self.key)?;
        }

        Ok(())
    }

    fn valid_binding_at(
        &self,
        primary: &impl PublicKeyTrait,
        t: DateTime<Utc>,
    ) -> Option<&Signature> {
        self.binding_signatures.iter().find(|sig| {
            sig.created().map(|c| *c <= t).unwrap_or(false)
                && self.verify_binding(primary, sig).is_ok()
        })
    }

    /// Whether the subkey is usable at `t`: a binding verifies, the key
    /// has not expired and no valid revocation covers `t`.
    pub fn is_valid_at(&self, primary: &impl PublicKeyTrait, t: DateTime<Utc>) -> bool {
        let Some(binding) = self.valid_binding_at(primary, t) else {
            return false;
        };

        if let Some(expiry) = binding.key_expiration_time() {
            if *self.key.created_at() + Duration::seconds(i64::from(expiry)) <= t {
                return false;
            }
        }

        let revoked = self.revocation_signatures.iter().any(|rev| {
            rev.created().map(|c| *c <= t).unwrap_or(false)
                && rev.verify_key_binding(primary, primary, &self.key).is_ok()
        });

        !revoked
    }

    /// Whether this subkey may be used for encryption at `t`.
    pub fn is_encryption_key_at(&self, primary: &impl PublicKeyTrait, t: DateTime<Utc>) -> bool {
        if !self.key.is_encryption_key() {
            return false;
        }

        match self.valid_binding_at(primary, t) {
            Some(binding) => {
                let flags = binding.key_flags();
                (flags.encrypt_comms() || flags.encrypt_storage())
                    && self.is_valid_at(primary, t)
            }
            None => false,
        }
    }

    /// Whether this subkey may be used for signing at `t`.
    pub fn is_signing_key_at(&self, primary: &impl PublicKeyTrait, t: DateTime<Utc>) -> bool {
        if !self.key.is_signing_key() {
            return false;
        }

        match self.valid_binding_at(primary, t) {
            Some(binding) => binding.key_flags().sign() && self.is_valid_at(primary, t),
            None => false,
        }
    }
}

impl Serialize for SignedPublicSubKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, Tag::PublicSubkey, &self.key)?;
        for sig in self
            .binding_signatures
            .iter()
            .chain(self.revocation_signatures.iter())
        {
            packet::write_packet(writer, Tag::Signature, sig)?;
        }

        Ok(())
    }
}

impl SignedPublicKey {
    pub fn new(
        primary_key: packet::PublicKey,
        details: SignedKeyDetails,
        public_subkeys: Vec<SignedPublicSubKey>,
    ) -> Self {
        SignedPublicKey {
            primary_key,
            details,
            public_subkeys,
        }
    }

    /// Verifies all certificate semantics: users, direct and revocation
    /// signatures and every subkey binding.
    pub fn verify(&self) -> Result<()> {
        self.details.verify(&self.primary_key)?;

        for subkey in &self.public_subkeys {
            subkey.verify(&self.primary_key)?;
        }

        Ok(())
    }

    /// Whether the key graph is usable at time `t`: created before `t`,
    /// some user id valid, not revoked and not expired.
    pub fn verify_at(&self, t: DateTime<Utc>) -> Result<()> {
        crate::ensure!(
            self.primary_key.created_at() <= &t,
            "key not yet created at {}",
            t
        );

        if self.details.is_revoked_at(&self.primary_key, t) {
            return Err(crate::errors::Error::KeyInvalid("key is revoked".into()));
        }

        if !self.details.has_valid_user_at(&self.primary_key, t) {
            return Err(crate::errors::Error::KeyInvalid(
                "no valid user id".into(),
            ));
        }

        if let Some(expiry) = self.details.expires_at(&self.primary_key) {
            if expiry <= t {
                return Err(crate::errors::Error::KeyInvalid("key is expired".into()));
            }
        }

        Ok(())
    }

    /// The keys to encrypt to, newest subkeys first, the primary appended
    /// last if it is itself encryption capable.
    pub fn encryption_keys(&self, t: DateTime<Utc>) -> Vec<&dyn PublicKeyTrait> {
        let mut subkeys: Vec<&SignedPublicSubKey> = self
            .public_subkeys
            .iter()
            .filter(|sub| sub.is_encryption_key_at(&self.primary_key, t))
            .collect();
        subkeys.sort_by(|a, b| b.key.created_at().cmp(a.key.created_at()));

        let mut keys: Vec<&dyn PublicKeyTrait> =
            subkeys.into_iter().map(|s| &s.key as &dyn PublicKeyTrait).collect();

        if self.primary_key.is_encryption_key() {
            keys.push(&self.primary_key as &dyn PublicKeyTrait);
        }

        keys
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.details.expires_at(&self.primary_key)
    }

    pub fn to_armored_writer(
        &self,
        writer: &mut impl io::Write,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Result<()> {
        let bytes = self.to_bytes()?;
        armor::write(writer, &armor::BlockType::PublicKey, headers, &bytes)
    }

    pub fn to_armored_string(&self, headers: Option<&BTreeMap<String, String>>) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf, headers)?;
        Ok(String::from_utf8(buf).expect("armor is ascii"))
    }
}

impl Serialize for SignedPublicKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, Tag::PublicKey, &self.primary_key)?;
        self.details.to_writer(writer)?;
        for subkey in &self.public_subkeys {
            subkey.to_writer(writer)?;
        }

        Ok(())
    }
}

impl KeyTrait for SignedPublicKey {
    fn version(&self) -> KeyVersion {
        self.primary_key.version()
    }

    fn fingerprint(&self) -> Vec<u8> {
        self.primary_key.fingerprint()
    }

    fn key_id(&self) -> KeyId {
        self.primary_key.key_id()
    }

    fn algorithm(&self) -> crate::crypto::public_key::PublicKeyAlgorithm {
        self.primary_key.algorithm()
    }

    fn created_at(&self) -> &DateTime<Utc> {
        self.primary_key.created_at()
    }
}

impl From<SignedSecretKey> for SignedPublicKey {
    fn from(value: SignedSecretKey) -> Self {
        let primary = value.primary_key.public_key().clone();
        let mut subkeys: Vec<SignedPublicSubKey> = value.public_subkeys;

        for sub in value.secret_subkeys {
            subkeys.push(SignedPublicSubKey {
                key: sub.key.public_key().clone(),
                binding_signatures: sub.binding_signatures,
                revocation_signatures: sub.revocation_signatures,
            });
        }

        SignedPublicKey::new(primary, value.details, subkeys)
    }
}
