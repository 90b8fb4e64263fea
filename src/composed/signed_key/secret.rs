use std::collections::BTreeMap;
use std::io;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use rand::{CryptoRng, Rng};

use crate::armor;
use crate::composed::signed_key::{SignedKeyDetails, SignedPublicKey, SignedPublicSubKey};
use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{
    self, PublicKeyEncryptedSessionKey, RevocationCode, Signature, SignatureConfig,
    SignatureType, Subpacket, SubpacketData, UserId,
};
use crate::ser::Serialize;
use crate::types::{
    KeyId, KeyTrait, KeyVersion, PublicKeyTrait, SecretKeyRepr, SecretKeyTrait, SignedUser, Tag,
    Version,
};

/// A signed secret key: the key graph with the secret halves of the
/// primary and the subkeys.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedSecretKey {
    pub primary_key: packet::SecretKey,
    pub details: SignedKeyDetails,
    pub public_subkeys: Vec<SignedPublicSubKey>,
    pub secret_subkeys: Vec<SignedSecretSubKey>,
}

/// A secret subkey with its binding and revocation signatures.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedSecretSubKey {
    pub key: packet::SecretSubkey,
    pub binding_signatures: Vec<Signature>,
    pub revocation_signatures: Vec<Signature>,
}

/// A key packet selected for decryption.
#[derive(Debug, Clone, Copy)]
pub enum DecryptionKey<'a> {
    Subkey(&'a packet::SecretSubkey),
    Primary(&'a packet::SecretKey),
}

/// A key packet selected for signing.
#[derive(Debug, Clone, Copy)]
pub enum SigningKey<'a> {
    Subkey(&'a packet::SecretSubkey),
    Primary(&'a packet::SecretKey),
}

impl SignedSecretSubKey {
    /// Splits the signatures following a subkey packet.
    pub fn new(key: packet::SecretSubkey, signatures: Vec<Signature>) -> Self {
        let (revocation_signatures, binding_signatures) = signatures
            .into_iter()
            .partition(|sig| sig.typ() == SignatureType::SubkeyRevocation);

        SignedSecretSubKey {
            key,
            binding_signatures,
            revocation_signatures,
        }
    }

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

impl Serialize for SignedSecretSubKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, Tag::SecretSubkey, &self.key)?;
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

impl SignedSecretKey {
    pub fn new(
        primary_key: packet::SecretKey,
        details: SignedKeyDetails,
        public_subkeys: Vec<SignedPublicSubKey>,
        secret_subkeys: Vec<SignedSecretSubKey>,
    ) -> Self {
        SignedSecretKey {
            primary_key,
            details,
            public_subkeys,
            secret_subkeys,
        }
    }

    /// Verifies all certificate semantics.
    pub fn verify(&self) -> Result<()> {
        crate::ensure!(
            self.primary_key.is_signing_key(),
            "the primary key must be signing capable"
        );

        self.details.verify(&self.primary_key)?;

        for subkey in &self.public_subkeys {
            subkey.verify(&self.primary_key)?;
        }
        for subkey in &self.secret_subkeys {
            subkey.verify(&self.primary_key)?;
        }

        Ok(())
    }

    /// Whether the key graph is usable at time `t`.
    pub fn verify_at(&self, t: DateTime<Utc>) -> Result<()> {
        crate::ensure!(
            self.primary_key.created_at() <= &t,
            "key not yet created at {}",
            t
        );

        if self.details.is_revoked_at(&self.primary_key, t) {
            return Err(Error::KeyInvalid("key is revoked".into()));
        }

        if !self.details.has_valid_user_at(&self.primary_key, t) {
            return Err(Error::KeyInvalid("no valid user id".into()));
        }

        if let Some(expiry) = self.details.expires_at(&self.primary_key) {
            if expiry <= t {
                return Err(Error::KeyInvalid("key is expired".into()));
            }
        }

        Ok(())
    }

    /// Unlocks the primary key.
    pub fn unlock<G>(&self, pw: &str, work: G) -> Result<()>
    where
        G: FnOnce(&SecretKeyRepr) -> Result<()>,
    {
        self.primary_key.unlock(pw, work)
    }

    /// Locks the primary key and all secret subkeys under the passphrase.
    pub fn lock<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        pw: &str,
        sym: SymmetricKeyAlgorithm,
        aead: Option<AeadAlgorithm>,
    ) -> Result<Self> {
        let primary_key = self.primary_key.lock(rng, pw, sym, aead)?;
        let secret_subkeys = self
            .secret_subkeys
            .iter()
            .map(|sub| {
                Ok(SignedSecretSubKey {
                    key: sub.key.lock(rng, pw, sym, aead)?,
                    binding_signatures: sub.binding_signatures.clone(),
                    revocation_signatures: sub.revocation_signatures.clone(),
                })
            })
            .collect::<Result<_>>()?;

        Ok(SignedSecretKey {
            primary_key,
            details: self.details.clone(),
            public_subkeys: self.public_subkeys.clone(),
            secret_subkeys,
        })
    }

    /// Removes the passphrase protection everywhere.
    pub fn unlocked(&self, pw: &str) -> Result<Self> {
        let primary_key = self.primary_key.unlocked(pw)?;
        let secret_subkeys = self
            .secret_subkeys
            .iter()
            .map(|sub| {
                Ok(SignedSecretSubKey {
                    key: sub.key.unlocked(pw)?,
                    binding_signatures: sub.binding_signatures.clone(),
                    revocation_signatures: sub.revocation_signatures.clone(),
                })
            })
            .collect::<Result<_>>()?;

        Ok(SignedSecretKey {
            primary_key,
            details: self.details.clone(),
            public_subkeys: self.public_subkeys.clone(),
            secret_subkeys,
        })
    }

    /// The decryption candidates at time `t`: encryption capable subkeys,
    /// newest first, then the primary if it is encryption capable. With a
    /// key id only matching packets are returned.
    pub fn decryption_keys(
        &self,
        key_id: Option<&KeyId>,
        t: DateTime<Utc>,
    ) -> Vec<DecryptionKey<'_>> {
        let mut subkeys: Vec<&SignedSecretSubKey> = self
            .secret_subkeys
            .iter()
            .filter(|sub| sub.is_encryption_key_at(&self.primary_key, t))
            .collect();
        subkeys.sort_by(|a, b| b.key.created_at().cmp(a.key.created_at()));

        let mut keys: Vec<DecryptionKey<'_>> = subkeys
            .into_iter()
            .map(|sub| DecryptionKey::Subkey(&sub.key))
            .collect();

        if self.primary_key.is_encryption_key() {
            keys.push(DecryptionKey::Primary(&self.primary_key));
        }

        if let Some(id) = key_id {
            keys.retain(|k| &k.key_id() == id);
        }

        keys
    }

    /// The signing key at time `t`: a signing capable subkey with a valid
    /// binding, falling back to the primary.
    pub fn signing_key(&self, t: DateTime<Utc>) -> Option<SigningKey<'_>> {
        let subkey = self
            .secret_subkeys
            .iter()
            .find(|sub| sub.is_signing_key_at(&self.primary_key, t));

        match subkey {
            Some(sub) => Some(SigningKey::Subkey(&sub.key)),
            None if self.primary_key.is_signing_key() => {
                Some(SigningKey::Primary(&self.primary_key))
            }
            None => None,
        }
    }

    /// Tries to recover the session key from a single PKESK. Candidates
    /// are matched by key id before any cryptography runs.
    pub fn decrypt_session_key(
        &self,
        key_pw: &str,
        pkesk: &PublicKeyEncryptedSessionKey,
        t: DateTime<Utc>,
    ) -> Result<(Option<SymmetricKeyAlgorithm>, Vec<u8>)> {
        for candidate in self.decryption_keys(None, t) {
            if !pkesk.matches_key(&candidate) {
                continue;
            }

            return candidate.unwrap_session_key(key_pw, pkesk);
        }

        Err(Error::MissingKey)
    }

    fn revocation_config<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        typ: SignatureType,
        code: RevocationCode,
        reason: &str,
    ) -> Result<SignatureConfig> {
        let mut config = SignatureConfig::from_key(rng, &self.primary_key, typ)?;
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::RevocationReason(
                code,
                reason.to_string(),
            )));

        Ok(config)
    }

    /// Revokes the primary key. Returns the new value; the input is left
    /// untouched.
    pub fn revoke<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        pw: &str,
        code: RevocationCode,
        reason: &str,
    ) -> Result<Self> {
        let config = self.revocation_config(rng, SignatureType::KeyRevocation, code, reason)?;
        let sig = config.sign_key(&self.primary_key, pw, &self.primary_key)?;

        let mut new_key = self.clone();
        new_key.details.revocation_signatures.push(sig);

        Ok(new_key)
    }

    /// Revokes a user id certification.
    pub fn revoke_user<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        pw: &str,
        user_id: &str,
        code: RevocationCode,
        reason: &str,
    ) -> Result<Self> {
        let pos = self
            .details
            .users
            .iter()
            .position(|u| u.id.id() == user_id)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown user id {:?}", user_id)))?;

        let config = self.revocation_config(rng, SignatureType::CertRevocation, code, reason)?;
        let sig = config.sign_certification(
            &self.primary_key,
            pw,
            &self.primary_key,
            &self.details.users[pos].id,
        )?;

        let mut new_key = self.clone();
        new_key.details.users[pos]
            .revocation_certifications
            .push(sig);

        Ok(new_key)
    }

    /// Revokes a subkey.
    pub fn revoke_subkey<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        pw: &str,
        subkey_id: &KeyId,
        code: RevocationCode,
        reason: &str,
    ) -> Result<Self> {
        let mut new_key = self.clone();

        if let Some(sub) = new_key
            .secret_subkeys
            .iter_mut()
            .find(|s| &s.key.key_id() == subkey_id)
        {
            let config =
                self.revocation_config(rng, SignatureType::SubkeyRevocation, code, reason)?;
            let sig = config.sign_key_binding(&self.primary_key, pw, &self.primary_key, &sub.key)?;
            sub.revocation_signatures.push(sig);

            return Ok(new_key);
        }

        if let Some(sub) = new_key
            .public_subkeys
            .iter_mut()
            .find(|s| &s.key.key_id() == subkey_id)
        {
            let config =
                self.revocation_config(rng, SignatureType::SubkeyRevocation, code, reason)?;
            let sig = config.sign_key_binding(&self.primary_key, pw, &self.primary_key, &sub.key)?;
            sub.revocation_signatures.push(sig);

            return Ok(new_key);
        }

        Err(Error::InvalidArgument(format!(
            "unknown subkey {}",
            subkey_id
        )))
    }

    /// Generates and binds a fresh subkey. The new subkey material is
    /// returned unprotected; lock the result to protect it.
    pub fn add_subkey<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        pw: &str,
        key_type: crate::composed::KeyType,
        can_sign: bool,
        can_encrypt: bool,
    ) -> Result<Self> {
        key_type.check_version(self.version())?;

        let (public_params, plain) = key_type.generate(rng)?;
        let subkey = packet::SecretSubkey::new(
            packet::PublicSubkey::new(
                Version::New,
                self.version(),
                key_type.to_alg(),
                Utc::now(),
                public_params,
            )?,
            crate::types::SecretParams::Plain(plain),
        )?;

        let mut flags = packet::KeyFlags::default();
        flags.set_sign(can_sign);
        flags.set_encrypt_comms(can_encrypt);
        flags.set_encrypt_storage(can_encrypt);

        let mut config =
            SignatureConfig::from_key(rng, &self.primary_key, SignatureType::SubkeyBinding)?;
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::KeyFlags(flags)));

        if can_sign {
            let back_config =
                SignatureConfig::from_key(rng, &subkey, SignatureType::KeyBinding)?;
            let back_sig = back_config.sign_key_binding(&subkey, "", &self.primary_key, &subkey)?;
            config
                .hashed_subpackets
                .push(Subpacket::regular(SubpacketData::EmbeddedSignature(
                    Box::new(back_sig),
                )));
        }

        let binding = config.sign_key_binding(&self.primary_key, pw, &self.primary_key, &subkey)?;

        let mut new_key = self.clone();
        new_key.secret_subkeys.push(SignedSecretSubKey {
            key: subkey,
            binding_signatures: vec![binding],
            revocation_signatures: Vec::new(),
        });

        Ok(new_key)
    }

    /// Certifies and adds another user id.
    pub fn add_user<R: Rng + CryptoRng>(&self, rng: &mut R, pw: &str, id: &str) -> Result<Self> {
        let user_id = UserId::from_str(Version::New, id);

        let mut config =
            SignatureConfig::from_key(rng, &self.primary_key, SignatureType::CertGeneric)?;
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::KeyFlags(
                self.primary_user_key_flags(),
            )));

        let sig =
            config.sign_certification(&self.primary_key, pw, &self.primary_key, &user_id)?;

        let mut new_key = self.clone();
        new_key.details.users.push(SignedUser {
            id: user_id,
            self_certifications: vec![sig],
            other_certifications: Vec::new(),
            revocation_certifications: Vec::new(),
        });

        Ok(new_key)
    }

    /// Issues a revocation for another key, returning the revoked graph.
    pub fn revoke_other<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        pw: &str,
        target: &SignedPublicKey,
        code: RevocationCode,
        reason: &str,
    ) -> Result<SignedPublicKey> {
        let config = self.revocation_config(rng, SignatureType::KeyRevocation, code, reason)?;
        let sig = config.sign_key(&self.primary_key, pw, &target.primary_key)?;

        let mut new_key = target.clone();
        new_key.details.revocation_signatures.push(sig);

        Ok(new_key)
    }

    fn primary_user_key_flags(&self) -> packet::KeyFlags {
        self.details
            .users
            .iter()
            .find(|u| u.is_primary())
            .or_else(|| self.details.users.first())
            .and_then(|u| u.self_certifications.first())
            .map(|sig| sig.key_flags())
            .unwrap_or_default()
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
        armor::write(writer, &armor::BlockType::PrivateKey, headers, &bytes)
    }

    pub fn to_armored_string(&self, headers: Option<&BTreeMap<String, String>>) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf, headers)?;
        Ok(String::from_utf8(buf).expect("armor is ascii"))
    }
}

impl Serialize for SignedSecretKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, Tag::SecretKey, &self.primary_key)?;
        self.details.to_writer(writer)?;
        for subkey in &self.public_subkeys {
            subkey.to_writer(writer)?;
        }
        for subkey in &self.secret_subkeys {
            subkey.to_writer(writer)?;
        }

        Ok(())
    }
}

impl KeyTrait for SignedSecretKey {
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

macro_rules! impl_key_ref {
    ($name:ident, $( $variant:ident => $ty:ty ),*) => {
        impl KeyTrait for $name<'_> {
            fn version(&self) -> KeyVersion {
                match self { $( $name::$variant(k) => k.version(), )* }
            }

            fn fingerprint(&self) -> Vec<u8> {
                match self { $( $name::$variant(k) => k.fingerprint(), )* }
            }

            fn key_id(&self) -> KeyId {
                match self { $( $name::$variant(k) => k.key_id(), )* }
            }

            fn algorithm(&self) -> crate::crypto::public_key::PublicKeyAlgorithm {
                match self { $( $name::$variant(k) => k.algorithm(), )* }
            }

            fn created_at(&self) -> &DateTime<Utc> {
                match self { $( $name::$variant(k) => k.created_at(), )* }
            }
        }
    };
}

impl_key_ref!(DecryptionKey, Subkey => packet::SecretSubkey, Primary => packet::SecretKey);
impl_key_ref!(SigningKey, Subkey => packet::SecretSubkey, Primary => packet::SecretKey);

impl DecryptionKey<'_> {
    /// Unlocks the key and unwraps the session key from the PKESK.
    pub fn unwrap_session_key(
        &self,
        pw: &str,
        pkesk: &PublicKeyEncryptedSessionKey,
    ) -> Result<(Option<SymmetricKeyAlgorithm>, Vec<u8>)> {
        let fingerprint = self.fingerprint();
        let mut out = None;

        match self {
            DecryptionKey::Subkey(key) => key.unlock(pw, |repr| {
                out = Some(pkesk.unwrap_session_key(repr, &fingerprint)?);
                Ok(())
            })?,
            DecryptionKey::Primary(key) => key.unlock(pw, |repr| {
                out = Some(pkesk.unwrap_session_key(repr, &fingerprint)?);
                Ok(())
            })?,
        }

        out.ok_or_else(|| crate::format_err!("session key recovery failed"))
    }
}

impl SigningKey<'_> {
    pub fn create_signature_config<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        typ: SignatureType,
    ) -> Result<SignatureConfig> {
        match self {
            SigningKey::Subkey(key) => SignatureConfig::from_key(rng, *key, typ),
            SigningKey::Primary(key) => SignatureConfig::from_key(rng, *key, typ),
        }
    }
}
