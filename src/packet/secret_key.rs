use std::io;

use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use rand::{CryptoRng, Rng};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::checksum;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::DynCryptoRng;
use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{
    EncryptedSecretParams, EskType, KeyId, KeyTrait, KeyVersion, PkeskBytes, PlainSecretParams,
    PublicKeyTrait, PublicParams, S2kUsage, SecretKeyRepr, SecretKeyTrait, SecretParams,
    SignatureBytes, StringToKey, Tag, Version,
};
use crate::util::Reader;

use super::public_key::{parse_public_fields, write_public_fields};
use super::{PublicKey, PublicSubkey};

/// Represents a secret key packet.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.5.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    details: PublicKey,
    secret_params: SecretParams,
}

/// Represents a secret subkey packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSubkey {
    details: PublicSubkey,
    secret_params: SecretParams,
}

/// Derives the key encryption key guarding AEAD protected secret material.
fn aead_kek(
    s2k_output: &[u8],
    tag: Tag,
    version: KeyVersion,
    sym: SymmetricKeyAlgorithm,
    aead: AeadAlgorithm,
) -> Result<Zeroizing<Vec<u8>>> {
    let info = [tag.encode(), version as u8, sym as u8, aead as u8];

    let hk = Hkdf::<Sha256>::new(None, s2k_output);
    let mut kek = Zeroizing::new(vec![0u8; sym.key_size()]);
    hk.expand(&info, &mut kek)
        .map_err(|e| Error::CryptoError(e.to_string()))?;

    Ok(kek)
}

macro_rules! impl_secret_key {
    ($name:ident, $details:ident, $tag:expr) => {
        impl $name {
            pub fn new(details: $details, secret_params: SecretParams) -> Result<Self> {
                if details.version() == KeyVersion::V6
                    && secret_params.string_to_key_usage() == S2kUsage::MalleableCfb
                {
                    return Err(Error::InvalidArgument(
                        "v6 keys can not use the malleable CFB protection".into(),
                    ));
                }

                Ok($name {
                    details,
                    secret_params,
                })
            }

            /// Parses the packet from the given slice.
            pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
                let mut r = Reader::new(input);
                let (version, algorithm, created_at, public_params) =
                    parse_public_fields(&mut r)?;
                let secret_params = SecretParams::try_from_reader(&mut r, version, algorithm)?;

                Ok($name {
                    details: $details::new(
                        packet_version,
                        version,
                        algorithm,
                        created_at,
                        public_params,
                    )?,
                    secret_params,
                })
            }

            pub fn packet_version(&self) -> Version {
                self.details.packet_version()
            }

            pub fn tag(&self) -> Tag {
                $tag
            }

            pub fn public_key(&self) -> &$details {
                &self.details
            }

            pub fn secret_params(&self) -> &SecretParams {
                &self.secret_params
            }

            pub fn has_passphrase(&self) -> bool {
                self.secret_params.is_encrypted()
            }

            /// Recovers the plaintext secret material.
            fn decrypt_secret_params(&self, pw: &str) -> Result<PlainSecretParams> {
                match &self.secret_params {
                    SecretParams::Plain(params) => Ok(params.clone()),
                    SecretParams::Encrypted(enc) => {
                        if pw.is_empty() {
                            return Err(Error::InvalidArgument("missing passphrase".into()));
                        }
                        self.decrypt_encrypted_params(enc, pw)
                    }
                }
            }

            fn decrypt_encrypted_params(
                &self,
                enc: &EncryptedSecretParams,
                pw: &str,
            ) -> Result<PlainSecretParams> {
                let sym = enc.encryption_algorithm;
                let derived = enc.string_to_key.derive(pw.as_bytes(), sym.key_size())?;

                let material = match enc.usage {
                    S2kUsage::Aead => {
                        let aead = enc
                            .aead
                            .ok_or_else(|| crate::format_err!("missing AEAD algorithm"))?;
                        let kek =
                            aead_kek(&derived, $tag, self.details.version(), sym, aead)?;

                        let mut aad = vec![$tag.encode()];
                        aad.extend(self.details.to_bytes()?);

                        Zeroizing::new(aead.decrypt(sym, &kek, &enc.iv, &aad, &enc.data)?)
                    }
                    S2kUsage::Cfb => {
                        let mut data = enc.data.clone();
                        sym.decrypt_cfb(&derived, &enc.iv, &mut data)?;
                        crate::ensure!(data.len() > 20, "truncated secret material");

                        let (material, cksum) = data.split_at(data.len() - 20);
                        checksum::sha1(cksum, material)?;
                        Zeroizing::new(material.to_vec())
                    }
                    S2kUsage::MalleableCfb => {
                        let mut data = enc.data.clone();
                        sym.decrypt_cfb(&derived, &enc.iv, &mut data)?;
                        crate::ensure!(data.len() > 2, "truncated secret material");

                        let (material, cksum) = data.split_at(data.len() - 2);
                        checksum::simple(cksum, material)
                            .map_err(|_| Error::PassphraseIncorrect)?;
                        Zeroizing::new(material.to_vec())
                    }
                    S2kUsage::LegacyCfb(_) => {
                        crate::unsupported_err!("legacy per-MPI encrypted secret keys")
                    }
                    S2kUsage::Unprotected => unreachable!("not encrypted"),
                };

                let mut mr = Reader::new(&material);
                let params =
                    PlainSecretParams::try_from_reader(self.details.algorithm(), &mut mr)?;
                crate::ensure!(mr.is_empty(), "trailing secret material");

                Ok(params)
            }

            /// Locks the secret material under the given passphrase:
            /// CFB with a SHA-1 trailer, or AEAD for v6 keys.
            pub fn lock<R: Rng + CryptoRng>(
                &self,
                rng: &mut R,
                pw: &str,
                sym: SymmetricKeyAlgorithm,
                aead: Option<AeadAlgorithm>,
            ) -> Result<Self> {
                if pw.is_empty() {
                    return Err(Error::InvalidArgument("missing passphrase".into()));
                }
                crate::ensure!(
                    sym != SymmetricKeyAlgorithm::Plaintext,
                    "refusing to lock with the plaintext algorithm"
                );

                let SecretParams::Plain(ref plain) = self.secret_params else {
                    return Err(Error::InvalidArgument(
                        "key material is already locked".into(),
                    ));
                };

                if aead.is_some() && self.details.version() != KeyVersion::V6 {
                    return Err(Error::InvalidArgument(
                        "AEAD protection requires a v6 key".into(),
                    ));
                }

                let s2k = match aead {
                    Some(_) => StringToKey::new_argon2(rng),
                    None => StringToKey::new_default(rng),
                };
                let derived = s2k.derive(pw.as_bytes(), sym.key_size())?;

                let enc = match aead {
                    Some(aead_alg) => {
                        let kek = aead_kek(
                            &derived,
                            $tag,
                            self.details.version(),
                            sym,
                            aead_alg,
                        )?;

                        let mut iv = vec![0u8; aead_alg.iv_size()];
                        rng.fill_bytes(&mut iv);

                        let mut aad = vec![$tag.encode()];
                        aad.extend(self.details.to_bytes()?);

                        let material = Zeroizing::new(plain.to_bytes()?);
                        let data = aead_alg.encrypt(sym, &kek, &iv, &aad, &material)?;

                        EncryptedSecretParams {
                            data,
                            iv,
                            encryption_algorithm: sym,
                            aead: Some(aead_alg),
                            string_to_key: s2k,
                            usage: S2kUsage::Aead,
                        }
                    }
                    None => {
                        let mut iv = vec![0u8; sym.block_size()];
                        rng.fill_bytes(&mut iv);

                        let mut data = plain.to_bytes()?;
                        let cksum = checksum::calculate_sha1(&data);
                        data.extend(cksum);
                        sym.encrypt_cfb(&derived, &iv, &mut data)?;

                        EncryptedSecretParams {
                            data,
                            iv,
                            encryption_algorithm: sym,
                            aead: None,
                            string_to_key: s2k,
                            usage: S2kUsage::Cfb,
                        }
                    }
                };

                Ok($name {
                    details: self.details.clone(),
                    secret_params: SecretParams::Encrypted(enc),
                })
            }

            /// Removes the passphrase protection.
            pub fn unlocked(&self, pw: &str) -> Result<Self> {
                let plain = self.decrypt_secret_params(pw)?;

                Ok($name {
                    details: self.details.clone(),
                    secret_params: SecretParams::Plain(plain),
                })
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                write_public_fields(
                    writer,
                    self.details.version(),
                    self.details.algorithm(),
                    self.details.created_at(),
                    self.details.public_params(),
                )?;
                self.secret_params.to_writer(writer, self.details.version())?;

                Ok(())
            }
        }

        impl KeyTrait for $name {
            fn version(&self) -> KeyVersion {
                self.details.version()
            }

            fn fingerprint(&self) -> Vec<u8> {
                self.details.fingerprint()
            }

            fn key_id(&self) -> KeyId {
                self.details.key_id()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.details.algorithm()
            }

            fn created_at(&self) -> &DateTime<Utc> {
                self.details.created_at()
            }
        }

        impl PublicKeyTrait for $name {
            fn public_params(&self) -> &PublicParams {
                self.details.public_params()
            }

            fn verify_signature(
                &self,
                hash: HashAlgorithm,
                hashed: &[u8],
                sig: &SignatureBytes,
            ) -> Result<()> {
                self.details.verify_signature(hash, hashed, sig)
            }

            fn encrypt_session_key(
                &self,
                rng: &mut DynCryptoRng<'_>,
                plain: &[u8],
                typ: EskType,
            ) -> Result<PkeskBytes> {
                self.details.encrypt_session_key(rng, plain, typ)
            }

            fn to_signable_bytes(&self) -> Result<Vec<u8>> {
                self.details.to_signable_bytes()
            }
        }

        impl SecretKeyTrait for $name {
            fn unlock<G>(&self, pw: &str, work: G) -> Result<()>
            where
                G: FnOnce(&SecretKeyRepr) -> Result<()>,
            {
                let plain = self.decrypt_secret_params(pw)?;
                plain.is_valid(self.details.public_params())?;
                let repr = plain.as_repr(self.details.public_params())?;

                work(&repr)
            }

            fn create_signature(
                &self,
                key_pw: &str,
                hash: HashAlgorithm,
                digest: &[u8],
            ) -> Result<SignatureBytes> {
                let mut sig = None;

                self.unlock(key_pw, |repr| {
                    sig = Some(match repr {
                        SecretKeyRepr::RSA(key) => crate::crypto::rsa::sign(key, hash, digest)?,
                        SecretKeyRepr::DSA(key) => crate::crypto::dsa::sign(
                            &key.p, &key.q, &key.g, &key.y, &key.x, digest,
                        )?,
                        SecretKeyRepr::ECDSA(key) => {
                            crate::crypto::ecdsa::sign(&key.curve, &key.d, digest)?
                        }
                        SecretKeyRepr::EdDSA(key) => match self.details.algorithm() {
                            PublicKeyAlgorithm::EdDSALegacy => {
                                crate::crypto::eddsa::sign_legacy(key, digest)?
                            }
                            _ => crate::crypto::eddsa::sign(key, digest)?,
                        },
                        SecretKeyRepr::ECDH(_) | SecretKeyRepr::X25519(_) => {
                            crate::bail!("key material can not be used for signing")
                        }
                    });

                    Ok(())
                })?;

                sig.ok_or_else(|| crate::format_err!("signing failed"))
            }
        }
    };
}

impl_secret_key!(SecretKey, PublicKey, Tag::SecretKey);
impl_secret_key!(SecretSubkey, PublicSubkey, Tag::SecretSubkey);

/// Recovers the session key payload from the algorithm specific ESK values.
pub(crate) fn decrypt_session_key_with(
    repr: &SecretKeyRepr,
    values: &PkeskBytes,
    fingerprint: &[u8],
) -> Result<Vec<u8>> {
    match (repr, values) {
        (SecretKeyRepr::RSA(key), PkeskBytes::Rsa { mpi }) => {
            crate::crypto::rsa::decrypt(key, mpi)
        }
        (
            SecretKeyRepr::ECDH(key),
            PkeskBytes::Ecdh {
                public_point,
                encrypted_session_key,
            },
        ) => crate::crypto::ecdh::decrypt(
            &key.curve,
            &key.d,
            key.hash,
            key.alg_sym,
            fingerprint,
            public_point,
            encrypted_session_key,
        ),
        (
            SecretKeyRepr::X25519(key),
            PkeskBytes::X25519 {
                ephemeral,
                session_key,
                ..
            },
        ) => crate::crypto::x25519::decrypt(&key.secret, ephemeral, session_key),
        (SecretKeyRepr::DSA(_), _)
        | (SecretKeyRepr::ECDSA(_), _)
        | (SecretKeyRepr::EdDSA(_), _) => {
            crate::bail!("key material can not be used for decryption")
        }
        _ => crate::bail!("mismatch between key algorithm and session key values"),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn sample_key(rng: &mut ChaCha8Rng, version: KeyVersion) -> SecretKey {
        let (public_params, plain, alg) = match version {
            KeyVersion::V6 => {
                let (p, s) = crate::crypto::eddsa::generate_key(rng);
                (p, s, PublicKeyAlgorithm::Ed25519)
            }
            _ => {
                let (p, s) = crate::crypto::eddsa::generate_key_legacy(rng);
                (p, s, PublicKeyAlgorithm::EdDSALegacy)
            }
        };

        let details = PublicKey::new(
            Version::New,
            version,
            alg,
            chrono::Utc::now(),
            public_params,
        )
        .unwrap();

        SecretKey::new(details, SecretParams::Plain(plain)).unwrap()
    }

    #[test]
    fn test_lock_unlock_cfb() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let key = sample_key(&mut rng, KeyVersion::V4);

        let locked = key
            .lock(&mut rng, "hunter2", SymmetricKeyAlgorithm::AES256, None)
            .unwrap();
        assert!(locked.has_passphrase());

        // wrong passphrase is detected by the SHA-1 trailer
        assert!(matches!(
            locked.unlocked("wrong"),
            Err(Error::PassphraseIncorrect)
        ));

        let unlocked = locked.unlocked("hunter2").unwrap();
        assert_eq!(unlocked, key);
    }

    #[test]
    fn test_lock_unlock_aead_v6() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let key = sample_key(&mut rng, KeyVersion::V6);

        let locked = key
            .lock(
                &mut rng,
                "correct horse",
                SymmetricKeyAlgorithm::AES128,
                Some(AeadAlgorithm::Ocb),
            )
            .unwrap();

        // the serialized form survives a parse
        let bytes = locked.to_bytes().unwrap();
        let parsed = SecretKey::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(parsed, locked);

        assert!(matches!(
            parsed.unlocked("horse correct"),
            Err(Error::PassphraseIncorrect)
        ));
        assert_eq!(parsed.unlocked("correct horse").unwrap(), key);
    }

    #[test]
    fn test_aead_requires_v6() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let key = sample_key(&mut rng, KeyVersion::V4);
        assert!(matches!(
            key.lock(
                &mut rng,
                "pw",
                SymmetricKeyAlgorithm::AES128,
                Some(AeadAlgorithm::Gcm)
            ),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(14);
        let key = sample_key(&mut rng, KeyVersion::V4);
        assert!(key
            .lock(&mut rng, "", SymmetricKeyAlgorithm::AES128, None)
            .is_err());
    }
}
