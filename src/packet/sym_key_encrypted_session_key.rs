use std::io;

use byteorder::WriteBytesExt;
use hkdf::Hkdf;
use rand::{CryptoRng, Rng};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{SkeskVersion, StringToKey, Tag, Version};
use crate::util::Reader;

/// Symmetric-Key Encrypted Session Key Packet (SKESK)
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymKeyEncryptedSessionKey {
    V4 {
        packet_version: Version,
        sym_algorithm: SymmetricKeyAlgorithm,
        s2k: StringToKey,
        /// CFB encrypted `sym_algorithm ‖ session_key`; if absent, the S2K
        /// output is the session key itself.
        encrypted_key: Option<Vec<u8>>,
    },
    V6 {
        packet_version: Version,
        sym_algorithm: SymmetricKeyAlgorithm,
        aead: AeadAlgorithm,
        s2k: StringToKey,
        iv: Vec<u8>,
        /// AEAD encrypted session key, tag included.
        encrypted_key: Vec<u8>,
    },
}

fn v6_kek(
    s2k_output: &[u8],
    sym: SymmetricKeyAlgorithm,
    aead: AeadAlgorithm,
) -> Result<(Zeroizing<Vec<u8>>, [u8; 4])> {
    let info = [
        Tag::SymKeyEncryptedSessionKey.encode(),
        SkeskVersion::V6 as u8,
        sym as u8,
        aead as u8,
    ];

    let hk = Hkdf::<Sha256>::new(None, s2k_output);
    let mut kek = Zeroizing::new(vec![0u8; sym.key_size()]);
    hk.expand(&info, &mut kek)
        .map_err(|e| Error::CryptoError(e.to_string()))?;

    Ok((kek, info))
}

impl SymKeyEncryptedSessionKey {
    /// Parses a `SymKeyEncryptedSessionKey` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        let mut r = Reader::new(input);

        let version = r.read_u8()?;
        match version {
            4 => {
                let sym_algorithm = SymmetricKeyAlgorithm::try_from_u8(r.read_u8()?)?;
                let s2k = StringToKey::try_from_reader(&mut r)?;
                crate::ensure!(
                    !s2k.is_argon2(),
                    "Argon2 requires the AEAD based v6 packet"
                );

                let rest = r.rest();
                let encrypted_key = if rest.is_empty() {
                    None
                } else {
                    Some(rest.to_vec())
                };

                Ok(SymKeyEncryptedSessionKey::V4 {
                    packet_version,
                    sym_algorithm,
                    s2k,
                    encrypted_key,
                })
            }
            6 => {
                let _count = r.read_u8()?;
                let sym_algorithm = SymmetricKeyAlgorithm::try_from_u8(r.read_u8()?)?;
                let aead = AeadAlgorithm::try_from_u8(r.read_u8()?)?;
                let s2k_len = r.read_u8()?;
                let s2k_raw = r.take(s2k_len as usize)?;
                let mut s2k_reader = Reader::new(s2k_raw);
                let s2k = StringToKey::try_from_reader(&mut s2k_reader)?;
                crate::ensure!(s2k_reader.is_empty(), "trailing S2K data");

                let iv = r.take(aead.iv_size())?.to_vec();
                let encrypted_key = r.rest().to_vec();
                crate::ensure!(
                    encrypted_key.len() > aead.tag_size(),
                    "truncated encrypted session key"
                );

                Ok(SymKeyEncryptedSessionKey::V6 {
                    packet_version,
                    sym_algorithm,
                    aead,
                    s2k,
                    iv,
                    encrypted_key,
                })
            }
            _ => Err(Error::UnsupportedVersion(version)),
        }
    }

    /// Creates a v4 packet carrying the given session key encrypted under
    /// the passphrase.
    pub fn encrypt_v4(
        pw: &str,
        session_key: &[u8],
        session_key_algorithm: SymmetricKeyAlgorithm,
        s2k: StringToKey,
        sym_algorithm: SymmetricKeyAlgorithm,
    ) -> Result<Self> {
        if pw.is_empty() {
            return Err(Error::InvalidArgument("missing passphrase".into()));
        }

        let kek = s2k.derive(pw.as_bytes(), sym_algorithm.key_size())?;

        let mut data = Vec::with_capacity(session_key.len() + 1);
        data.push(session_key_algorithm as u8);
        data.extend_from_slice(session_key);

        let iv = vec![0u8; sym_algorithm.block_size()];
        sym_algorithm.encrypt_cfb(&kek, &iv, &mut data)?;

        Ok(SymKeyEncryptedSessionKey::V4 {
            packet_version: Version::New,
            sym_algorithm,
            s2k,
            encrypted_key: Some(data),
        })
    }

    /// Creates a v6 packet, AEAD sealing the session key under the
    /// passphrase derived key.
    pub fn encrypt_v6<R: Rng + CryptoRng>(
        rng: &mut R,
        pw: &str,
        session_key: &[u8],
        s2k: StringToKey,
        sym_algorithm: SymmetricKeyAlgorithm,
        aead: AeadAlgorithm,
    ) -> Result<Self> {
        if pw.is_empty() {
            return Err(Error::InvalidArgument("missing passphrase".into()));
        }

        let derived = s2k.derive(pw.as_bytes(), sym_algorithm.key_size())?;
        let (kek, info) = v6_kek(&derived, sym_algorithm, aead)?;

        let mut iv = vec![0u8; aead.iv_size()];
        rng.fill_bytes(&mut iv);

        let encrypted_key = aead.encrypt(sym_algorithm, &kek, &iv, &info, session_key)?;

        Ok(SymKeyEncryptedSessionKey::V6 {
            packet_version: Version::New,
            sym_algorithm,
            aead,
            s2k,
            iv,
            encrypted_key,
        })
    }

    /// Recovers the session key from the passphrase. Returns the symmetric
    /// algorithm intended for the payload (v4) and the key bytes.
    pub fn decrypt(&self, pw: &str) -> Result<(Option<SymmetricKeyAlgorithm>, Vec<u8>)> {
        if pw.is_empty() {
            return Err(Error::InvalidArgument("missing passphrase".into()));
        }

        match self {
            SymKeyEncryptedSessionKey::V4 {
                sym_algorithm,
                s2k,
                encrypted_key,
                ..
            } => {
                let kek = s2k.derive(pw.as_bytes(), sym_algorithm.key_size())?;

                match encrypted_key {
                    None => {
                        // the derived key is the session key
                        Ok((Some(*sym_algorithm), kek.to_vec()))
                    }
                    Some(esk) => {
                        let mut data = esk.clone();
                        let iv = vec![0u8; sym_algorithm.block_size()];
                        sym_algorithm.decrypt_cfb(&kek, &iv, &mut data)?;

                        crate::ensure!(!data.is_empty(), "empty session key");
                        let sym = SymmetricKeyAlgorithm::try_from_u8(data[0])?;
                        crate::ensure_eq!(
                            data.len() - 1,
                            sym.key_size(),
                            "invalid session key length"
                        );

                        Ok((Some(sym), data[1..].to_vec()))
                    }
                }
            }
            SymKeyEncryptedSessionKey::V6 {
                sym_algorithm,
                aead,
                s2k,
                iv,
                encrypted_key,
                ..
            } => {
                let derived = s2k.derive(pw.as_bytes(), sym_algorithm.key_size())?;
                let (kek, info) = v6_kek(&derived, *sym_algorithm, *aead)?;

                let key = aead.decrypt(*sym_algorithm, &kek, iv, &info, encrypted_key)?;

                Ok((None, key))
            }
        }
    }

    pub fn packet_version(&self) -> Version {
        match self {
            SymKeyEncryptedSessionKey::V4 { packet_version, .. }
            | SymKeyEncryptedSessionKey::V6 { packet_version, .. } => *packet_version,
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::SymKeyEncryptedSessionKey
    }
}

impl Serialize for SymKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SymKeyEncryptedSessionKey::V4 {
                sym_algorithm,
                s2k,
                encrypted_key,
                ..
            } => {
                writer.write_u8(SkeskVersion::V4 as u8)?;
                writer.write_u8(*sym_algorithm as u8)?;
                s2k.to_writer(writer)?;
                if let Some(esk) = encrypted_key {
                    writer.write_all(esk)?;
                }
            }
            SymKeyEncryptedSessionKey::V6 {
                sym_algorithm,
                aead,
                s2k,
                iv,
                encrypted_key,
                ..
            } => {
                writer.write_u8(SkeskVersion::V6 as u8)?;

                let s2k_bytes = s2k.to_bytes()?;
                let count = 1 + 1 + 1 + s2k_bytes.len() + iv.len();
                writer.write_u8(count as u8)?;
                writer.write_u8(*sym_algorithm as u8)?;
                writer.write_u8(*aead as u8)?;
                writer.write_u8(s2k_bytes.len() as u8)?;
                writer.write_all(&s2k_bytes)?;
                writer.write_all(iv)?;
                writer.write_all(encrypted_key)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;

    #[test]
    fn test_v4_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let s2k = StringToKey::new_default(&mut rng);
        let session_key = [0x42u8; 16];

        let skesk = SymKeyEncryptedSessionKey::encrypt_v4(
            "secret",
            &session_key,
            SymmetricKeyAlgorithm::AES128,
            s2k,
            SymmetricKeyAlgorithm::AES256,
        )
        .unwrap();

        let bytes = skesk.to_bytes().unwrap();
        let parsed = SymKeyEncryptedSessionKey::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(parsed, skesk);

        let (sym, key) = parsed.decrypt("secret").unwrap();
        assert_eq!(sym, Some(SymmetricKeyAlgorithm::AES128));
        assert_eq!(key, session_key);
    }

    #[test]
    fn test_v4_without_esk_uses_derived_key() {
        let skesk = SymKeyEncryptedSessionKey::V4 {
            packet_version: Version::New,
            sym_algorithm: SymmetricKeyAlgorithm::AES128,
            s2k: StringToKey::Salted {
                hash: HashAlgorithm::SHA256,
                salt: [1u8; 8],
            },
            encrypted_key: None,
        };

        let (sym, key) = skesk.decrypt("pw").unwrap();
        assert_eq!(sym, Some(SymmetricKeyAlgorithm::AES128));
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn test_v6_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        let s2k = StringToKey::Argon2 {
            salt: [9u8; 16],
            t: 1,
            p: 4,
            m_enc: 10,
        };
        let session_key = [0x24u8; 32];

        let skesk = SymKeyEncryptedSessionKey::encrypt_v6(
            &mut rng,
            "tiefsee",
            &session_key,
            s2k,
            SymmetricKeyAlgorithm::AES256,
            AeadAlgorithm::Ocb,
        )
        .unwrap();

        let bytes = skesk.to_bytes().unwrap();
        let parsed = SymKeyEncryptedSessionKey::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(parsed, skesk);

        let (sym, key) = parsed.decrypt("tiefsee").unwrap();
        assert_eq!(sym, None);
        assert_eq!(key, session_key);

        // wrong passphrase fails on the AEAD tag
        assert!(parsed.decrypt("flachsee").is_err());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(33);
        let s2k = StringToKey::new_default(&mut rng);
        assert!(SymKeyEncryptedSessionKey::encrypt_v4(
            "",
            &[0u8; 16],
            SymmetricKeyAlgorithm::AES128,
            s2k,
            SymmetricKeyAlgorithm::AES128,
        )
        .is_err());
    }
}
