use std::io;

use byteorder::WriteBytesExt;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::DynCryptoRng;
use crate::errors::{Error, Result};
use crate::packet::secret_key::decrypt_session_key_with;
use crate::ser::Serialize;
use crate::types::{
    EskType, KeyId, KeyTrait, KeyVersion, Mpi, PkeskBytes, PublicKeyTrait, SecretKeyRepr, Tag,
    Version,
};
use crate::util::Reader;

/// Public-Key Encrypted Session Key Packet (PKESK)
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    packet_version: Version,
    pub version: u8,
    /// v3: the recipient key id (possibly the wildcard).
    pub id: Option<KeyId>,
    /// v6: the recipient key version and fingerprint, if not anonymous.
    pub fingerprint: Option<(KeyVersion, Vec<u8>)>,
    pub pk_algorithm: PublicKeyAlgorithm,
    pub values: PkeskBytes,
}

fn parse_values(alg: PublicKeyAlgorithm, version: u8, r: &mut Reader<'_>) -> Result<PkeskBytes> {
    match alg {
        PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt => Ok(PkeskBytes::Rsa {
            mpi: Mpi::try_from_reader(r)?,
        }),
        PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncrypt => {
            Ok(PkeskBytes::Elgamal {
                first: Mpi::try_from_reader(r)?,
                second: Mpi::try_from_reader(r)?,
            })
        }
        PublicKeyAlgorithm::ECDH => {
            let public_point = Mpi::try_from_reader(r)?;
            let len = r.read_u8()?;
            let encrypted_session_key = r.take(len as usize)?.to_vec();

            Ok(PkeskBytes::Ecdh {
                public_point,
                encrypted_session_key,
            })
        }
        PublicKeyAlgorithm::X25519 => {
            let ephemeral = r.take_arr::<32>()?;
            let len = r.read_u8()? as usize;

            let (sym_alg, esk_len) = if version == 3 {
                crate::ensure!(len > 0, "invalid session key length");
                (
                    Some(SymmetricKeyAlgorithm::try_from_u8(r.read_u8()?)?),
                    len - 1,
                )
            } else {
                (None, len)
            };

            Ok(PkeskBytes::X25519 {
                ephemeral,
                session_key: r.take(esk_len)?.to_vec(),
                sym_alg,
            })
        }
        _ => Ok(PkeskBytes::Other {
            data: r.rest().to_vec(),
        }),
    }
}

impl PublicKeyEncryptedSessionKey {
    /// Parses a `PublicKeyEncryptedSessionKey` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        let mut r = Reader::new(input);

        let version = r.read_u8()?;

        let (id, fingerprint) = match version {
            3 => (Some(KeyId::from_slice(r.take(8)?)?), None),
            6 => {
                let len = r.read_u8()?;
                if len == 0 {
                    // anonymous recipient
                    (None, None)
                } else {
                    let key_version = r.read_u8()?;
                    let key_version = num_traits::FromPrimitive::from_u8(key_version)
                        .ok_or(Error::UnsupportedVersion(key_version))?;
                    let fp = r.take(len as usize - 1)?.to_vec();
                    (None, Some((key_version, fp)))
                }
            }
            _ => return Err(Error::UnsupportedVersion(version)),
        };

        let pk_algorithm = PublicKeyAlgorithm::from(r.read_u8()?);
        let values = parse_values(pk_algorithm, version, &mut r)?;
        crate::ensure!(r.is_empty(), "trailing data in PKESK");

        Ok(PublicKeyEncryptedSessionKey {
            packet_version,
            version,
            id,
            fingerprint,
            pk_algorithm,
            values,
        })
    }

    /// Encrypts the session key to `pkey`. The PKESK generation follows
    /// the payload framing: v3 pairs with SEIPD v1, v6 with SEIPD v2.
    pub fn from_session_key<R: CryptoRng + Rng, K: PublicKeyTrait + ?Sized>(
        rng: &mut R,
        session_key: &[u8],
        sym_algorithm: SymmetricKeyAlgorithm,
        esk_type: EskType,
        pkey: &K,
    ) -> Result<Self> {
        let version = match esk_type {
            EskType::V6 => 6u8,
            EskType::V3_4 => 3u8,
        };

        // The payload the asymmetric wrap covers: a leading algorithm octet
        // and a trailing checksum, depending on generation and algorithm.
        let mut plain = Zeroizing::new(Vec::with_capacity(session_key.len() + 3));
        if esk_type == EskType::V3_4 {
            plain.push(sym_algorithm as u8);
        }
        plain.extend_from_slice(session_key);
        if pkey.algorithm() != PublicKeyAlgorithm::X25519
            && pkey.algorithm() != PublicKeyAlgorithm::X448
        {
            let cksum = checksum::calculate_simple(session_key).to_be_bytes();
            plain.extend_from_slice(&cksum);
        }

        let mut drng = DynCryptoRng::new(rng);
        let values = pkey.encrypt_session_key(&mut drng, &plain, esk_type)?;

        let (id, fingerprint) = match version {
            6 => (None, Some((pkey.version(), pkey.fingerprint()))),
            _ => (Some(pkey.key_id()), None),
        };

        Ok(PublicKeyEncryptedSessionKey {
            packet_version: Version::New,
            version,
            id,
            fingerprint,
            pk_algorithm: pkey.algorithm(),
            values,
        })
    }

    /// True if this packet addresses the given key. Checked before any
    /// cryptographic work is attempted.
    pub fn matches_key(&self, key: &impl KeyTrait) -> bool {
        if self.pk_algorithm != key.algorithm() {
            return false;
        }

        match self.version {
            3 => match &self.id {
                Some(id) => id.is_wildcard() || id == &key.key_id(),
                None => false,
            },
            6 => match &self.fingerprint {
                Some((version, fp)) => *version == key.version() && fp == &key.fingerprint(),
                // anonymous: worth a try
                None => true,
            },
            _ => false,
        }
    }

    /// Unwraps the session key using the given unlocked key material.
    /// Returns the symmetric algorithm (absent for v6) and the key bytes.
    pub fn unwrap_session_key(
        &self,
        repr: &SecretKeyRepr,
        fingerprint: &[u8],
    ) -> Result<(Option<SymmetricKeyAlgorithm>, Vec<u8>)> {
        let decrypted = Zeroizing::new(decrypt_session_key_with(repr, &self.values, fingerprint)?);

        // X25519 wraps the bare session key; the algorithm octet lives
        // outside the wrap.
        if let PkeskBytes::X25519 { sym_alg, .. } = &self.values {
            crate::ensure!(!decrypted.is_empty(), "empty session key");
            return Ok((*sym_alg, decrypted.to_vec()));
        }

        match self.version {
            3 => {
                crate::ensure!(decrypted.len() > 3, "session key payload too short");
                let sym = SymmetricKeyAlgorithm::try_from_u8(decrypted[0])?;
                let (key, cksum) = decrypted[1..].split_at(decrypted.len() - 3);
                checksum::simple(cksum, key)?;

                Ok((Some(sym), key.to_vec()))
            }
            6 => {
                crate::ensure!(decrypted.len() > 2, "session key payload too short");
                let (key, cksum) = decrypted.split_at(decrypted.len() - 2);
                checksum::simple(cksum, key)?;

                Ok((None, key.to_vec()))
            }
            v => Err(Error::UnsupportedVersion(v)),
        }
    }

    pub fn packet_version(&self) -> Version {
        self.packet_version
    }

    pub fn tag(&self) -> Tag {
        Tag::PublicKeyEncryptedSessionKey
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version)?;

        match self.version {
            3 => {
                let id = self
                    .id
                    .ok_or_else(|| Error::InvalidArgument("missing recipient key id".into()))?;
                writer.write_all(id.as_bytes())?;
            }
            6 => match &self.fingerprint {
                Some((key_version, fp)) => {
                    writer.write_u8(1 + fp.len() as u8)?;
                    writer.write_u8(*key_version as u8)?;
                    writer.write_all(fp)?;
                }
                None => writer.write_u8(0)?,
            },
            v => return Err(Error::UnsupportedVersion(v)),
        }

        writer.write_u8(self.pk_algorithm.into())?;

        match &self.values {
            PkeskBytes::Rsa { mpi } => mpi.to_writer(writer)?,
            PkeskBytes::Elgamal { first, second } => {
                first.to_writer(writer)?;
                second.to_writer(writer)?;
            }
            PkeskBytes::Ecdh {
                public_point,
                encrypted_session_key,
            } => {
                public_point.to_writer(writer)?;
                writer.write_u8(encrypted_session_key.len() as u8)?;
                writer.write_all(encrypted_session_key)?;
            }
            PkeskBytes::X25519 {
                ephemeral,
                session_key,
                sym_alg,
            } => {
                writer.write_all(&ephemeral[..])?;
                match sym_alg {
                    Some(sym) => {
                        writer.write_u8(session_key.len() as u8 + 1)?;
                        writer.write_u8(*sym as u8)?;
                    }
                    None => writer.write_u8(session_key.len() as u8)?,
                }
                writer.write_all(session_key)?;
            }
            PkeskBytes::Other { data } => writer.write_all(data)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_v3_rsa() {
        let pkesk = PublicKeyEncryptedSessionKey {
            packet_version: Version::New,
            version: 3,
            id: Some(KeyId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap()),
            fingerprint: None,
            pk_algorithm: PublicKeyAlgorithm::RSA,
            values: PkeskBytes::Rsa {
                mpi: Mpi::from_slice(&[0x99; 256]),
            },
        };

        let bytes = pkesk.to_bytes().unwrap();
        assert_eq!(
            PublicKeyEncryptedSessionKey::from_slice(Version::New, &bytes).unwrap(),
            pkesk
        );
    }

    #[test]
    fn test_roundtrip_v6_x25519() {
        let pkesk = PublicKeyEncryptedSessionKey {
            packet_version: Version::New,
            version: 6,
            id: None,
            fingerprint: Some((KeyVersion::V6, vec![0x77; 32])),
            pk_algorithm: PublicKeyAlgorithm::X25519,
            values: PkeskBytes::X25519 {
                ephemeral: [3u8; 32],
                session_key: vec![0x12; 40],
                sym_alg: None,
            },
        };

        let bytes = pkesk.to_bytes().unwrap();
        assert_eq!(
            PublicKeyEncryptedSessionKey::from_slice(Version::New, &bytes).unwrap(),
            pkesk
        );
    }
}
