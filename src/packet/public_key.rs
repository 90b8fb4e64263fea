use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use num_traits::FromPrimitive;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::DynCryptoRng;
use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{
    EskType, KeyId, KeyTrait, KeyVersion, PkeskBytes, PublicKeyTrait, PublicParams,
    SignatureBytes, Tag, Version,
};
use crate::util::Reader;

/// Represents a public key packet.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.5.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    packet_version: Version,
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    public_params: PublicParams,
}

/// Represents a public subkey packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicSubkey {
    packet_version: Version,
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    public_params: PublicParams,
}

/// Parses the fields shared by public and secret key packets, leaving the
/// reader positioned after the public material.
pub(crate) fn parse_public_fields(
    r: &mut Reader<'_>,
) -> Result<(KeyVersion, PublicKeyAlgorithm, DateTime<Utc>, PublicParams)> {
    let version = r.read_u8()?;
    let version = KeyVersion::from_u8(version).ok_or(Error::UnsupportedVersion(version))?;

    match version {
        KeyVersion::V4 | KeyVersion::V6 => {}
        _ => return Err(Error::UnsupportedVersion(version as u8)),
    }

    let created_at = Utc
        .timestamp_opt(i64::from(r.read_be_u32()?), 0)
        .single()
        .ok_or_else(|| crate::format_err!("invalid key creation time"))?;
    let algorithm = PublicKeyAlgorithm::from(r.read_u8()?);

    let public_params = if version == KeyVersion::V6 {
        let len = r.read_be_u32()? as usize;
        let material = r.take(len)?;
        let mut mr = Reader::new(material);
        let params = PublicParams::try_from_reader(algorithm, &mut mr)?;
        crate::ensure!(mr.is_empty(), "trailing public key material");
        params
    } else {
        PublicParams::try_from_reader(algorithm, r)?
    };

    Ok((version, algorithm, created_at, public_params))
}

pub(crate) fn write_public_fields<W: io::Write>(
    writer: &mut W,
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: &DateTime<Utc>,
    public_params: &PublicParams,
) -> Result<()> {
    writer.write_u8(version as u8)?;
    writer.write_u32::<BigEndian>(created_at.timestamp() as u32)?;
    writer.write_u8(algorithm.into())?;

    if version == KeyVersion::V6 {
        let material = public_params.to_bytes()?;
        writer.write_u32::<BigEndian>(material.len() as u32)?;
        writer.write_all(&material)?;
    } else {
        public_params.to_writer(writer)?;
    }

    Ok(())
}

/// Dispatches signature verification on the public material.
pub(crate) fn verify_signature_with(
    params: &PublicParams,
    hash: HashAlgorithm,
    hashed: &[u8],
    sig: &SignatureBytes,
) -> Result<()> {
    match (params, sig) {
        (PublicParams::RSA { n, e }, SignatureBytes::Mpis(mpis)) => {
            crate::ensure_eq!(mpis.len(), 1, "invalid signature");
            crate::crypto::rsa::verify(n, e, hash, hashed, mpis[0].as_bytes())
        }
        (PublicParams::DSA { p, q, g, y }, SignatureBytes::Mpis(mpis)) => {
            crate::ensure_eq!(mpis.len(), 2, "invalid signature");
            crate::crypto::dsa::verify(p, q, g, y, hashed, &mpis[0], &mpis[1])
        }
        (PublicParams::ECDSA { curve, p }, SignatureBytes::Mpis(mpis)) => {
            crate::ensure_eq!(mpis.len(), 2, "invalid signature");
            crate::crypto::ecdsa::verify(curve, p, hashed, &mpis[0], &mpis[1])
        }
        (PublicParams::EdDSALegacy { curve, q }, SignatureBytes::Mpis(mpis)) => {
            crate::ensure_eq!(mpis.len(), 2, "invalid signature");
            crate::crypto::eddsa::verify_legacy(curve, q, hashed, &mpis[0], &mpis[1])
        }
        (PublicParams::Ed25519 { public }, SignatureBytes::Native(raw)) => {
            crate::crypto::eddsa::verify(public, hashed, raw)
        }
        (PublicParams::X25519 { .. }, _) | (PublicParams::X448 { .. }, _) => {
            crate::bail!("key material can not be used for verify operations")
        }
        (PublicParams::ECDH { .. }, _) => {
            crate::bail!("ECDH can not be used for verify operations")
        }
        (PublicParams::Elgamal { .. }, _) => {
            crate::unimplemented_err!("verify Elgamal")
        }
        (PublicParams::Ed448 { .. }, _) => {
            crate::unsupported_err!("Ed448 verification")
        }
        (PublicParams::Unknown { alg, .. }, _) => {
            crate::unsupported_err!("verification with unknown algorithm {}", alg)
        }
        _ => crate::bail!("inconsistent signature encoding"),
    }
}

/// Dispatches session key encryption on the public material.
pub(crate) fn encrypt_session_key_with(
    params: &PublicParams,
    fingerprint: &[u8],
    rng: &mut DynCryptoRng<'_>,
    plain: &[u8],
    typ: EskType,
) -> Result<PkeskBytes> {
    match params {
        PublicParams::RSA { n, e } => crate::crypto::rsa::encrypt(rng, n, e, plain),
        PublicParams::ECDH {
            curve,
            p,
            hash,
            alg_sym,
        } => crate::crypto::ecdh::encrypt(rng, curve, p, *hash, *alg_sym, fingerprint, plain),
        PublicParams::X25519 { public } => {
            let (sym_alg, plain) = match typ {
                EskType::V6 => (None, plain),
                EskType::V3_4 => {
                    crate::ensure!(!plain.is_empty(), "plain may not be empty");
                    // byte 0 is the symmetric algorithm
                    (
                        Some(SymmetricKeyAlgorithm::try_from_u8(plain[0])?),
                        &plain[1..],
                    )
                }
            };

            let (ephemeral, session_key) = crate::crypto::x25519::encrypt(rng, public, plain)?;

            Ok(PkeskBytes::X25519 {
                ephemeral,
                session_key,
                sym_alg,
            })
        }
        PublicParams::Elgamal { .. } => crate::unimplemented_err!("encryption with Elgamal"),
        PublicParams::X448 { .. } => crate::unsupported_err!("X448 encryption"),
        PublicParams::Unknown { alg, .. } => {
            crate::unsupported_err!("encryption with unknown algorithm {}", alg)
        }
        _ => crate::bail!("key material can not be used for encryption"),
    }
}

macro_rules! impl_public_key {
    ($name:ident, $tag:expr) => {
        impl $name {
            pub fn new(
                packet_version: Version,
                version: KeyVersion,
                algorithm: PublicKeyAlgorithm,
                created_at: DateTime<Utc>,
                public_params: PublicParams,
            ) -> Result<Self> {
                match version {
                    KeyVersion::V4 | KeyVersion::V6 => {}
                    _ => return Err(Error::UnsupportedVersion(version as u8)),
                }

                Ok($name {
                    packet_version,
                    version,
                    algorithm,
                    created_at: created_at.trunc_subsecs(0),
                    public_params,
                })
            }

            /// Parses the packet from the given slice.
            pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
                let mut r = Reader::new(input);
                let (version, algorithm, created_at, public_params) =
                    parse_public_fields(&mut r)?;
                crate::ensure!(r.is_empty(), "trailing data in key packet");

                Ok($name {
                    packet_version,
                    version,
                    algorithm,
                    created_at,
                    public_params,
                })
            }

            pub fn packet_version(&self) -> Version {
                self.packet_version
            }

            pub fn tag(&self) -> Tag {
                $tag
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                write_public_fields(
                    writer,
                    self.version,
                    self.algorithm,
                    &self.created_at,
                    &self.public_params,
                )
            }
        }

        impl KeyTrait for $name {
            fn version(&self) -> KeyVersion {
                self.version
            }

            /// Returns the fingerprint of this key.
            fn fingerprint(&self) -> Vec<u8> {
                let body = self.to_bytes().expect("serialize to vec");

                match self.version {
                    KeyVersion::V6 => {
                        let mut hasher = sha2::Sha256::default();
                        digest::Digest::update(&mut hasher, [0x9b]);
                        digest::Digest::update(
                            &mut hasher,
                            (body.len() as u32).to_be_bytes(),
                        );
                        digest::Digest::update(&mut hasher, &body);
                        digest::Digest::finalize(hasher).to_vec()
                    }
                    _ => {
                        let mut hasher = sha1::Sha1::default();
                        digest::Digest::update(&mut hasher, [0x99]);
                        digest::Digest::update(
                            &mut hasher,
                            (body.len() as u16).to_be_bytes(),
                        );
                        digest::Digest::update(&mut hasher, &body);
                        digest::Digest::finalize(hasher).to_vec()
                    }
                }
            }

            /// Returns the Key ID of the key.
            fn key_id(&self) -> KeyId {
                let f = self.fingerprint();
                let raw: [u8; 8] = match self.version {
                    // High 64 bits
                    KeyVersion::V6 => f[0..8].try_into().expect("fixed size"),
                    // Low 64 bits
                    _ => f[f.len() - 8..].try_into().expect("fixed size"),
                };
                raw.into()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.algorithm
            }

            fn created_at(&self) -> &DateTime<Utc> {
                &self.created_at
            }
        }

        impl PublicKeyTrait for $name {
            fn public_params(&self) -> &PublicParams {
                &self.public_params
            }

            fn verify_signature(
                &self,
                hash: HashAlgorithm,
                hashed: &[u8],
                sig: &SignatureBytes,
            ) -> Result<()> {
                verify_signature_with(&self.public_params, hash, hashed, sig)
            }

            fn encrypt_session_key(
                &self,
                rng: &mut DynCryptoRng<'_>,
                plain: &[u8],
                typ: EskType,
            ) -> Result<PkeskBytes> {
                encrypt_session_key_with(
                    &self.public_params,
                    &self.fingerprint(),
                    rng,
                    plain,
                    typ,
                )
            }

            fn to_signable_bytes(&self) -> Result<Vec<u8>> {
                let body = self.to_bytes()?;
                let mut out = Vec::with_capacity(body.len() + 5);
                out.push(self.version.signing_prefix());
                match self.version {
                    KeyVersion::V6 => {
                        out.extend_from_slice(&(body.len() as u32).to_be_bytes())
                    }
                    _ => out.extend_from_slice(&(body.len() as u16).to_be_bytes()),
                }
                out.extend_from_slice(&body);

                Ok(out)
            }
        }
    };
}

impl_public_key!(PublicKey, Tag::PublicKey);
impl_public_key!(PublicSubkey, Tag::PublicSubkey);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mpi;

    fn sample_v4() -> PublicKey {
        PublicKey::new(
            Version::New,
            KeyVersion::V4,
            PublicKeyAlgorithm::RSA,
            Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
            PublicParams::RSA {
                n: Mpi::from_slice(&[0xaa; 128]),
                e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip_v4() {
        let key = sample_v4();
        let bytes = key.to_bytes().unwrap();
        let back = PublicKey::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_roundtrip_v6() {
        let key = PublicKey::new(
            Version::New,
            KeyVersion::V6,
            PublicKeyAlgorithm::Ed25519,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            PublicParams::Ed25519 { public: [7u8; 32] },
        )
        .unwrap();
        let bytes = key.to_bytes().unwrap();
        let back = PublicKey::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(back, key);

        assert_eq!(key.fingerprint().len(), 32);
        assert_eq!(key.key_id().as_bytes(), &key.fingerprint()[..8]);
    }

    #[test]
    fn test_v4_key_id_is_low_bits() {
        let key = sample_v4();
        let fp = key.fingerprint();
        assert_eq!(fp.len(), 20);
        assert_eq!(key.key_id().as_bytes(), &fp[12..]);
    }

    #[test]
    fn test_v3_rejected() {
        let mut bytes = sample_v4().to_bytes().unwrap();
        bytes[0] = 3;
        assert!(matches!(
            PublicKey::from_slice(Version::New, &bytes),
            Err(Error::UnsupportedVersion(3))
        ));
    }
}
