use std::fmt;
use std::io;

use byteorder::WriteBytesExt;
use num_bigint::BigUint;
use num_traits::One;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::checksum;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{
    DsaSecretKey, EcdhSecretKey, EcdsaSecretKey, KeyVersion, Mpi, PublicParams, SecretKeyRepr,
    StringToKey, X25519SecretKey,
};
use crate::util::Reader;

/// How the secret key material is protected.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.5.3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S2kUsage {
    /// Plaintext secret material.
    Unprotected,
    /// Very old keys store the symmetric algorithm directly in the usage
    /// octet, with an implicit MD5 S2K.
    LegacyCfb(SymmetricKeyAlgorithm),
    /// AEAD protection (usage octet 253).
    Aead,
    /// CFB protection with a SHA-1 integrity trailer (usage octet 254).
    Cfb,
    /// CFB protection with a malleable two-octet checksum (usage octet 255).
    MalleableCfb,
}

impl From<S2kUsage> for u8 {
    fn from(u: S2kUsage) -> u8 {
        match u {
            S2kUsage::Unprotected => 0,
            S2kUsage::LegacyCfb(alg) => alg as u8,
            S2kUsage::Aead => 253,
            S2kUsage::Cfb => 254,
            S2kUsage::MalleableCfb => 255,
        }
    }
}

/// The decrypted secret parameters for the different algorithms.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub enum PlainSecretParams {
    RSA { d: Mpi, p: Mpi, q: Mpi, u: Mpi },
    DSA(Mpi),
    ECDSA(Mpi),
    ECDH(Mpi),
    Elgamal(Mpi),
    EdDSALegacy(Mpi),
    Ed25519([u8; 32]),
    X25519([u8; 32]),
    Unknown(Vec<u8>),
}

impl fmt::Debug for PlainSecretParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlainSecretParams::RSA { .. } => "RSA",
            PlainSecretParams::DSA(_) => "DSA",
            PlainSecretParams::ECDSA(_) => "ECDSA",
            PlainSecretParams::ECDH(_) => "ECDH",
            PlainSecretParams::Elgamal(_) => "Elgamal",
            PlainSecretParams::EdDSALegacy(_) => "EdDSALegacy",
            PlainSecretParams::Ed25519(_) => "Ed25519",
            PlainSecretParams::X25519(_) => "X25519",
            PlainSecretParams::Unknown(_) => "Unknown",
        };
        write!(f, "PlainSecretParams::{}(..)", name)
    }
}

impl PlainSecretParams {
    pub fn try_from_reader(alg: PublicKeyAlgorithm, r: &mut Reader<'_>) -> Result<Self> {
        let params = match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => PlainSecretParams::RSA {
                d: Mpi::try_from_reader(r)?,
                p: Mpi::try_from_reader(r)?,
                q: Mpi::try_from_reader(r)?,
                u: Mpi::try_from_reader(r)?,
            },
            PublicKeyAlgorithm::DSA => PlainSecretParams::DSA(Mpi::try_from_reader(r)?),
            PublicKeyAlgorithm::ECDSA => PlainSecretParams::ECDSA(Mpi::try_from_reader(r)?),
            PublicKeyAlgorithm::ECDH => PlainSecretParams::ECDH(Mpi::try_from_reader(r)?),
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncrypt => {
                PlainSecretParams::Elgamal(Mpi::try_from_reader(r)?)
            }
            PublicKeyAlgorithm::EdDSALegacy => {
                PlainSecretParams::EdDSALegacy(Mpi::try_from_reader(r)?)
            }
            PublicKeyAlgorithm::Ed25519 => PlainSecretParams::Ed25519(r.take_arr()?),
            PublicKeyAlgorithm::X25519 => PlainSecretParams::X25519(r.take_arr()?),
            _ => PlainSecretParams::Unknown(r.rest().to_vec()),
        };

        Ok(params)
    }

    /// Two-octet sum checksum over the serialized material.
    pub fn checksum_simple(&self) -> Result<[u8; 2]> {
        let body = self.to_bytes()?;
        Ok(checksum::calculate_simple(&body).to_be_bytes())
    }

    /// Turns the raw parameters into an operational private key.
    pub fn as_repr(&self, public: &PublicParams) -> Result<SecretKeyRepr> {
        match (self, public) {
            (
                PlainSecretParams::RSA { d, p, q, .. },
                PublicParams::RSA { n, e },
            ) => {
                let key = crate::crypto::rsa::private_key_from_mpis(n, e, d, p, q)?;
                Ok(SecretKeyRepr::RSA(key))
            }
            (PlainSecretParams::DSA(x), PublicParams::DSA { p, q, g, y }) => {
                Ok(SecretKeyRepr::DSA(DsaSecretKey {
                    p: p.clone(),
                    q: q.clone(),
                    g: g.clone(),
                    y: y.clone(),
                    x: x.clone(),
                }))
            }
            (PlainSecretParams::ECDSA(d), PublicParams::ECDSA { curve, .. }) => {
                Ok(SecretKeyRepr::ECDSA(EcdsaSecretKey {
                    curve: curve.clone(),
                    d: d.clone(),
                }))
            }
            (
                PlainSecretParams::ECDH(d),
                PublicParams::ECDH {
                    curve,
                    hash,
                    alg_sym,
                    ..
                },
            ) => Ok(SecretKeyRepr::ECDH(EcdhSecretKey {
                curve: curve.clone(),
                d: d.clone(),
                hash: *hash,
                alg_sym: *alg_sym,
            })),
            (PlainSecretParams::EdDSALegacy(seed), PublicParams::EdDSALegacy { .. }) => {
                let raw: [u8; 32] = seed.to_padded(32)?.try_into().expect("fixed size");
                Ok(SecretKeyRepr::EdDSA(ed25519_dalek::SigningKey::from_bytes(
                    &raw,
                )))
            }
            (PlainSecretParams::Ed25519(seed), PublicParams::Ed25519 { .. }) => Ok(
                SecretKeyRepr::EdDSA(ed25519_dalek::SigningKey::from_bytes(seed)),
            ),
            (PlainSecretParams::X25519(secret), PublicParams::X25519 { .. }) => {
                Ok(SecretKeyRepr::X25519(X25519SecretKey { secret: *secret }))
            }
            (PlainSecretParams::Elgamal(_), _) => {
                crate::unimplemented_err!("Elgamal secret keys")
            }
            (PlainSecretParams::Unknown(_), _) => {
                crate::unsupported_err!("secret key material for unknown algorithm")
            }
            _ => crate::bail!("inconsistent key parameters"),
        }
    }

    /// Algebraic consistency check between the secret and public material.
    pub fn is_valid(&self, public: &PublicParams) -> Result<()> {
        match (self, public) {
            (PlainSecretParams::RSA { d, p, q, .. }, PublicParams::RSA { n, e }) => {
                let p = BigUint::from(p);
                let q = BigUint::from(q);
                let n = BigUint::from(n);
                crate::ensure!(&p * &q == n, "n does not equal p * q");

                let de = BigUint::from(d) * BigUint::from(e);
                let one = BigUint::one();
                crate::ensure!(
                    de.clone() % (p - &one) == one && de % (q - &one) == one,
                    "d is not the inverse of e"
                );
                Ok(())
            }
            (PlainSecretParams::DSA(x), PublicParams::DSA { p, g, y, .. }) => {
                crate::ensure!(
                    crate::crypto::dsa::is_valid(p, g, y, x),
                    "y does not equal g^x mod p"
                );
                Ok(())
            }
            (PlainSecretParams::ECDSA(d), PublicParams::ECDSA { curve, p }) => {
                crate::crypto::ecdsa::is_valid(curve, p, d)
            }
            (PlainSecretParams::ECDH(d), PublicParams::ECDH { curve, p, .. }) => {
                crate::crypto::ecdh::is_valid(curve, p, d)
            }
            (PlainSecretParams::Elgamal(x), PublicParams::Elgamal { p, g, y }) => {
                let p = BigUint::from(p);
                let g = BigUint::from(g);
                let y = BigUint::from(y);
                let x = BigUint::from(x);
                crate::ensure!(g.modpow(&x, &p) == y, "y does not equal g^x mod p");
                Ok(())
            }
            (PlainSecretParams::EdDSALegacy(seed), PublicParams::EdDSALegacy { q, .. }) => {
                crate::ensure_eq!(q.len(), 33, "invalid Q (len)");
                let raw: [u8; 32] = seed.to_padded(32)?.try_into().expect("fixed size");
                crate::crypto::eddsa::is_valid(&raw, &q.as_bytes()[1..])
            }
            (PlainSecretParams::Ed25519(seed), PublicParams::Ed25519 { public }) => {
                crate::crypto::eddsa::is_valid(seed, public)
            }
            (PlainSecretParams::X25519(secret), PublicParams::X25519 { public }) => {
                crate::crypto::x25519::is_valid(secret, public)
            }
            (PlainSecretParams::Unknown(_), PublicParams::Unknown { .. }) => Ok(()),
            _ => crate::bail!("inconsistent key parameters"),
        }
    }
}

impl Serialize for PlainSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PlainSecretParams::RSA { d, p, q, u } => {
                d.to_writer(writer)?;
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                u.to_writer(writer)?;
            }
            PlainSecretParams::DSA(x)
            | PlainSecretParams::ECDSA(x)
            | PlainSecretParams::ECDH(x)
            | PlainSecretParams::Elgamal(x)
            | PlainSecretParams::EdDSALegacy(x) => {
                x.to_writer(writer)?;
            }
            PlainSecretParams::Ed25519(raw) | PlainSecretParams::X25519(raw) => {
                writer.write_all(&raw[..])?;
            }
            PlainSecretParams::Unknown(raw) => {
                writer.write_all(raw)?;
            }
        }

        Ok(())
    }
}

/// Secret key material in its stored (possibly encrypted) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecretParams {
    /// Ciphertext, including the SHA-1 trailer or AEAD tag.
    pub data: Vec<u8>,
    /// CFB IV, or the AEAD nonce.
    pub iv: Vec<u8>,
    pub encryption_algorithm: SymmetricKeyAlgorithm,
    pub aead: Option<AeadAlgorithm>,
    pub string_to_key: StringToKey,
    pub usage: S2kUsage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

impl SecretParams {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }

    pub fn string_to_key_usage(&self) -> S2kUsage {
        match self {
            SecretParams::Plain(_) => S2kUsage::Unprotected,
            SecretParams::Encrypted(e) => e.usage,
        }
    }

    pub fn try_from_reader(
        r: &mut Reader<'_>,
        version: KeyVersion,
        alg: PublicKeyAlgorithm,
    ) -> Result<Self> {
        let usage = r.read_u8()?;

        if version == KeyVersion::V6 && usage != 0 {
            // cumulative length of the conditional fields
            let _len = r.read_u8()?;
        }

        match usage {
            0 => {
                let rest = r.rest();
                let material = if version == KeyVersion::V6 {
                    rest
                } else {
                    crate::ensure!(rest.len() >= 2, "missing secret material checksum");
                    let (material, cksum) = rest.split_at(rest.len() - 2);
                    checksum::simple(cksum, material)?;
                    material
                };

                let mut mr = Reader::new(material);
                let params = PlainSecretParams::try_from_reader(alg, &mut mr)?;
                crate::ensure!(mr.is_empty(), "trailing secret material");

                Ok(SecretParams::Plain(params))
            }
            253 => {
                let sym = SymmetricKeyAlgorithm::try_from_u8(r.read_u8()?)?;
                let aead = AeadAlgorithm::try_from_u8(r.read_u8()?)?;
                if version == KeyVersion::V6 {
                    let _s2k_len = r.read_u8()?;
                }
                let s2k = StringToKey::try_from_reader(r)?;
                let iv = r.take(aead.iv_size())?.to_vec();
                let data = r.rest().to_vec();

                Ok(SecretParams::Encrypted(EncryptedSecretParams {
                    data,
                    iv,
                    encryption_algorithm: sym,
                    aead: Some(aead),
                    string_to_key: s2k,
                    usage: S2kUsage::Aead,
                }))
            }
            254 | 255 => {
                if usage == 255 && version == KeyVersion::V6 {
                    return Err(Error::InvalidArgument(
                        "v6 keys can not use the malleable CFB protection".into(),
                    ));
                }

                let sym = SymmetricKeyAlgorithm::try_from_u8(r.read_u8()?)?;
                if version == KeyVersion::V6 {
                    let _s2k_len = r.read_u8()?;
                }
                let s2k = StringToKey::try_from_reader(r)?;
                if s2k.is_argon2() {
                    return Err(Error::InvalidArgument(
                        "Argon2 requires AEAD protection".into(),
                    ));
                }
                let iv = r.take(sym.block_size())?.to_vec();
                let data = r.rest().to_vec();

                Ok(SecretParams::Encrypted(EncryptedSecretParams {
                    data,
                    iv,
                    encryption_algorithm: sym,
                    aead: None,
                    string_to_key: s2k,
                    usage: if usage == 254 {
                        S2kUsage::Cfb
                    } else {
                        S2kUsage::MalleableCfb
                    },
                }))
            }
            _ => {
                let sym = SymmetricKeyAlgorithm::try_from_u8(usage)?;
                let iv = r.take(sym.block_size())?.to_vec();
                let data = r.rest().to_vec();

                Ok(SecretParams::Encrypted(EncryptedSecretParams {
                    data,
                    iv,
                    encryption_algorithm: sym,
                    aead: None,
                    string_to_key: StringToKey::Simple {
                        hash: HashAlgorithm::MD5,
                    },
                    usage: S2kUsage::LegacyCfb(sym),
                }))
            }
        }
    }

    pub fn to_writer<W: io::Write>(&self, writer: &mut W, version: KeyVersion) -> Result<()> {
        match self {
            SecretParams::Plain(params) => {
                writer.write_u8(0)?;
                params.to_writer(writer)?;
                if version != KeyVersion::V6 {
                    writer.write_all(&params.checksum_simple()?)?;
                }
            }
            SecretParams::Encrypted(params) => {
                writer.write_u8(params.usage.into())?;

                match params.usage {
                    S2kUsage::LegacyCfb(_) => {
                        writer.write_all(&params.iv)?;
                        writer.write_all(&params.data)?;
                    }
                    S2kUsage::Aead | S2kUsage::Cfb | S2kUsage::MalleableCfb => {
                        let s2k = params.string_to_key.to_bytes()?;

                        if version == KeyVersion::V6 {
                            let mut count = 1 + 1 + s2k.len() + params.iv.len();
                            if params.aead.is_some() {
                                count += 1;
                            }
                            writer.write_u8(count as u8)?;
                        }

                        writer.write_u8(params.encryption_algorithm as u8)?;
                        if let Some(aead) = params.aead {
                            writer.write_u8(aead as u8)?;
                        }
                        if version == KeyVersion::V6 {
                            writer.write_u8(s2k.len() as u8)?;
                        }
                        writer.write_all(&s2k)?;
                        writer.write_all(&params.iv)?;
                        writer.write_all(&params.data)?;
                    }
                    S2kUsage::Unprotected => unreachable!("plain material is not encrypted"),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(params: &SecretParams, version: KeyVersion, alg: PublicKeyAlgorithm) {
        let mut buf = Vec::new();
        params.to_writer(&mut buf, version).unwrap();
        let mut r = Reader::new(&buf);
        let back = SecretParams::try_from_reader(&mut r, version, alg).unwrap();
        assert_eq!(&back, params);
        assert!(r.is_empty());
    }

    #[test]
    fn test_plain_roundtrip_v4_and_v6() {
        let params = SecretParams::Plain(PlainSecretParams::Ed25519([3u8; 32]));
        roundtrip(&params, KeyVersion::V4, PublicKeyAlgorithm::Ed25519);
        roundtrip(&params, KeyVersion::V6, PublicKeyAlgorithm::Ed25519);
    }

    #[test]
    fn test_plain_checksum_is_verified() {
        let params = SecretParams::Plain(PlainSecretParams::Ed25519([3u8; 32]));
        let mut buf = Vec::new();
        params.to_writer(&mut buf, KeyVersion::V4).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 1;
        let mut r = Reader::new(&buf);
        assert!(matches!(
            SecretParams::try_from_reader(&mut r, KeyVersion::V4, PublicKeyAlgorithm::Ed25519),
            Err(Error::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let params = SecretParams::Encrypted(EncryptedSecretParams {
            data: vec![1, 2, 3, 4],
            iv: vec![0u8; 16],
            encryption_algorithm: SymmetricKeyAlgorithm::AES128,
            aead: None,
            string_to_key: StringToKey::IteratedAndSalted {
                hash: HashAlgorithm::SHA256,
                salt: [7u8; 8],
                count: 224,
            },
            usage: S2kUsage::Cfb,
        });
        roundtrip(&params, KeyVersion::V4, PublicKeyAlgorithm::RSA);
        roundtrip(&params, KeyVersion::V6, PublicKeyAlgorithm::RSA);
    }

    #[test]
    fn test_aead_roundtrip_v6() {
        let params = SecretParams::Encrypted(EncryptedSecretParams {
            data: vec![9u8; 48],
            iv: vec![1u8; 15],
            encryption_algorithm: SymmetricKeyAlgorithm::AES256,
            aead: Some(AeadAlgorithm::Ocb),
            string_to_key: StringToKey::Argon2 {
                salt: [4u8; 16],
                t: 1,
                p: 4,
                m_enc: 10,
            },
            usage: S2kUsage::Aead,
        });
        roundtrip(&params, KeyVersion::V6, PublicKeyAlgorithm::Ed25519);
    }

    #[test]
    fn test_v6_malleable_rejected() {
        // usage octet 255 in a v6 key
        let buf = [255u8, 10, 7, 3, 8, 1, 2, 3, 4, 5, 6, 7, 8, 224];
        let mut r = Reader::new(&buf);
        assert!(matches!(
            SecretParams::try_from_reader(&mut r, KeyVersion::V6, PublicKeyAlgorithm::RSA),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_argon2_without_aead_rejected() {
        let s2k = StringToKey::Argon2 {
            salt: [0u8; 16],
            t: 1,
            p: 4,
            m_enc: 10,
        };
        let mut buf = vec![254u8, 7];
        buf.extend(s2k.to_bytes().unwrap());
        buf.extend([0u8; 16]);
        let mut r = Reader::new(&buf);
        assert!(matches!(
            SecretParams::try_from_reader(&mut r, KeyVersion::V4, PublicKeyAlgorithm::RSA),
            Err(Error::InvalidArgument(_))
        ));
    }
}
