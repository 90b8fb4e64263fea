use std::io;

use byteorder::WriteBytesExt;

use crate::crypto::ecc_curve::{ecc_curve_from_oid, ECCCurve};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::Mpi;
use crate::util::Reader;

/// The public parameters for the different algorithms.
///
/// Unknown algorithms keep their raw material so the packet reserializes
/// byte-exact; they can never be used for crypto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicParams {
    RSA {
        n: Mpi,
        e: Mpi,
    },
    DSA {
        p: Mpi,
        q: Mpi,
        g: Mpi,
        y: Mpi,
    },
    ECDSA {
        curve: ECCCurve,
        p: Mpi,
    },
    ECDH {
        curve: ECCCurve,
        p: Mpi,
        hash: HashAlgorithm,
        alg_sym: SymmetricKeyAlgorithm,
    },
    Elgamal {
        p: Mpi,
        g: Mpi,
        y: Mpi,
    },
    EdDSALegacy {
        curve: ECCCurve,
        q: Mpi,
    },
    Ed25519 {
        public: [u8; 32],
    },
    X25519 {
        public: [u8; 32],
    },
    Ed448 {
        public: [u8; 57],
    },
    X448 {
        public: [u8; 56],
    },
    Unknown {
        alg: u8,
        data: Vec<u8>,
    },
}

fn read_curve(r: &mut Reader<'_>) -> Result<ECCCurve> {
    let len = r.read_u8()?;
    let oid = r.take(len as usize)?;
    ecc_curve_from_oid(oid).ok_or_else(|| crate::format_err!("unknown curve oid {}", hex::encode(oid)))
}

fn write_curve<W: io::Write>(writer: &mut W, curve: &ECCCurve) -> Result<()> {
    let oid = curve.oid();
    writer.write_u8(oid.len() as u8)?;
    writer.write_all(&oid)?;

    Ok(())
}

impl PublicParams {
    pub fn try_from_reader(alg: PublicKeyAlgorithm, r: &mut Reader<'_>) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => Ok(PublicParams::RSA {
                n: Mpi::try_from_reader(r)?,
                e: Mpi::try_from_reader(r)?,
            }),
            PublicKeyAlgorithm::DSA => Ok(PublicParams::DSA {
                p: Mpi::try_from_reader(r)?,
                q: Mpi::try_from_reader(r)?,
                g: Mpi::try_from_reader(r)?,
                y: Mpi::try_from_reader(r)?,
            }),
            PublicKeyAlgorithm::ECDSA => Ok(PublicParams::ECDSA {
                curve: read_curve(r)?,
                p: Mpi::try_from_reader(r)?,
            }),
            PublicKeyAlgorithm::ECDH => {
                let curve = read_curve(r)?;
                let p = Mpi::try_from_reader(r)?;
                let kdf_len = r.read_u8()?;
                crate::ensure_eq!(kdf_len, 3, "invalid KDF parameter length");
                let reserved = r.read_u8()?;
                crate::ensure_eq!(reserved, 1, "invalid KDF parameter prefix");
                let hash = HashAlgorithm::try_from_u8(r.read_u8()?)?;
                let alg_sym = SymmetricKeyAlgorithm::try_from_u8(r.read_u8()?)?;

                Ok(PublicParams::ECDH {
                    curve,
                    p,
                    hash,
                    alg_sym,
                })
            }
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncrypt => {
                Ok(PublicParams::Elgamal {
                    p: Mpi::try_from_reader(r)?,
                    g: Mpi::try_from_reader(r)?,
                    y: Mpi::try_from_reader(r)?,
                })
            }
            PublicKeyAlgorithm::EdDSALegacy => Ok(PublicParams::EdDSALegacy {
                curve: read_curve(r)?,
                q: Mpi::try_from_reader(r)?,
            }),
            PublicKeyAlgorithm::Ed25519 => Ok(PublicParams::Ed25519 {
                public: r.take_arr()?,
            }),
            PublicKeyAlgorithm::X25519 => Ok(PublicParams::X25519 {
                public: r.take_arr()?,
            }),
            PublicKeyAlgorithm::Ed448 => Ok(PublicParams::Ed448 {
                public: r.take_arr()?,
            }),
            PublicKeyAlgorithm::X448 => Ok(PublicParams::X448 {
                public: r.take_arr()?,
            }),
            PublicKeyAlgorithm::DiffieHellman
            | PublicKeyAlgorithm::Private(_)
            | PublicKeyAlgorithm::Unknown(_) => Ok(PublicParams::Unknown {
                alg: alg.into(),
                data: r.rest().to_vec(),
            }),
        }
    }
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::RSA { n, e } => {
                n.to_writer(writer)?;
                e.to_writer(writer)?;
            }
            PublicParams::DSA { p, q, g, y } => {
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::ECDSA { curve, p } => {
                write_curve(writer, curve)?;
                p.to_writer(writer)?;
            }
            PublicParams::ECDH {
                curve,
                p,
                hash,
                alg_sym,
            } => {
                write_curve(writer, curve)?;
                p.to_writer(writer)?;
                writer.write_u8(3)?;
                writer.write_u8(1)?;
                writer.write_u8(*hash as u8)?;
                writer.write_u8(*alg_sym as u8)?;
            }
            PublicParams::Elgamal { p, g, y } => {
                p.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::EdDSALegacy { curve, q } => {
                write_curve(writer, curve)?;
                q.to_writer(writer)?;
            }
            PublicParams::Ed25519 { public } => {
                writer.write_all(&public[..])?;
            }
            PublicParams::X25519 { public } => {
                writer.write_all(&public[..])?;
            }
            PublicParams::Ed448 { public } => {
                writer.write_all(&public[..])?;
            }
            PublicParams::X448 { public } => {
                writer.write_all(&public[..])?;
            }
            PublicParams::Unknown { data, .. } => {
                writer.write_all(data)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsa_roundtrip() {
        let params = PublicParams::RSA {
            n: Mpi::from_slice(&[0xde, 0xad, 0xbe, 0xef]),
            e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
        };
        let bytes = params.to_bytes().unwrap();
        let mut r = Reader::new(&bytes);
        let parsed = PublicParams::try_from_reader(PublicKeyAlgorithm::RSA, &mut r).unwrap();
        assert_eq!(parsed, params);
        assert!(r.is_empty());
    }

    #[test]
    fn test_ecdh_roundtrip() {
        let params = PublicParams::ECDH {
            curve: ECCCurve::Curve25519,
            p: Mpi::from_slice(&[0x40; 33]),
            hash: HashAlgorithm::SHA256,
            alg_sym: SymmetricKeyAlgorithm::AES128,
        };
        let bytes = params.to_bytes().unwrap();
        let mut r = Reader::new(&bytes);
        let parsed = PublicParams::try_from_reader(PublicKeyAlgorithm::ECDH, &mut r).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn test_unknown_reserializes() {
        let raw = [1u8, 2, 3, 4];
        let mut r = Reader::new(&raw);
        let parsed =
            PublicParams::try_from_reader(PublicKeyAlgorithm::Unknown(99), &mut r).unwrap();
        assert_eq!(parsed.to_bytes().unwrap(), raw);
    }
}
