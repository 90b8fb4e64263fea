use std::io;

use byteorder::WriteBytesExt;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::util::Reader;

/// String-to-key specifiers, used to derive symmetric keys from passphrases.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-3.7
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringToKey {
    Simple {
        hash: HashAlgorithm,
    },
    Salted {
        hash: HashAlgorithm,
        salt: [u8; 8],
    },
    IteratedAndSalted {
        hash: HashAlgorithm,
        salt: [u8; 8],
        /// Coded iteration count.
        count: u8,
    },
    Argon2 {
        salt: [u8; 16],
        /// Number of passes.
        t: u8,
        /// Degree of parallelism.
        p: u8,
        /// Exponent of the memory size: `2^m_enc` KiB.
        m_enc: u8,
    },
}

/// Decodes a coded iterated S2K count into the actual octet count.
#[inline]
pub fn decode_count(coded: u8) -> usize {
    (16 + (coded as usize & 15)) << ((coded as usize >> 4) + 6)
}

impl StringToKey {
    /// The default specifier for locking v4 keys: iterated and salted,
    /// SHA-256.
    pub fn new_default<R: Rng + CryptoRng>(rng: &mut R) -> Self {
        let mut salt = [0u8; 8];
        rng.fill_bytes(&mut salt);

        StringToKey::IteratedAndSalted {
            hash: HashAlgorithm::SHA256,
            salt,
            count: 224,
        }
    }

    /// The RFC 9580 memory constrained Argon2id profile (t=3, p=4, 64 MiB).
    pub fn new_argon2<R: Rng + CryptoRng>(rng: &mut R) -> Self {
        let mut salt = [0u8; 16];
        rng.fill_bytes(&mut salt);

        StringToKey::Argon2 {
            salt,
            t: 3,
            p: 4,
            m_enc: 16,
        }
    }

    pub fn typ(&self) -> u8 {
        match self {
            StringToKey::Simple { .. } => 0,
            StringToKey::Salted { .. } => 1,
            StringToKey::IteratedAndSalted { .. } => 3,
            StringToKey::Argon2 { .. } => 4,
        }
    }

    pub fn is_argon2(&self) -> bool {
        matches!(self, StringToKey::Argon2 { .. })
    }

    pub fn try_from_reader(r: &mut Reader<'_>) -> Result<Self> {
        let typ = r.read_u8()?;
        match typ {
            0 => Ok(StringToKey::Simple {
                hash: HashAlgorithm::try_from_u8(r.read_u8()?)?,
            }),
            1 => Ok(StringToKey::Salted {
                hash: HashAlgorithm::try_from_u8(r.read_u8()?)?,
                salt: r.take_arr()?,
            }),
            3 => Ok(StringToKey::IteratedAndSalted {
                hash: HashAlgorithm::try_from_u8(r.read_u8()?)?,
                salt: r.take_arr()?,
                count: r.read_u8()?,
            }),
            4 => Ok(StringToKey::Argon2 {
                salt: r.take_arr()?,
                t: r.read_u8()?,
                p: r.read_u8()?,
                m_enc: r.read_u8()?,
            }),
            _ => Err(Error::Unsupported(format!("S2K type {}", typ))),
        }
    }

    /// Derives `key_size` octets of key material from `passphrase`.
    pub fn derive(&self, passphrase: &[u8], key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        crate::ensure!(!passphrase.is_empty(), "empty passphrase");

        match self {
            StringToKey::Simple { hash }
            | StringToKey::Salted { hash, .. }
            | StringToKey::IteratedAndSalted { hash, .. } => {
                let salt: &[u8] = match self {
                    StringToKey::Simple { .. } => &[],
                    StringToKey::Salted { salt, .. }
                    | StringToKey::IteratedAndSalted { salt, .. } => &salt[..],
                    StringToKey::Argon2 { .. } => unreachable!(),
                };

                let mut out = Zeroizing::new(Vec::with_capacity(key_size));
                // Context octets: instance `i` is preloaded with `i` zeros, so
                // each round produces an independent digest.
                let mut ctx = 0usize;

                while out.len() < key_size {
                    let mut hasher = hash.new_hasher()?;
                    hasher.update(&vec![0u8; ctx]);

                    match self {
                        StringToKey::Simple { .. } | StringToKey::Salted { .. } => {
                            hasher.update(salt);
                            hasher.update(passphrase);
                        }
                        StringToKey::IteratedAndSalted { count, .. } => {
                            let mut data = Zeroizing::new(Vec::with_capacity(
                                salt.len() + passphrase.len(),
                            ));
                            data.extend_from_slice(salt);
                            data.extend_from_slice(passphrase);

                            // At least one full copy is always hashed; the
                            // final repetition is truncated.
                            let mut todo = decode_count(*count).max(data.len());
                            while todo > 0 {
                                let n = todo.min(data.len());
                                hasher.update(&data[..n]);
                                todo -= n;
                            }
                        }
                        StringToKey::Argon2 { .. } => unreachable!(),
                    }

                    out.extend_from_slice(&hasher.finalize());
                    ctx += 1;
                }

                out.truncate(key_size);
                Ok(out)
            }
            StringToKey::Argon2 { salt, t, p, m_enc } => {
                let m_cost = 1u32
                    .checked_shl(u32::from(*m_enc))
                    .ok_or_else(|| Error::InvalidArgument("Argon2 memory too large".into()))?;
                let params =
                    argon2::Params::new(m_cost, u32::from(*t), u32::from(*p), Some(key_size))
                        .map_err(|e| Error::CryptoError(e.to_string()))?;
                let argon2 = argon2::Argon2::new(
                    argon2::Algorithm::Argon2id,
                    argon2::Version::V0x13,
                    params,
                );

                let mut out = Zeroizing::new(vec![0u8; key_size]);
                argon2
                    .hash_password_into(passphrase, &salt[..], &mut out)
                    .map_err(|e| Error::CryptoError(e.to_string()))?;

                Ok(out)
            }
        }
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.typ())?;
        match self {
            StringToKey::Simple { hash } => {
                writer.write_u8(*hash as u8)?;
            }
            StringToKey::Salted { hash, salt } => {
                writer.write_u8(*hash as u8)?;
                writer.write_all(&salt[..])?;
            }
            StringToKey::IteratedAndSalted { hash, salt, count } => {
                writer.write_u8(*hash as u8)?;
                writer.write_all(&salt[..])?;
                writer.write_u8(*count)?;
            }
            StringToKey::Argon2 { salt, t, p, m_enc } => {
                writer.write_all(&salt[..])?;
                writer.write_u8(*t)?;
                writer.write_u8(*p)?;
                writer.write_u8(*m_enc)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_count() {
        assert_eq!(decode_count(0), 1024);
        assert_eq!(decode_count(96), 65536);
        assert_eq!(decode_count(255), 65011712);
    }

    #[test]
    fn test_s2k_roundtrip() {
        let cases = [
            StringToKey::Simple {
                hash: HashAlgorithm::SHA256,
            },
            StringToKey::Salted {
                hash: HashAlgorithm::SHA1,
                salt: [1, 2, 3, 4, 5, 6, 7, 8],
            },
            StringToKey::IteratedAndSalted {
                hash: HashAlgorithm::SHA256,
                salt: [8, 7, 6, 5, 4, 3, 2, 1],
                count: 224,
            },
            StringToKey::Argon2 {
                salt: [9u8; 16],
                t: 1,
                p: 4,
                m_enc: 10,
            },
        ];

        for s2k in cases {
            let bytes = s2k.to_bytes().unwrap();
            let mut r = Reader::new(&bytes);
            assert_eq!(StringToKey::try_from_reader(&mut r).unwrap(), s2k);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut r = Reader::new(&[2, 8]);
        assert!(StringToKey::try_from_reader(&mut r).is_err());
    }

    #[test]
    fn test_simple_is_truncated_digest() {
        // Simple S2K is a plain hash of the passphrase.
        let s2k = StringToKey::Simple {
            hash: HashAlgorithm::SHA256,
        };
        let key = s2k.derive(b"abc", 16).unwrap();
        assert_eq!(hex::encode(&key[..]), "ba7816bf8f01cfea414140de5dae2223");
    }

    #[test]
    fn test_iterated_min_one_copy() {
        // A count smaller than |salt + passphrase| still hashes one full
        // copy, making the result identical to the salted variant.
        let salt = [0x11u8; 8];
        let iterated = StringToKey::IteratedAndSalted {
            hash: HashAlgorithm::SHA1,
            salt,
            count: 0,
        };
        let salted = StringToKey::Salted {
            hash: HashAlgorithm::SHA1,
            salt,
        };
        let long_pw = vec![0x42u8; 2048];
        assert_eq!(
            iterated.derive(&long_pw, 16).unwrap(),
            salted.derive(&long_pw, 16).unwrap()
        );
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let s2k = StringToKey::Simple {
            hash: HashAlgorithm::SHA256,
        };
        assert!(s2k.derive(b"", 16).is_err());
    }

    #[test]
    fn test_derive_spans_multiple_digests() {
        // 64 bytes of output from a 20 byte digest needs four contexts.
        let s2k = StringToKey::Salted {
            hash: HashAlgorithm::SHA1,
            salt: [0xaa; 8],
        };
        let key = s2k.derive(b"test", 64).unwrap();
        assert_eq!(key.len(), 64);
        // Different contexts must differ.
        assert_ne!(key[..20], key[20..40]);
    }
}
