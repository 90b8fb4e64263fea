use digest::{Digest, DynDigest};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::errors::{Error, Result};

/// Hash algorithm identifiers.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-9.5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum HashAlgorithm {
    MD5 = 1,
    SHA1 = 2,
    RIPEMD160 = 3,
    SHA256 = 8,
    SHA384 = 9,
    SHA512 = 10,
    SHA224 = 11,
    SHA3_256 = 12,
    SHA3_512 = 14,
}

impl HashAlgorithm {
    pub fn try_from_u8(v: u8) -> Result<Self> {
        Self::from_u8(v).ok_or_else(|| Error::Unsupported(format!("hash algorithm {}", v)))
    }

    /// A streaming hasher for this algorithm.
    pub fn new_hasher(self) -> Result<Box<dyn DynDigest>> {
        match self {
            HashAlgorithm::MD5 => Ok(Box::new(md5::Md5::new())),
            HashAlgorithm::SHA1 => Ok(Box::new(sha1::Sha1::new())),
            HashAlgorithm::RIPEMD160 => Ok(Box::new(ripemd::Ripemd160::new())),
            HashAlgorithm::SHA256 => Ok(Box::new(sha2::Sha256::new())),
            HashAlgorithm::SHA384 => Ok(Box::new(sha2::Sha384::new())),
            HashAlgorithm::SHA512 => Ok(Box::new(sha2::Sha512::new())),
            HashAlgorithm::SHA224 => Ok(Box::new(sha2::Sha224::new())),
            HashAlgorithm::SHA3_256 => Ok(Box::new(sha3::Sha3_256::new())),
            HashAlgorithm::SHA3_512 => Ok(Box::new(sha3::Sha3_512::new())),
        }
    }

    /// One-shot digest.
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = self.new_hasher()?;
        hasher.update(data);
        Ok(hasher.finalize().to_vec())
    }

    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 | HashAlgorithm::RIPEMD160 => 20,
            HashAlgorithm::SHA224 => 28,
            HashAlgorithm::SHA256 | HashAlgorithm::SHA3_256 => 32,
            HashAlgorithm::SHA384 => 48,
            HashAlgorithm::SHA512 | HashAlgorithm::SHA3_512 => 64,
        }
    }

    /// Salt size for v6 signatures made with this algorithm.
    /// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-9.5
    pub fn salt_size(self) -> Result<usize> {
        match self {
            HashAlgorithm::SHA224 | HashAlgorithm::SHA256 | HashAlgorithm::SHA3_256 => Ok(16),
            HashAlgorithm::SHA384 => Ok(24),
            HashAlgorithm::SHA512 | HashAlgorithm::SHA3_512 => Ok(32),
            _ => Err(Error::Unsupported(format!(
                "{:?} can not be used for v6 signatures",
                self
            ))),
        }
    }

    /// Uppercase name, as used in armor `Hash:` headers.
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::MD5 => "MD5",
            HashAlgorithm::SHA1 => "SHA1",
            HashAlgorithm::RIPEMD160 => "RIPEMD160",
            HashAlgorithm::SHA256 => "SHA256",
            HashAlgorithm::SHA384 => "SHA384",
            HashAlgorithm::SHA512 => "SHA512",
            HashAlgorithm::SHA224 => "SHA224",
            HashAlgorithm::SHA3_256 => "SHA3-256",
            HashAlgorithm::SHA3_512 => "SHA3-512",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "MD5" => Some(HashAlgorithm::MD5),
            "SHA1" => Some(HashAlgorithm::SHA1),
            "RIPEMD160" => Some(HashAlgorithm::RIPEMD160),
            "SHA256" => Some(HashAlgorithm::SHA256),
            "SHA384" => Some(HashAlgorithm::SHA384),
            "SHA512" => Some(HashAlgorithm::SHA512),
            "SHA224" => Some(HashAlgorithm::SHA224),
            "SHA3-256" => Some(HashAlgorithm::SHA3_256),
            "SHA3-512" => Some(HashAlgorithm::SHA3_512),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest() {
        assert_eq!(
            hex::encode(HashAlgorithm::SHA1.digest(b"abc").unwrap()),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex::encode(HashAlgorithm::SHA256.digest(b"abc").unwrap()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_sizes() {
        for alg in [
            HashAlgorithm::MD5,
            HashAlgorithm::SHA1,
            HashAlgorithm::RIPEMD160,
            HashAlgorithm::SHA256,
            HashAlgorithm::SHA384,
            HashAlgorithm::SHA512,
            HashAlgorithm::SHA224,
            HashAlgorithm::SHA3_256,
            HashAlgorithm::SHA3_512,
        ] {
            assert_eq!(alg.digest(b"x").unwrap().len(), alg.digest_size());
        }
    }

    #[test]
    fn test_names_roundtrip() {
        for alg in [
            HashAlgorithm::SHA1,
            HashAlgorithm::SHA256,
            HashAlgorithm::SHA3_512,
        ] {
            assert_eq!(HashAlgorithm::from_name(alg.name()), Some(alg));
        }
    }
}
