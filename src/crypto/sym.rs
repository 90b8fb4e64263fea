use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::errors::{Error, Result};

/// Symmetric key algorithm identifiers.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-9.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    Plaintext = 0,
    IDEA = 1,
    /// TripleDES (DES-EDE, 168 bit key derived from 192)
    TripleDES = 2,
    /// CAST5 (128 bit key, as per RFC 2144)
    CAST5 = 3,
    /// Blowfish (128 bit key, 16 rounds)
    Blowfish = 4,
    AES128 = 7,
    AES192 = 8,
    AES256 = 9,
    /// Twofish with 256-bit key
    Twofish = 10,
    Camellia128 = 11,
    Camellia192 = 12,
    Camellia256 = 13,
}

macro_rules! cfb {
    ($mode:ident, $op:ident, $cipher:ty, $key:expr, $iv:expr, $data:expr) => {{
        use cipher::{AsyncStreamCipher, KeyIvInit};
        cfb_mode::$mode::<$cipher>::new_from_slices($key, $iv)
            .map_err(|e| Error::CryptoError(e.to_string()))?
            .$op($data);
        Ok(())
    }};
}

impl SymmetricKeyAlgorithm {
    pub fn try_from_u8(v: u8) -> Result<Self> {
        Self::from_u8(v).ok_or_else(|| Error::Unsupported(format!("symmetric algorithm {}", v)))
    }

    /// Key size in octets.
    pub fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish
            | SymmetricKeyAlgorithm::AES128
            | SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::TripleDES
            | SymmetricKeyAlgorithm::AES192
            | SymmetricKeyAlgorithm::Camellia192 => 24,
            SymmetricKeyAlgorithm::AES256
            | SymmetricKeyAlgorithm::Twofish
            | SymmetricKeyAlgorithm::Camellia256 => 32,
        }
    }

    /// Block size in octets.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::TripleDES
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::AES128
            | SymmetricKeyAlgorithm::AES192
            | SymmetricKeyAlgorithm::AES256
            | SymmetricKeyAlgorithm::Twofish
            | SymmetricKeyAlgorithm::Camellia128
            | SymmetricKeyAlgorithm::Camellia192
            | SymmetricKeyAlgorithm::Camellia256 => 16,
        }
    }

    /// CFB encrypts `data` in place.
    pub fn encrypt_cfb(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::AES128 => cfb!(Encryptor, encrypt, aes::Aes128, key, iv, data),
            SymmetricKeyAlgorithm::AES192 => cfb!(Encryptor, encrypt, aes::Aes192, key, iv, data),
            SymmetricKeyAlgorithm::AES256 => cfb!(Encryptor, encrypt, aes::Aes256, key, iv, data),
            SymmetricKeyAlgorithm::TripleDES => {
                cfb!(Encryptor, encrypt, des::TdesEde3, key, iv, data)
            }
            SymmetricKeyAlgorithm::CAST5 => cfb!(Encryptor, encrypt, cast5::Cast5, key, iv, data),
            SymmetricKeyAlgorithm::Blowfish => {
                cfb!(Encryptor, encrypt, blowfish::Blowfish, key, iv, data)
            }
            SymmetricKeyAlgorithm::Twofish => {
                cfb!(Encryptor, encrypt, twofish::Twofish, key, iv, data)
            }
            _ => Err(Error::Unsupported(format!("cipher {:?}", self))),
        }
    }

    /// CFB decrypts `data` in place.
    pub fn decrypt_cfb(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::AES128 => cfb!(Decryptor, decrypt, aes::Aes128, key, iv, data),
            SymmetricKeyAlgorithm::AES192 => cfb!(Decryptor, decrypt, aes::Aes192, key, iv, data),
            SymmetricKeyAlgorithm::AES256 => cfb!(Decryptor, decrypt, aes::Aes256, key, iv, data),
            SymmetricKeyAlgorithm::TripleDES => {
                cfb!(Decryptor, decrypt, des::TdesEde3, key, iv, data)
            }
            SymmetricKeyAlgorithm::CAST5 => cfb!(Decryptor, decrypt, cast5::Cast5, key, iv, data),
            SymmetricKeyAlgorithm::Blowfish => {
                cfb!(Decryptor, decrypt, blowfish::Blowfish, key, iv, data)
            }
            SymmetricKeyAlgorithm::Twofish => {
                cfb!(Decryptor, decrypt, twofish::Twofish, key, iv, data)
            }
            _ => Err(Error::Unsupported(format!("cipher {:?}", self))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cfb_roundtrip() {
        for alg in [
            SymmetricKeyAlgorithm::AES128,
            SymmetricKeyAlgorithm::AES192,
            SymmetricKeyAlgorithm::AES256,
            SymmetricKeyAlgorithm::TripleDES,
            SymmetricKeyAlgorithm::CAST5,
            SymmetricKeyAlgorithm::Twofish,
        ] {
            let key = vec![0x42u8; alg.key_size()];
            let iv = vec![0u8; alg.block_size()];
            let plain = b"the quick brown fox jumps over it".to_vec();

            let mut data = plain.clone();
            alg.encrypt_cfb(&key, &iv, &mut data).unwrap();
            assert_ne!(data, plain, "{:?}", alg);
            alg.decrypt_cfb(&key, &iv, &mut data).unwrap();
            assert_eq!(data, plain, "{:?}", alg);
        }
    }

    #[test]
    fn test_unsupported_cipher() {
        let mut data = [0u8; 8];
        assert!(SymmetricKeyAlgorithm::IDEA
            .encrypt_cfb(&[0; 16], &[0; 8], &mut data)
            .is_err());
    }
}
