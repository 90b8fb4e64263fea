use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::AesGcm;
use eax::Eax;
use generic_array::typenum::{U12, U15, U16};
use generic_array::GenericArray;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use ocb3::Ocb3;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};

/// AEAD algorithm identifiers.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-9.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum AeadAlgorithm {
    Eax = 1,
    Ocb = 2,
    Gcm = 3,
}

type Aes128Ocb = Ocb3<Aes128, U15, U16>;
type Aes192Ocb = Ocb3<Aes192, U15, U16>;
type Aes256Ocb = Ocb3<Aes256, U15, U16>;
type Aes192Gcm = AesGcm<Aes192, U12>;

macro_rules! aead_op {
    ($cipher:ty, $key:expr, $nonce:expr, $aad:expr, $op:ident, $data:expr) => {{
        let cipher =
            <$cipher>::new_from_slice($key).map_err(|e| Error::CryptoError(e.to_string()))?;
        cipher
            .$op(
                GenericArray::from_slice($nonce),
                Payload {
                    msg: $data,
                    aad: $aad,
                },
            )
            .map_err(|_| Error::PassphraseIncorrect)
    }};
}

impl AeadAlgorithm {
    pub fn try_from_u8(v: u8) -> Result<Self> {
        Self::from_u8(v).ok_or_else(|| Error::Unsupported(format!("AEAD algorithm {}", v)))
    }

    /// Nonce size in octets.
    pub fn iv_size(self) -> usize {
        match self {
            AeadAlgorithm::Eax => 16,
            AeadAlgorithm::Ocb => 15,
            AeadAlgorithm::Gcm => 12,
        }
    }

    /// Authentication tag size in octets.
    pub fn tag_size(self) -> usize {
        16
    }

    /// Encrypts and authenticates, returning ciphertext followed by the tag.
    pub fn encrypt(
        self,
        sym: SymmetricKeyAlgorithm,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        crate::ensure_eq!(nonce.len(), self.iv_size(), "invalid nonce length");

        match (self, sym) {
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::AES128) => {
                aead_op!(Eax<Aes128>, key, nonce, aad, encrypt, plaintext)
            }
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::AES192) => {
                aead_op!(Eax<Aes192>, key, nonce, aad, encrypt, plaintext)
            }
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::AES256) => {
                aead_op!(Eax<Aes256>, key, nonce, aad, encrypt, plaintext)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::AES128) => {
                aead_op!(Aes128Ocb, key, nonce, aad, encrypt, plaintext)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::AES192) => {
                aead_op!(Aes192Ocb, key, nonce, aad, encrypt, plaintext)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::AES256) => {
                aead_op!(Aes256Ocb, key, nonce, aad, encrypt, plaintext)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::AES128) => {
                aead_op!(aes_gcm::Aes128Gcm, key, nonce, aad, encrypt, plaintext)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::AES192) => {
                aead_op!(Aes192Gcm, key, nonce, aad, encrypt, plaintext)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::AES256) => {
                aead_op!(aes_gcm::Aes256Gcm, key, nonce, aad, encrypt, plaintext)
            }
            _ => Err(Error::Unsupported(format!(
                "AEAD {:?} with cipher {:?}",
                self, sym
            ))),
        }
    }

    /// Verifies the tag and decrypts. A failed tag surfaces as
    /// `PassphraseIncorrect` so callers can tell damage from malformation.
    pub fn decrypt(
        self,
        sym: SymmetricKeyAlgorithm,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        crate::ensure_eq!(nonce.len(), self.iv_size(), "invalid nonce length");
        crate::ensure!(
            ciphertext.len() >= self.tag_size(),
            "ciphertext too short for tag"
        );

        match (self, sym) {
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::AES128) => {
                aead_op!(Eax<Aes128>, key, nonce, aad, decrypt, ciphertext)
            }
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::AES192) => {
                aead_op!(Eax<Aes192>, key, nonce, aad, decrypt, ciphertext)
            }
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::AES256) => {
                aead_op!(Eax<Aes256>, key, nonce, aad, decrypt, ciphertext)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::AES128) => {
                aead_op!(Aes128Ocb, key, nonce, aad, decrypt, ciphertext)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::AES192) => {
                aead_op!(Aes192Ocb, key, nonce, aad, decrypt, ciphertext)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::AES256) => {
                aead_op!(Aes256Ocb, key, nonce, aad, decrypt, ciphertext)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::AES128) => {
                aead_op!(aes_gcm::Aes128Gcm, key, nonce, aad, decrypt, ciphertext)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::AES192) => {
                aead_op!(Aes192Gcm, key, nonce, aad, decrypt, ciphertext)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::AES256) => {
                aead_op!(aes_gcm::Aes256Gcm, key, nonce, aad, decrypt, ciphertext)
            }
            _ => Err(Error::Unsupported(format!(
                "AEAD {:?} with cipher {:?}",
                self, sym
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aead_roundtrip() {
        for aead in [AeadAlgorithm::Eax, AeadAlgorithm::Ocb, AeadAlgorithm::Gcm] {
            for sym in [
                SymmetricKeyAlgorithm::AES128,
                SymmetricKeyAlgorithm::AES192,
                SymmetricKeyAlgorithm::AES256,
            ] {
                let key = vec![7u8; sym.key_size()];
                let nonce = vec![3u8; aead.iv_size()];
                let aad = b"header";
                let plain = b"secret chunk";

                let ct = aead.encrypt(sym, &key, &nonce, aad, plain).unwrap();
                assert_eq!(ct.len(), plain.len() + aead.tag_size());

                let pt = aead.decrypt(sym, &key, &nonce, aad, &ct).unwrap();
                assert_eq!(pt, plain);

                // tampering must fail
                let mut bad = ct.clone();
                bad[0] ^= 1;
                assert!(aead.decrypt(sym, &key, &nonce, aad, &bad).is_err());

                // wrong aad must fail
                assert!(aead.decrypt(sym, &key, &nonce, b"other", &ct).is_err());
            }
        }
    }
}
