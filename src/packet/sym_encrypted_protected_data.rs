use std::io;

use byteorder::WriteBytesExt;
use hkdf::Hkdf;
use rand::{CryptoRng, Rng};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::checksum;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{Tag, Version};
use crate::util::Reader;

/// Symmetrically Encrypted Integrity Protected Data Packet (SEIPD)
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.13
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymEncryptedProtectedData {
    /// CFB mode with a SHA-1 modification detection code trailer.
    V1 {
        packet_version: Version,
        data: Vec<u8>,
    },
    /// Chunked AEAD.
    V2 {
        packet_version: Version,
        sym_algorithm: SymmetricKeyAlgorithm,
        aead: AeadAlgorithm,
        /// Chunk size exponent; chunks are `1 << (c + 6)` octets.
        chunk_size: u8,
        salt: [u8; 32],
        data: Vec<u8>,
    },
}

/// Derives the message key and nonce prefix for a v2 packet.
fn v2_keys(
    session_key: &[u8],
    sym: SymmetricKeyAlgorithm,
    aead: AeadAlgorithm,
    chunk_size: u8,
    salt: &[u8; 32],
) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>, [u8; 5])> {
    let info = [
        Tag::SymEncryptedProtectedData.encode(),
        0x02,
        sym as u8,
        aead as u8,
        chunk_size,
    ];

    let hk = Hkdf::<Sha256>::new(Some(&salt[..]), session_key);
    let mut okm = Zeroizing::new(vec![0u8; sym.key_size() + aead.iv_size() - 8]);
    hk.expand(&info, &mut okm)
        .map_err(|e| Error::CryptoError(e.to_string()))?;

    let message_key = Zeroizing::new(okm[..sym.key_size()].to_vec());
    let nonce_prefix = okm[sym.key_size()..].to_vec();

    Ok((message_key, nonce_prefix, info))
}

fn chunk_nonce(prefix: &[u8], index: u64) -> Vec<u8> {
    let mut nonce = prefix.to_vec();
    nonce.extend_from_slice(&index.to_be_bytes());
    nonce
}

impl SymEncryptedProtectedData {
    /// Parses a `SymEncryptedProtectedData` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        let mut r = Reader::new(input);
        let version = r.read_u8()?;

        match version {
            1 => Ok(SymEncryptedProtectedData::V1 {
                packet_version,
                data: r.rest().to_vec(),
            }),
            2 => {
                let sym_algorithm = SymmetricKeyAlgorithm::try_from_u8(r.read_u8()?)?;
                let aead = AeadAlgorithm::try_from_u8(r.read_u8()?)?;
                let chunk_size = r.read_u8()?;
                crate::ensure!(chunk_size <= 16, "invalid chunk size exponent");
                let salt = r.take_arr::<32>()?;
                let data = r.rest().to_vec();

                Ok(SymEncryptedProtectedData::V2 {
                    packet_version,
                    sym_algorithm,
                    aead,
                    chunk_size,
                    salt,
                    data,
                })
            }
            _ => Err(Error::UnsupportedVersion(version)),
        }
    }

    /// Encrypts a serialized packet stream, v1 style: random prefix with
    /// repeated quick check octets, SHA-1 MDC trailer, CFB under a zero IV.
    pub fn encrypt_v1<R: Rng + CryptoRng>(
        rng: &mut R,
        sym: SymmetricKeyAlgorithm,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Self> {
        let bs = sym.block_size();

        let mut data = Vec::with_capacity(bs + 2 + plaintext.len() + 22);
        let mut prefix = vec![0u8; bs];
        rng.fill_bytes(&mut prefix);
        data.extend_from_slice(&prefix);
        data.extend_from_slice(&prefix[bs - 2..]);
        data.extend_from_slice(plaintext);

        // the MDC covers everything up to and including its own header
        data.extend_from_slice(&[0xd3, 0x14]);
        let mdc = checksum::calculate_sha1(&data);
        data.extend_from_slice(&mdc);

        let iv = vec![0u8; bs];
        sym.encrypt_cfb(key, &iv, &mut data)?;

        Ok(SymEncryptedProtectedData::V1 {
            packet_version: Version::New,
            data,
        })
    }

    /// Encrypts a serialized packet stream, v2 style: chunked AEAD with a
    /// final zero length chunk binding the total plaintext length.
    pub fn encrypt_v2<R: Rng + CryptoRng>(
        rng: &mut R,
        sym: SymmetricKeyAlgorithm,
        aead: AeadAlgorithm,
        chunk_size: u8,
        session_key: &[u8],
        plaintext: &[u8],
    ) -> Result<Self> {
        crate::ensure!(chunk_size <= 16, "invalid chunk size exponent");
        crate::ensure_eq!(session_key.len(), sym.key_size(), "invalid session key");

        let mut salt = [0u8; 32];
        rng.fill_bytes(&mut salt);

        let (message_key, nonce_prefix, info) =
            v2_keys(session_key, sym, aead, chunk_size, &salt)?;

        let chunk_len = 1usize << (chunk_size + 6);
        let mut data = Vec::with_capacity(plaintext.len() + 64);

        let mut index = 0u64;
        for chunk in plaintext.chunks(chunk_len) {
            let nonce = chunk_nonce(&nonce_prefix, index);
            data.extend(aead.encrypt(sym, &message_key, &nonce, &info, chunk)?);
            index += 1;
        }

        // final chunk: empty plaintext, aad additionally binds the total
        // length
        let nonce = chunk_nonce(&nonce_prefix, index);
        let mut final_aad = info.to_vec();
        final_aad.extend_from_slice(&(plaintext.len() as u64).to_be_bytes());
        data.extend(aead.encrypt(sym, &message_key, &nonce, &final_aad, &[])?);

        Ok(SymEncryptedProtectedData::V2 {
            packet_version: Version::New,
            sym_algorithm: sym,
            aead,
            chunk_size,
            salt,
            data,
        })
    }

    /// Decrypts the payload, returning the plaintext packet stream.
    ///
    /// For v1 the symmetric algorithm comes from the session key
    /// negotiation; v2 carries its own.
    pub fn decrypt(
        &self,
        session_key: &[u8],
        sym: Option<SymmetricKeyAlgorithm>,
    ) -> Result<Vec<u8>> {
        match self {
            SymEncryptedProtectedData::V1 { data, .. } => {
                let sym =
                    sym.ok_or_else(|| crate::format_err!("missing symmetric algorithm"))?;
                let bs = sym.block_size();
                crate::ensure!(data.len() > bs + 2 + 22, "truncated encrypted data");

                let mut data = data.clone();
                let iv = vec![0u8; bs];
                sym.decrypt_cfb(session_key, &iv, &mut data)?;

                // quick check octets
                if data[bs - 2..bs] != data[bs..bs + 2] {
                    return Err(Error::PassphraseIncorrect);
                }

                // the trailer is the MDC packet: 0xd3 0x14 sha1
                let mdc_start = data.len() - 22;
                crate::ensure_eq!(data[mdc_start], 0xd3, "invalid MDC header");
                crate::ensure_eq!(data[mdc_start + 1], 0x14, "invalid MDC length");

                let expected = checksum::calculate_sha1(&data[..mdc_start + 2]);
                if expected != data[mdc_start + 2..] {
                    return Err(Error::ChecksumMismatch);
                }

                Ok(data[bs + 2..mdc_start].to_vec())
            }
            SymEncryptedProtectedData::V2 {
                sym_algorithm,
                aead,
                chunk_size,
                salt,
                data,
                ..
            } => {
                let sym = *sym_algorithm;
                crate::ensure_eq!(session_key.len(), sym.key_size(), "invalid session key");

                let (message_key, nonce_prefix, info) =
                    v2_keys(session_key, sym, *aead, *chunk_size, salt)?;

                let tag_size = aead.tag_size();
                crate::ensure!(data.len() >= tag_size, "truncated encrypted data");

                let (chunk_area, final_tag) = data.split_at(data.len() - tag_size);
                let chunk_len = 1usize << (chunk_size + 6);

                let mut out = Vec::with_capacity(chunk_area.len());
                let mut index = 0u64;
                for chunk in chunk_area.chunks(chunk_len + tag_size) {
                    let nonce = chunk_nonce(&nonce_prefix, index);
                    out.extend(aead.decrypt(sym, &message_key, &nonce, &info, chunk)?);
                    index += 1;
                }

                // the final chunk authenticates the total plaintext length,
                // so truncation is detected
                let nonce = chunk_nonce(&nonce_prefix, index);
                let mut final_aad = info.to_vec();
                final_aad.extend_from_slice(&(out.len() as u64).to_be_bytes());
                aead.decrypt(sym, &message_key, &nonce, &final_aad, final_tag)?;

                Ok(out)
            }
        }
    }

    /// The symmetric algorithm the payload itself names (v2 only).
    pub fn sym_algorithm(&self) -> Option<SymmetricKeyAlgorithm> {
        match self {
            SymEncryptedProtectedData::V1 { .. } => None,
            SymEncryptedProtectedData::V2 { sym_algorithm, .. } => Some(*sym_algorithm),
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            SymEncryptedProtectedData::V1 { .. } => 1,
            SymEncryptedProtectedData::V2 { .. } => 2,
        }
    }

    pub fn packet_version(&self) -> Version {
        match self {
            SymEncryptedProtectedData::V1 { packet_version, .. }
            | SymEncryptedProtectedData::V2 { packet_version, .. } => *packet_version,
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::SymEncryptedProtectedData
    }
}

impl Serialize for SymEncryptedProtectedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version())?;

        match self {
            SymEncryptedProtectedData::V1 { data, .. } => {
                writer.write_all(data)?;
            }
            SymEncryptedProtectedData::V2 {
                sym_algorithm,
                aead,
                chunk_size,
                salt,
                data,
                ..
            } => {
                writer.write_u8(*sym_algorithm as u8)?;
                writer.write_u8(*aead as u8)?;
                writer.write_u8(*chunk_size)?;
                writer.write_all(&salt[..])?;
                writer.write_all(data)?;
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

    #[test]
    fn test_v1_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(41);
        let key = [7u8; 32];
        let plaintext = b"inner packet stream".to_vec();

        let packet = SymEncryptedProtectedData::encrypt_v1(
            &mut rng,
            SymmetricKeyAlgorithm::AES256,
            &key,
            &plaintext,
        )
        .unwrap();

        let bytes = packet.to_bytes().unwrap();
        let parsed = SymEncryptedProtectedData::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(parsed, packet);

        let out = parsed
            .decrypt(&key, Some(SymmetricKeyAlgorithm::AES256))
            .unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn test_v1_detects_modification() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let key = [7u8; 16];
        let packet = SymEncryptedProtectedData::encrypt_v1(
            &mut rng,
            SymmetricKeyAlgorithm::AES128,
            &key,
            b"payload",
        )
        .unwrap();

        let mut bytes = packet.to_bytes().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 1;
        let tampered = SymEncryptedProtectedData::from_slice(Version::New, &bytes).unwrap();
        assert!(tampered
            .decrypt(&key, Some(SymmetricKeyAlgorithm::AES128))
            .is_err());
    }

    #[test]
    fn test_v2_roundtrip_multi_chunk() {
        let mut rng = ChaCha8Rng::seed_from_u64(43);
        let key = [9u8; 16];
        // chunk size exponent 0 = 64 octet chunks, so this spans chunks
        let plaintext = vec![0xabu8; 300];

        for aead in [AeadAlgorithm::Eax, AeadAlgorithm::Ocb, AeadAlgorithm::Gcm] {
            let packet = SymEncryptedProtectedData::encrypt_v2(
                &mut rng,
                SymmetricKeyAlgorithm::AES128,
                aead,
                0,
                &key,
                &plaintext,
            )
            .unwrap();

            let bytes = packet.to_bytes().unwrap();
            let parsed = SymEncryptedProtectedData::from_slice(Version::New, &bytes).unwrap();
            assert_eq!(parsed, packet);

            let out = parsed.decrypt(&key, None).unwrap();
            assert_eq!(out, plaintext, "{:?}", aead);
        }
    }

    #[test]
    fn test_v2_detects_truncation() {
        let mut rng = ChaCha8Rng::seed_from_u64(44);
        let key = [3u8; 16];
        let plaintext = vec![0x11u8; 200];

        let packet = SymEncryptedProtectedData::encrypt_v2(
            &mut rng,
            SymmetricKeyAlgorithm::AES128,
            AeadAlgorithm::Ocb,
            0,
            &key,
            &plaintext,
        )
        .unwrap();

        // drop one whole chunk (64 + 16 octets) from the middle
        let SymEncryptedProtectedData::V2 {
            sym_algorithm,
            aead,
            chunk_size,
            salt,
            data,
            packet_version,
        } = packet
        else {
            unreachable!()
        };
        let mut truncated = data.clone();
        truncated.drain(80..160);
        let tampered = SymEncryptedProtectedData::V2 {
            packet_version,
            sym_algorithm,
            aead,
            chunk_size,
            salt,
            data: truncated,
        };

        assert!(tampered.decrypt(&key, None).is_err());
    }
}
