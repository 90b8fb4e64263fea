use std::io;

use byteorder::WriteBytesExt;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::signature::{SignatureConfig, SignatureType, SignatureVersion};
use crate::ser::Serialize;
use crate::types::{KeyId, KeyTrait, KeyVersion, Tag, Version};
use crate::util::Reader;

/// One-Pass Signature Packet
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnePassSignature {
    packet_version: Version,
    pub version: u8,
    pub typ: SignatureType,
    pub hash_algorithm: HashAlgorithm,
    pub pub_algorithm: PublicKeyAlgorithm,
    /// v3: the signing key id.
    pub key_id: Option<KeyId>,
    /// v6: the signature salt and the signing key fingerprint.
    pub salt: Vec<u8>,
    pub fingerprint: Option<Vec<u8>>,
    /// Zero when another one-pass signature packet follows.
    pub last: u8,
}

impl OnePassSignature {
    /// Parses a `OnePassSignature` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        let mut r = Reader::new(input);

        let version = r.read_u8()?;
        crate::ensure!(
            version == 3 || version == 6,
            "invalid one pass signature version {}",
            version
        );

        let typ = r.read_u8()?;
        let typ = num_traits::FromPrimitive::from_u8(typ)
            .ok_or_else(|| crate::format_err!("invalid signature type {}", typ))?;
        let hash_algorithm = HashAlgorithm::try_from_u8(r.read_u8()?)?;
        let pub_algorithm = PublicKeyAlgorithm::from(r.read_u8()?);

        let (key_id, salt, fingerprint) = if version == 6 {
            let salt_len = r.read_u8()?;
            let salt = r.take(salt_len as usize)?.to_vec();
            let fingerprint = r.take(32)?.to_vec();
            (None, salt, Some(fingerprint))
        } else {
            let key_id = KeyId::from_slice(r.take(8)?)?;
            (Some(key_id), Vec::new(), None)
        };

        let last = r.read_u8()?;
        crate::ensure!(r.is_empty(), "trailing data in one pass signature");

        Ok(OnePassSignature {
            packet_version,
            version,
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            salt,
            fingerprint,
            last,
        })
    }

    /// Builds the one pass packet announcing the signature that will be
    /// produced from the given config.
    pub fn from_config(
        config: &SignatureConfig,
        key: &impl KeyTrait,
        last: u8,
    ) -> Result<Self> {
        let (version, key_id, salt, fingerprint) = match config.version {
            SignatureVersion::V4 => (3u8, Some(key.key_id()), Vec::new(), None),
            SignatureVersion::V6 => {
                crate::ensure_eq!(key.version(), KeyVersion::V6, "issuer must be a v6 key");
                (6u8, None, config.salt.clone(), Some(key.fingerprint()))
            }
        };

        Ok(OnePassSignature {
            packet_version: Version::New,
            version,
            typ: config.typ,
            hash_algorithm: config.hash_alg,
            pub_algorithm: config.pub_alg,
            key_id,
            salt,
            fingerprint,
            last,
        })
    }

    pub fn packet_version(&self) -> Version {
        self.packet_version
    }

    pub fn tag(&self) -> Tag {
        Tag::OnePassSignature
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version)?;
        writer.write_u8(self.typ as u8)?;
        writer.write_u8(self.hash_algorithm as u8)?;
        writer.write_u8(self.pub_algorithm.into())?;

        match self.version {
            6 => {
                writer.write_u8(self.salt.len() as u8)?;
                writer.write_all(&self.salt)?;
                let fp = self
                    .fingerprint
                    .as_ref()
                    .ok_or_else(|| Error::InvalidArgument("missing fingerprint".into()))?;
                writer.write_all(fp)?;
            }
            _ => {
                let key_id = self
                    .key_id
                    .ok_or_else(|| Error::InvalidArgument("missing key id".into()))?;
                writer.write_all(key_id.as_bytes())?;
            }
        }

        writer.write_u8(self.last)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_v3() {
        let ops = OnePassSignature {
            packet_version: Version::New,
            version: 3,
            typ: SignatureType::Binary,
            hash_algorithm: HashAlgorithm::SHA256,
            pub_algorithm: PublicKeyAlgorithm::EdDSALegacy,
            key_id: Some(KeyId::from_slice(&[8, 7, 6, 5, 4, 3, 2, 1]).unwrap()),
            salt: Vec::new(),
            fingerprint: None,
            last: 1,
        };

        let bytes = ops.to_bytes().unwrap();
        assert_eq!(
            OnePassSignature::from_slice(Version::New, &bytes).unwrap(),
            ops
        );
    }

    #[test]
    fn test_roundtrip_v6() {
        let ops = OnePassSignature {
            packet_version: Version::New,
            version: 6,
            typ: SignatureType::Binary,
            hash_algorithm: HashAlgorithm::SHA512,
            pub_algorithm: PublicKeyAlgorithm::Ed25519,
            key_id: None,
            salt: vec![9u8; 32],
            fingerprint: Some(vec![1u8; 32]),
            last: 1,
        };

        let bytes = ops.to_bytes().unwrap();
        assert_eq!(
            OnePassSignature::from_slice(Version::New, &bytes).unwrap(),
            ops
        );
    }
}
