use std::io;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::{Tag, Version};

/// Symmetrically Encrypted Data Packet (legacy, tag 9)
/// Ref: https://www.rfc-editor.org/rfc/rfc4880.html#section-5.7
///
/// Carried for decryption of old messages only; emission always uses the
/// integrity protected packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymEncryptedData {
    packet_version: Version,
    data: Vec<u8>,
}

impl SymEncryptedData {
    /// Parses a `SymEncryptedData` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        Ok(SymEncryptedData {
            packet_version,
            data: input.to_vec(),
        })
    }

    /// Decrypts using the OpenPGP CFB mode with resynchronization: the
    /// random prefix is decrypted under a zero IV, the remainder under an
    /// IV taken from the prefix ciphertext.
    pub fn decrypt(&self, sym: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Vec<u8>> {
        let bs = sym.block_size();
        crate::ensure!(self.data.len() > bs + 2, "truncated encrypted data");

        let zero_iv = vec![0u8; bs];
        let mut prefix = self.data[..bs + 2].to_vec();
        sym.decrypt_cfb(key, &zero_iv, &mut prefix)?;

        // quick check octets
        crate::ensure!(
            prefix[bs - 2..bs] == prefix[bs..bs + 2],
            "invalid key or corrupted prefix"
        );

        let iv = &self.data[2..bs + 2];
        let mut rest = self.data[bs + 2..].to_vec();
        sym.decrypt_cfb(key, iv, &mut rest)?;

        Ok(rest)
    }

    pub fn packet_version(&self) -> Version {
        self.packet_version
    }

    pub fn tag(&self) -> Tag {
        Tag::SymEncryptedData
    }
}

impl Serialize for SymEncryptedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;

        Ok(())
    }
}
