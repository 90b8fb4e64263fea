use std::collections::BTreeMap;
use std::io;

use crate::armor::{self, BlockType};
use crate::composed::shared::Deserializable;
use crate::errors::Result;
use crate::normalize_lines::normalize_to_crlf;
use crate::packet::{self, Packet, Signature, SignatureType};
use crate::ser::Serialize;
use crate::types::{PublicKeyTrait, Tag};

/// A detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandaloneSignature {
    pub signature: Signature,
}

impl StandaloneSignature {
    pub fn new(signature: Signature) -> Self {
        StandaloneSignature { signature }
    }

    /// Verifies the signature over the given data. Text signatures are
    /// verified over canonicalized line endings.
    pub fn verify(&self, key: &impl PublicKeyTrait, data: &[u8]) -> Result<()> {
        if self.signature.typ() == SignatureType::Text {
            self.signature.verify(key, &normalize_to_crlf(data))
        } else {
            self.signature.verify(key, data)
        }
    }

    pub fn to_armored_writer(
        &self,
        writer: &mut impl io::Write,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Result<()> {
        let bytes = self.to_bytes()?;
        armor::write(writer, &BlockType::Signature, headers, &bytes)
    }

    pub fn to_armored_string(&self, headers: Option<&BTreeMap<String, String>>) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf, headers)?;
        Ok(String::from_utf8(buf).expect("armor is ascii"))
    }
}

impl Serialize for StandaloneSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, Tag::Signature, &self.signature)
    }
}

impl Deserializable for StandaloneSignature {
    fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Vec<Self>> {
        packets
            .into_iter()
            .map(|packet| {
                let signature: Signature = packet.try_into()?;
                Ok(StandaloneSignature::new(signature))
            })
            .collect()
    }

    fn matches_block_type(typ: &BlockType) -> bool {
        matches!(typ, BlockType::Signature)
    }
}
