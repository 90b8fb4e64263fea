use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::{Tag, Version};
use crate::util::read_string_lossy;

/// User ID Packet
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.11
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId {
    packet_version: Version,
    id: String,
}

impl UserId {
    /// Parses a `UserId` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        Ok(UserId {
            packet_version,
            id: read_string_lossy(input),
        })
    }

    pub fn from_str(packet_version: Version, id: impl Into<String>) -> Self {
        UserId {
            packet_version,
            id: id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn packet_version(&self) -> Version {
        self.packet_version
    }

    pub fn tag(&self) -> Tag {
        Tag::UserId
    }

    /// The framing certification signatures hash: `0xB4`, a four-octet
    /// length, then the packet body.
    pub fn to_certification_bytes(&self) -> Result<Vec<u8>> {
        let body = self.id.as_bytes();
        let mut out = Vec::with_capacity(5 + body.len());
        out.push(0xb4);
        out.write_u32::<BigEndian>(body.len() as u32)?;
        out.extend_from_slice(body);

        Ok(out)
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.id.as_bytes())?;

        Ok(())
    }
}
