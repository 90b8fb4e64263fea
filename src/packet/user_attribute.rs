use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::{Tag, Version};
use crate::util::{read_packet_length, write_packet_length, Reader};

/// User Attribute Packet
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.12
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAttribute {
    Image {
        packet_version: Version,
        data: Vec<u8>,
    },
    Unknown {
        packet_version: Version,
        typ: u8,
        data: Vec<u8>,
    },
}

impl UserAttribute {
    /// Parses a `UserAttribute` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        let mut r = Reader::new(input);
        let len = read_packet_length(&mut r)?;
        crate::ensure!(len > 0, "empty user attribute subpacket");
        let typ = r.read_u8()?;
        let data = r.take(len - 1)?.to_vec();
        crate::ensure!(r.is_empty(), "trailing data in user attribute");

        match typ {
            1 => Ok(UserAttribute::Image {
                packet_version,
                data,
            }),
            _ => Ok(UserAttribute::Unknown {
                packet_version,
                typ,
                data,
            }),
        }
    }

    pub fn packet_version(&self) -> Version {
        match self {
            UserAttribute::Image { packet_version, .. }
            | UserAttribute::Unknown { packet_version, .. } => *packet_version,
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::UserAttribute
    }

    pub fn typ(&self) -> u8 {
        match self {
            UserAttribute::Image { .. } => 1,
            UserAttribute::Unknown { typ, .. } => *typ,
        }
    }

    fn body_len(&self) -> usize {
        match self {
            UserAttribute::Image { data, .. } | UserAttribute::Unknown { data, .. } => {
                data.len() + 1
            }
        }
    }

    /// The framing certification signatures hash: `0xD1`, a four-octet
    /// length, then the packet body.
    pub fn to_certification_bytes(&self) -> Result<Vec<u8>> {
        let body = self.to_bytes()?;
        let mut out = Vec::with_capacity(5 + body.len());
        out.push(0xd1);
        out.write_u32::<BigEndian>(body.len() as u32)?;
        out.extend_from_slice(&body);

        Ok(out)
    }
}

impl Serialize for UserAttribute {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        write_packet_length(writer, self.body_len())?;
        writer.write_u8(self.typ())?;
        match self {
            UserAttribute::Image { data, .. } | UserAttribute::Unknown { data, .. } => {
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
    fn test_roundtrip() {
        let attr = UserAttribute::Image {
            packet_version: Version::New,
            data: vec![1, 2, 3, 4, 5],
        };
        let bytes = attr.to_bytes().unwrap();
        assert_eq!(UserAttribute::from_slice(Version::New, &bytes).unwrap(), attr);
    }
}
