use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::errors::Result;
use crate::normalize_lines::normalize_to_crlf;
use crate::ser::Serialize;
use crate::types::{Tag, Version};
use crate::util::{read_string_lossy, Reader};

/// Literal Data Packet
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.9
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralData {
    packet_version: Version,
    mode: DataMode,
    file_name: String,
    created: DateTime<Utc>,
    data: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',
    Mime = b'm',
}

impl LiteralData {
    /// Creates a literal data packet from binary data.
    pub fn from_bytes(file_name: impl Into<String>, data: &[u8]) -> LiteralData {
        LiteralData {
            packet_version: Version::New,
            mode: DataMode::Binary,
            file_name: file_name.into(),
            created: Utc::now().trunc_subsecs(0),
            data: data.to_vec(),
        }
    }

    /// Creates a literal data packet from UTF-8 text.
    pub fn from_str(file_name: impl Into<String>, text: &str) -> LiteralData {
        LiteralData {
            packet_version: Version::New,
            mode: DataMode::Utf8,
            file_name: file_name.into(),
            created: Utc::now().trunc_subsecs(0),
            data: text.as_bytes().to_vec(),
        }
    }

    /// Parses a `LiteralData` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        let mut r = Reader::new(input);

        let mode = r.read_u8()?;
        let mode = DataMode::from_u8(mode)
            .ok_or_else(|| crate::format_err!("invalid data mode {}", mode))?;
        let name_len = r.read_u8()?;
        let file_name = read_string_lossy(r.take(name_len as usize)?);
        let created = Utc
            .timestamp_opt(i64::from(r.read_be_u32()?), 0)
            .single()
            .ok_or_else(|| crate::format_err!("invalid creation time"))?;
        let data = r.rest().to_vec();

        Ok(LiteralData {
            packet_version,
            mode,
            file_name,
            created,
            data,
        })
    }

    pub fn packet_version(&self) -> Version {
        self.packet_version
    }

    pub fn tag(&self) -> Tag {
        Tag::LiteralData
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_binary(&self) -> bool {
        self.mode == DataMode::Binary
    }

    /// The octets a signature over this literal covers. Text mode data is
    /// hashed with line endings converted to CRLF.
    pub fn to_signable_bytes(&self) -> Vec<u8> {
        match self.mode {
            DataMode::Binary => self.data.clone(),
            _ => normalize_to_crlf(&self.data),
        }
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.mode as u8)?;
        writer.write_u8(self.file_name.len() as u8)?;
        writer.write_all(self.file_name.as_bytes())?;
        writer.write_u32::<BigEndian>(self.created.timestamp() as u32)?;
        writer.write_all(&self.data)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let packet = LiteralData::from_bytes("hello.txt", b"hello world");
        let bytes = packet.to_bytes().unwrap();
        let back = LiteralData::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(back, packet);
    }

    #[test]
    fn test_text_normalization() {
        let packet = LiteralData::from_str("", "a\nb\r\nc");
        assert_eq!(packet.to_signable_bytes(), b"a\r\nb\r\nc");
    }
}
