//! Byte-level helpers shared by the packet and armor codecs.

use std::io;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::errors::{Error, Result};

/// A cursor over a fully buffered packet body.
///
/// Packet bodies are reassembled into a single buffer before body parsing,
/// so all body parsers operate on slices through this reader.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = *self
            .data
            .get(self.pos)
            .ok_or(Error::PacketIncomplete)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_be_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(BigEndian::read_u16(b))
    }

    pub fn read_be_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(BigEndian::read_u32(b))
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::PacketIncomplete);
        }
        let b = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(b)
    }

    pub fn take_arr<const N: usize>(&mut self) -> Result<[u8; N]> {
        let b = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(b);
        Ok(out)
    }

    /// Consumes and returns everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let b = &self.data[self.pos..];
        self.pos = self.data.len();
        b
    }
}

/// Strips leading zero octets from a big-endian magnitude.
pub fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| b != &0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Interprets the given octets as a string, replacing invalid UTF-8.
pub fn read_string_lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_string()
}

/// Reads a variable length prefix as used by new format packets and by
/// signature subpackets (one, two or five octets; no partial lengths).
pub fn read_packet_length(r: &mut Reader<'_>) -> Result<usize> {
    let olen = r.read_u8()?;
    let len = match olen {
        0..=191 => olen as usize,
        192..=254 => ((olen as usize - 192) << 8) + 192 + r.read_u8()? as usize,
        255 => r.read_be_u32()? as usize,
    };
    Ok(len)
}

/// Writes a variable length prefix, choosing the shortest encoding.
pub fn write_packet_length(writer: &mut impl io::Write, len: usize) -> Result<()> {
    if len < 192 {
        writer.write_u8(len as u8)?;
    } else if len < 8384 {
        let a = ((len - 192) / 256) + 192;
        let b = (len - 192) % 256;
        writer.write_u8(a as u8)?;
        writer.write_u8(b as u8)?;
    } else {
        writer.write_u8(255)?;
        writer.write_u32::<BigEndian>(len as u32)?;
    }

    Ok(())
}

/// Number of octets `write_packet_length` will emit for `len`.
pub fn packet_length_len(len: usize) -> usize {
    if len < 192 {
        1
    } else if len < 8384 {
        2
    } else {
        5
    }
}

/// Number of bits in the big-endian magnitude, leading zero bits stripped.
pub fn bit_size(bytes: &[u8]) -> usize {
    let bytes = strip_leading_zeros(bytes);
    match bytes.first() {
        None => 0,
        Some(first) => (bytes.len() - 1) * 8 + (8 - first.leading_zeros() as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_basics() {
        let mut r = Reader::new(&[1, 2, 3, 4, 5]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_be_u16().unwrap(), 0x0203);
        assert_eq!(r.rest(), &[4, 5]);
        assert!(r.is_empty());
        assert!(r.read_u8().is_err());
    }

    #[test]
    fn test_packet_length_roundtrip() {
        for len in [0usize, 1, 190, 191, 192, 193, 8000, 8383, 8384, 100_000] {
            let mut buf = Vec::new();
            write_packet_length(&mut buf, len).unwrap();
            assert_eq!(buf.len(), packet_length_len(len), "len {}", len);
            let mut r = Reader::new(&buf);
            assert_eq!(read_packet_length(&mut r).unwrap(), len, "len {}", len);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn test_bit_size() {
        assert_eq!(bit_size(&[]), 0);
        assert_eq!(bit_size(&[0, 0]), 0);
        assert_eq!(bit_size(&[1]), 1);
        assert_eq!(bit_size(&[0, 0xff]), 8);
        assert_eq!(bit_size(&[0x01, 0x00]), 9);
    }
}
