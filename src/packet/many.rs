use std::io::Read;

use log::warn;

use crate::errors::{Error, Result};
use crate::packet::{single, Packet};
use crate::util::Reader;

/// Parses all packets from the given reader.
///
/// Unknown tags and packets whose bodies fail to parse are logged and
/// skipped; framing errors abort the parse.
pub fn parser(mut input: impl Read) -> Result<Vec<Packet>> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;

    from_slice(&buf)
}

/// Parses all packets from the given slice.
pub fn from_slice(input: &[u8]) -> Result<Vec<Packet>> {
    let mut r = Reader::new(input);
    let mut packets = Vec::new();

    while !r.is_empty() {
        match single::next(&mut r)? {
            Ok(packet) => {
                packets.push(packet);
            }
            Err(Error::PacketIncomplete) => return Err(Error::PacketIncomplete),
            Err(err) => {
                // skip packets we can not handle, the framing already
                // advanced past them
                warn!("skipping packet: {:?}", err);
            }
        }
    }

    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{LiteralData, Marker};
    use crate::ser::Serialize;
    use crate::types::{Tag, Version};

    #[test]
    fn test_parse_multiple_packets() {
        let mut buf = Vec::new();
        Packet::from(Marker::from_slice(Version::New, b"PGP").unwrap())
            .to_writer(&mut buf)
            .unwrap();
        Packet::from(LiteralData::from_bytes("f", b"hello"))
            .to_writer(&mut buf)
            .unwrap();

        let packets = from_slice(&buf).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].tag(), Tag::Marker);
        assert_eq!(packets[1].tag(), Tag::LiteralData);
    }

    #[test]
    fn test_broken_packet_is_skipped() {
        let mut buf = Vec::new();
        // a marker packet with a wrong body
        buf.extend_from_slice(&[0xca, 0x03, b'X', b'Y', b'Z']);
        Packet::from(LiteralData::from_bytes("f", b"hello"))
            .to_writer(&mut buf)
            .unwrap();

        let packets = from_slice(&buf).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].tag(), Tag::LiteralData);
    }

    #[test]
    fn test_roundtrip_preserves_packets() {
        let packets = vec![
            Packet::from(LiteralData::from_bytes("a", b"first")),
            Packet::from(LiteralData::from_bytes("b", &vec![0x42; 9000])),
        ];

        let mut buf = Vec::new();
        for packet in &packets {
            packet.to_writer(&mut buf).unwrap();
        }

        assert_eq!(from_slice(&buf).unwrap(), packets);
    }

    #[test]
    fn test_truncated_input_fails() {
        let mut buf = Vec::new();
        Packet::from(LiteralData::from_bytes("f", b"hello"))
            .to_writer(&mut buf)
            .unwrap();
        buf.truncate(buf.len() - 2);

        assert!(from_slice(&buf).is_err());
    }
}
