//! Single packet framing: old and new format headers, partial length
//! reassembly and the tag dispatch into body parsers.

use std::borrow::Cow;

use num_traits::FromPrimitive;

use crate::errors::{Error, Result};
use crate::packet::Packet;
use crate::types::{PacketLength, Tag, Version};
use crate::util::Reader;

/// Reads a new format length, starting at the given octet.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-4.2.1
fn read_new_length(r: &mut Reader<'_>) -> Result<PacketLength> {
    let olen = r.read_u8()?;
    let len = match olen {
        // One-Octet Lengths
        0..=191 => PacketLength::Fixed(olen as usize),
        // Two-Octet Lengths
        192..=223 => {
            let second = r.read_u8()? as usize;
            PacketLength::Fixed(((olen as usize - 192) << 8) + 192 + second)
        }
        // Partial Body Lengths
        224..=254 => PacketLength::Partial(1 << (olen as usize & 0x1f)),
        // Five-Octet Lengths
        255 => PacketLength::Fixed(r.read_be_u32()? as usize),
    };

    Ok(len)
}

/// Parses an old format packet header.
/// Ref: https://www.rfc-editor.org/rfc/rfc4880.html#section-4.2.1
fn old_packet_header(first: u8, r: &mut Reader<'_>) -> Result<(u8, PacketLength)> {
    let tag = (first >> 2) & 0x0f;
    let len = match first & 0b11 {
        0 => PacketLength::Fixed(r.read_u8()? as usize),
        1 => PacketLength::Fixed(r.read_be_u16()? as usize),
        2 => PacketLength::Fixed(r.read_be_u32()? as usize),
        3 => PacketLength::Indeterminate,
        _ => unreachable!(),
    };

    Ok((tag, len))
}

/// Reassembles the body of a packet announced with a partial length.
/// Every chunk but the last carries a partial length; a fixed length
/// terminates the sequence.
fn read_partial_body<'a>(r: &mut Reader<'a>, first_len: usize) -> Result<Vec<u8>> {
    let mut out = r.take(first_len)?.to_vec();

    loop {
        match read_new_length(r).map_err(|_| {
            Error::Message("partial length chunk without terminator".into())
        })? {
            PacketLength::Partial(len) => {
                out.extend_from_slice(r.take(len)?);
            }
            PacketLength::Fixed(len) => {
                out.extend_from_slice(r.take(len)?);
                break;
            }
            PacketLength::Indeterminate => {
                return Err(Error::Message(
                    "invalid indeterminate length in partial body".into(),
                ));
            }
        }
    }

    Ok(out)
}

/// Parses a single packet header and returns the raw tag and the
/// reassembled body.
pub(crate) fn parser<'a>(r: &mut Reader<'a>) -> Result<(Version, u8, Cow<'a, [u8]>)> {
    let first = r.read_u8()?;
    crate::ensure!(first & 0x80 != 0, "invalid packet header");

    if first & 0x40 != 0 {
        // New format
        let tag = first & 0x3f;
        let body = match read_new_length(r)? {
            PacketLength::Fixed(len) => Cow::Borrowed(r.take(len)?),
            PacketLength::Partial(len) => Cow::Owned(read_partial_body(r, len)?),
            PacketLength::Indeterminate => unreachable!("not produced for new format"),
        };

        Ok((Version::New, tag, body))
    } else {
        // Old format
        let (tag, length) = old_packet_header(first, r)?;
        let body = match length {
            PacketLength::Fixed(len) => Cow::Borrowed(r.take(len)?),
            PacketLength::Indeterminate => Cow::Borrowed(r.rest()),
            PacketLength::Partial(_) => unreachable!("not produced for old format"),
        };

        Ok((Version::Old, tag, body))
    }
}

/// Parses the packet body for a recognized tag.
pub(crate) fn body_parser(ver: Version, tag: Tag, body: &[u8]) -> Result<Packet> {
    use crate::packet::*;

    let res: Result<Packet> = match tag {
        Tag::PublicKeyEncryptedSessionKey => {
            PublicKeyEncryptedSessionKey::from_slice(ver, body).map(Into::into)
        }
        Tag::Signature => Signature::from_slice(ver, body).map(Into::into),
        Tag::SymKeyEncryptedSessionKey => {
            SymKeyEncryptedSessionKey::from_slice(ver, body).map(Into::into)
        }
        Tag::OnePassSignature => OnePassSignature::from_slice(ver, body).map(Into::into),
        Tag::SecretKey => SecretKey::from_slice(ver, body).map(Into::into),
        Tag::PublicKey => PublicKey::from_slice(ver, body).map(Into::into),
        Tag::SecretSubkey => SecretSubkey::from_slice(ver, body).map(Into::into),
        Tag::CompressedData => CompressedData::from_slice(ver, body).map(Into::into),
        Tag::SymEncryptedData => SymEncryptedData::from_slice(ver, body).map(Into::into),
        Tag::Marker => Marker::from_slice(ver, body).map(Into::into),
        Tag::LiteralData => LiteralData::from_slice(ver, body).map(Into::into),
        Tag::UserId => UserId::from_slice(ver, body).map(Into::into),
        Tag::PublicSubkey => PublicSubkey::from_slice(ver, body).map(Into::into),
        Tag::UserAttribute => UserAttribute::from_slice(ver, body).map(Into::into),
        Tag::SymEncryptedProtectedData => {
            SymEncryptedProtectedData::from_slice(ver, body).map(Into::into)
        }
        Tag::Trust | Tag::ModDetectionCode | Tag::Padding => {
            Err(Error::Unsupported(format!("tag {:?} is skipped", tag)))
        }
    };

    match res {
        Ok(res) => Ok(res),
        Err(Error::PacketIncomplete) => Err(Error::PacketIncomplete),
        Err(err) => Err(Error::InvalidPacketContent(Box::new(err))),
    }
}

/// Parses one packet from the reader; unknown tags and unparseable bodies
/// surface as recoverable errors with the reader already advanced.
pub(crate) fn next(r: &mut Reader<'_>) -> Result<Result<Packet>> {
    let (ver, raw_tag, body) = parser(r)?;

    match Tag::from_u8(raw_tag) {
        Some(tag) => Ok(body_parser(ver, tag, &body)),
        None => Ok(Err(Error::Unsupported(format!(
            "unknown packet tag {}",
            raw_tag
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_format_single() {
        // Marker packet: new format, tag 10, length 3, "PGP"
        let raw = [0xca, 0x03, 0x50, 0x47, 0x50];
        let mut r = Reader::new(&raw);
        let (ver, tag, body) = parser(&mut r).unwrap();
        assert_eq!(ver, Version::New);
        assert_eq!(tag, 10);
        assert_eq!(&body[..], b"PGP");
        assert!(r.is_empty());
    }

    #[test]
    fn test_old_format_lengths() {
        // Old format, tag 11, one-octet length
        let mut raw = vec![0x80 | (11 << 2), 3];
        raw.extend_from_slice(b"abc");
        let mut r = Reader::new(&raw);
        let (ver, tag, body) = parser(&mut r).unwrap();
        assert_eq!(ver, Version::Old);
        assert_eq!(tag, 11);
        assert_eq!(&body[..], b"abc");

        // two-octet length
        let mut raw = vec![0x80 | (11 << 2) | 1, 0x01, 0x00];
        raw.extend_from_slice(&[0x55; 256]);
        let mut r = Reader::new(&raw);
        let (_, _, body) = parser(&mut r).unwrap();
        assert_eq!(body.len(), 256);

        // indeterminate length swallows the rest
        let raw = vec![0x80 | (11 << 2) | 3, 1, 2, 3, 4];
        let mut r = Reader::new(&raw);
        let (_, _, body) = parser(&mut r).unwrap();
        assert_eq!(&body[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_two_octet_new_length() {
        let mut raw = vec![0xcb];
        // length 192 encodes as 0xc0 0x00
        raw.push(0xc0);
        raw.push(0x00);
        raw.extend_from_slice(&[0x77; 192]);
        let mut r = Reader::new(&raw);
        let (_, tag, body) = parser(&mut r).unwrap();
        assert_eq!(tag, 11);
        assert_eq!(body.len(), 192);
    }

    #[test]
    fn test_partial_lengths_reassemble() {
        // tag 11, partial chunk of 512 (0xe9 = 224 | 9), then a fixed rest
        let mut raw = vec![0xcb, 0xe9];
        raw.extend_from_slice(&[0x11; 512]);
        raw.push(5);
        raw.extend_from_slice(&[0x22; 5]);

        let mut r = Reader::new(&raw);
        let (_, _, body) = parser(&mut r).unwrap();
        assert_eq!(body.len(), 517);
        assert_eq!(body[511], 0x11);
        assert_eq!(body[512], 0x22);
    }

    #[test]
    fn test_partial_without_terminator_fails() {
        let mut raw = vec![0xcb, 0xe9];
        raw.extend_from_slice(&[0x11; 512]);
        // ends without a terminating fixed length chunk

        let mut r = Reader::new(&raw);
        assert!(parser(&mut r).is_err());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let raw = [0x12, 0x00];
        let mut r = Reader::new(&raw);
        assert!(parser(&mut r).is_err());
    }
}
