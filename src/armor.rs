//! ASCII armor reading and writing.
//! Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-6

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};
use std::str;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use byteorder::{BigEndian, ByteOrder};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_until};
use nom::character::complete::{digit1, line_ending, not_line_ending};
use nom::combinator::{map, map_res, opt, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::IResult;

use crate::errors::{Error, Result};

/// Maximum line length of the base64 body.
const LINE_LENGTH: usize = 76;

/// Armor block types.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum BlockType {
    /// PGP public key
    PublicKey,
    /// PGP private key
    PrivateKey,
    Message,
    MultiPartMessage(usize, usize),
    Signature,
    // gnupg extension
    File,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::PublicKey => write!(f, "PGP PUBLIC KEY BLOCK"),
            BlockType::PrivateKey => write!(f, "PGP PRIVATE KEY BLOCK"),
            BlockType::Message => write!(f, "PGP MESSAGE"),
            BlockType::MultiPartMessage(x, y) => write!(f, "PGP MESSAGE, PART {}/{}", x, y),
            BlockType::Signature => write!(f, "PGP SIGNATURE"),
            BlockType::File => write!(f, "PGP ARMORED FILE"),
        }
    }
}

/// Parses the type inside of an ascii armor header.
fn armor_block_type(i: &str) -> IResult<&str, BlockType> {
    alt((
        value(BlockType::PublicKey, tag("PGP PUBLIC KEY BLOCK")),
        value(BlockType::PrivateKey, tag("PGP PRIVATE KEY BLOCK")),
        map(
            preceded(
                tag("PGP MESSAGE, PART "),
                pair(
                    map_res(digit1, str::parse::<usize>),
                    opt(preceded(tag("/"), map_res(digit1, str::parse::<usize>))),
                ),
            ),
            |(x, y)| BlockType::MultiPartMessage(x, y.unwrap_or(0)),
        ),
        value(BlockType::Message, tag("PGP MESSAGE")),
        value(BlockType::Signature, tag("PGP SIGNATURE")),
        value(BlockType::File, tag("PGP ARMORED FILE")),
    ))(i)
}

/// Parses a single armor header line.
fn armor_header_line(i: &str) -> IResult<&str, BlockType> {
    delimited(
        tag("-----BEGIN "),
        armor_block_type,
        pair(tag("-----"), line_ending),
    )(i)
}

/// Parses a single armor footer line.
fn armor_footer_line(i: &str) -> IResult<&str, BlockType> {
    delimited(tag("-----END "), armor_block_type, tag("-----"))(i)
}

/// Parses a single `Key: Value` armor header.
fn key_value_pair(i: &str) -> IResult<&str, (&str, &str)> {
    pair(
        terminated(take_until(": "), tag(": ")),
        terminated(not_line_ending, line_ending),
    )(i)
}

fn key_value_pairs(i: &str) -> IResult<&str, Vec<(&str, &str)>> {
    many0(key_value_pair)(i)
}

/// Reads the `=XXXX` checksum into its 24 bit value.
fn read_checksum(input: &str) -> Result<u32> {
    let checksum = STANDARD.decode(input)?;
    crate::ensure_eq!(checksum.len(), 3, "invalid checksum length");

    let mut buf = [0u8; 4];
    buf[1..].copy_from_slice(&checksum);

    Ok(BigEndian::read_u32(&buf))
}

/// Parses an armored block from the given string.
pub fn parse_str(input: &str) -> Result<(BlockType, BTreeMap<String, String>, Vec<u8>)> {
    // skip anything before the armor starts
    let (rest, _) = take_until::<_, _, nom::error::Error<&str>>("-----BEGIN ")(input)
        .map_err(|_| Error::InvalidArmor("missing armor header".into()))?;

    let (rest, typ) =
        armor_header_line(rest).map_err(|err| Error::InvalidArmor(format!("{:?}", err)))?;
    let (rest, headers) =
        key_value_pairs(rest).map_err(|err| Error::InvalidArmor(format!("{:?}", err)))?;

    let headers: BTreeMap<String, String> = headers
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let mut body = String::with_capacity(rest.len());
    let mut checksum = None;
    let mut footer = None;

    for line in rest.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Ok((_, typ)) = armor_footer_line(line) {
            footer = Some(typ);
            break;
        }

        if let Some(sum) = line.strip_prefix('=') {
            // could be base64 padding or the checksum line
            if sum.len() == 4 && !sum.contains('=') {
                checksum = Some(read_checksum(sum)?);
                continue;
            }
        }

        body.extend(line.chars().filter(|c| !c.is_whitespace()));
    }

    let footer = footer.ok_or_else(|| Error::InvalidArmor("missing armor footer".into()))?;
    if footer != typ {
        return Err(Error::InvalidArmor(format!(
            "mismatch in armor header and footer: {:?} != {:?}",
            typ, footer
        )));
    }

    let decoded = STANDARD.decode(&body)?;

    if let Some(expected) = checksum {
        let actual = crc24::hash_raw(&decoded);
        if expected != actual {
            return Err(Error::InvalidChecksum);
        }
    }

    Ok((typ, headers, decoded))
}

/// Parses an armored block from the given reader.
pub fn parse(mut input: impl Read) -> Result<(BlockType, BTreeMap<String, String>, Vec<u8>)> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;
    let text = str::from_utf8(&buf)?;

    parse_str(text)
}

/// Writes an armored block.
pub fn write(
    writer: &mut impl io::Write,
    typ: &BlockType,
    headers: Option<&BTreeMap<String, String>>,
    source: &[u8],
) -> Result<()> {
    writeln!(writer, "-----BEGIN {}-----", typ)?;

    if let Some(headers) = headers {
        for (key, value) in headers {
            writeln!(writer, "{}: {}", key, value)?;
        }
    }
    writeln!(writer)?;

    let encoded = STANDARD.encode(source);
    for chunk in encoded.as_bytes().chunks(LINE_LENGTH) {
        writer.write_all(chunk)?;
        writeln!(writer)?;
    }

    let crc = crc24::hash_raw(source);
    let mut crc_buf = [0u8; 4];
    BigEndian::write_u32(&mut crc_buf, crc);
    writeln!(writer, "={}", STANDARD.encode(&crc_buf[1..]))?;

    writeln!(writer, "-----END {}-----", typ)?;

    Ok(())
}

/// Convenience wrapper producing a string.
pub fn write_string(
    typ: &BlockType,
    headers: Option<&BTreeMap<String, String>>,
    source: &[u8],
) -> Result<String> {
    let mut buf = Vec::new();
    write(&mut buf, typ, headers, source)?;

    Ok(String::from_utf8(buf).expect("armor is ascii"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_armor_header_line() {
        assert_eq!(
            armor_header_line("-----BEGIN PGP MESSAGE-----\n").unwrap(),
            ("", BlockType::Message)
        );

        assert_eq!(
            armor_header_line("-----BEGIN PGP MESSAGE, PART 3/14-----\n").unwrap(),
            ("", BlockType::MultiPartMessage(3, 14))
        );

        assert_eq!(
            armor_header_line("-----BEGIN PGP MESSAGE, PART 14-----\n").unwrap(),
            ("", BlockType::MultiPartMessage(14, 0))
        );
    }

    #[test]
    fn test_key_value_pair() {
        assert_eq!(
            key_value_pair("hello: world\n").unwrap(),
            ("", ("hello", "world")),
            "single"
        );

        assert_eq!(
            key_value_pair("hello: world\nother content").unwrap(),
            ("other content", ("hello", "world")),
            "with rest"
        );
    }

    #[test]
    fn test_parse_armor_small() {
        let mut map = BTreeMap::new();
        map.insert("Version".to_string(), "GnuPG v1".to_string());

        let c = Cursor::new(
            "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\
             Version: GnuPG v1\n\
             \n\
             aGVsbG8gd29ybGQ=\n\
             -----END PGP PUBLIC KEY BLOCK-----\n",
        );
        let (typ, headers, res) = parse(c).unwrap();

        assert_eq!(typ, BlockType::PublicKey);
        assert_eq!(headers, map);
        assert_eq!(res.as_slice(), &b"hello world"[..]);
    }

    #[test]
    fn test_roundtrip() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1234).collect();
        let mut headers = BTreeMap::new();
        headers.insert("Comment".to_string(), "roundtrip".to_string());

        let armored = write_string(&BlockType::Message, Some(&headers), &data).unwrap();
        assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----"));
        for line in armored.lines() {
            assert!(line.len() <= 76 + 10);
        }

        let (typ, parsed_headers, decoded) = parse_str(&armored).unwrap();
        assert_eq!(typ, BlockType::Message);
        assert_eq!(parsed_headers, headers);
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_crc_mismatch_is_detected() {
        let armored = write_string(&BlockType::Message, None, b"some content").unwrap();

        let mut lines: Vec<String> = armored.lines().map(|l| l.to_string()).collect();
        let body_line = lines
            .iter()
            .position(|l| !l.starts_with("-----") && !l.is_empty())
            .unwrap();
        lines[body_line] = if lines[body_line].starts_with('A') {
            format!("B{}", &lines[body_line][1..])
        } else {
            format!("A{}", &lines[body_line][1..])
        };
        let tampered = lines.join("\n");

        assert!(matches!(
            parse_str(&tampered),
            Err(Error::InvalidChecksum) | Err(Error::Base64(_))
        ));
    }

    #[test]
    fn test_footer_mismatch_is_detected() {
        let armored = write_string(&BlockType::Message, None, b"data").unwrap();
        let broken = armored.replace("-----END PGP MESSAGE-----", "-----END PGP SIGNATURE-----");
        assert!(parse_str(&broken).is_err());
    }

    #[test]
    fn test_ignores_leading_noise() {
        let armored = write_string(&BlockType::Signature, None, b"sig").unwrap();
        let with_noise = format!("Some mail text\n\n{}", armored);
        let (typ, _, decoded) = parse_str(&with_noise).unwrap();
        assert_eq!(typ, BlockType::Signature);
        assert_eq!(decoded, b"sig");
    }
}
