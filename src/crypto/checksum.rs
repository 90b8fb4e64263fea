use byteorder::{BigEndian, ByteOrder};
use sha1::{Digest, Sha1};

use crate::errors::{Error, Result};

/// Sum of all octets, mod 65536, as used by v4 secret material and session
/// key wrapping.
pub fn calculate_simple(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)))
}

/// Validates the two-octet simple checksum.
pub fn simple(expected: &[u8], data: &[u8]) -> Result<()> {
    crate::ensure_eq!(expected.len(), 2, "invalid simple checksum length");
    if BigEndian::read_u16(expected) != calculate_simple(data) {
        return Err(Error::ChecksumMismatch);
    }

    Ok(())
}

pub fn calculate_sha1(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Validates the 20-octet SHA-1 trailer guarding CFB protected secret
/// material. Failure means the passphrase was wrong.
pub fn sha1(expected: &[u8], data: &[u8]) -> Result<()> {
    if expected.len() != 20 || calculate_sha1(data) != expected {
        return Err(Error::PassphraseIncorrect);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        assert_eq!(calculate_simple(&[]), 0);
        assert_eq!(calculate_simple(&[1, 2, 3]), 6);
        assert_eq!(calculate_simple(&[0xff, 0xff, 3]), 0x0201);

        simple(&[0x02, 0x01], &[0xff, 0xff, 3]).unwrap();
        assert!(simple(&[0x02, 0x02], &[0xff, 0xff, 3]).is_err());
    }

    #[test]
    fn test_sha1() {
        let sum = calculate_sha1(b"abc");
        sha1(&sum, b"abc").unwrap();
        assert!(sha1(&sum, b"abd").is_err());
    }
}
