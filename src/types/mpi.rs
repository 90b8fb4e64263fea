use std::fmt;
use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use num_bigint::BigUint;
use zeroize::Zeroize;

use crate::errors::Result;
use crate::ser::Serialize;
use crate::util::{bit_size, strip_leading_zeros, Reader};

/// A multiprecision integer: a big-endian magnitude, stored with leading
/// zero octets stripped. On the wire it is prefixed by a two-octet bit count.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct Mpi(Vec<u8>);

impl Mpi {
    /// Wraps the given magnitude, stripping leading zeros.
    pub fn from_slice(raw: &[u8]) -> Self {
        Mpi(strip_leading_zeros(raw).to_vec())
    }

    pub fn from_raw(raw: Vec<u8>) -> Self {
        if raw.first() == Some(&0) {
            Mpi::from_slice(&raw)
        } else {
            Mpi(raw)
        }
    }

    /// Parses a wire format MPI.
    pub fn try_from_reader(r: &mut Reader<'_>) -> Result<Self> {
        let bits = r.read_be_u16()? as usize;
        let len = (bits + 7) / 8;
        let raw = r.take(len)?;

        Ok(Mpi::from_slice(raw))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The magnitude left-padded with zeros to `size` octets. Errors if the
    /// value does not fit.
    pub fn to_padded(&self, size: usize) -> Result<Vec<u8>> {
        crate::ensure!(self.0.len() <= size, "value too large for {} octets", size);
        let mut out = vec![0u8; size];
        out[size - self.0.len()..].copy_from_slice(&self.0);
        Ok(out)
    }
}

impl Serialize for Mpi {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(bit_size(&self.0) as u16)?;
        writer.write_all(&self.0)?;

        Ok(())
    }
}

impl AsRef<[u8]> for Mpi {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&BigUint> for Mpi {
    fn from(v: &BigUint) -> Self {
        Mpi(v.to_bytes_be())
    }
}

impl From<BigUint> for Mpi {
    fn from(v: BigUint) -> Self {
        Mpi(v.to_bytes_be())
    }
}

impl From<&Mpi> for BigUint {
    fn from(v: &Mpi) -> Self {
        BigUint::from_bytes_be(&v.0)
    }
}

impl fmt::Debug for Mpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mpi({})", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mpi_roundtrip() {
        // Example from RFC 4880 3.2: the value 511 is `00 09 01 FF`.
        let mpi = Mpi::from_slice(&[0x01, 0xff]);
        let bytes = mpi.to_bytes().unwrap();
        assert_eq!(bytes, vec![0x00, 0x09, 0x01, 0xff]);

        let mut r = Reader::new(&bytes);
        assert_eq!(Mpi::try_from_reader(&mut r).unwrap(), mpi);
        assert!(r.is_empty());
    }

    #[test]
    fn test_mpi_strips_leading_zeros() {
        let mpi = Mpi::from_slice(&[0x00, 0x00, 0x02]);
        assert_eq!(mpi.as_bytes(), &[0x02]);
        assert_eq!(mpi.to_bytes().unwrap(), vec![0x00, 0x02, 0x02]);
    }

    #[test]
    fn test_mpi_padded() {
        let mpi = Mpi::from_slice(&[0x02, 0x03]);
        assert_eq!(mpi.to_padded(4).unwrap(), vec![0, 0, 2, 3]);
        assert!(mpi.to_padded(1).is_err());
    }
}
