use std::io::{self, Read};

use byteorder::WriteBytesExt;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;

use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, Tag, Version};
use crate::util::Reader;

/// Compressed Data Packet
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.6
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedData {
    packet_version: Version,
    algorithm: CompressionAlgorithm,
    compressed_data: Vec<u8>,
}

impl CompressedData {
    /// Parses a `CompressedData` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        let mut r = Reader::new(input);
        let algorithm = CompressionAlgorithm::try_from_u8(r.read_u8()?)?;

        Ok(CompressedData {
            packet_version,
            algorithm,
            compressed_data: r.rest().to_vec(),
        })
    }

    /// Compresses a serialized packet stream.
    pub fn from_data(algorithm: CompressionAlgorithm, data: &[u8]) -> Result<Self> {
        let compressed_data = match algorithm {
            CompressionAlgorithm::Uncompressed => data.to_vec(),
            CompressionAlgorithm::ZIP => {
                let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
                io::Write::write_all(&mut enc, data)?;
                enc.finish()?
            }
            CompressionAlgorithm::ZLIB => {
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
                io::Write::write_all(&mut enc, data)?;
                enc.finish()?
            }
            CompressionAlgorithm::BZip2 => {
                crate::unsupported_err!("BZip2 compression")
            }
        };

        Ok(CompressedData {
            packet_version: Version::New,
            algorithm,
            compressed_data,
        })
    }

    /// The decompressed packet stream.
    pub fn decompress(&self) -> Result<Vec<u8>> {
        match self.algorithm {
            CompressionAlgorithm::Uncompressed => Ok(self.compressed_data.clone()),
            CompressionAlgorithm::ZIP => {
                let mut out = Vec::new();
                DeflateDecoder::new(&self.compressed_data[..]).read_to_end(&mut out)?;
                Ok(out)
            }
            CompressionAlgorithm::ZLIB => {
                let mut out = Vec::new();
                ZlibDecoder::new(&self.compressed_data[..]).read_to_end(&mut out)?;
                Ok(out)
            }
            CompressionAlgorithm::BZip2 => {
                crate::unsupported_err!("BZip2 decompression")
            }
        }
    }

    pub fn packet_version(&self) -> Version {
        self.packet_version
    }

    pub fn tag(&self) -> Tag {
        Tag::CompressedData
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }
}

impl Serialize for CompressedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.algorithm as u8)?;
        writer.write_all(&self.compressed_data)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let data = b"a very compressible message message message".repeat(4);
        for alg in [
            CompressionAlgorithm::Uncompressed,
            CompressionAlgorithm::ZIP,
            CompressionAlgorithm::ZLIB,
        ] {
            let packet = CompressedData::from_data(alg, &data).unwrap();
            assert_eq!(packet.decompress().unwrap(), data, "{:?}", alg);

            let bytes = packet.to_bytes().unwrap();
            let back = CompressedData::from_slice(Version::New, &bytes).unwrap();
            assert_eq!(back, packet);
        }
    }
}
