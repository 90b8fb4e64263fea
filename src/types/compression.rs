use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::errors::{Error, Result};

/// Compression algorithm identifiers.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-9.4
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum CompressionAlgorithm {
    #[default]
    Uncompressed = 0,
    ZIP = 1,
    ZLIB = 2,
    BZip2 = 3,
}

impl CompressionAlgorithm {
    pub fn try_from_u8(v: u8) -> Result<Self> {
        Self::from_u8(v).ok_or_else(|| Error::Unsupported(format!("compression algorithm {}", v)))
    }
}
