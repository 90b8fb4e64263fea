use num_derive::FromPrimitive;

/// Packet header flavor.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-4.2
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum Version {
    /// Old (legacy) packet format.
    Old = 0,
    /// New (OpenPGP) packet format. Always used on emission.
    #[default]
    New = 1,
}

/// Packet tags.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum Tag {
    PublicKeyEncryptedSessionKey = 1,
    Signature = 2,
    SymKeyEncryptedSessionKey = 3,
    OnePassSignature = 4,
    SecretKey = 5,
    PublicKey = 6,
    SecretSubkey = 7,
    CompressedData = 8,
    SymEncryptedData = 9,
    Marker = 10,
    LiteralData = 11,
    Trust = 12,
    UserId = 13,
    PublicSubkey = 14,
    UserAttribute = 17,
    SymEncryptedProtectedData = 18,
    ModDetectionCode = 19,
    Padding = 21,
}

impl Tag {
    /// The tag encoded as the first octet of a new format header.
    pub fn encode(self) -> u8 {
        0b1100_0000 | self as u8
    }
}

/// Body length as encoded in a packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketLength {
    Fixed(usize),
    Indeterminate,
    Partial(usize),
}

impl From<usize> for PacketLength {
    fn from(val: usize) -> PacketLength {
        PacketLength::Fixed(val)
    }
}

/// Key packet versions. Only v4 and v6 keys can be constructed; the
/// remaining values are recognized so their packets can be skipped cleanly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
#[repr(u8)]
pub enum KeyVersion {
    V2 = 2,
    V3 = 3,
    #[default]
    V4 = 4,
    V5 = 5,
    V6 = 6,
}

impl KeyVersion {
    /// Octet prefixing the serialized key in signature hashing.
    pub fn signing_prefix(self) -> u8 {
        match self {
            KeyVersion::V6 => 0x9b,
            _ => 0x99,
        }
    }
}

/// Versions of the symmetric-key encrypted session key packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum SkeskVersion {
    V4 = 4,
    V6 = 6,
}
