mod compressed_data;
mod literal_data;
mod many;
mod marker;
mod one_pass_signature;
mod public_key;
mod public_key_encrypted_session_key;
mod secret_key;
pub mod signature;
mod single;
mod sym_encrypted_data;
mod sym_encrypted_protected_data;
mod sym_key_encrypted_session_key;
mod user_attribute;
mod user_id;

pub use self::compressed_data::*;
pub use self::literal_data::*;
pub use self::many::*;
pub use self::marker::*;
pub use self::one_pass_signature::*;
pub use self::public_key::{PublicKey, PublicSubkey};
pub use self::public_key_encrypted_session_key::*;
pub use self::secret_key::{SecretKey, SecretSubkey};
pub use self::signature::{
    KeyFlags, Notation, RevocationCode, RevocationKey, Signature, SignatureConfig,
    SignatureConfigBuilder, SignatureType, SignatureVersion, Subpacket, SubpacketData,
};
pub use self::sym_encrypted_data::*;
pub use self::sym_encrypted_protected_data::*;
pub use self::sym_key_encrypted_session_key::*;
pub use self::user_attribute::*;
pub use self::user_id::*;

use std::io;

use byteorder::WriteBytesExt;

use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{Tag, Version};
use crate::util::write_packet_length;

/// The target of a certification signature: the packet types that can be
/// bound to a primary key by a signature over `primary ‖ target`.
pub trait CertificationTarget {
    /// The framed bytes hashed into the certification.
    fn to_certification_bytes(&self) -> Result<Vec<u8>>;
}

impl CertificationTarget for UserId {
    fn to_certification_bytes(&self) -> Result<Vec<u8>> {
        UserId::to_certification_bytes(self)
    }
}

impl CertificationTarget for UserAttribute {
    fn to_certification_bytes(&self) -> Result<Vec<u8>> {
        UserAttribute::to_certification_bytes(self)
    }
}

impl<T: CertificationTarget> CertificationTarget for &T {
    fn to_certification_bytes(&self) -> Result<Vec<u8>> {
        (*self).to_certification_bytes()
    }
}

/// The sum of all packet types.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    CompressedData(CompressedData),
    PublicKey(PublicKey),
    PublicSubkey(PublicSubkey),
    SecretKey(SecretKey),
    SecretSubkey(SecretSubkey),
    LiteralData(LiteralData),
    Marker(Marker),
    OnePassSignature(OnePassSignature),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Signature(Signature),
    SymEncryptedData(SymEncryptedData),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
    UserAttribute(UserAttribute),
    UserId(UserId),
}

macro_rules! impl_packet {
    ($name:ident) => {
        impl From<$name> for Packet {
            fn from(p: $name) -> Packet {
                Packet::$name(p)
            }
        }

        impl TryFrom<Packet> for $name {
            type Error = Error;

            fn try_from(p: Packet) -> Result<$name> {
                match p {
                    Packet::$name(p) => Ok(p),
                    _ => Err(crate::format_err!(
                        "unexpected packet {:?}, expected {}",
                        p.tag(),
                        stringify!($name)
                    )),
                }
            }
        }
    };
}

impl_packet!(CompressedData);
impl_packet!(PublicKey);
impl_packet!(PublicSubkey);
impl_packet!(SecretKey);
impl_packet!(SecretSubkey);
impl_packet!(LiteralData);
impl_packet!(Marker);
impl_packet!(OnePassSignature);
impl_packet!(PublicKeyEncryptedSessionKey);
impl_packet!(Signature);
impl_packet!(SymEncryptedData);
impl_packet!(SymEncryptedProtectedData);
impl_packet!(SymKeyEncryptedSessionKey);
impl_packet!(UserAttribute);
impl_packet!(UserId);

impl Packet {
    pub fn tag(&self) -> Tag {
        match self {
            Packet::CompressedData(p) => p.tag(),
            Packet::PublicKey(p) => p.tag(),
            Packet::PublicSubkey(p) => p.tag(),
            Packet::SecretKey(p) => p.tag(),
            Packet::SecretSubkey(p) => p.tag(),
            Packet::LiteralData(p) => p.tag(),
            Packet::Marker(p) => p.tag(),
            Packet::OnePassSignature(p) => p.tag(),
            Packet::PublicKeyEncryptedSessionKey(p) => p.tag(),
            Packet::Signature(p) => p.tag(),
            Packet::SymEncryptedData(p) => p.tag(),
            Packet::SymEncryptedProtectedData(p) => p.tag(),
            Packet::SymKeyEncryptedSessionKey(p) => p.tag(),
            Packet::UserAttribute(p) => p.tag(),
            Packet::UserId(p) => p.tag(),
        }
    }

    pub fn packet_version(&self) -> Version {
        match self {
            Packet::CompressedData(p) => p.packet_version(),
            Packet::PublicKey(p) => p.packet_version(),
            Packet::PublicSubkey(p) => p.packet_version(),
            Packet::SecretKey(p) => p.packet_version(),
            Packet::SecretSubkey(p) => p.packet_version(),
            Packet::LiteralData(p) => p.packet_version(),
            Packet::Marker(p) => p.packet_version(),
            Packet::OnePassSignature(p) => p.packet_version(),
            Packet::PublicKeyEncryptedSessionKey(p) => p.packet_version(),
            Packet::Signature(p) => p.packet_version(),
            Packet::SymEncryptedData(p) => p.packet_version(),
            Packet::SymEncryptedProtectedData(p) => p.packet_version(),
            Packet::SymKeyEncryptedSessionKey(p) => p.packet_version(),
            Packet::UserAttribute(p) => p.packet_version(),
            Packet::UserId(p) => p.packet_version(),
        }
    }
}

/// Writes a packet with a new format header and a single length chunk.
pub fn write_packet<S: Serialize>(writer: &mut impl io::Write, tag: Tag, body: &S) -> Result<()> {
    let body = body.to_bytes()?;
    writer.write_u8(tag.encode())?;
    write_packet_length(writer, body.len())?;
    writer.write_all(&body)?;

    Ok(())
}

impl Serialize for Packet {
    /// Serializes the complete framed packet.
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Packet::CompressedData(p) => write_packet(writer, self.tag(), p),
            Packet::PublicKey(p) => write_packet(writer, self.tag(), p),
            Packet::PublicSubkey(p) => write_packet(writer, self.tag(), p),
            Packet::SecretKey(p) => write_packet(writer, self.tag(), p),
            Packet::SecretSubkey(p) => write_packet(writer, self.tag(), p),
            Packet::LiteralData(p) => write_packet(writer, self.tag(), p),
            Packet::Marker(p) => write_packet(writer, self.tag(), p),
            Packet::OnePassSignature(p) => write_packet(writer, self.tag(), p),
            Packet::PublicKeyEncryptedSessionKey(p) => write_packet(writer, self.tag(), p),
            Packet::Signature(p) => write_packet(writer, self.tag(), p),
            Packet::SymEncryptedData(p) => write_packet(writer, self.tag(), p),
            Packet::SymEncryptedProtectedData(p) => write_packet(writer, self.tag(), p),
            Packet::SymKeyEncryptedSessionKey(p) => write_packet(writer, self.tag(), p),
            Packet::UserAttribute(p) => write_packet(writer, self.tag(), p),
            Packet::UserId(p) => write_packet(writer, self.tag(), p),
        }
    }
}

/// The packets with the given tag, original order preserved.
pub fn filter_by_tag(packets: &[Packet], tag: Tag) -> Vec<&Packet> {
    packets.iter().filter(|p| p.tag() == tag).collect()
}
