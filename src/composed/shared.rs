use std::io::{Cursor, Read};

use crate::armor::{self, BlockType};
use crate::errors::{Error, Result};
use crate::packet::{self, Packet};

/// Compositions that can be read from packet streams, raw bytes and armor.
pub trait Deserializable: Sized {
    /// Turn a list of packets into a usable representation.
    fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Vec<Self>>;

    /// True if an armor block of this type can hold this composition.
    fn matches_block_type(typ: &BlockType) -> bool;

    /// Parse a single byte encoded composition.
    fn from_bytes(bytes: impl Read) -> Result<Self> {
        let el = Self::from_bytes_many(bytes)?;
        single(el)
    }

    /// Parse a list of compositions in raw byte format.
    fn from_bytes_many(bytes: impl Read) -> Result<Vec<Self>> {
        let packets = packet::parser(bytes)?;

        Self::from_packets(packets)
    }

    /// Parse a single armor encoded composition.
    fn from_string(input: &str) -> Result<Self> {
        let el = Self::from_string_many(input)?;
        single(el)
    }

    /// Parse an armor encoded list of compositions.
    fn from_string_many(input: &str) -> Result<Vec<Self>> {
        Self::from_armor_many(Cursor::new(input))
    }

    /// Armored ascii data, single composition.
    fn from_armor_single<R: Read>(input: R) -> Result<Self> {
        let el = Self::from_armor_many(input)?;
        single(el)
    }

    /// Armored ascii data.
    fn from_armor_many<R: Read>(input: R) -> Result<Vec<Self>> {
        let (typ, _headers, data) = armor::parse(input)?;

        if !Self::matches_block_type(&typ) {
            return Err(Error::InvalidArmor(format!(
                "unexpected armor block {:?}",
                typ
            )));
        }

        Self::from_bytes_many(Cursor::new(data))
    }
}

fn single<T>(mut el: Vec<T>) -> Result<T> {
    if el.len() > 1 {
        return Err(Error::TooManyPackets);
    }

    el.pop().ok_or(Error::MissingPackets)
}
