use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::Result;
use crate::packet::signature::{Signature, SignatureVersion, Subpacket, SubpacketData};
use crate::ser::Serialize;
use crate::types::SignatureBytes;
use crate::util::write_packet_length;

impl Subpacket {
    fn body_to_bytes(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();

        match &self.data {
            SubpacketData::SignatureCreationTime(t) => {
                body.write_u32::<BigEndian>(t.timestamp() as u32)?;
            }
            SubpacketData::SignatureExpirationTime(d) | SubpacketData::KeyExpirationTime(d) => {
                body.write_u32::<BigEndian>(*d)?;
            }
            SubpacketData::ExportableCertification(v)
            | SubpacketData::Revocable(v)
            | SubpacketData::IsPrimary(v) => {
                body.write_u8(u8::from(*v))?;
            }
            SubpacketData::TrustSignature(depth, value) => {
                body.write_u8(*depth)?;
                body.write_u8(*value)?;
            }
            SubpacketData::RegularExpression(s)
            | SubpacketData::PreferredKeyServer(s)
            | SubpacketData::PolicyURI(s)
            | SubpacketData::SignersUserID(s) => {
                body.extend_from_slice(s.as_bytes());
            }
            SubpacketData::PreferredSymmetricAlgorithms(algs) => {
                body.extend(algs.iter().map(|a| *a as u8));
            }
            SubpacketData::PreferredHashAlgorithms(algs) => {
                body.extend(algs.iter().map(|a| *a as u8));
            }
            SubpacketData::PreferredCompressionAlgorithms(algs) => {
                body.extend(algs.iter().map(|a| *a as u8));
            }
            SubpacketData::RevocationKey(rev) => {
                body.write_u8(rev.class)?;
                body.write_u8(rev.algorithm.into())?;
                body.extend_from_slice(&rev.fingerprint);
            }
            SubpacketData::Issuer(id) => {
                body.extend_from_slice(id.as_bytes());
            }
            SubpacketData::NotationData(n) => {
                body.write_u8(if n.readable { 0x80 } else { 0 })?;
                body.extend_from_slice(&[0, 0, 0]);
                body.write_u16::<BigEndian>(n.name.len() as u16)?;
                body.write_u16::<BigEndian>(n.value.len() as u16)?;
                body.extend_from_slice(n.name.as_bytes());
                body.extend_from_slice(n.value.as_bytes());
            }
            SubpacketData::KeyServerPreferences(v) | SubpacketData::Features(v) => {
                body.extend_from_slice(v);
            }
            SubpacketData::KeyFlags(flags) => {
                body.write_u8((*flags).into())?;
            }
            SubpacketData::RevocationReason(code, reason) => {
                body.write_u8(*code as u8)?;
                body.extend_from_slice(reason.as_bytes());
            }
            SubpacketData::SignatureTarget(pub_alg, hash_alg, hash) => {
                body.write_u8((*pub_alg).into())?;
                body.write_u8(*hash_alg as u8)?;
                body.extend_from_slice(hash);
            }
            SubpacketData::EmbeddedSignature(sig) => {
                sig.to_writer(&mut body)?;
            }
            SubpacketData::IssuerFingerprint(version, fp) => {
                body.write_u8(*version as u8)?;
                body.extend_from_slice(fp);
            }
            SubpacketData::PreferredAead(pairs) => {
                for (sym, aead) in pairs {
                    body.write_u8(*sym as u8)?;
                    body.write_u8(*aead as u8)?;
                }
            }
            SubpacketData::Other(_, raw) => {
                body.extend_from_slice(raw);
            }
        }

        Ok(body)
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let body = self.body_to_bytes()?;
        write_packet_length(writer, body.len() + 1)?;

        let mut typ = self.data.typ();
        if self.is_critical {
            typ |= 0x80;
        }
        writer.write_u8(typ)?;
        writer.write_all(&body)?;

        Ok(())
    }
}

impl Serialize for SignatureBytes {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SignatureBytes::Mpis(mpis) => {
                for mpi in mpis {
                    mpi.to_writer(writer)?;
                }
            }
            SignatureBytes::Native(raw) => {
                writer.write_all(raw)?;
            }
        }

        Ok(())
    }
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let config = &self.config;
        writer.write_u8(config.version as u8)?;
        writer.write_u8(config.typ as u8)?;
        writer.write_u8(config.pub_alg.into())?;
        writer.write_u8(config.hash_alg as u8)?;

        let mut hashed = Vec::new();
        for packet in &config.hashed_subpackets {
            packet.to_writer(&mut hashed)?;
        }
        let mut unhashed = Vec::new();
        for packet in &config.unhashed_subpackets {
            packet.to_writer(&mut unhashed)?;
        }

        match config.version {
            SignatureVersion::V4 => {
                writer.write_u16::<BigEndian>(hashed.len() as u16)?;
                writer.write_all(&hashed)?;
                writer.write_u16::<BigEndian>(unhashed.len() as u16)?;
                writer.write_all(&unhashed)?;
            }
            SignatureVersion::V6 => {
                writer.write_u32::<BigEndian>(hashed.len() as u32)?;
                writer.write_all(&hashed)?;
                writer.write_u32::<BigEndian>(unhashed.len() as u32)?;
                writer.write_all(&unhashed)?;
            }
        }

        writer.write_all(&self.signed_hash_value)?;

        if config.version == SignatureVersion::V6 {
            writer.write_u8(config.salt.len() as u8)?;
            writer.write_all(&config.salt)?;
        }

        self.signature.to_writer(writer)?;

        Ok(())
    }
}
