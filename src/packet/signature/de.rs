use chrono::{TimeZone, Utc};
use log::debug;
use num_traits::FromPrimitive;

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::signature::{
    Notation, RevocationCode, RevocationKey, Signature, SignatureConfig, SignatureType,
    SignatureVersion, Subpacket, SubpacketData,
};
use crate::types::{
    CompressionAlgorithm, KeyId, KeyVersion, Mpi, SignatureBytes, Version,
};
use crate::util::{read_packet_length, read_string_lossy, Reader};

impl Signature {
    /// Parses a `Signature` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        let mut r = Reader::new(input);

        let version = r.read_u8()?;
        let version =
            SignatureVersion::from_u8(version).ok_or(Error::UnsupportedVersion(version))?;

        let typ = r.read_u8()?;
        let typ = SignatureType::from_u8(typ)
            .ok_or_else(|| crate::format_err!("invalid signature type {}", typ))?;
        let pub_alg = PublicKeyAlgorithm::from(r.read_u8()?);
        let hash_alg = HashAlgorithm::try_from_u8(r.read_u8()?)?;

        let hashed_len = match version {
            SignatureVersion::V4 => r.read_be_u16()? as usize,
            SignatureVersion::V6 => r.read_be_u32()? as usize,
        };
        let hashed_subpackets = subpackets(r.take(hashed_len)?)?;

        let unhashed_len = match version {
            SignatureVersion::V4 => r.read_be_u16()? as usize,
            SignatureVersion::V6 => r.read_be_u32()? as usize,
        };
        let unhashed_subpackets = subpackets(r.take(unhashed_len)?)?;

        let signed_hash_value = r.take_arr::<2>()?;

        let salt = match version {
            SignatureVersion::V4 => Vec::new(),
            SignatureVersion::V6 => {
                let salt_len = r.read_u8()?;
                r.take(salt_len as usize)?.to_vec()
            }
        };

        let signature = actual_signature(pub_alg, &mut r)?;
        crate::ensure!(r.is_empty(), "trailing data in signature packet");

        Ok(Signature::new(
            packet_version,
            SignatureConfig {
                version,
                typ,
                pub_alg,
                hash_alg,
                hashed_subpackets,
                unhashed_subpackets,
                salt,
            },
            signed_hash_value,
            signature,
        ))
    }
}

fn actual_signature(pub_alg: PublicKeyAlgorithm, r: &mut Reader<'_>) -> Result<SignatureBytes> {
    match pub_alg {
        PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSASign => {
            Ok(SignatureBytes::Mpis(vec![Mpi::try_from_reader(r)?]))
        }
        PublicKeyAlgorithm::DSA
        | PublicKeyAlgorithm::ECDSA
        | PublicKeyAlgorithm::EdDSALegacy
        | PublicKeyAlgorithm::Elgamal => Ok(SignatureBytes::Mpis(vec![
            Mpi::try_from_reader(r)?,
            Mpi::try_from_reader(r)?,
        ])),
        PublicKeyAlgorithm::Ed25519 => {
            let raw = r.take(64)?;
            Ok(SignatureBytes::Native(raw.to_vec()))
        }
        _ => Ok(SignatureBytes::Native(r.rest().to_vec())),
    }
}

fn subpackets(input: &[u8]) -> Result<Vec<Subpacket>> {
    let mut r = Reader::new(input);
    let mut packets = Vec::new();

    while !r.is_empty() {
        // the subpacket length (1, 2, or 5 octets)
        let len = read_packet_length(&mut r)?;
        crate::ensure!(len > 0, "empty subpacket");

        // the subpacket type (1 octet), MSB flags the critical bit
        let typ_raw = r.read_u8()?;
        let is_critical = typ_raw & 0x80 != 0;
        let typ = typ_raw & 0x7f;

        let body = r.take(len - 1)?;
        let data = subpacket(typ, body)?;

        packets.push(Subpacket { is_critical, data });
    }

    Ok(packets)
}

fn timestamp(r: &mut Reader<'_>) -> Result<chrono::DateTime<Utc>> {
    Utc.timestamp_opt(i64::from(r.read_be_u32()?), 0)
        .single()
        .ok_or_else(|| crate::format_err!("invalid timestamp"))
}

fn subpacket(typ: u8, body: &[u8]) -> Result<SubpacketData> {
    debug!("parsing subpacket {} ({} octets)", typ, body.len());
    let mut r = Reader::new(body);

    let data = match typ {
        2 => SubpacketData::SignatureCreationTime(timestamp(&mut r)?),
        3 => SubpacketData::SignatureExpirationTime(r.read_be_u32()?),
        4 => SubpacketData::ExportableCertification(r.read_u8()? == 1),
        5 => SubpacketData::TrustSignature(r.read_u8()?, r.read_u8()?),
        6 => SubpacketData::RegularExpression(read_string_lossy(r.rest())),
        7 => SubpacketData::Revocable(r.read_u8()? == 1),
        9 => SubpacketData::KeyExpirationTime(r.read_be_u32()?),
        11 => SubpacketData::PreferredSymmetricAlgorithms(
            r.rest()
                .iter()
                .map(|v| SymmetricKeyAlgorithm::try_from_u8(*v))
                .collect::<Result<_>>()?,
        ),
        12 => SubpacketData::RevocationKey(RevocationKey {
            class: r.read_u8()?,
            algorithm: PublicKeyAlgorithm::from(r.read_u8()?),
            fingerprint: r.rest().to_vec(),
        }),
        16 => SubpacketData::Issuer(KeyId::from_slice(r.take(8)?)?),
        20 => {
            let readable = r.read_u8()? == 0x80;
            let _ = r.take(3)?;
            let name_len = r.read_be_u16()? as usize;
            let value_len = r.read_be_u16()? as usize;
            let name = read_string_lossy(r.take(name_len)?);
            let value = read_string_lossy(r.take(value_len)?);

            SubpacketData::NotationData(Notation {
                readable,
                name,
                value,
            })
        }
        21 => SubpacketData::PreferredHashAlgorithms(
            r.rest()
                .iter()
                .map(|v| HashAlgorithm::try_from_u8(*v))
                .collect::<Result<_>>()?,
        ),
        22 => SubpacketData::PreferredCompressionAlgorithms(
            r.rest()
                .iter()
                .map(|v| CompressionAlgorithm::try_from_u8(*v))
                .collect::<Result<_>>()?,
        ),
        23 => SubpacketData::KeyServerPreferences(r.rest().to_vec()),
        24 => SubpacketData::PreferredKeyServer(read_string_lossy(r.rest())),
        25 => SubpacketData::IsPrimary(r.read_u8()? == 1),
        26 => SubpacketData::PolicyURI(read_string_lossy(r.rest())),
        27 => SubpacketData::KeyFlags(r.read_u8()?.into()),
        28 => SubpacketData::SignersUserID(read_string_lossy(r.rest())),
        29 => {
            let code = r.read_u8()?;
            let code = RevocationCode::from_u8(code)
                .ok_or_else(|| crate::format_err!("invalid revocation code {}", code))?;

            SubpacketData::RevocationReason(code, read_string_lossy(r.rest()))
        }
        30 => SubpacketData::Features(r.rest().to_vec()),
        31 => SubpacketData::SignatureTarget(
            PublicKeyAlgorithm::from(r.read_u8()?),
            HashAlgorithm::try_from_u8(r.read_u8()?)?,
            r.rest().to_vec(),
        ),
        32 => SubpacketData::EmbeddedSignature(Box::new(Signature::from_slice(
            Version::New,
            r.rest(),
        )?)),
        33 => {
            let version = r.read_u8()?;
            let version =
                KeyVersion::from_u8(version).ok_or(Error::UnsupportedVersion(version))?;

            SubpacketData::IssuerFingerprint(version, r.rest().to_vec())
        }
        39 => {
            let rest = r.rest();
            crate::ensure_eq!(rest.len() % 2, 0, "invalid AEAD ciphersuite list");
            SubpacketData::PreferredAead(
                rest.chunks(2)
                    .map(|pair| {
                        Ok((
                            SymmetricKeyAlgorithm::try_from_u8(pair[0])?,
                            AeadAlgorithm::try_from_u8(pair[1])?,
                        ))
                    })
                    .collect::<Result<_>>()?,
            )
        }
        _ => SubpacketData::Other(typ, body.to_vec()),
    };

    Ok(data)
}
