use std::collections::BTreeMap;
use std::io;

use chrono::Utc;
use log::{debug, warn};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::armor::{self, BlockType};
use crate::composed::shared::Deserializable;
use crate::composed::signed_key::SignedSecretKey;
use crate::composed::StandaloneSignature;
use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{
    self, CompressedData, LiteralData, OnePassSignature, Packet, PublicKeyEncryptedSessionKey,
    Signature, SignatureConfig, SignatureType, SymEncryptedData, SymEncryptedProtectedData,
    SymKeyEncryptedSessionKey,
};
use crate::ser::Serialize;
use crate::types::{
    CompressionAlgorithm, EskType, KeyTrait, PublicKeyTrait, SecretKeyTrait, StringToKey, Tag,
};

/// An encrypted session key packet, either public key or passphrase based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Esk {
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
}

impl Esk {
    pub fn tag(&self) -> Tag {
        match self {
            Esk::PublicKeyEncryptedSessionKey(p) => p.tag(),
            Esk::SymKeyEncryptedSessionKey(p) => p.tag(),
        }
    }
}

impl Serialize for Esk {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Esk::PublicKeyEncryptedSessionKey(p) => {
                packet::write_packet(writer, self.tag(), p)
            }
            Esk::SymKeyEncryptedSessionKey(p) => packet::write_packet(writer, self.tag(), p),
        }
    }
}

/// The encrypted payload: exactly one of these closes an encrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edata {
    SymEncryptedData(SymEncryptedData),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
}

impl Edata {
    pub fn tag(&self) -> Tag {
        match self {
            Edata::SymEncryptedData(p) => p.tag(),
            Edata::SymEncryptedProtectedData(p) => p.tag(),
        }
    }
}

impl Serialize for Edata {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Edata::SymEncryptedData(p) => packet::write_packet(writer, self.tag(), p),
            Edata::SymEncryptedProtectedData(p) => packet::write_packet(writer, self.tag(), p),
        }
    }
}

/// How the encrypted payload is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seipd {
    /// SEIPD v1: CFB with an MDC trailer.
    V1,
    /// SEIPD v2: chunked AEAD.
    V2 {
        aead: AeadAlgorithm,
        chunk_size: u8,
    },
}

impl Default for Seipd {
    fn default() -> Self {
        Seipd::V1
    }
}

/// A PGP message.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-10.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Literal(LiteralData),
    Compressed(CompressedData),
    Signed {
        /// nested message
        message: Option<Box<Message>>,
        /// for signature packets that contain a one pass message
        one_pass_signature: Option<OnePassSignature>,
        signature: Signature,
    },
    Encrypted {
        esk: Vec<Esk>,
        edata: Edata,
    },
}

impl Message {
    pub fn new_literal(file_name: impl Into<String>, text: &str) -> Self {
        Message::Literal(LiteralData::from_str(file_name, text))
    }

    pub fn new_literal_bytes(file_name: impl Into<String>, data: &[u8]) -> Self {
        Message::Literal(LiteralData::from_bytes(file_name, data))
    }

    /// The literal message, if any, however deeply nested.
    pub fn get_literal(&self) -> Option<&LiteralData> {
        match self {
            Message::Literal(data) => Some(data),
            Message::Signed { message, .. } => message.as_ref().and_then(|m| m.get_literal()),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.get_literal().is_some()
    }

    /// Check if this message is a signature that was signed with a one
    /// pass signature.
    pub fn is_one_pass_signed(&self) -> bool {
        matches!(
            self,
            Message::Signed {
                one_pass_signature: Some(_),
                ..
            }
        )
    }

    /// The raw content of the literal data, if any.
    pub fn get_content(&self) -> Option<Vec<u8>> {
        self.get_literal().map(|l| l.data().to_vec())
    }

    /// Signs the message with the given key, wrapping it in a one pass
    /// signature frame.
    pub fn sign<R: Rng + CryptoRng>(
        self,
        rng: &mut R,
        key: &(impl SecretKeyTrait + KeyTrait),
        key_pw: &str,
    ) -> Result<Message> {
        let literal = self
            .get_literal()
            .ok_or_else(|| Error::InvalidArgument("nothing to sign".into()))?;

        let typ = if literal.is_binary() {
            SignatureType::Binary
        } else {
            SignatureType::Text
        };
        let content = literal.to_signable_bytes();

        let config = SignatureConfig::from_key(rng, key, typ)?;

        // a one pass packet is last unless the inner message is itself one
        // pass signed
        let last = if self.is_one_pass_signed() { 0 } else { 1 };
        let ops = OnePassSignature::from_config(&config, key, last)?;

        let signature = config.sign(key, key_pw, &content)?;

        Ok(Message::Signed {
            message: Some(Box::new(self)),
            one_pass_signature: Some(ops),
            signature,
        })
    }

    /// Produces a detached signature over the message content.
    pub fn sign_detached<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        key: &(impl SecretKeyTrait + KeyTrait),
        key_pw: &str,
    ) -> Result<StandaloneSignature> {
        let literal = self
            .get_literal()
            .ok_or_else(|| Error::InvalidArgument("nothing to sign".into()))?;

        let typ = if literal.is_binary() {
            SignatureType::Binary
        } else {
            SignatureType::Text
        };

        let config = SignatureConfig::from_key(rng, key, typ)?;
        let signature = config.sign(key, key_pw, &literal.to_signable_bytes())?;

        Ok(StandaloneSignature::new(signature))
    }

    /// Verifies the signature against the given key.
    pub fn verify(&self, key: &impl PublicKeyTrait) -> Result<()> {
        match self {
            Message::Signed {
                message, signature, ..
            } => {
                let literal = message
                    .as_ref()
                    .and_then(|m| m.get_literal())
                    .ok_or_else(|| Error::SignatureError("no signed content".into()))?;

                signature.verify(key, &literal.to_signable_bytes())
            }
            _ => Err(Error::SignatureError("message is not signed".into())),
        }
    }

    /// Compresses the message.
    pub fn compress(&self, alg: CompressionAlgorithm) -> Result<Message> {
        let data = self.to_bytes()?;

        Ok(Message::Compressed(CompressedData::from_data(alg, &data)?))
    }

    /// Decompresses the message.
    pub fn decompress(self) -> Result<Message> {
        match self {
            Message::Compressed(data) => Message::from_bytes(&data.decompress()?[..]),
            _ => Ok(self),
        }
    }

    /// Encrypts the message. A fresh session key is generated and wrapped
    /// once per recipient key and once per passphrase; the payload is
    /// encrypted exactly once.
    pub fn encrypt<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        recipients: &[&dyn PublicKeyTrait],
        passwords: &[&str],
        sym: SymmetricKeyAlgorithm,
        seipd: Seipd,
    ) -> Result<Message> {
        crate::ensure!(
            !recipients.is_empty() || !passwords.is_empty(),
            "missing recipients and passwords"
        );

        let mut session_key = Zeroizing::new(vec![0u8; sym.key_size()]);
        rng.fill_bytes(&mut session_key);

        // the session key wrapping follows the payload framing generation
        let esk_type = match seipd {
            Seipd::V1 => EskType::V3_4,
            Seipd::V2 { .. } => EskType::V6,
        };

        let mut esk = Vec::with_capacity(recipients.len() + passwords.len());

        for pkey in recipients {
            let pkesk = PublicKeyEncryptedSessionKey::from_session_key(
                rng,
                &session_key,
                sym,
                esk_type,
                *pkey,
            )?;
            esk.push(Esk::PublicKeyEncryptedSessionKey(pkesk));
        }

        for pw in passwords {
            let skesk = match seipd {
                Seipd::V1 => SymKeyEncryptedSessionKey::encrypt_v4(
                    pw,
                    &session_key,
                    sym,
                    StringToKey::new_default(rng),
                    sym,
                )?,
                Seipd::V2 { aead, .. } => {
                    let s2k = StringToKey::new_default(rng);
                    SymKeyEncryptedSessionKey::encrypt_v6(
                        rng,
                        pw,
                        &session_key,
                        s2k,
                        sym,
                        aead,
                    )?
                }
            };
            esk.push(Esk::SymKeyEncryptedSessionKey(skesk));
        }

        let payload = self.to_bytes()?;
        let edata = match seipd {
            Seipd::V1 => Edata::SymEncryptedProtectedData(SymEncryptedProtectedData::encrypt_v1(
                rng,
                sym,
                &session_key,
                &payload,
            )?),
            Seipd::V2 { aead, chunk_size } => {
                Edata::SymEncryptedProtectedData(SymEncryptedProtectedData::encrypt_v2(
                    rng,
                    sym,
                    aead,
                    chunk_size,
                    &session_key,
                    &payload,
                )?)
            }
        };

        Ok(Message::Encrypted { esk, edata })
    }

    /// Decrypts the message, trying the given passphrases against SKESK
    /// packets first, then the given keys against matching PKESKs. A
    /// session key only counts as recovered once the payload integrity
    /// check accepts it; until then every failure moves on to the next
    /// candidate.
    pub fn decrypt(
        &self,
        passwords: &[&str],
        keys: &[(&SignedSecretKey, &str)],
    ) -> Result<Message> {
        let Message::Encrypted { esk, edata } = self else {
            return Err(Error::InvalidArgument("message is not encrypted".into()));
        };

        let now = Utc::now();

        let try_payload = |sym: Option<SymmetricKeyAlgorithm>,
                           session_key: &[u8]|
         -> Result<Vec<u8>> {
            match edata {
                Edata::SymEncryptedProtectedData(data) => data.decrypt(session_key, sym),
                Edata::SymEncryptedData(data) => {
                    let sym =
                        sym.ok_or_else(|| crate::format_err!("missing symmetric algorithm"))?;
                    data.decrypt(sym, session_key)
                }
            }
        };

        let mut plaintext = None;

        // passphrase based candidates first
        'done: {
            for esk_packet in esk {
                let Esk::SymKeyEncryptedSessionKey(skesk) = esk_packet else {
                    continue;
                };

                for pw in passwords {
                    let (sym, session_key) = match skesk.decrypt(pw) {
                        Ok(recovered) => recovered,
                        Err(err) => {
                            debug!("SKESK candidate failed: {:?}", err);
                            continue;
                        }
                    };
                    let session_key = Zeroizing::new(session_key);

                    match try_payload(sym, &session_key) {
                        Ok(data) => {
                            plaintext = Some(data);
                            break 'done;
                        }
                        Err(err) => debug!("payload rejected the session key: {:?}", err),
                    }
                }
            }

            // then public key based ones, matched by key id before any
            // cryptography happens
            for esk_packet in esk {
                let Esk::PublicKeyEncryptedSessionKey(pkesk) = esk_packet else {
                    continue;
                };

                for (key, key_pw) in keys {
                    let (sym, session_key) = match key.decrypt_session_key(key_pw, pkesk, now) {
                        Ok(recovered) => recovered,
                        Err(err) => {
                            debug!("PKESK candidate failed: {:?}", err);
                            continue;
                        }
                    };
                    let session_key = Zeroizing::new(session_key);

                    match try_payload(sym, &session_key) {
                        Ok(data) => {
                            plaintext = Some(data);
                            break 'done;
                        }
                        Err(err) => warn!("payload rejected the session key: {:?}", err),
                    }
                }
            }
        }

        let plaintext = plaintext.ok_or(Error::SessionKeyDecryptionFailed)?;

        let message = Message::from_bytes(&plaintext[..])?;
        message.decompress()
    }

    /// Runs the session key trial loop over all ESK packets.
    pub fn decrypt_session_key(
        &self,
        passwords: &[&str],
        keys: &[(&SignedSecretKey, &str)],
    ) -> Result<(Option<SymmetricKeyAlgorithm>, Zeroizing<Vec<u8>>)> {
        let Message::Encrypted { esk, .. } = self else {
            return Err(Error::InvalidArgument("message is not encrypted".into()));
        };

        let now = Utc::now();

        // passphrase based candidates first
        for esk_packet in esk {
            let Esk::SymKeyEncryptedSessionKey(skesk) = esk_packet else {
                continue;
            };

            for pw in passwords {
                match skesk.decrypt(pw) {
                    Ok((sym, key)) => return Ok((sym, Zeroizing::new(key))),
                    Err(err) => {
                        debug!("SKESK candidate failed: {:?}", err);
                    }
                }
            }
        }

        // then public key based ones, matched by key id before any
        // cryptography happens
        for esk_packet in esk {
            let Esk::PublicKeyEncryptedSessionKey(pkesk) = esk_packet else {
                continue;
            };

            for (key, key_pw) in keys {
                match key.decrypt_session_key(key_pw, pkesk, now) {
                    Ok((sym, session_key)) => return Ok((sym, Zeroizing::new(session_key))),
                    Err(Error::MissingKey) => {
                        debug!("no matching key packet for PKESK");
                    }
                    Err(err) => {
                        warn!("PKESK candidate failed: {:?}", err);
                    }
                }
            }
        }

        Err(Error::SessionKeyDecryptionFailed)
    }

    pub fn to_armored_writer(
        &self,
        writer: &mut impl io::Write,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Result<()> {
        let bytes = self.to_bytes()?;
        armor::write(writer, &armor::BlockType::Message, headers, &bytes)
    }

    pub fn to_armored_string(&self, headers: Option<&BTreeMap<String, String>>) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf, headers)?;
        Ok(String::from_utf8(buf).expect("armor is ascii"))
    }
}

impl Serialize for Message {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Message::Literal(data) => packet::write_packet(writer, Tag::LiteralData, data),
            Message::Compressed(data) => {
                packet::write_packet(writer, Tag::CompressedData, data)
            }
            Message::Signed {
                message,
                one_pass_signature,
                signature,
            } => {
                if let Some(ops) = one_pass_signature {
                    packet::write_packet(writer, Tag::OnePassSignature, ops)?;
                }
                if let Some(message) = message {
                    message.to_writer(writer)?;
                }
                packet::write_packet(writer, Tag::Signature, signature)
            }
            Message::Encrypted { esk, edata } => {
                for esk_packet in esk {
                    esk_packet.to_writer(writer)?;
                }
                edata.to_writer(writer)
            }
        }
    }
}

impl Deserializable for Message {
    /// Parse a composed message.
    /// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-10.3
    fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Vec<Self>> {
        // interim state of a signed message while its trailing signature
        // packet has not arrived
        struct PendingSigned {
            message: Option<Message>,
            one_pass_signature: OnePassSignature,
        }

        fn place(msg: Message, pending: &mut Vec<PendingSigned>) -> Result<Option<Message>> {
            match pending.last_mut() {
                Some(open) => {
                    crate::ensure!(open.message.is_none(), "multiple messages in signed frame");
                    open.message = Some(msg);
                    Ok(None)
                }
                None => Ok(Some(msg)),
            }
        }

        let mut done: Vec<Message> = Vec::new();
        let mut pending: Vec<PendingSigned> = Vec::new();
        let mut pending_esk: Vec<Esk> = Vec::new();

        for packet in packets.into_iter() {
            let tag = packet.tag();
            debug!("{:?}: ", tag);

            match tag {
                Tag::LiteralData => {
                    let msg = Message::Literal(packet.try_into()?);
                    if let Some(msg) = place(msg, &mut pending)? {
                        done.push(msg);
                    }
                }
                Tag::CompressedData => {
                    let msg = Message::Compressed(packet.try_into()?);
                    if let Some(msg) = place(msg, &mut pending)? {
                        done.push(msg);
                    }
                }
                //    ESK :- Public-Key Encrypted Session Key Packet |
                //           Symmetric-Key Encrypted Session Key Packet.
                Tag::PublicKeyEncryptedSessionKey => {
                    pending_esk.push(Esk::PublicKeyEncryptedSessionKey(packet.try_into()?));
                }
                Tag::SymKeyEncryptedSessionKey => {
                    pending_esk.push(Esk::SymKeyEncryptedSessionKey(packet.try_into()?));
                }
                //    Encrypted Data :- Symmetrically Encrypted Data Packet |
                //          Symmetrically Encrypted Integrity Protected Data Packet
                Tag::SymEncryptedData => {
                    let edata = Edata::SymEncryptedData(packet.try_into()?);
                    let msg = Message::Encrypted {
                        esk: std::mem::take(&mut pending_esk),
                        edata,
                    };
                    if let Some(msg) = place(msg, &mut pending)? {
                        done.push(msg);
                    }
                }
                Tag::SymEncryptedProtectedData => {
                    let edata = Edata::SymEncryptedProtectedData(packet.try_into()?);
                    let msg = Message::Encrypted {
                        esk: std::mem::take(&mut pending_esk),
                        edata,
                    };
                    if let Some(msg) = place(msg, &mut pending)? {
                        done.push(msg);
                    }
                }
                Tag::OnePassSignature => {
                    pending.push(PendingSigned {
                        message: None,
                        one_pass_signature: packet.try_into()?,
                    });
                }
                Tag::Signature => {
                    let signature: Signature = packet.try_into()?;
                    match pending.pop() {
                        Some(open) => {
                            let msg = Message::Signed {
                                message: open.message.map(Box::new),
                                one_pass_signature: Some(open.one_pass_signature),
                                signature,
                            };
                            if let Some(msg) = place(msg, &mut pending)? {
                                done.push(msg);
                            }
                        }
                        None => {
                            // a signature without a one pass frame wraps
                            // the preceding message
                            let message = done.pop().map(Box::new);
                            done.push(Message::Signed {
                                message,
                                one_pass_signature: None,
                                signature,
                            });
                        }
                    }
                }
                Tag::Marker => {
                    // Marker packets are ignored
                }
                _ => crate::bail!("unexpected packet {:?}", tag),
            }
        }

        crate::ensure!(pending.is_empty(), "one pass signature without signature");
        crate::ensure!(
            pending_esk.is_empty(),
            "encrypted session keys without encrypted data"
        );

        Ok(done)
    }

    fn matches_block_type(typ: &BlockType) -> bool {
        matches!(
            typ,
            BlockType::Message | BlockType::MultiPartMessage(_, _) | BlockType::File
        )
    }
}
