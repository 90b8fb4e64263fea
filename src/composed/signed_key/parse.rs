use log::{debug, warn};

use crate::armor::BlockType;
use crate::composed::shared::Deserializable;
use crate::composed::signed_key::{
    PublicOrSecret, SignedKeyDetails, SignedPublicKey, SignedPublicSubKey, SignedSecretKey,
    SignedSecretSubKey,
};
use crate::errors::Result;
use crate::packet::{self, Packet, Signature, SignatureType, UserAttribute, UserId};
use crate::types::{KeyTrait, SignedUser, SignedUserAttribute, Tag};

/// This macro generates the parsers matching the two different types of
/// transferable keys, public and secret.
macro_rules! key_parser {
    ( $key_type:ty, $subkey_container:ty, $key_tag:expr, $subkey_tag:expr, $inner_key_type:ty, $inner_subkey_type:ty ) => {
        impl Deserializable for $key_type {
            /// Parse transferable keys from the given packets.
            /// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-10.1
            fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Vec<Self>> {
                // split the stream at each primary key packet
                let mut groups: Vec<Vec<Packet>> = Vec::new();

                for packet in packets {
                    if packet.tag() == $key_tag || groups.is_empty() {
                        groups.push(Vec::new());
                    }
                    groups.last_mut().expect("just pushed").push(packet);
                }

                groups
                    .into_iter()
                    .map(Self::from_packets_single)
                    .collect()
            }

            fn matches_block_type(typ: &BlockType) -> bool {
                matches!(
                    typ,
                    BlockType::PublicKey | BlockType::PrivateKey | BlockType::File
                )
            }
        }

        impl $key_type {
            /// Parse a single transferable key from packets.
            fn from_packets_single(packets: Vec<Packet>) -> Result<Self> {
                debug!("parsing key");
                let mut packets = packets.into_iter().peekable();

                // -- One Public-Key (or Secret-Key) packet
                let primary_key: $inner_key_type = packets
                    .next()
                    .ok_or_else(|| crate::format_err!("missing primary key"))?
                    .try_into()?;
                let primary_id = primary_key.key_id();

                // -- Zero or more revocation signatures
                // -- followed by zero or more direct signatures
                let mut revocation_signatures = Vec::new();
                let mut direct_signatures = Vec::new();

                while let Some(true) = packets.peek().map(|p| p.tag() == Tag::Signature) {
                    let packet = packets.next().expect("peeked");
                    let sig: Signature = packet.try_into()?;

                    if sig.typ() == SignatureType::KeyRevocation {
                        revocation_signatures.push(sig);
                    } else {
                        direct_signatures.push(sig);
                    }
                }

                // -- Zero or more User ID packets
                // -- Zero or more User Attribute packets
                let mut users = Vec::new();
                let mut user_attributes = Vec::new();

                while let Some(true) = packets
                    .peek()
                    .map(|p| p.tag() == Tag::UserId || p.tag() == Tag::UserAttribute)
                {
                    let packet = packets.next().expect("peeked");
                    match packet.tag() {
                        Tag::UserId => {
                            let id: UserId = packet.try_into()?;

                            // --- zero or more signature packets
                            let mut sigs = Vec::new();
                            while let Some(true) =
                                packets.peek().map(|p| p.tag() == Tag::Signature)
                            {
                                let packet = packets.next().expect("peeked");
                                sigs.push(packet.try_into()?);
                            }

                            users.push(SignedUser::new(id, sigs, &primary_id));
                        }
                        Tag::UserAttribute => {
                            let attr: UserAttribute = packet.try_into()?;

                            let mut sigs = Vec::new();
                            while let Some(true) =
                                packets.peek().map(|p| p.tag() == Tag::Signature)
                            {
                                let packet = packets.next().expect("peeked");
                                sigs.push(packet.try_into()?);
                            }

                            user_attributes.push(SignedUserAttribute::new(attr, sigs));
                        }
                        _ => unreachable!("peeked"),
                    }
                }

                if users.is_empty() {
                    warn!("key without user ids");
                }

                // -- Zero or more Subkey packets
                let mut subkeys: Vec<$subkey_container> = Vec::new();

                while let Some(true) = packets.peek().map(|p| p.tag() == $subkey_tag) {
                    let packet = packets.next().expect("peeked");
                    let subkey: $inner_subkey_type = packet.try_into()?;

                    let mut sigs = Vec::new();
                    while let Some(true) = packets.peek().map(|p| p.tag() == Tag::Signature) {
                        let packet = packets.next().expect("peeked");
                        sigs.push(packet.try_into()?);
                    }

                    if sigs.is_empty() {
                        warn!("missing binding signature on subkey");
                    }

                    subkeys.push(<$subkey_container>::new(subkey, sigs));
                }

                crate::ensure!(packets.next().is_none(), "failed to process all packets");

                Ok(Self::assemble(
                    primary_key,
                    SignedKeyDetails::new(
                        revocation_signatures,
                        direct_signatures,
                        users,
                        user_attributes,
                    ),
                    subkeys,
                ))
            }
        }
    };
}

key_parser!(
    SignedSecretKey,
    SignedSecretSubKey,
    Tag::SecretKey,
    Tag::SecretSubkey,
    packet::SecretKey,
    packet::SecretSubkey
);

key_parser!(
    SignedPublicKey,
    SignedPublicSubKey,
    Tag::PublicKey,
    Tag::PublicSubkey,
    packet::PublicKey,
    packet::PublicSubkey
);

impl SignedSecretKey {
    fn assemble(
        primary_key: packet::SecretKey,
        details: SignedKeyDetails,
        subkeys: Vec<SignedSecretSubKey>,
    ) -> Self {
        SignedSecretKey::new(primary_key, details, Vec::new(), subkeys)
    }
}

impl SignedPublicKey {
    fn assemble(
        primary_key: packet::PublicKey,
        details: SignedKeyDetails,
        subkeys: Vec<SignedPublicSubKey>,
    ) -> Self {
        SignedPublicKey::new(primary_key, details, subkeys)
    }
}

impl Deserializable for PublicOrSecret {
    /// Parse a mixed keyring: any sequence of public and secret
    /// transferable keys.
    fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Vec<Self>> {
        let mut groups: Vec<(Tag, Vec<Packet>)> = Vec::new();

        for packet in packets {
            let tag = packet.tag();
            if tag == Tag::PublicKey || tag == Tag::SecretKey || groups.is_empty() {
                groups.push((tag, Vec::new()));
            }
            groups.last_mut().expect("just pushed").1.push(packet);
        }

        groups
            .into_iter()
            .map(|(tag, packets)| match tag {
                Tag::SecretKey => SignedSecretKey::from_packets_single(packets)
                    .map(PublicOrSecret::Secret),
                _ => SignedPublicKey::from_packets_single(packets).map(PublicOrSecret::Public),
            })
            .collect()
    }

    fn matches_block_type(typ: &BlockType) -> bool {
        matches!(
            typ,
            BlockType::PublicKey | BlockType::PrivateKey | BlockType::File
        )
    }
}
