//! # OpenPGP implementation in Rust
//!
//! Packet level and composed APIs for the OpenPGP message format
//! (RFC 4880 and RFC 9580): parsing and emitting packet streams and ASCII
//! armor, generating and protecting keys, signing, verifying, encrypting
//! and decrypting messages.
//!
//! ## Example: generate a key and roundtrip a message
//!
//! ```no_run
//! use opgp::composed::{
//!     Deserializable, KeyType, Message, SecretKeyParamsBuilder, Seipd, SignedPublicKey,
//!     SubkeyParamsBuilder,
//! };
//! use opgp::crypto::sym::SymmetricKeyAlgorithm;
//!
//! # fn main() -> opgp::errors::Result<()> {
//! let mut rng = rand::thread_rng();
//!
//! let key = SecretKeyParamsBuilder::default()
//!     .key_type(KeyType::Ed25519Legacy)
//!     .primary_user_id("Alice <alice@example.org>".into())
//!     .subkey(
//!         SubkeyParamsBuilder::default()
//!             .key_type(KeyType::ECDH)
//!             .build()?,
//!     )
//!     .build()?
//!     .generate(&mut rng)?;
//!
//! let public = SignedPublicKey::from(key.clone());
//! let msg = Message::new_literal("", "hello world")
//!     .encrypt(
//!         &mut rng,
//!         &public.encryption_keys(chrono::Utc::now()),
//!         &[],
//!         SymmetricKeyAlgorithm::AES128,
//!         Seipd::V1,
//!     )?;
//!
//! let decrypted = msg.decrypt(&[], &[(&key, "")])?;
//! assert_eq!(decrypted.get_content().unwrap(), b"hello world");
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::module_inception)]

#[macro_use]
pub mod errors;

pub mod armor;
pub mod composed;
pub mod crypto;
pub mod normalize_lines;
pub mod packet;
pub mod ser;
pub mod types;
pub mod util;

pub use crate::composed::{
    CleartextSignedMessage, Deserializable, KeyType, Message, PublicOrSecret,
    SecretKeyParamsBuilder, SignedPublicKey, SignedSecretKey, StandaloneSignature,
    SubkeyParamsBuilder,
};
pub use crate::errors::{Error, Result};
pub use crate::ser::Serialize;
