pub mod cleartext;
pub mod key;
pub mod message;
pub mod shared;
pub mod signed_key;
mod standalone_signature;

pub use self::cleartext::CleartextSignedMessage;
pub use self::key::*;
pub use self::message::*;
pub use self::shared::Deserializable;
pub use self::signed_key::*;
pub use self::standalone_signature::StandaloneSignature;
