use std::fmt;

use crate::errors::Result;

/// The eight-octet key id of a key, derived from its fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; 8]);

impl KeyId {
    pub fn from_slice(input: &[u8]) -> Result<KeyId> {
        crate::ensure_eq!(input.len(), 8, "invalid key id length");
        let mut r = [0u8; 8];
        r.copy_from_slice(input);

        Ok(KeyId(r))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The wildcard id (all zeros), used by anonymous recipients.
    pub fn wildcard() -> KeyId {
        KeyId([0u8; 8])
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == [0u8; 8]
    }
}

impl From<[u8; 8]> for KeyId {
    fn from(v: [u8; 8]) -> Self {
        KeyId(v)
    }
}

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(self.0))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}
