//! Error types and the macros used to raise them.

use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Message(String),
    #[error("incomplete input")]
    PacketIncomplete,
    #[error("invalid packet content: {0:?}")]
    InvalidPacketContent(Box<Error>),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unimplemented: {0}")]
    Unimplemented(String),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("incorrect passphrase")]
    PassphraseIncorrect,
    #[error("no matching ESK, unable to recover session key")]
    SessionKeyDecryptionFailed,
    #[error("signature error: {0}")]
    SignatureError(String),
    #[error("key verification failed: {0}")]
    KeyInvalid(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("crypto provider error: {0}")]
    CryptoError(String),
    #[error("missing key")]
    MissingKey,
    #[error("missing packets")]
    MissingPackets,
    #[error("too many packets")]
    TooManyPackets,
    #[error("invalid armor checksum")]
    InvalidChecksum,
    #[error("armor parsing failed: {0}")]
    InvalidArmor(String),
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("utf8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl Error {
    /// True if the error indicates a wrong passphrase or failed integrity
    /// tag, as opposed to malformed data.
    pub fn is_wrong_passphrase(&self) -> bool {
        matches!(self, Error::PassphraseIncorrect)
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::InvalidArgument(format!("missing field {}", err.field_name()))
    }
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Error {
        Error::CryptoError(err.to_string())
    }
}

impl From<signature::Error> for Error {
    fn from(err: signature::Error) -> Error {
        Error::SignatureError(err.to_string())
    }
}

impl<T> From<nom::Err<nom::error::Error<T>>> for Error {
    fn from(err: nom::Err<nom::error::Error<T>>) -> Error {
        match err {
            nom::Err::Incomplete(_) => Error::PacketIncomplete,
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Error::InvalidArmor(format!("{:?}", e.code))
            }
        }
    }
}

#[macro_export]
macro_rules! format_err {
    ($($arg:tt)*) => {
        $crate::errors::Error::Message(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::format_err!($($arg)*))
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::bail!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::bail!(
                        "expected `{:?}` == `{:?}`",
                        left_val,
                        right_val
                    );
                }
            }
        }
    }};
    ($left:expr, $right:expr, $($arg:tt)*) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::bail!(
                        "{}: expected `{:?}` == `{:?}`",
                        format!($($arg)*),
                        left_val,
                        right_val
                    );
                }
            }
        }
    }};
}

#[macro_export]
macro_rules! unsupported_err {
    ($($arg:tt)*) => {
        return Err($crate::errors::Error::Unsupported(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! unimplemented_err {
    ($($arg:tt)*) => {
        return Err($crate::errors::Error::Unimplemented(format!($($arg)*)))
    };
}
