use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::types::Mpi;

/// The algorithm specific values of an encrypted session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkeskBytes {
    Rsa {
        mpi: Mpi,
    },
    Elgamal {
        first: Mpi,
        second: Mpi,
    },
    Ecdh {
        public_point: Mpi,
        encrypted_session_key: Vec<u8>,
    },
    X25519 {
        ephemeral: [u8; 32],
        session_key: Vec<u8>,
        /// v3 PKESKs carry the symmetric algorithm outside the wrap.
        sym_alg: Option<SymmetricKeyAlgorithm>,
    },
    /// Unknown algorithms are carried opaquely.
    Other {
        data: Vec<u8>,
    },
}

/// Which PKESK generation the session key is being packed for; v6 drops the
/// leading symmetric algorithm octet and the checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EskType {
    V3_4,
    V6,
}

/// An algorithm specific signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureBytes {
    /// MPI encoded (RSA, DSA, ECDSA, legacy EdDSA).
    Mpis(Vec<Mpi>),
    /// Native fixed width encoding (Ed25519, Ed448).
    Native(Vec<u8>),
}
