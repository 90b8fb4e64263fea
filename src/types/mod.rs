mod compression;
mod esk;
mod key_id;
mod mpi;
mod packet_types;
mod public_params;
mod s2k;
mod secret_key_repr;
mod secret_params;
mod user;

pub use self::compression::*;
pub use self::esk::*;
pub use self::key_id::*;
pub use self::mpi::*;
pub use self::packet_types::*;
pub use self::public_params::*;
pub use self::s2k::*;
pub use self::secret_key_repr::*;
pub use self::secret_params::*;
pub use self::user::*;

use chrono::{DateTime, Utc};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::DynCryptoRng;
use crate::errors::Result;

/// Shared details of public and secret key packets.
pub trait KeyTrait {
    fn version(&self) -> KeyVersion;
    fn fingerprint(&self) -> Vec<u8>;
    fn key_id(&self) -> KeyId;
    fn algorithm(&self) -> PublicKeyAlgorithm;
    fn created_at(&self) -> &DateTime<Utc>;

    fn is_signing_key(&self) -> bool {
        self.algorithm().can_sign()
    }

    fn is_encryption_key(&self) -> bool {
        self.algorithm().can_encrypt()
    }
}

impl<T: KeyTrait> KeyTrait for &T {
    fn version(&self) -> KeyVersion {
        (*self).version()
    }

    fn fingerprint(&self) -> Vec<u8> {
        (*self).fingerprint()
    }

    fn key_id(&self) -> KeyId {
        (*self).key_id()
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        (*self).algorithm()
    }

    fn created_at(&self) -> &DateTime<Utc> {
        (*self).created_at()
    }
}

/// The public half: verification and session key encryption.
pub trait PublicKeyTrait: KeyTrait {
    fn public_params(&self) -> &PublicParams;

    /// Verify a signature over `hashed`, the digest of the signed data.
    fn verify_signature(
        &self,
        hash: HashAlgorithm,
        hashed: &[u8],
        sig: &SignatureBytes,
    ) -> Result<()>;

    /// Encrypt the session key payload to this key.
    fn encrypt_session_key(
        &self,
        rng: &mut DynCryptoRng<'_>,
        plain: &[u8],
        typ: EskType,
    ) -> Result<PkeskBytes>;

    /// The serialized public key, framed the way signatures hash keys
    /// (`0x99`/`0x9b`, length, packet body).
    fn to_signable_bytes(&self) -> Result<Vec<u8>>;
}

impl<T: PublicKeyTrait> PublicKeyTrait for &T {
    fn public_params(&self) -> &PublicParams {
        (*self).public_params()
    }

    fn verify_signature(
        &self,
        hash: HashAlgorithm,
        hashed: &[u8],
        sig: &SignatureBytes,
    ) -> Result<()> {
        (*self).verify_signature(hash, hashed, sig)
    }

    fn encrypt_session_key(
        &self,
        rng: &mut DynCryptoRng<'_>,
        plain: &[u8],
        typ: EskType,
    ) -> Result<PkeskBytes> {
        (*self).encrypt_session_key(rng, plain, typ)
    }

    fn to_signable_bytes(&self) -> Result<Vec<u8>> {
        (*self).to_signable_bytes()
    }
}

/// The secret half: unlocking and signature creation.
pub trait SecretKeyTrait: PublicKeyTrait {
    /// Decrypts the secret material and hands it to `work`. The decrypted
    /// representation only lives for the duration of the closure.
    fn unlock<G>(&self, pw: &str, work: G) -> Result<()>
    where
        G: FnOnce(&SecretKeyRepr) -> Result<()>,
        Self: Sized;

    /// Sign the given digest.
    fn create_signature(
        &self,
        key_pw: &str,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<SignatureBytes>;
}
