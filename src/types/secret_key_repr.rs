use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::ecc_curve::ECCCurve;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::types::Mpi;

/// The decrypted form of a secret key, as exposed to crypto operations.
/// Only ever lives inside an `unlock` closure.
#[derive(Debug)]
pub enum SecretKeyRepr {
    RSA(rsa::RsaPrivateKey),
    DSA(DsaSecretKey),
    ECDSA(EcdsaSecretKey),
    ECDH(EcdhSecretKey),
    EdDSA(ed25519_dalek::SigningKey),
    X25519(X25519SecretKey),
}

#[derive(Debug, Clone)]
pub struct DsaSecretKey {
    pub p: Mpi,
    pub q: Mpi,
    pub g: Mpi,
    pub y: Mpi,
    pub x: Mpi,
}

#[derive(Debug, Clone)]
pub struct EcdsaSecretKey {
    pub curve: ECCCurve,
    pub d: Mpi,
}

#[derive(Debug, Clone)]
pub struct EcdhSecretKey {
    pub curve: ECCCurve,
    pub d: Mpi,
    pub hash: HashAlgorithm,
    pub alg_sym: SymmetricKeyAlgorithm,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct X25519SecretKey {
    pub secret: [u8; 32],
}

impl std::fmt::Debug for X25519SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X25519SecretKey").finish_non_exhaustive()
    }
}
