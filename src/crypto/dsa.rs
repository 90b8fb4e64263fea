use dsa::{Components, SigningKey, VerifyingKey};
use num_bigint::BigUint;
use signature::hazmat::{PrehashSigner, PrehashVerifier};

use crate::errors::{Error, Result};
use crate::types::{Mpi, SignatureBytes};

fn verifying_key(p: &Mpi, q: &Mpi, g: &Mpi, y: &Mpi) -> Result<VerifyingKey> {
    let components = Components::from_components(p.into(), q.into(), g.into())
        .map_err(|e| Error::CryptoError(e.to_string()))?;
    VerifyingKey::from_components(components, y.into())
        .map_err(|e| Error::CryptoError(e.to_string()))
}

/// Verify a DSA signature `(r, s)` over a prehashed message.
pub fn verify(
    p: &Mpi,
    q: &Mpi,
    g: &Mpi,
    y: &Mpi,
    hashed: &[u8],
    r: &Mpi,
    s: &Mpi,
) -> Result<()> {
    let key = verifying_key(p, q, g, y)?;
    let sig = dsa::Signature::from_components(r.into(), s.into())
        .map_err(|e| Error::SignatureError(e.to_string()))?;

    key.verify_prehash(hashed, &sig)
        .map_err(|e| Error::SignatureError(e.to_string()))
}

/// Produce a DSA signature over a prehashed message.
pub fn sign(
    p: &Mpi,
    q: &Mpi,
    g: &Mpi,
    y: &Mpi,
    x: &Mpi,
    hashed: &[u8],
) -> Result<SignatureBytes> {
    let key = verifying_key(p, q, g, y)?;
    let signing = SigningKey::from_components(key, x.into())
        .map_err(|e| Error::CryptoError(e.to_string()))?;

    let sig: dsa::Signature = signing
        .sign_prehash(hashed)
        .map_err(|e| Error::CryptoError(e.to_string()))?;

    Ok(SignatureBytes::Mpis(vec![
        Mpi::from(sig.r().clone()),
        Mpi::from(sig.s().clone()),
    ]))
}

/// `y = g^x mod p` must hold for the stored secret.
pub fn is_valid(p: &Mpi, g: &Mpi, y: &Mpi, x: &Mpi) -> bool {
    let p = BigUint::from(p);
    let g = BigUint::from(g);
    let y = BigUint::from(y);
    let x = BigUint::from(x);

    g.modpow(&x, &p) == y
}
