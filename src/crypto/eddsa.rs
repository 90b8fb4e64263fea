use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, Rng};

use crate::crypto::ecc_curve::ECCCurve;
use crate::errors::{Error, Result};
use crate::types::{Mpi, PlainSecretParams, PublicParams, SignatureBytes};

fn verifying_key(q: &[u8]) -> Result<VerifyingKey> {
    let raw: [u8; 32] = q
        .try_into()
        .map_err(|_| crate::format_err!("invalid ed25519 public key length"))?;
    VerifyingKey::from_bytes(&raw).map_err(|e| Error::CryptoError(e.to_string()))
}

/// Verify an EdDSA signature in the legacy MPI encoding (`r ‖ s`, possibly
/// encoded short).
pub fn verify_legacy(
    curve: &ECCCurve,
    q: &Mpi,
    hashed: &[u8],
    r: &Mpi,
    s: &Mpi,
) -> Result<()> {
    crate::ensure_eq!(curve, &ECCCurve::Ed25519, "unsupported EdDSA curve");
    crate::ensure_eq!(q.len(), 33, "invalid Q (len)");
    crate::ensure_eq!(q.as_bytes()[0], 0x40, "invalid Q (prefix)");

    crate::ensure!(r.len() <= 32, "invalid R (len)");
    crate::ensure!(s.len() <= 32, "invalid S (len)");

    let mut sig_bytes = [0u8; 64];
    // add padding if the values were encoded short
    sig_bytes[..32].copy_from_slice(&r.to_padded(32)?);
    sig_bytes[32..].copy_from_slice(&s.to_padded(32)?);

    verify(&q.as_bytes()[1..], hashed, &sig_bytes)
}

/// Verify an Ed25519 signature in the native encoding.
pub fn verify(q: &[u8], hashed: &[u8], sig: &[u8]) -> Result<()> {
    let key = verifying_key(q)?;
    let raw: [u8; 64] = sig
        .try_into()
        .map_err(|_| crate::format_err!("invalid ed25519 signature length"))?;
    let sig = ed25519_dalek::Signature::from_bytes(&raw);

    key.verify(hashed, &sig)
        .map_err(|e| Error::SignatureError(e.to_string()))
}

/// Sign, returning the legacy MPI encoding.
pub fn sign_legacy(secret: &SigningKey, digest: &[u8]) -> Result<SignatureBytes> {
    let bytes = secret.sign(digest).to_bytes();

    Ok(SignatureBytes::Mpis(vec![
        Mpi::from_slice(&bytes[..32]),
        Mpi::from_slice(&bytes[32..]),
    ]))
}

/// Sign, returning the native 64-octet encoding.
pub fn sign(secret: &SigningKey, digest: &[u8]) -> Result<SignatureBytes> {
    Ok(SignatureBytes::Native(
        secret.sign(digest).to_bytes().to_vec(),
    ))
}

/// Generate a key pair in the legacy (v4, MPI encoded) form.
pub fn generate_key_legacy<R: Rng + CryptoRng>(rng: &mut R) -> (PublicParams, PlainSecretParams) {
    let signing = SigningKey::generate(rng);
    let public = signing.verifying_key();

    let mut q = Vec::with_capacity(33);
    q.push(0x40);
    q.extend_from_slice(public.as_bytes());

    (
        PublicParams::EdDSALegacy {
            curve: ECCCurve::Ed25519,
            q: Mpi::from_raw(q),
        },
        PlainSecretParams::EdDSALegacy(Mpi::from_raw(signing.to_bytes().to_vec())),
    )
}

/// Generate a key pair in the RFC 9580 native form.
pub fn generate_key<R: Rng + CryptoRng>(rng: &mut R) -> (PublicParams, PlainSecretParams) {
    let signing = SigningKey::generate(rng);
    let public = signing.verifying_key();

    (
        PublicParams::Ed25519 {
            public: public.to_bytes(),
        },
        PlainSecretParams::Ed25519(signing.to_bytes()),
    )
}

/// The stored secret must rederive the stored public point.
pub fn is_valid(secret: &[u8; 32], public: &[u8]) -> Result<()> {
    let signing = SigningKey::from_bytes(secret);
    crate::ensure_eq!(
        signing.verifying_key().as_bytes(),
        public,
        "public point does not match secret scalar"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_legacy_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (public, secret) = generate_key_legacy(&mut rng);

        let (PublicParams::EdDSALegacy { curve, q }, PlainSecretParams::EdDSALegacy(d)) =
            (&public, &secret)
        else {
            panic!("wrong params");
        };

        let signing = SigningKey::from_bytes(&d.to_padded(32).unwrap().try_into().unwrap());
        let digest = [7u8; 32];
        let SignatureBytes::Mpis(sig) = sign_legacy(&signing, &digest).unwrap() else {
            panic!("wrong encoding");
        };

        verify_legacy(curve, q, &digest, &sig[0], &sig[1]).unwrap();
        assert!(verify_legacy(curve, q, &[8u8; 32], &sig[0], &sig[1]).is_err());
    }

    #[test]
    fn test_native_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (public, secret) = generate_key(&mut rng);

        let (PublicParams::Ed25519 { public: q }, PlainSecretParams::Ed25519(d)) =
            (&public, &secret)
        else {
            panic!("wrong params");
        };

        is_valid(d, q).unwrap();

        let signing = SigningKey::from_bytes(d);
        let digest = [9u8; 64];
        let SignatureBytes::Native(sig) = sign(&signing, &digest).unwrap() else {
            panic!("wrong encoding");
        };
        verify(q, &digest, &sig).unwrap();
    }
}
