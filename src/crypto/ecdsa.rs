use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::crypto::ecc_curve::ECCCurve;
use crate::errors::{Error, Result};
use crate::types::{Mpi, SignatureBytes};

/// Verify an ECDSA signature over a prehashed message.
pub fn verify(
    curve: &ECCCurve,
    p: &Mpi,
    hashed: &[u8],
    r: &Mpi,
    s: &Mpi,
) -> Result<()> {
    match curve {
        ECCCurve::P256 => {
            let key = VerifyingKey::from_sec1_bytes(p.as_bytes())
                .map_err(|e| Error::CryptoError(e.to_string()))?;

            let mut raw = [0u8; 64];
            raw[..32].copy_from_slice(&r.to_padded(32)?);
            raw[32..].copy_from_slice(&s.to_padded(32)?);
            let sig = Signature::from_slice(&raw)
                .map_err(|e| Error::SignatureError(e.to_string()))?;

            key.verify_prehash(hashed, &sig)
                .map_err(|e| Error::SignatureError(e.to_string()))
        }
        _ => Err(Error::Unsupported(format!("ECDSA over {:?}", curve))),
    }
}

/// Produce an ECDSA signature over a prehashed message.
pub fn sign(curve: &ECCCurve, d: &Mpi, hashed: &[u8]) -> Result<SignatureBytes> {
    match curve {
        ECCCurve::P256 => {
            let raw = d.to_padded(32)?;
            let key = SigningKey::from_slice(&raw)
                .map_err(|e| Error::CryptoError(e.to_string()))?;

            let sig: Signature = key
                .sign_prehash(hashed)
                .map_err(|e| Error::CryptoError(e.to_string()))?;
            let bytes = sig.to_bytes();

            Ok(SignatureBytes::Mpis(vec![
                Mpi::from_slice(&bytes[..32]),
                Mpi::from_slice(&bytes[32..]),
            ]))
        }
        _ => Err(Error::Unsupported(format!("ECDSA over {:?}", curve))),
    }
}

/// The stored secret scalar must rederive the stored public point.
pub fn is_valid(curve: &ECCCurve, p: &Mpi, d: &Mpi) -> Result<()> {
    match curve {
        ECCCurve::P256 => {
            let key = SigningKey::from_slice(&d.to_padded(32)?)
                .map_err(|e| Error::CryptoError(e.to_string()))?;
            let derived = key.verifying_key().to_encoded_point(false);
            crate::ensure_eq!(
                derived.as_bytes(),
                p.as_bytes(),
                "public point does not match secret scalar"
            );
            Ok(())
        }
        // No provider for the remaining curves; nothing to check.
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;

    #[test]
    fn test_p256_sign_verify() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let signing = SigningKey::random(&mut rng);
        let point = signing.verifying_key().to_encoded_point(false);

        let p = Mpi::from_slice(point.as_bytes());
        let d = Mpi::from_slice(&signing.to_bytes());

        is_valid(&ECCCurve::P256, &p, &d).unwrap();

        let digest = HashAlgorithm::SHA256.digest(b"data").unwrap();
        let SignatureBytes::Mpis(sig) = sign(&ECCCurve::P256, &d, &digest).unwrap() else {
            panic!("wrong encoding");
        };
        verify(&ECCCurve::P256, &p, &digest, &sig[0], &sig[1]).unwrap();

        let bad = HashAlgorithm::SHA256.digest(b"other").unwrap();
        assert!(verify(&ECCCurve::P256, &p, &bad, &sig[0], &sig[1]).is_err());
    }
}
