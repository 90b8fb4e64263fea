use hkdf::Hkdf;
use rand::{CryptoRng, Rng};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::ecdh::{aes_kw_unwrap, aes_kw_wrap};
use crate::errors::{Error, Result};
use crate::types::{PlainSecretParams, PublicParams};

const HKDF_INFO: &[u8] = b"OpenPGP X25519";

/// Generate an X25519 key pair (RFC 9580 native encoding).
pub fn generate_key<R: Rng + CryptoRng>(rng: &mut R) -> (PublicParams, PlainSecretParams) {
    let secret = x25519_dalek::StaticSecret::random_from_rng(rng);
    let public = x25519_dalek::PublicKey::from(&secret);

    (
        PublicParams::X25519 {
            public: *public.as_bytes(),
        },
        PlainSecretParams::X25519(secret.to_bytes()),
    )
}

/// KEK = HKDF-SHA256(eph ‖ recipient ‖ shared, info = "OpenPGP X25519").
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-5.1.6
fn derive_kek(
    ephemeral: &[u8; 32],
    recipient: &[u8; 32],
    shared: &[u8],
) -> Result<Zeroizing<[u8; 16]>> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(96));
    ikm.extend_from_slice(ephemeral);
    ikm.extend_from_slice(recipient);
    ikm.extend_from_slice(shared);

    let hk = Hkdf::<Sha256>::new(None, &ikm);
    let mut kek = Zeroizing::new([0u8; 16]);
    hk.expand(HKDF_INFO, &mut kek[..])
        .map_err(|e| Error::CryptoError(e.to_string()))?;

    Ok(kek)
}

/// Wrap a session key to an X25519 recipient. Returns the ephemeral public
/// key and the wrapped session key.
pub fn encrypt<R: Rng + CryptoRng>(
    rng: &mut R,
    recipient: &[u8; 32],
    session_key: &[u8],
) -> Result<([u8; 32], Vec<u8>)> {
    let eph = x25519_dalek::StaticSecret::random_from_rng(rng);
    let eph_public = x25519_dalek::PublicKey::from(&eph);
    let shared = eph.diffie_hellman(&x25519_dalek::PublicKey::from(*recipient));

    let kek = derive_kek(eph_public.as_bytes(), recipient, shared.as_bytes())?;
    let wrapped = aes_kw_wrap(&kek[..], session_key)?;

    Ok((*eph_public.as_bytes(), wrapped))
}

/// Unwrap a session key.
pub fn decrypt(secret: &[u8; 32], ephemeral: &[u8; 32], wrapped: &[u8]) -> Result<Vec<u8>> {
    let secret = x25519_dalek::StaticSecret::from(*secret);
    let public = x25519_dalek::PublicKey::from(&secret);
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(*ephemeral));

    let kek = derive_kek(ephemeral, public.as_bytes(), shared.as_bytes())?;
    aes_kw_unwrap(&kek[..], wrapped)
}

/// The stored secret must rederive the stored public key.
pub fn is_valid(secret: &[u8; 32], public: &[u8]) -> Result<()> {
    let secret = x25519_dalek::StaticSecret::from(*secret);
    let derived = x25519_dalek::PublicKey::from(&secret);
    crate::ensure_eq!(
        derived.as_bytes(),
        public,
        "public key does not match secret scalar"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_wrap_unwrap() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let (public, secret) = generate_key(&mut rng);

        let (PublicParams::X25519 { public }, PlainSecretParams::X25519(d)) = (&public, &secret)
        else {
            panic!("wrong params");
        };

        is_valid(d, public).unwrap();

        let session_key = [0x5au8; 32];
        let (eph, wrapped) = encrypt(&mut rng, public, &session_key).unwrap();
        let recovered = decrypt(d, &eph, &wrapped).unwrap();
        assert_eq!(recovered, session_key);

        // a different secret must not unwrap
        let (_, other) = generate_key(&mut rng);
        let PlainSecretParams::X25519(other_d) = other else {
            panic!("wrong params");
        };
        assert!(decrypt(&other_d, &eph, &wrapped).is_err());
    }
}
