use num_bigint::traits::ModInverse;
use num_bigint::BigUint;
use rand::{CryptoRng, Rng};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{Error, Result};
use crate::types::{Mpi, PkeskBytes, PlainSecretParams, PublicParams, SignatureBytes};

fn pkcs1v15_sign_padding(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    let padding = match hash {
        HashAlgorithm::MD5 => Pkcs1v15Sign::new::<md5::Md5>(),
        HashAlgorithm::SHA1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::RIPEMD160 => Pkcs1v15Sign::new::<ripemd::Ripemd160>(),
        HashAlgorithm::SHA256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::SHA384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::SHA512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        HashAlgorithm::SHA224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        HashAlgorithm::SHA3_256 => Pkcs1v15Sign::new::<sha3::Sha3_256>(),
        HashAlgorithm::SHA3_512 => Pkcs1v15Sign::new::<sha3::Sha3_512>(),
    };

    Ok(padding)
}

/// Verify a RSA, PKCS1v15 padded signature.
pub fn verify(n: &Mpi, e: &Mpi, hash: HashAlgorithm, hashed: &[u8], sig: &[u8]) -> Result<()> {
    let key = RsaPublicKey::new(n.into(), e.into())?;

    key.verify(pkcs1v15_sign_padding(hash)?, hashed, sig)
        .map_err(|err| Error::SignatureError(err.to_string()))
}

/// Sign using RSA, with PKCS1v15 padding.
pub fn sign(key: &RsaPrivateKey, hash: HashAlgorithm, digest: &[u8]) -> Result<SignatureBytes> {
    let sig = key.sign(pkcs1v15_sign_padding(hash)?, digest)?;

    Ok(SignatureBytes::Mpis(vec![Mpi::from_raw(sig)]))
}

/// Encrypt the session key payload to the given public key.
pub fn encrypt<R: CryptoRng + Rng>(rng: &mut R, n: &Mpi, e: &Mpi, plain: &[u8]) -> Result<PkeskBytes> {
    let key = RsaPublicKey::new(n.into(), e.into())?;
    let data = key.encrypt(rng, Pkcs1v15Encrypt, plain)?;

    Ok(PkeskBytes::Rsa {
        mpi: Mpi::from_raw(data),
    })
}

/// Recover the session key payload.
pub fn decrypt(key: &RsaPrivateKey, mpi: &Mpi) -> Result<Vec<u8>> {
    // The ciphertext is exactly as long as the modulus.
    let ciphertext = mpi.to_padded(key.size())?;
    let data = key.decrypt(Pkcs1v15Encrypt, &ciphertext)?;

    Ok(data)
}

/// Generate an RSA key pair of the given bit size.
pub fn generate_key<R: Rng + CryptoRng>(
    rng: &mut R,
    bit_size: usize,
) -> Result<(PublicParams, PlainSecretParams)> {
    let key = RsaPrivateKey::new(rng, bit_size)?;

    let p = &key.primes()[0];
    let q = &key.primes()[1];
    let u = p
        .clone()
        .mod_inverse(q)
        .and_then(|u| u.to_biguint())
        .ok_or_else(|| Error::CryptoError("failed to compute CRT coefficient".into()))?;

    Ok((
        PublicParams::RSA {
            n: key.n().into(),
            e: key.e().into(),
        },
        PlainSecretParams::RSA {
            d: key.d().into(),
            p: p.into(),
            q: q.into(),
            u: u.into(),
        },
    ))
}

/// Rebuild a private key from the stored parameters.
pub fn private_key_from_mpis(n: &Mpi, e: &Mpi, d: &Mpi, p: &Mpi, q: &Mpi) -> Result<RsaPrivateKey> {
    let key = RsaPrivateKey::from_components(
        n.into(),
        e.into(),
        d.into(),
        vec![BigUint::from(p), BigUint::from(q)],
    )?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_sign_verify_encrypt_decrypt() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (public, secret) = generate_key(&mut rng, 1024).unwrap();

        let (PublicParams::RSA { n, e }, PlainSecretParams::RSA { d, p, q, .. }) =
            (&public, &secret)
        else {
            panic!("wrong params");
        };

        let key = private_key_from_mpis(n, e, d, p, q).unwrap();

        let digest = HashAlgorithm::SHA256.digest(b"hello").unwrap();
        let sig = sign(&key, HashAlgorithm::SHA256, &digest).unwrap();
        let SignatureBytes::Mpis(ref mpis) = sig else {
            panic!("wrong signature encoding");
        };
        verify(n, e, HashAlgorithm::SHA256, &digest, mpis[0].as_bytes()).unwrap();

        let wrapped = encrypt(&mut rng, n, e, b"session-key").unwrap();
        let PkeskBytes::Rsa { ref mpi } = wrapped else {
            panic!("wrong esk encoding");
        };
        assert_eq!(decrypt(&key, mpi).unwrap(), b"session-key");
    }
}
