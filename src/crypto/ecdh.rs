use aes::{Aes128, Aes192, Aes256};
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use generic_array::GenericArray;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::ecc_curve::ECCCurve;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::types::{Mpi, PkeskBytes, PlainSecretParams, PublicParams};

// 20 octets representing "Anonymous Sender    ".
const ANON_SENDER: &[u8; 20] = b"Anonymous Sender    ";

/// Build the KDF parameter block for ECDH (as defined in RFC 6637 section 8).
pub fn build_ecdh_param(
    oid: &[u8],
    alg_sym: SymmetricKeyAlgorithm,
    hash: HashAlgorithm,
    fingerprint: &[u8],
) -> Vec<u8> {
    let kdf_params = [
        0x03, // length of the following fields
        0x01, // reserved for future extensions
        hash as u8,
        alg_sym as u8,
    ];

    let oid_len = [oid.len() as u8];
    let alg_byte = [u8::from(PublicKeyAlgorithm::ECDH)];

    let values: Vec<&[u8]> = vec![
        &oid_len,
        oid,
        &alg_byte,
        &kdf_params,
        &ANON_SENDER[..],
        fingerprint,
    ];

    values.concat()
}

/// The ECDH KDF: `H(0x00000001 ‖ Z ‖ param)` truncated to the KEK size.
fn kdf(hash: HashAlgorithm, shared: &[u8], length: usize, param: &[u8]) -> Result<Vec<u8>> {
    let mut hasher = hash.new_hasher()?;
    hasher.update(&[0, 0, 0, 1]);
    hasher.update(shared);
    hasher.update(param);

    let mut digest = hasher.finalize().to_vec();
    crate::ensure!(digest.len() >= length, "KDF digest too short");
    digest.truncate(length);

    Ok(digest)
}

// The fixed RFC 3394 initial value.
const KW_IV: [u8; 8] = [0xA6; 8];

fn into_blocks(data: &[u8]) -> Vec<[u8; 8]> {
    data.chunks(8)
        .map(|chunk| {
            let mut block = [0u8; 8];
            block.copy_from_slice(chunk);
            block
        })
        .collect()
}

macro_rules! impl_aes_kw {
    ($name_wrap:ident, $name_unwrap:ident, $cipher:ty) => {
        fn $name_wrap(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
            let cipher =
                <$cipher>::new_from_slice(key).map_err(|e| Error::CryptoError(e.to_string()))?;

            // number of 64 bit blocks in the input data
            let n = data.len() / 8;

            // A = IV, R[i] = P[i]
            let mut a = KW_IV;
            let mut r = into_blocks(data);

            for j in 0..=5u64 {
                for i in 0..n {
                    let t = (n as u64) * j + (i as u64) + 1;

                    // B = AES(K, A | R[i])
                    let mut b = GenericArray::default();
                    b[..8].copy_from_slice(&a);
                    b[8..].copy_from_slice(&r[i]);
                    cipher.encrypt_block(&mut b);

                    // A = MSB(64, B) ^ t
                    a.copy_from_slice(&b[..8]);
                    for (ai, ti) in a.iter_mut().zip(t.to_be_bytes().iter()) {
                        *ai ^= ti;
                    }

                    // R[i] = LSB(64, B)
                    r[i].copy_from_slice(&b[8..]);
                }
            }

            let mut out = a.to_vec();
            for block in &r {
                out.extend_from_slice(block);
            }

            Ok(out)
        }

        fn $name_unwrap(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
            let cipher =
                <$cipher>::new_from_slice(key).map_err(|e| Error::CryptoError(e.to_string()))?;

            let n = (data.len() / 8) - 1;

            // A = C[0], R[i] = C[i]
            let blocks = into_blocks(data);
            let mut a = blocks[0];
            let mut r = blocks[1..].to_vec();

            for j in (0..=5u64).rev() {
                for i in (0..n).rev() {
                    let t = (n as u64) * j + (i as u64) + 1;

                    // B = AES-1(K, (A ^ t) | R[i])
                    for (ai, ti) in a.iter_mut().zip(t.to_be_bytes().iter()) {
                        *ai ^= ti;
                    }
                    let mut b = GenericArray::default();
                    b[..8].copy_from_slice(&a);
                    b[8..].copy_from_slice(&r[i]);
                    cipher.decrypt_block(&mut b);

                    // A = MSB(64, B)
                    a.copy_from_slice(&b[..8]);

                    // R[i] = LSB(64, B)
                    r[i].copy_from_slice(&b[8..]);
                }
            }

            if a != KW_IV {
                crate::bail!("aes key unwrap failed the integrity check");
            }

            let mut out = Vec::with_capacity(r.len() * 8);
            for block in &r {
                out.extend_from_slice(block);
            }

            Ok(out)
        }
    };
}

impl_aes_kw!(aes_kw_wrap_128, aes_kw_unwrap_128, Aes128);
impl_aes_kw!(aes_kw_wrap_192, aes_kw_unwrap_192, Aes192);
impl_aes_kw!(aes_kw_wrap_256, aes_kw_unwrap_256, Aes256);

/// AES Key Wrap, as defined in RFC 3394, dispatched on the KEK size.
pub fn aes_kw_wrap(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    crate::ensure_eq!(data.len() % 8, 0, "data must be a multiple of 64bit");

    match key.len() * 8 {
        128 => aes_kw_wrap_128(key, data),
        192 => aes_kw_wrap_192(key, data),
        256 => aes_kw_wrap_256(key, data),
        size => crate::bail!("invalid aes key size: {}", size),
    }
}

/// AES Key Unwrap, as defined in RFC 3394.
pub fn aes_kw_unwrap(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    crate::ensure_eq!(data.len() % 8, 0, "data must be a multiple of 64bit");
    crate::ensure!(data.len() > 8, "data too short");

    match key.len() * 8 {
        128 => aes_kw_unwrap_128(key, data),
        192 => aes_kw_unwrap_192(key, data),
        256 => aes_kw_unwrap_256(key, data),
        size => crate::bail!("invalid aes key size: {}", size),
    }
}

/// PKCS5-style padding to the next multiple of eight octets. A full pad
/// block is added when the input is already aligned.
fn pad(plain: &[u8]) -> Vec<u8> {
    let pad_len = 8 - (plain.len() % 8);
    let mut out = plain.to_vec();
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

fn unpad(mut data: Vec<u8>) -> Result<Vec<u8>> {
    let pad_len = *data.last().ok_or_else(|| crate::format_err!("empty payload"))? as usize;
    crate::ensure!(
        pad_len > 0 && pad_len <= 8 && pad_len < data.len(),
        "invalid padding"
    );
    crate::ensure!(
        data[data.len() - pad_len..].iter().all(|b| *b as usize == pad_len),
        "invalid padding"
    );
    data.truncate(data.len() - pad_len);

    Ok(data)
}

/// Generate an ECDH key pair over Curve25519.
pub fn generate_key<R: Rng + CryptoRng>(rng: &mut R) -> (PublicParams, PlainSecretParams) {
    let secret = x25519_dalek::StaticSecret::random_from_rng(rng);
    let public = x25519_dalek::PublicKey::from(&secret);

    // Public point: 0x40 prefixed native encoding.
    let mut p = Vec::with_capacity(33);
    p.push(0x40);
    p.extend_from_slice(public.as_bytes());

    // The secret scalar is stored big-endian.
    let q: Vec<u8> = secret.to_bytes().iter().rev().cloned().collect();

    (
        PublicParams::ECDH {
            curve: ECCCurve::Curve25519,
            p: Mpi::from_raw(p),
            hash: HashAlgorithm::SHA256,
            alg_sym: SymmetricKeyAlgorithm::AES128,
        },
        PlainSecretParams::ECDH(Mpi::from_raw(q)),
    )
}

/// Shared secret computation for the encrypting side. Returns the ephemeral
/// public point (wire encoding) and the raw shared secret.
fn shared_encrypt<R: Rng + CryptoRng>(
    rng: &mut R,
    curve: &ECCCurve,
    p: &Mpi,
) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>)> {
    match curve {
        ECCCurve::Curve25519 => {
            crate::ensure_eq!(p.len(), 33, "invalid public point");
            crate::ensure_eq!(p.as_bytes()[0], 0x40, "invalid public point prefix");

            let mut their_public = [0u8; 32];
            their_public.copy_from_slice(&p.as_bytes()[1..]);
            let their_public = x25519_dalek::PublicKey::from(their_public);

            let eph = x25519_dalek::StaticSecret::random_from_rng(rng);
            let eph_public = x25519_dalek::PublicKey::from(&eph);
            let shared = eph.diffie_hellman(&their_public);

            let mut point = Vec::with_capacity(33);
            point.push(0x40);
            point.extend_from_slice(eph_public.as_bytes());

            Ok((point, Zeroizing::new(shared.as_bytes().to_vec())))
        }
        ECCCurve::P256 => {
            let their_public = p256::PublicKey::from_sec1_bytes(p.as_bytes())
                .map_err(|e| Error::CryptoError(e.to_string()))?;

            let eph = p256::ecdh::EphemeralSecret::random(rng);
            let eph_point = eph.public_key().to_encoded_point(false);
            let shared = eph.diffie_hellman(&their_public);

            Ok((
                eph_point.as_bytes().to_vec(),
                Zeroizing::new(shared.raw_secret_bytes().to_vec()),
            ))
        }
        _ => Err(Error::Unsupported(format!("ECDH over {:?}", curve))),
    }
}

/// Shared secret computation for the decrypting side.
fn shared_decrypt(curve: &ECCCurve, d: &Mpi, ephemeral: &Mpi) -> Result<Zeroizing<Vec<u8>>> {
    match curve {
        ECCCurve::Curve25519 => {
            crate::ensure_eq!(ephemeral.len(), 33, "invalid ephemeral point");
            crate::ensure_eq!(ephemeral.as_bytes()[0], 0x40, "invalid ephemeral prefix");

            let mut scalar: [u8; 32] = d.to_padded(32)?.try_into().expect("fixed size");
            scalar.reverse();
            let secret = x25519_dalek::StaticSecret::from(scalar);

            let mut their_public = [0u8; 32];
            their_public.copy_from_slice(&ephemeral.as_bytes()[1..]);
            let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(their_public));

            Ok(Zeroizing::new(shared.as_bytes().to_vec()))
        }
        ECCCurve::P256 => {
            let secret = p256::SecretKey::from_slice(&d.to_padded(32)?)
                .map_err(|e| Error::CryptoError(e.to_string()))?;
            let their_public = p256::PublicKey::from_sec1_bytes(ephemeral.as_bytes())
                .map_err(|e| Error::CryptoError(e.to_string()))?;

            let shared = p256::ecdh::diffie_hellman(
                secret.to_nonzero_scalar(),
                their_public.as_affine(),
            );

            Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
        }
        _ => Err(Error::Unsupported(format!("ECDH over {:?}", curve))),
    }
}

/// Wrap the session key payload to an ECDH recipient (RFC 6637).
#[allow(clippy::too_many_arguments)]
pub fn encrypt<R: Rng + CryptoRng>(
    rng: &mut R,
    curve: &ECCCurve,
    p: &Mpi,
    hash: HashAlgorithm,
    alg_sym: SymmetricKeyAlgorithm,
    fingerprint: &[u8],
    plain: &[u8],
) -> Result<PkeskBytes> {
    let (point, shared) = shared_encrypt(rng, curve, p)?;

    let param = build_ecdh_param(&curve.oid(), alg_sym, hash, fingerprint);
    let kek = Zeroizing::new(kdf(hash, &shared, alg_sym.key_size(), &param)?);

    let padded = Zeroizing::new(pad(plain));
    let encrypted_session_key = aes_kw_wrap(&kek, &padded)?;

    Ok(PkeskBytes::Ecdh {
        public_point: Mpi::from_raw(point),
        encrypted_session_key,
    })
}

/// Unwrap the session key payload (RFC 6637).
pub fn decrypt(
    curve: &ECCCurve,
    d: &Mpi,
    hash: HashAlgorithm,
    alg_sym: SymmetricKeyAlgorithm,
    fingerprint: &[u8],
    ephemeral: &Mpi,
    encrypted_session_key: &[u8],
) -> Result<Vec<u8>> {
    let shared = shared_decrypt(curve, d, ephemeral)?;

    let param = build_ecdh_param(&curve.oid(), alg_sym, hash, fingerprint);
    let kek = Zeroizing::new(kdf(hash, &shared, alg_sym.key_size(), &param)?);

    let padded = aes_kw_unwrap(&kek, encrypted_session_key)?;
    unpad(padded)
}

/// The stored secret scalar must rederive the stored public point.
pub fn is_valid(curve: &ECCCurve, p: &Mpi, d: &Mpi) -> Result<()> {
    match curve {
        ECCCurve::Curve25519 => {
            let mut scalar: [u8; 32] = d.to_padded(32)?.try_into().expect("fixed size");
            scalar.reverse();
            let secret = x25519_dalek::StaticSecret::from(scalar);
            let public = x25519_dalek::PublicKey::from(&secret);

            crate::ensure_eq!(p.len(), 33, "invalid public point");
            crate::ensure_eq!(
                &p.as_bytes()[1..],
                public.as_bytes(),
                "public point does not match secret scalar"
            );
            Ok(())
        }
        ECCCurve::P256 => {
            let secret = p256::SecretKey::from_slice(&d.to_padded(32)?)
                .map_err(|e| Error::CryptoError(e.to_string()))?;
            let derived = secret.public_key().to_encoded_point(false);
            crate::ensure_eq!(
                derived.as_bytes(),
                p.as_bytes(),
                "public point does not match secret scalar"
            );
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    macro_rules! test_aes_kw {
        ($name:ident, $kek:expr, $input:expr, $output:expr) => {
            #[test]
            fn $name() {
                let kek = hex::decode($kek).unwrap();
                let input_bin = hex::decode($input).unwrap();
                let output_bin = hex::decode($output).unwrap();

                assert_eq!(
                    hex::encode(aes_kw_wrap(&kek, &input_bin).unwrap()),
                    $output.to_lowercase(),
                    "failed wrap"
                );
                assert_eq!(
                    hex::encode(aes_kw_unwrap(&kek, &output_bin).unwrap()),
                    $input.to_lowercase(),
                    "failed unwrap"
                );
            }
        };
    }

    test_aes_kw!(
        aes_kw_wrap_unwrap_128_key_128_kek,
        "000102030405060708090A0B0C0D0E0F",
        "00112233445566778899AABBCCDDEEFF",
        "1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5"
    );

    test_aes_kw!(
        aes_kw_wrap_unwrap_128_key_192_kek,
        "000102030405060708090A0B0C0D0E0F1011121314151617",
        "00112233445566778899AABBCCDDEEFF",
        "96778B25AE6CA435F92B5B97C050AED2468AB8A17AD84E5D"
    );

    test_aes_kw!(
        aes_kw_wrap_unwrap_128_key_256_kek,
        "000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F",
        "00112233445566778899AABBCCDDEEFF",
        "64E8C3F9CE0F5BA263E9777905818A2A93C8191E7D6E8AE7"
    );

    test_aes_kw!(
        aes_kw_wrap_unwrap_256_key_256_kek,
        "000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F",
        "00112233445566778899AABBCCDDEEFF000102030405060708090A0B0C0D0E0F",
        "28C9F404C4B810F4CBCCB35CFB87F8263F5786E2D80ED326CBC7F0E71A99F43BFB988B9B7A02DD21"
    );

    #[test]
    fn test_pad_unpad() {
        let padded = pad(&[1, 2, 3]);
        assert_eq!(padded.len(), 8);
        assert_eq!(&padded[3..], &[5, 5, 5, 5, 5]);
        assert_eq!(unpad(padded).unwrap(), vec![1, 2, 3]);

        let aligned = pad(&[0u8; 8]);
        assert_eq!(aligned.len(), 16);
        assert_eq!(unpad(aligned).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn test_ecdh_curve25519_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (public, secret) = generate_key(&mut rng);

        let (PublicParams::ECDH { curve, p, hash, alg_sym }, PlainSecretParams::ECDH(d)) =
            (&public, &secret)
        else {
            panic!("wrong params");
        };

        is_valid(curve, p, d).unwrap();

        let fingerprint = [0xabu8; 20];
        let plain = b"\x09session-key-32-bytes-long......\x12\x34";

        let values = encrypt(&mut rng, curve, p, *hash, *alg_sym, &fingerprint, plain).unwrap();
        let PkeskBytes::Ecdh {
            public_point,
            encrypted_session_key,
        } = values
        else {
            panic!("wrong esk");
        };

        let recovered = decrypt(
            curve,
            d,
            *hash,
            *alg_sym,
            &fingerprint,
            &public_point,
            &encrypted_session_key,
        )
        .unwrap();
        assert_eq!(recovered, plain);
    }
}
