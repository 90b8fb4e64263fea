/// Public key algorithm identifiers.
/// Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-9.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt and Sign)
    RSA,
    /// DEPRECATED: RSA (Encrypt-Only)
    RSAEncrypt,
    /// DEPRECATED: RSA (Sign-Only)
    RSASign,
    /// Elgamal (Encrypt-Only)
    ElgamalEncrypt,
    /// DSA (Digital Signature Algorithm)
    DSA,
    /// Elliptic Curve Diffie-Hellman (RFC 6637)
    ECDH,
    /// ECDSA (RFC 6637)
    ECDSA,
    /// DEPRECATED: Elgamal (Encrypt and Sign)
    Elgamal,
    /// Reserved for Diffie-Hellman (X9.42)
    DiffieHellman,
    /// EdDSA with legacy MPI encoding
    EdDSALegacy,
    /// X25519 (RFC 9580 native encoding)
    X25519,
    /// X448 (RFC 9580 native encoding)
    X448,
    /// Ed25519 (RFC 9580 native encoding)
    Ed25519,
    /// Ed448 (RFC 9580 native encoding)
    Ed448,
    /// Private experimental range (100..=110)
    Private(u8),
    /// Everything else; carried opaquely.
    Unknown(u8),
}

impl PublicKeyAlgorithm {
    /// True if the algorithm can produce signatures.
    pub fn can_sign(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA
                | PublicKeyAlgorithm::RSASign
                | PublicKeyAlgorithm::DSA
                | PublicKeyAlgorithm::ECDSA
                | PublicKeyAlgorithm::EdDSALegacy
                | PublicKeyAlgorithm::Ed25519
                | PublicKeyAlgorithm::Ed448
        )
    }

    /// True if the algorithm can encrypt session keys.
    pub fn can_encrypt(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA
                | PublicKeyAlgorithm::RSAEncrypt
                | PublicKeyAlgorithm::ElgamalEncrypt
                | PublicKeyAlgorithm::Elgamal
                | PublicKeyAlgorithm::ECDH
                | PublicKeyAlgorithm::X25519
                | PublicKeyAlgorithm::X448
        )
    }
}

impl From<u8> for PublicKeyAlgorithm {
    fn from(v: u8) -> Self {
        match v {
            1 => PublicKeyAlgorithm::RSA,
            2 => PublicKeyAlgorithm::RSAEncrypt,
            3 => PublicKeyAlgorithm::RSASign,
            16 => PublicKeyAlgorithm::ElgamalEncrypt,
            17 => PublicKeyAlgorithm::DSA,
            18 => PublicKeyAlgorithm::ECDH,
            19 => PublicKeyAlgorithm::ECDSA,
            20 => PublicKeyAlgorithm::Elgamal,
            21 => PublicKeyAlgorithm::DiffieHellman,
            22 => PublicKeyAlgorithm::EdDSALegacy,
            25 => PublicKeyAlgorithm::X25519,
            26 => PublicKeyAlgorithm::X448,
            27 => PublicKeyAlgorithm::Ed25519,
            28 => PublicKeyAlgorithm::Ed448,
            100..=110 => PublicKeyAlgorithm::Private(v),
            _ => PublicKeyAlgorithm::Unknown(v),
        }
    }
}

impl From<PublicKeyAlgorithm> for u8 {
    fn from(alg: PublicKeyAlgorithm) -> Self {
        match alg {
            PublicKeyAlgorithm::RSA => 1,
            PublicKeyAlgorithm::RSAEncrypt => 2,
            PublicKeyAlgorithm::RSASign => 3,
            PublicKeyAlgorithm::ElgamalEncrypt => 16,
            PublicKeyAlgorithm::DSA => 17,
            PublicKeyAlgorithm::ECDH => 18,
            PublicKeyAlgorithm::ECDSA => 19,
            PublicKeyAlgorithm::Elgamal => 20,
            PublicKeyAlgorithm::DiffieHellman => 21,
            PublicKeyAlgorithm::EdDSALegacy => 22,
            PublicKeyAlgorithm::X25519 => 25,
            PublicKeyAlgorithm::X448 => 26,
            PublicKeyAlgorithm::Ed25519 => 27,
            PublicKeyAlgorithm::Ed448 => 28,
            PublicKeyAlgorithm::Private(v) | PublicKeyAlgorithm::Unknown(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_ids() {
        for v in 0..=255u8 {
            let alg = PublicKeyAlgorithm::from(v);
            assert_eq!(u8::from(alg), v);
        }
    }
}
