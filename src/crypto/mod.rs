//! The crypto provider surface: algorithm identifiers and per-algorithm
//! primitives, backed by the RustCrypto crates.

pub mod aead;
pub mod checksum;
pub mod dsa;
pub mod ecc_curve;
pub mod ecdh;
pub mod ecdsa;
pub mod eddsa;
pub mod hash;
pub mod public_key;
pub mod rsa;
pub mod sym;
pub mod x25519;

mod rng_adapter {
    use rand::{CryptoRng, RngCore};

    /// Object safe handle over a caller supplied CSPRNG, so rng-consuming
    /// operations stay callable through trait objects.
    pub struct DynCryptoRng<'a>(&'a mut dyn RngCore);

    impl<'a> DynCryptoRng<'a> {
        /// Construction requires a `CryptoRng` bound, which is what makes
        /// the blanket `CryptoRng` marker below sound.
        pub fn new<R: RngCore + CryptoRng>(rng: &'a mut R) -> Self {
            DynCryptoRng(rng)
        }
    }

    impl RngCore for DynCryptoRng<'_> {
        fn next_u32(&mut self) -> u32 {
            self.0.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.0.next_u64()
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.0.fill_bytes(dest)
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.0.try_fill_bytes(dest)
        }
    }

    impl CryptoRng for DynCryptoRng<'_> {}
}

pub use rng_adapter::DynCryptoRng;
