//! Sources of time, randomness and key material.
//!
//! Each is a trait object handed to [Verifier](crate::dc_api::Verifier) and
//! [RequestBuilder](crate::dc_api::RequestBuilder) at construction, so tests can pin them
//! without touching process-wide state.

use rand::{rngs::OsRng, RngCore};
use time::OffsetDateTime;

use crate::nonce::ResponseEncryptionKeys;

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock stopped at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

pub trait RandomSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest)
    }
}

/// Produces the ephemeral key pair a wallet encrypts its response to.
pub trait KeyPairGenerator: Send + Sync {
    fn generate(&self) -> ResponseEncryptionKeys;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct P256KeyPairGenerator;

impl KeyPairGenerator for P256KeyPairGenerator {
    fn generate(&self) -> ResponseEncryptionKeys {
        ResponseEncryptionKeys::from_secret_key(&p256::SecretKey::random(&mut OsRng))
    }
}
