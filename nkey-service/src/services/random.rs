//! Cryptographic randomness and the token formats built from it.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

pub const NKEY_PREFIX: &str = "TOUNET_";
const NKEY_RANDOM_BYTES: usize = 32;
const INVITE_RANDOM_BYTES: usize = 16;
const INVITE_CODE_LEN: usize = 22;
const APP_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
#[error("random source failure: {0}")]
pub struct RandomError(pub String);

pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<(), RandomError>;
}

/// Operating-system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn fill(&self, buf: &mut [u8]) -> Result<(), RandomError> {
        rand::rngs::OsRng
            .try_fill_bytes(buf)
            .map_err(|e| RandomError(e.to_string()))
    }
}

/// Fills every buffer with the same byte. Every draw is identical, which
/// makes collisions reproducible in tests.
#[derive(Debug)]
pub struct FixedRandomSource(pub u8);

impl RandomSource for FixedRandomSource {
    fn fill(&self, buf: &mut [u8]) -> Result<(), RandomError> {
        buf.fill(self.0);
        Ok(())
    }
}

/// Each draw uses the next byte value, so successive values differ.
#[derive(Debug, Default)]
pub struct SequenceRandomSource(AtomicU8);

impl RandomSource for SequenceRandomSource {
    fn fill(&self, buf: &mut [u8]) -> Result<(), RandomError> {
        let byte = self.0.fetch_add(1, Ordering::SeqCst);
        buf.fill(byte);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FailingRandomSource;

impl RandomSource for FailingRandomSource {
    fn fill(&self, _buf: &mut [u8]) -> Result<(), RandomError> {
        Err(RandomError("entropy source unavailable".to_string()))
    }
}

/// `TOUNET_` followed by 32 random bytes, base64url without padding.
pub fn generate_nkey_value(source: &dyn RandomSource) -> Result<String, RandomError> {
    let mut bytes = [0u8; NKEY_RANDOM_BYTES];
    source.fill(&mut bytes)?;
    Ok(format!("{}{}", NKEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes)))
}

/// 16 random bytes, base64url, 22 characters.
pub fn generate_invite_code(source: &dyn RandomSource) -> Result<String, RandomError> {
    let mut bytes = [0u8; INVITE_RANDOM_BYTES];
    source.fill(&mut bytes)?;
    let mut code = URL_SAFE_NO_PAD.encode(bytes);
    code.truncate(INVITE_CODE_LEN);
    Ok(code)
}

/// 32 random bytes, standard base64.
pub fn generate_app_secret(source: &dyn RandomSource) -> Result<String, RandomError> {
    let mut bytes = [0u8; APP_SECRET_BYTES];
    source.fill(&mut bytes)?;
    Ok(STANDARD.encode(bytes))
}
