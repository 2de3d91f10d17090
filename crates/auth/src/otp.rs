//! One-time login codes.
//!
//! Only the SHA-256 digest of a code is stored; the code itself travels by
//! email.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Random numeric code of `digits` length, zero padded.
pub fn generate_code(digits: u32) -> String {
    let digits = digits.clamp(4, 10);
    let upper = 10u64.pow(digits);
    let value = rand::thread_rng().gen_range(0..upper);
    format!("{value:0width$}", width = digits as usize)
}

pub fn digest(code: &str) -> String {
    hex::encode(Sha256::digest(code.trim().as_bytes()))
}

/// Compare a submitted code against a stored digest without short-circuiting.
pub fn matches(code: &str, stored_digest: &str) -> bool {
    let candidate = digest(code);
    candidate.len() == stored_digest.len()
        && candidate
            .bytes()
            .zip(stored_digest.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
