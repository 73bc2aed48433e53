//! Challenge/response authentication.
//!
//! The server hands out a random 32-byte challenge; the client proves knowledge of the shared
//! secret by returning `HMAC-SHA256(secret, challenge)` as lowercase hex. Hex comparison on the
//! server is case-insensitive.
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::protocol::CHALLENGE_LEN;

type HmacSha256 = Hmac<Sha256>;

pub type Challenge = [u8; CHALLENGE_LEN];

/// Fresh challenge from the thread-local CSPRNG.
pub fn generate_challenge() -> Challenge {
    let mut challenge = [0; CHALLENGE_LEN];
    rand::rng().fill_bytes(&mut challenge);
    challenge
}

fn mac(secret: &[u8], challenge: &[u8]) -> HmacSha256 {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 takes keys of any length"),
    };
    mac.update(challenge);
    mac
}

/// Lowercase hex of `HMAC-SHA256(secret, challenge)`.
pub fn respond(secret: &[u8], challenge: &[u8]) -> String {
    let digest = mac(secret, challenge).finalize().into_bytes();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Checks a hex response against the challenge, ignoring hex case.
pub fn verify(secret: &[u8], challenge: &[u8], response: &str) -> bool {
    match decode_hex(response) {
        Some(bytes) => mac(secret, challenge).verify_slice(&bytes).is_ok(),
        None => false,
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}
