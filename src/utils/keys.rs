//! Identifier and key generation.

use md5::{Digest, Md5};
use rand::RngExt;

/// Fresh opaque click id: `clk_` + 32 hex chars.
pub fn generate_click_id() -> String {
    format!("clk_{}", random_hex(16))
}

/// Deterministic per-device key: md5(idfv + secret), hex encoded.
///
/// Acts as the idempotency key for repeated checkins from the same device,
/// and doubles as the customer_user_id forwarded to the tracker.
pub fn generate_os_user_key(idfv: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(idfv.as_bytes());
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Tenant API key: millisecond timestamp in base36 + random suffix.
pub fn generate_api_key() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    format!("{}_{}", to_base36(millis), random_hex(16))
}

/// Short random id for live event feed entries.
pub fn random_event_id() -> String {
    random_hex(5)
}

fn random_hex(bytes: usize) -> String {
    let mut rng = rand::rng();
    let mut buf = vec![0u8; bytes];
    rng.fill(buf.as_mut_slice());
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

fn to_base36(mut value: u64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
