use sha2::{Digest, Sha256};

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Content digest of a materialized script, recorded next to its result so two runs
/// can be compared script by script.
pub fn script_digest(code: &str) -> String {
    format!("sha256:{}", sha256_hex(code))
}
