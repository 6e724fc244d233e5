use std::fmt::Write;

use sha1::{Digest, Sha1};

use crate::flags::flag_definitions::FlagKey;

const LONG_SCALE: u64 = 0xfffffffffffffff;

/// This function takes a subject identifier and a flag key and returns a
/// float between 0 and 1. Given the same subject and key it always returns
/// the same float, uniformly distributed, so gating on `hash < p / 100`
/// shows a flag to p% of subjects. Stable across process restarts.
pub fn rollout_hash(subject_id: &str, flag: FlagKey) -> f64 {
    let hash_key = format!("{}.{}", flag.as_str(), subject_id);
    let mut hasher = Sha1::new();
    hasher.update(hash_key.as_bytes());
    let result = hasher.finalize();
    // Fold the first 15 hex characters of the digest into an integer,
    // padding each byte as 2 characters.
    let hex_str: String = result.iter().fold(String::new(), |mut acc, byte| {
        let _ = write!(acc, "{:02x}", byte);
        acc
    })[..15]
        .to_string();
    let hash_val = u64::from_str_radix(&hex_str, 16)
        .expect("sha1 hex digest is always a valid base-16 integer");

    hash_val as f64 / LONG_SCALE as f64
}

/// The subject's percentile band for a flag, 0-99. A flag rolled out at p%
/// stays enabled for subjects whose band is below p.
pub fn rollout_bucket(subject_id: &str, flag: FlagKey) -> u8 {
    // The digest can reach LONG_SCALE exactly; clamp into the top band.
    let scaled = (rollout_hash(subject_id, flag) * 100.0).floor();
    (scaled as u64).min(99) as u8
}
