use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Fixed key so fingerprints are stable across process restarts, unlike
/// `std::collections::hash_map::DefaultHasher`, whose seed is randomized
/// per-process and would silently break the dedup invariant on every
/// restart.
const FINGERPRINT_KEY_0: u64 = 0x5bd1_e995_6c9c_2d32;
const FINGERPRINT_KEY_1: u64 = 0x27d4_eb2f_1656_67c5;

/// `stable_hash(sender || "\x1f" || content || "\x1f" || floor(create_time/60))`,
/// rendered as lowercase 16-hex-digit string.
pub fn fingerprint(sender: &str, content: &str, create_time: i64) -> String {
    let mut hasher = SipHasher13::new_with_keys(FINGERPRINT_KEY_0, FINGERPRINT_KEY_1);
    hasher.write(sender.as_bytes());
    hasher.write(&[0x1f]);
    hasher.write(content.as_bytes());
    hasher.write(&[0x1f]);
    hasher.write((create_time / 60).to_string().as_bytes());
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_within_same_minute_collide() {
        let a = fingerprint("alice", "hello", 1_000);
        let b = fingerprint("alice", "hello", 1_059);
        assert_eq!(a, b);
    }

    #[test]
    fn crossing_a_minute_boundary_changes_fingerprint() {
        let a = fingerprint("alice", "hello", 1_000);
        let b = fingerprint("alice", "hello", 1_060);
        assert_ne!(a, b);
    }

    #[test]
    fn different_content_changes_fingerprint() {
        let a = fingerprint("alice", "hello", 1_000);
        let b = fingerprint("alice", "goodbye", 1_000);
        assert_ne!(a, b);
    }

    #[test]
    fn is_stable_across_repeated_calls() {
        assert_eq!(
            fingerprint("alice", "hello", 1_000),
            fingerprint("alice", "hello", 1_000)
        );
    }
}
