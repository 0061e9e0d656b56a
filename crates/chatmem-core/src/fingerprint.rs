//! Exact and approximate chunk fingerprints.
//!
//! The exact fingerprint is the SHA-256 of the chunk text and catches
//! byte-identical chunks. The approximate fingerprint is a 64-bit simhash
//! over character bigrams: texts that differ in a handful of characters
//! share most bigrams, so their fingerprints differ in only a few bits.
//!
//! # Simhash
//!
//! 1. Take every overlapping two-character window of the text.
//! 2. Hash each with BLAKE2b truncated to an 8-byte digest (read big-endian).
//! 3. For each bit position `i`, add `+1` to `acc[i]` if the bit is set,
//!    `-1` otherwise.
//! 4. Bit `i` of the result is set iff `acc[i] > 0`.
//!
//! Text shorter than two characters has no bigrams and hashes to `0`.

use blake2::digest::consts::U8;
use blake2::{Blake2b, Digest};
use sha2::Sha256;

use crate::models::Fingerprint;

type Blake2b64 = Blake2b<U8>;

/// Fingerprint width in bits.
pub const SIMHASH_BITS: usize = 64;

/// Compute both fingerprints of `text`.
pub fn fingerprint(text: &str) -> Fingerprint {
    Fingerprint {
        exact_hash: Sha256::digest(text.as_bytes()).into(),
        approx: simhash(text),
    }
}

/// Hex-encoded SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// 64-bit simhash of `text` over character bigrams.
pub fn simhash(text: &str) -> u64 {
    let chars: Vec<char> = text.chars().collect();
    let mut acc = [0i64; SIMHASH_BITS];
    let mut bigram = String::with_capacity(8);

    for pair in chars.windows(2) {
        bigram.clear();
        bigram.push(pair[0]);
        bigram.push(pair[1]);

        let h = bigram_hash(&bigram);
        for (i, slot) in acc.iter_mut().enumerate() {
            if (h >> i) & 1 == 1 {
                *slot += 1;
            } else {
                *slot -= 1;
            }
        }
    }

    acc.iter()
        .enumerate()
        .filter(|(_, v)| **v > 0)
        .fold(0u64, |bits, (i, _)| bits | (1 << i))
}

fn bigram_hash(bigram: &str) -> u64 {
    let digest = Blake2b64::digest(bigram.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest);
    u64::from_be_bytes(bytes)
}

/// Number of differing bits between two fingerprints.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Render a simhash as 16 zero-padded lowercase hex digits.
pub fn format_simhash(sh: u64) -> String {
    format!("{sh:016x}")
}

/// Parse a hex simhash as written by [`format_simhash`].
pub fn parse_simhash(hex: &str) -> Option<u64> {
    u64::from_str_radix(hex.trim(), 16).ok()
}

impl Fingerprint {
    /// Hex-encoded exact hash.
    pub fn exact_hex(&self) -> String {
        self.exact_hash.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Hex-encoded approximate fingerprint.
    pub fn approx_hex(&self) -> String {
        format_simhash(self.approx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[250314Fri 09:05] User: I finally fixed the flaky deploy script.\n\
        Assistant: Nice, was it the race in the health check again?";

    #[test]
    fn test_short_text_is_zero() {
        assert_eq!(simhash(""), 0);
        assert_eq!(simhash("a"), 0);
        assert_eq!(simhash("語"), 0);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(fingerprint(SAMPLE), fingerprint(SAMPLE));
    }

    #[test]
    fn test_exact_hash_hex() {
        let fp = fingerprint("abc");
        assert_eq!(
            fp.exact_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fp.exact_hex(), content_hash("abc"));
    }

    #[test]
    fn test_single_bigram_is_its_hash() {
        // One bigram: every set bit votes +1, every clear bit -1.
        assert_eq!(simhash("ab"), bigram_hash("ab"));
    }

    #[test]
    fn test_one_char_edit_changes_few_bits() {
        let edited = SAMPLE.replace("flaky", "flakY");
        let a = fingerprint(SAMPLE);
        let b = fingerprint(&edited);
        assert_ne!(a.exact_hash, b.exact_hash);
        let d = hamming_distance(a.approx, b.approx);
        assert!(d <= 5, "hamming distance {} too large", d);
    }

    #[test]
    fn test_unrelated_texts_far_apart() {
        let other = "Completely different words about gardening tomatoes in a greenhouse during winter.";
        let d = hamming_distance(simhash(SAMPLE), simhash(other));
        assert!(d > 5, "unrelated texts unexpectedly close: {}", d);
    }

    #[test]
    fn test_format_and_parse() {
        assert_eq!(format_simhash(0xff), "00000000000000ff");
        assert_eq!(parse_simhash("00000000000000ff"), Some(0xff));
        assert_eq!(parse_simhash("zz"), None);
        let sh = simhash(SAMPLE);
        assert_eq!(parse_simhash(&format_simhash(sh)), Some(sh));
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0b1011, 0b0001), 2);
        assert_eq!(hamming_distance(0, u64::MAX), 64);
    }
}
