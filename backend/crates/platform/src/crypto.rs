//! Cryptographic Utilities

use std::io::{self, Read};

use rand::{Rng, RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Read buffer size used when streaming data into a digest
pub const STREAM_CHUNK_SIZE: usize = 8192;

/// Generate a cryptographically secure random 64-bit value
pub fn random_u64() -> u64 {
    OsRng.next_u64()
}

/// Generate a random numeric code of `len` decimal digits (leading zeros allowed)
pub fn random_digits(len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'0' + OsRng.gen_range(0..10u8)))
        .collect()
}

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Feed everything `reader` yields into `hasher` in fixed-size chunks
///
/// Returns the number of bytes consumed.
pub fn update_from_reader<D, R>(hasher: &mut D, reader: &mut R) -> io::Result<u64>
where
    D: Digest,
    R: Read + ?Sized,
{
    let mut buffer = [0u8; STREAM_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
        total += read as u64;
    }
    Ok(total)
}

/// Encode bytes as lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_values() {
        // SHA-256 of empty string
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);

        // SHA-256 of "hello"
        let hash = sha256(b"hello");
        let expected =
            hex::decode("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        // Larger than one chunk so the loop runs more than once
        let data: Vec<u8> = (0..STREAM_CHUNK_SIZE * 3 + 17).map(|i| i as u8).collect();
        let mut hasher = Sha256::new();
        let consumed = update_from_reader(&mut hasher, &mut data.as_slice()).unwrap();
        let streamed: [u8; 32] = hasher.finalize().into();

        assert_eq!(consumed, data.len() as u64);
        assert_eq!(streamed, sha256(&data));
    }

    #[test]
    fn test_random_digits() {
        let code = random_digits(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(random_digits(0).is_empty());
    }

    #[test]
    fn test_hex_is_lowercase() {
        assert_eq!(to_hex(&[0xAB, 0x01]), "ab01");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_constant_time_eq() {
        let a = [1u8, 2, 3, 4];
        let b = [1u8, 2, 3, 4];
        let c = [1u8, 2, 3, 5];
        assert!(constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &c));
        assert!(!constant_time_eq(&a, &b[..3]));
    }
}
