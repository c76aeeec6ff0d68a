//! Domain Services
//!
//! Composite hash binding: one SHA-256 digest over the rendered document and
//! the confirmation metadata. Stateless and safe to call from any thread.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use platform::crypto::{constant_time_eq, update_from_reader};
use sha2::{Digest, Sha256};

use crate::domain::value_objects::CompositeHash;
use crate::error::BindingError;

/// Separator written between metadata fields
pub const FIELD_DELIMITER: &[u8] = b"|";

/// Name printed in the stamp next to the hash
pub const HASH_ALGORITHM: &str = "SHA-256";

/// Metadata bound into the hash, in hashing order
#[derive(Debug, Clone, Copy)]
pub struct BindingFields<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub code: &'a str,
    pub signing_time: &'a str,
}

impl<'a> BindingFields<'a> {
    fn ordered(&self) -> [(&'static str, &'a str); 4] {
        [
            ("name", self.name),
            ("phone", self.phone),
            ("code", self.code),
            ("signing_time", self.signing_time),
        ]
    }
}

pub struct HashBinder;

impl HashBinder {
    /// Digest of `document` followed by `name|phone|code|signing_time`
    ///
    /// The document is streamed in fixed-size chunks. Fails if it yields no
    /// bytes, cannot be read, or any metadata field is empty.
    pub fn compute<R: Read + ?Sized>(
        document: &mut R,
        fields: &BindingFields<'_>,
    ) -> Result<CompositeHash, BindingError> {
        let ordered = fields.ordered();
        if let Some((name, _)) = ordered.iter().find(|(_, value)| value.is_empty()) {
            return Err(BindingError::EmptyField(*name));
        }

        let mut hasher = Sha256::new();
        if update_from_reader(&mut hasher, document)? == 0 {
            return Err(BindingError::EmptyDocument);
        }
        for (i, (_, value)) in ordered.iter().enumerate() {
            if i > 0 {
                hasher.update(FIELD_DELIMITER);
            }
            hasher.update(value.as_bytes());
        }

        Ok(CompositeHash::from_bytes(hasher.finalize().into()))
    }

    /// [`HashBinder::compute`] over a file on disk
    pub fn compute_file(
        path: &Path,
        fields: &BindingFields<'_>,
    ) -> Result<CompositeHash, BindingError> {
        let mut file = File::open(path)?;
        Self::compute(&mut file, fields)
    }

    /// 64 lowercase hex characters
    pub fn to_hex(hash: &CompositeHash) -> String {
        hash.to_hex()
    }

    /// Recompute and compare against `expected_hex` (case-insensitive)
    ///
    /// The comparison runs over the full length regardless of where the first
    /// mismatch is.
    pub fn verify<R: Read + ?Sized>(
        document: &mut R,
        fields: &BindingFields<'_>,
        expected_hex: &str,
    ) -> Result<bool, BindingError> {
        let actual = Self::compute(document, fields)?.to_hex();
        let expected = expected_hex.trim().to_ascii_lowercase();
        Ok(constant_time_eq(actual.as_bytes(), expected.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Page >> endobj\n%%EOF\n";

    fn fields() -> BindingFields<'static> {
        BindingFields {
            name: "Ivan Ivanovich Ivanov",
            phone: "+79161234567",
            code: "1234",
            signing_time: "2024-01-15T14:30:25+03:00",
        }
    }

    #[test]
    fn test_known_layout() {
        // Same bytes hashed in one shot
        let mut expected = PDF.to_vec();
        expected.extend_from_slice(b"Ivan Ivanovich Ivanov|+79161234567|1234|2024-01-15T14:30:25+03:00");
        let hash = HashBinder::compute(&mut &PDF[..], &fields()).unwrap();
        assert_eq!(hash.as_bytes(), &platform::crypto::sha256(&expected));
    }

    #[test]
    fn test_deterministic_and_hex_shape() {
        let a = HashBinder::compute(&mut &PDF[..], &fields()).unwrap();
        let b = HashBinder::compute(&mut &PDF[..], &fields()).unwrap();
        assert_eq!(a, b);

        let hex = HashBinder::to_hex(&a);
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_any_change_alters_hash() {
        let base = HashBinder::compute(&mut &PDF[..], &fields()).unwrap();

        let other_code = BindingFields {
            code: "1235",
            ..fields()
        };
        assert_ne!(base, HashBinder::compute(&mut &PDF[..], &other_code).unwrap());

        let other_name = BindingFields {
            name: "Ivan Ivanovich Petrov",
            ..fields()
        };
        assert_ne!(base, HashBinder::compute(&mut &PDF[..], &other_name).unwrap());

        let other_phone = BindingFields {
            phone: "+79161234568",
            ..fields()
        };
        assert_ne!(base, HashBinder::compute(&mut &PDF[..], &other_phone).unwrap());

        let mut tampered = PDF.to_vec();
        tampered[3] ^= 1;
        assert_ne!(base, HashBinder::compute(&mut tampered.as_slice(), &fields()).unwrap());
    }

    #[test]
    fn test_verify_round_trip_case_insensitive() {
        let hex = HashBinder::compute(&mut &PDF[..], &fields()).unwrap().to_hex();
        assert!(HashBinder::verify(&mut &PDF[..], &fields(), &hex).unwrap());
        assert!(HashBinder::verify(&mut &PDF[..], &fields(), &hex.to_uppercase()).unwrap());

        let wrong_time = BindingFields {
            signing_time: "2024-01-15T14:30:26+03:00",
            ..fields()
        };
        assert!(!HashBinder::verify(&mut &PDF[..], &wrong_time, &hex).unwrap());
        let wrong_signer = BindingFields {
            name: "Petr Petrovich Petrov",
            phone: "+79035550000",
            ..fields()
        };
        assert!(!HashBinder::verify(&mut &PDF[..], &wrong_signer, &hex).unwrap());
        assert!(!HashBinder::verify(&mut &PDF[..], &fields(), &hex[..63]).unwrap());
    }

    #[test]
    fn test_rejects_empty_inputs() {
        let empty: &[u8] = b"";
        assert!(matches!(
            HashBinder::compute(&mut &empty[..], &fields()),
            Err(BindingError::EmptyDocument)
        ));

        let no_phone = BindingFields {
            phone: "",
            ..fields()
        };
        assert!(matches!(
            HashBinder::compute(&mut &PDF[..], &no_phone),
            Err(BindingError::EmptyField("phone"))
        ));
    }

    #[test]
    fn test_compute_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, PDF).unwrap();

        let from_file = HashBinder::compute_file(&path, &fields()).unwrap();
        let from_memory = HashBinder::compute(&mut &PDF[..], &fields()).unwrap();
        assert_eq!(from_file, from_memory);

        assert!(matches!(
            HashBinder::compute_file(&dir.path().join("absent.pdf"), &fields()),
            Err(BindingError::Unreadable(_))
        ));
    }
}
