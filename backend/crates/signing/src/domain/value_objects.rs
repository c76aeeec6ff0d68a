//! Domain Value Objects

use std::fmt;

use serde::Serialize;

// ============================================================================
// Composite hash
// ============================================================================

/// 256-bit digest binding a document to its confirmation event
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeHash([u8; 32]);

impl CompositeHash {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// 64 lowercase hex characters
    pub fn to_hex(&self) -> String {
        platform::crypto::to_hex(&self.0)
    }
}

impl fmt::Display for CompositeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CompositeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompositeHash({})", self.to_hex())
    }
}

// ============================================================================
// Provider status
// ============================================================================

/// Status string the SMS provider uses for a queued message
pub const STATUS_ACCEPTED: &str = "accepted";

/// Provider answer to a send request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub status: String,
    /// Provider message id; empty when the message was refused
    pub message_id: String,
    pub description: Option<String>,
}

impl ProviderStatus {
    pub fn accepted(message_id: impl Into<String>) -> Self {
        Self {
            status: STATUS_ACCEPTED.to_string(),
            message_id: message_id.into(),
            description: None,
        }
    }

    pub fn rejected(status: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message_id: String::new(),
            description: Some(description.into()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == STATUS_ACCEPTED
    }
}

// ============================================================================
// Reserved control codes
// ============================================================================

/// Sentinel values that can never be used as a confirmation code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCode {
    LogOn,
    LogOff,
}

impl ControlCode {
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "LOG_ON" => Some(ControlCode::LogOn),
            "LOG_OFF" => Some(ControlCode::LogOff),
            _ => None,
        }
    }

    /// Logging state requested by this code
    pub fn enables_logging(self) -> bool {
        matches!(self, ControlCode::LogOn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_shape() {
        let hash = CompositeHash::from_bytes([0xAB; 32]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex, "ab".repeat(32));
        assert_eq!(hash.to_string(), hex);
    }

    #[test]
    fn test_provider_status() {
        assert!(ProviderStatus::accepted("42").is_accepted());
        let refused = ProviderStatus::rejected("error", "invalid mobile phone");
        assert!(!refused.is_accepted());
        assert!(refused.message_id.is_empty());
    }

    #[test]
    fn test_control_codes() {
        assert_eq!(ControlCode::parse("LOG_ON"), Some(ControlCode::LogOn));
        assert_eq!(ControlCode::parse("LOG_OFF"), Some(ControlCode::LogOff));
        assert_eq!(ControlCode::parse("log_on"), None);
        assert_eq!(ControlCode::parse("1234"), None);
        assert!(ControlCode::LogOn.enables_logging());
        assert!(!ControlCode::LogOff.enables_logging());
    }
}
