//! Error Kind - Classification of errors
//!
//! Defines the [`ErrorKind`] enum that maps to process exit codes.

use serde::Serialize;

/// Error classification
///
/// Shared across the whole signing pipeline. Every variant maps to a CLI
/// exit code (success is 0).
///
/// ## Notes
/// * `non_exhaustive` - more variants may be added later
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::Rendering;
/// assert_eq!(kind.exit_code(), 6);
/// assert_eq!(kind.as_str(), "Rendering Failed");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// 2 - Unauthorized: token mismatch or failed authentication
    Unauthorized,
    /// 3 - Invalid Input: malformed request data or identity fields
    InvalidInput,
    /// 4 - I/O: file operation failed
    Io,
    /// 5 - Template: placeholder substitution failed
    Template,
    /// 6 - Rendering: HTML to PDF conversion failed
    Rendering,
    /// 7 - Delivery: confirmation code was not sent
    Delivery,
    /// 8 - Binding: composite hash could not be computed
    Binding,
    /// 9 - Stamping: stamp could not be applied
    Stamping,
    /// 10 - Invalid Config: configuration is invalid
    InvalidConfig,
    /// 11 - Credentials: credentials could not be persisted
    Credentials,
    /// 12 - Service Unavailable: service stopped or not initialized
    ServiceUnavailable,
    /// 1 - Internal: internal error, panics included
    Internal,
}

impl ErrorKind {
    /// Process exit code
    ///
    /// ## Returns
    /// A non-zero exit code. `Internal` uses the generic 1.
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::Unauthorized.exit_code(), 2);
    /// assert_eq!(ErrorKind::Internal.exit_code(), 1);
    /// ```
    #[inline]
    pub const fn exit_code(&self) -> u8 {
        match self {
            ErrorKind::Internal => 1,
            ErrorKind::Unauthorized => 2,
            ErrorKind::InvalidInput => 3,
            ErrorKind::Io => 4,
            ErrorKind::Template => 5,
            ErrorKind::Rendering => 6,
            ErrorKind::Delivery => 7,
            ErrorKind::Binding => 8,
            ErrorKind::Stamping => 9,
            ErrorKind::InvalidConfig => 10,
            ErrorKind::Credentials => 11,
            ErrorKind::ServiceUnavailable => 12,
        }
    }

    /// Human-readable label
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::InvalidInput.as_str(), "Invalid Input");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::InvalidInput => "Invalid Input",
            ErrorKind::Io => "I/O Error",
            ErrorKind::Template => "Template Error",
            ErrorKind::Rendering => "Rendering Failed",
            ErrorKind::Delivery => "Delivery Failed",
            ErrorKind::Binding => "Binding Failed",
            ErrorKind::Stamping => "Stamping Failed",
            ErrorKind::InvalidConfig => "Invalid Config",
            ErrorKind::Credentials => "Credentials Error",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
            ErrorKind::Internal => "Internal Error",
        }
    }

    /// Whether the caller is at fault
    ///
    /// Authentication, input and configuration mistakes return `true`.
    /// Retrying will not change the outcome.
    #[inline]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::Unauthorized | ErrorKind::InvalidInput | ErrorKind::InvalidConfig
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
