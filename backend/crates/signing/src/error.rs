//! Signing Error Types
//!
//! This module provides signing-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use std::io;

use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Signing-specific result type alias
pub type SigningResult<T> = Result<T, SigningError>;

/// Signing-specific error variants
///
/// Each variant corresponds to one pipeline step. The stable code returned
/// by [`SigningError::code`] is what callers should match on.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Supplied token does not match the configured one
    #[error("Invalid authentication token")]
    InvalidAuthToken,

    /// Confirmation code rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Identity is missing required fields
    #[error("Invalid user data: {0}")]
    InvalidUserData(String),

    /// User data is not valid JSON
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Filesystem operation failed
    #[error("File I/O error: {context}: {source}")]
    FileIo {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Template could not be read or populated
    #[error("Template substitution failed: {0}")]
    HtmlReplace(String),

    /// HTML to PDF rendering failed
    #[error("PDF generation failed: {0}")]
    PdfGeneration(String),

    /// Confirmation message not accepted by the provider
    #[error("SMS delivery failed: {0}")]
    SmsSend(String),

    /// Composite hash could not be computed
    #[error("Hash binding failed: {0}")]
    Binding(#[from] BindingError),

    /// Stamp could not be applied or moved into place
    #[error("Stamp application failed: {0}")]
    StampApplication(String),

    /// Configuration is incomplete or unreadable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Credentials could not be persisted
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Render worker is not running
    #[error("Service unavailable: {0}")]
    ServiceShutdown(String),

    /// Unexpected failure, including a panic inside a collaborator
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SigningError {
    pub fn file_io(context: impl Into<String>, source: io::Error) -> Self {
        SigningError::FileIo {
            context: context.into(),
            source,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SigningError::InvalidAuthToken | SigningError::AuthenticationFailed(_) => {
                ErrorKind::Unauthorized
            }
            SigningError::InvalidUserData(_) | SigningError::InvalidJson(_) => {
                ErrorKind::InvalidInput
            }
            SigningError::FileIo { .. } => ErrorKind::Io,
            SigningError::HtmlReplace(_) => ErrorKind::Template,
            SigningError::PdfGeneration(_) => ErrorKind::Rendering,
            SigningError::SmsSend(_) => ErrorKind::Delivery,
            SigningError::Binding(_) => ErrorKind::Binding,
            SigningError::StampApplication(_) => ErrorKind::Stamping,
            SigningError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            SigningError::Credentials(_) => ErrorKind::Credentials,
            SigningError::ServiceShutdown(_) => ErrorKind::ServiceUnavailable,
            SigningError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            SigningError::InvalidAuthToken => "INVALID_AUTH_TOKEN",
            SigningError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            SigningError::InvalidUserData(_) => "INVALID_USER_DATA",
            SigningError::InvalidJson(_) => "INVALID_JSON",
            SigningError::FileIo { .. } => "FILE_IO_ERROR",
            SigningError::HtmlReplace(_) => "HTML_REPLACE_ERROR",
            SigningError::PdfGeneration(_) => "PDF_GENERATION_ERROR",
            SigningError::SmsSend(_) => "SMS_SEND_ERROR",
            SigningError::Binding(_) => "HASH_BINDING_ERROR",
            SigningError::StampApplication(_) => "STAMP_APPLICATION_ERROR",
            SigningError::InvalidConfig(_) => "INVALID_CONFIG",
            SigningError::Credentials(_) => "CREDENTIALS_ERROR",
            SigningError::ServiceShutdown(_) => "SERVICE_SHUTDOWN",
            SigningError::Internal(_) => "UNKNOWN_ERROR",
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            SigningError::Internal(msg) => {
                tracing::error!(message = %msg, "Signing internal error");
            }
            SigningError::FileIo { context, source } => {
                tracing::error!(context = %context, error = %source, "Signing I/O error");
            }
            SigningError::InvalidAuthToken | SigningError::AuthenticationFailed(_) => {
                tracing::warn!(code = self.code(), "Signing request rejected");
            }
            e if e.kind().is_caller_error() => {
                tracing::debug!(code = self.code(), error = %self, "Signing request invalid");
            }
            _ => {
                tracing::error!(code = self.code(), error = %self, "Signing step failed");
            }
        }
    }

    /// Convert to AppError
    pub fn to_app_error(self) -> AppError {
        self.into()
    }
}

impl From<SigningError> for AppError {
    fn from(err: SigningError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let app = AppError::new(kind, message);
        match err {
            SigningError::InvalidAuthToken => {
                app.with_action("Check the auth token passed to the service")
            }
            SigningError::InvalidUserData(_) => {
                app.with_action("Fill in the required fields of the user data file")
            }
            SigningError::FileIo { source, .. } => app.with_source(source),
            SigningError::InvalidJson(source) => app.with_source(source),
            SigningError::Binding(source) => app.with_source(source),
            _ => app,
        }
    }
}

// ============================================================================
// Collaborator errors
// ============================================================================

/// Failure reported by a rendering, stamping, templating or messaging backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PDF structure error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("{0}")]
    Failed(String),
}

impl BackendError {
    pub fn failed(message: impl Into<String>) -> Self {
        BackendError::Failed(message.into())
    }
}

/// Failure reported by the render worker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// `initialize` has not been called
    #[error("Render worker not initialized")]
    NotInitialized,

    /// The worker is shutting down or has stopped
    #[error("Render worker is shut down")]
    ShutDown,

    /// Engine startup failed on the worker thread
    #[error("Render engine failed to start: {0}")]
    StartupFailed(String),

    /// The backend failed this task
    #[error("Render failed: {0}")]
    Failed(String),
}

/// Failure while computing a composite hash
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("Document is empty")]
    EmptyDocument,

    #[error("Metadata field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("Document unreadable: {0}")]
    Unreadable(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_codes() {
        assert_eq!(SigningError::InvalidAuthToken.kind(), ErrorKind::Unauthorized);
        assert_eq!(SigningError::InvalidAuthToken.code(), "INVALID_AUTH_TOKEN");
        assert_eq!(
            SigningError::InvalidUserData("phone".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            SigningError::StampApplication("x".into()).code(),
            "STAMP_APPLICATION_ERROR"
        );
        assert_eq!(
            SigningError::Binding(BindingError::EmptyDocument).kind(),
            ErrorKind::Binding
        );
    }

    #[test]
    fn test_into_app_error_keeps_kind_and_source() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let app: AppError = SigningError::file_io("reading template", io_err).into();
        assert_eq!(app.kind(), ErrorKind::Io);
        assert!(std::error::Error::source(&app).is_some());
        assert!(app.message().contains("reading template"));

        let app = SigningError::InvalidAuthToken.to_app_error();
        assert!(app.action().is_some());
        assert_eq!(app.exit_code(), 2);
    }
}
