//! Document Signing Module
//!
//! Clean Architecture structure:
//! - `domain/` - Identity, stamp payload, composite hash binding, backend traits
//! - `application/` - Configuration and the signing pipeline
//! - `infra/` - Render worker, wkhtmltopdf, templates, IQSMS, incremental stamper
//!
//! ## Security Model
//! - Every pipeline operation checks the shared auth token before doing any work
//! - The confirmation code, phone, signer name and signing time are bound to the
//!   rendered document by one SHA-256 digest printed into the stamp
//! - Only a fully stamped document ever reaches the output directory
//! - `LOG_ON` / `LOG_OFF` are never accepted as confirmation codes

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::ServiceConfig;
pub use application::pipeline::{DEFAULT_CODE_LENGTH, DefaultSigningPipeline, SigningPipeline};
pub use domain::entities::{Identity, SigningOutcome, ValidationMode};
pub use domain::services::HashBinder;
pub use error::{SigningError, SigningResult};
pub use infra::render_worker::{RenderStats, RenderWorker};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult, ResultExt},
    kind::ErrorKind,
};
