//! Backend Traits
//!
//! Interfaces for the external collaborators the pipeline drives.
//! Implementations are in infrastructure layer.

use std::path::Path;

use crate::domain::entities::StampPayload;
use crate::domain::value_objects::ProviderStatus;
use crate::error::BackendError;

/// HTML to PDF engine
///
/// Engines are not reentrant and may keep thread-affine state, so an
/// instance is created, started, used and torn down on the render worker
/// thread only.
pub trait RenderBackend {
    /// One-time engine initialization
    fn startup(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Render `html_path` into `pdf_path`
    fn render(&mut self, html_path: &Path, pdf_path: &Path) -> Result<(), BackendError>;

    /// Release engine resources
    fn teardown(&mut self) {}
}

/// Writes the visible signature stamp into a PDF
pub trait StampBackend: Send + Sync {
    fn apply_stamp(
        &self,
        input_pdf: &Path,
        output_pdf: &Path,
        payload: &StampPayload,
    ) -> Result<(), BackendError>;

    /// Recover the pre-stamp document bytes and the stamp contents
    fn read_stamp(&self, stamped_pdf: &Path) -> Result<(Vec<u8>, StampPayload), BackendError> {
        let _ = stamped_pdf;
        Err(BackendError::failed("this stamper cannot read stamps back"))
    }
}

/// Produces populated HTML from a template
pub trait TemplatePopulator: Send + Sync {
    /// Literal find-and-replace of every field key with its value
    fn populate(
        &self,
        template_path: &Path,
        fields: &[(&str, &str)],
    ) -> Result<String, BackendError>;
}

/// SMS provider client
///
/// Implementations may hold cached configuration that is refreshed on use,
/// hence `&mut self`. The pipeline serializes access behind one lock.
pub trait MessagingBackend: Send {
    /// Random numeric confirmation code of `length` digits
    fn generate_code(&self, length: usize) -> String {
        platform::crypto::random_digits(length)
    }

    /// Send the confirmation message carrying `code`
    fn send_confirmation(
        &mut self,
        phone: &str,
        code: &str,
    ) -> Result<ProviderStatus, BackendError>;

    /// Send free text
    fn send_message(&mut self, phone: &str, text: &str) -> Result<ProviderStatus, BackendError>;

    /// Raw delivery status of a previously sent message
    fn check_status(&mut self, message_id: &str) -> Result<String, BackendError>;

    /// Persist new provider credentials and start using them
    fn set_credentials(&mut self, login: &str, password: &str) -> Result<(), BackendError>;
}
