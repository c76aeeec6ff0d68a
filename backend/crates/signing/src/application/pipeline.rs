//! Signing Pipeline Use Case
//!
//! Orchestrates one signing call end to end: authorization, identity
//! validation, document preparation, confirmation delivery, composite hash,
//! stamping and cleanup. Every step short-circuits with a [`SigningError`];
//! scratch files are removed on every exit path, including a panic inside a
//! collaborator.

use std::any::Any;
use std::path::Path;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use kernel::id::SigningRequestId;
use parking_lot::{Mutex, RwLock};
use platform::crypto::constant_time_eq;
use platform::fs::{self as pfs, TempFiles, UniqueNamer};
use platform::log_sink::{LogSink, Severity};
use platform::template_cache::TemplateCache;
use platform::time;

use crate::application::config::ServiceConfig;
use crate::domain::backend::{MessagingBackend, StampBackend, TemplatePopulator};
use crate::domain::entities::{
    ConfirmationContext, Identity, PreparedDocument, SigningOutcome, StampPayload, ValidationMode,
};
use crate::domain::services::{BindingFields, HASH_ALGORITHM, HashBinder};
use crate::domain::value_objects::{ControlCode, ProviderStatus};
use crate::error::{BackendError, RenderError, SigningError, SigningResult};
use crate::infra::iqsms::IqSmsClient;
use crate::infra::render_worker::{RenderStats, RenderWorker};
use crate::infra::stamper::IncrementalStamper;
use crate::infra::template::FileTemplatePopulator;
use crate::infra::wkhtmltopdf::{RenderOptions, WkHtmlToPdfRenderer};

/// Length of generated confirmation codes
pub const DEFAULT_CODE_LENGTH: usize = 4;

/// Signing pipeline
///
/// Safe to share between threads; concurrent `sign_document` calls only
/// serialize on the render worker and the messaging client.
pub struct SigningPipeline<M, S, P>
where
    M: MessagingBackend,
    S: StampBackend,
    P: TemplatePopulator,
{
    config: RwLock<ServiceConfig>,
    messaging: Mutex<M>,
    stamper: S,
    populator: P,
    renderer: Arc<RenderWorker>,
    log: Arc<LogSink>,
    namer: UniqueNamer,
}

impl<M, S, P> SigningPipeline<M, S, P>
where
    M: MessagingBackend,
    S: StampBackend,
    P: TemplatePopulator,
{
    /// Wire the pipeline; `renderer` should already be initialized
    pub fn new(
        config: ServiceConfig,
        messaging: M,
        stamper: S,
        populator: P,
        renderer: Arc<RenderWorker>,
        log: Arc<LogSink>,
    ) -> Self {
        if config.logging_enabled {
            log.enable();
        }
        Self {
            config: RwLock::new(config),
            messaging: Mutex::new(messaging),
            stamper,
            populator,
            renderer,
            log,
            namer: UniqueNamer::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Signing
    // ------------------------------------------------------------------------

    /// Sign a document for `identity` confirmed by `confirmation_code`
    ///
    /// In `test_mode` no SMS is sent; everything else runs as usual.
    pub fn sign_document(
        &self,
        token: &str,
        test_mode: bool,
        mode: ValidationMode,
        identity: &Identity,
        confirmation_code: &str,
    ) -> SigningResult<SigningOutcome> {
        self.authorize(token)?;

        let request_id = SigningRequestId::new();
        self.audit(
            Severity::Info,
            format!("[{request_id}] Signing started (test mode: {test_mode})"),
        );

        let result = catch_unwind(AssertUnwindSafe(|| {
            self.run_signing(request_id, test_mode, mode, identity, confirmation_code)
        }))
        .unwrap_or_else(|payload| Err(SigningError::Internal(panic_message(payload.as_ref()))));

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    request_id = %request_id,
                    hash = %outcome.document_hash,
                    output = %outcome.signed_pdf_path.display(),
                    "Document signed"
                );
                self.audit(
                    Severity::Success,
                    format!(
                        "[{request_id}] Document signed: {} ({})",
                        outcome.signed_pdf_path.display(),
                        outcome.document_hash
                    ),
                );
            }
            Err(e) => {
                e.log();
                self.audit(
                    Severity::Error,
                    format!("[{request_id}] Signing failed [{}]: {e}", e.code()),
                );
            }
        }
        result
    }

    fn run_signing(
        &self,
        request_id: SigningRequestId,
        test_mode: bool,
        mode: ValidationMode,
        identity: &Identity,
        code: &str,
    ) -> SigningResult<SigningOutcome> {
        if let Some(control) = ControlCode::parse(code) {
            if self.config.read().control_codes_enabled {
                self.apply_logging(control.enables_logging());
            }
            return Err(SigningError::AuthenticationFailed(
                "reserved control code cannot confirm a signature".to_string(),
            ));
        }

        identity.validate(mode)?;

        // Everything tracked here is deleted when `scratch` drops
        let mut scratch = TempFiles::new();
        let prepared = self.prepare_document(identity, &mut scratch)?;
        self.audit(
            Severity::Info,
            format!("[{request_id}] Document rendered: {}", prepared.pdf_path.display()),
        );

        let message_id = if test_mode {
            self.audit(
                Severity::Info,
                format!("[{request_id}] Test mode: confirmation SMS not sent"),
            );
            None
        } else {
            let status = self.deliver_confirmation(&identity.phone_number, code)?;
            self.audit(
                Severity::Info,
                format!(
                    "[{request_id}] Confirmation SMS accepted, id {}",
                    status.message_id
                ),
            );
            self.audit_delivery_status(request_id, &status.message_id);
            Some(status.message_id)
        };

        let confirmation = ConfirmationContext {
            phone: identity.phone_number.clone(),
            code: code.to_string(),
            signed_at: time::moscow_timestamp(),
        };
        let full_name = identity.full_name();
        let hash = HashBinder::compute_file(
            &prepared.pdf_path,
            &BindingFields {
                name: &full_name,
                phone: &confirmation.phone,
                code: &confirmation.code,
                signing_time: &confirmation.signed_at,
            },
        )?;
        let document_hash = HashBinder::to_hex(&hash);
        tracing::debug!(request_id = %request_id, hash = %document_hash, "Composite hash bound");

        let payload =
            StampPayload::new(identity, &confirmation, document_hash.clone(), HASH_ALGORITHM);
        let signed_pdf_path = self.stamp(&prepared, &payload, &mut scratch)?;

        Ok(SigningOutcome::new(
            request_id,
            identity,
            confirmation,
            document_hash,
            signed_pdf_path,
            message_id,
        ))
    }

    /// Populate the template and render it into a scratch PDF
    fn prepare_document(
        &self,
        identity: &Identity,
        scratch: &mut TempFiles,
    ) -> SigningResult<PreparedDocument> {
        let (template_path, temp_dir) = {
            let config = self.config.read();
            (config.html_template_path.clone(), config.temp_dir.clone())
        };
        pfs::ensure_dir(&temp_dir)
            .map_err(|e| SigningError::file_io(format!("creating {}", temp_dir.display()), e))?;

        let html_path = scratch.track(temp_dir.join(self.namer.next_name("template_", ".html")));
        let pdf_path =
            scratch.track(temp_dir.join(self.namer.next_name("temp_document_", ".pdf")));

        let html = guarded("template populator", || {
            self.populator.populate(&template_path, &identity.fields())
        })
        .map_err(|e| SigningError::HtmlReplace(e.to_string()))?;
        std::fs::write(&html_path, html)
            .map_err(|e| SigningError::file_io(format!("writing {}", html_path.display()), e))?;

        self.renderer
            .convert_sync(&html_path, &pdf_path)
            .map_err(render_error)?;

        Ok(PreparedDocument { html_path, pdf_path })
    }

    fn deliver_confirmation(&self, phone: &str, code: &str) -> SigningResult<ProviderStatus> {
        let status = guarded("messaging backend", || {
            self.messaging.lock().send_confirmation(phone, code)
        })
        .map_err(|e| SigningError::SmsSend(e.to_string()))?;
        ensure_accepted(status)
    }

    /// Query the provider once for the delivery status and audit it
    ///
    /// A failed query is logged and never fails the signing call.
    fn audit_delivery_status(&self, request_id: SigningRequestId, message_id: &str) {
        if message_id.is_empty() {
            return;
        }
        match guarded("messaging backend", || {
            self.messaging.lock().check_status(message_id)
        }) {
            Ok(status) => self.audit(
                Severity::Info,
                format!("[{request_id}] Delivery status of {message_id}: {status}"),
            ),
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Delivery status unavailable");
                self.audit(
                    Severity::Warning,
                    format!("[{request_id}] Delivery status of {message_id} unavailable: {e}"),
                );
            }
        }
    }

    /// Stamp into scratch, then move the finished file into the output dir
    fn stamp(
        &self,
        prepared: &PreparedDocument,
        payload: &StampPayload,
        scratch: &mut TempFiles,
    ) -> SigningResult<std::path::PathBuf> {
        let (temp_dir, output_dir) = {
            let config = self.config.read();
            (config.temp_dir.clone(), config.output_dir.clone())
        };
        let stamped = scratch.track(temp_dir.join(self.namer.next_name("signed_", ".pdf")));
        guarded("stamp backend", || {
            self.stamper.apply_stamp(&prepared.pdf_path, &stamped, payload)
        })
        .map_err(|e| SigningError::StampApplication(e.to_string()))?;

        pfs::ensure_dir(&output_dir)
            .map_err(|e| SigningError::file_io(format!("creating {}", output_dir.display()), e))?;
        let destination = output_dir.join(self.namer.next_name("signed_document_", ".pdf"));
        pfs::move_file(&stamped, &destination).map_err(|e| {
            SigningError::StampApplication(format!(
                "cannot move signed document to {}: {e}",
                destination.display()
            ))
        })?;
        Ok(destination)
    }

    // ------------------------------------------------------------------------
    // Administrative operations
    // ------------------------------------------------------------------------

    /// Random numeric code from the messaging backend's generator
    pub fn generate_confirmation_code(&self, token: &str, length: usize) -> SigningResult<String> {
        self.authorize(token)?;
        if length == 0 {
            return Err(SigningError::InvalidUserData(
                "confirmation code length must be positive".to_string(),
            ));
        }
        Ok(self.messaging.lock().generate_code(length))
    }

    /// Replace the configuration snapshot
    ///
    /// Paths are not checked. A changed log file path rebinds the audit log;
    /// if the new file cannot be opened the old binding is kept.
    pub fn update_config(&self, token: &str, new_config: ServiceConfig) -> SigningResult<()> {
        self.authorize(token)?;

        let previous_log = self.config.read().log_file_path.clone();
        let new_log = &new_config.log_file_path;
        if *new_log != previous_log && !new_log.as_os_str().is_empty() {
            if let Err(e) = self.log.set_file_path(new_log.clone()) {
                tracing::warn!(error = %e, "Audit log kept on previous file");
            }
        }

        *self.config.write() = new_config;
        tracing::info!("Configuration updated");
        self.audit(Severity::Info, "Configuration updated");
        Ok(())
    }

    /// Persist new SMS provider credentials
    pub fn set_messaging_credentials(
        &self,
        token: &str,
        login: &str,
        password: &str,
    ) -> SigningResult<bool> {
        self.authorize(token)?;
        if login.is_empty() || password.is_empty() {
            return Err(SigningError::Credentials(
                "login and password must not be empty".to_string(),
            ));
        }

        guarded("messaging backend", || {
            self.messaging.lock().set_credentials(login, password)
        })
        .map_err(|e| SigningError::Credentials(e.to_string()))?;

        self.audit(Severity::Success, format!("Messaging credentials updated for {login}"));
        Ok(true)
    }

    /// Turn the audit log on or off
    pub fn set_logging(&self, token: &str, enabled: bool) -> SigningResult<()> {
        self.authorize(token)?;
        self.apply_logging(enabled);
        Ok(())
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.log.is_enabled()
    }

    /// Send free text through the messaging backend
    pub fn send_message(
        &self,
        token: &str,
        test_mode: bool,
        phone: &str,
        text: &str,
    ) -> SigningResult<ProviderStatus> {
        self.authorize(token)?;
        if phone.trim().is_empty() {
            return Err(SigningError::InvalidUserData("phone_number".to_string()));
        }
        if test_mode {
            self.audit(Severity::Info, format!("Test mode: message to {phone} not sent"));
            return Ok(ProviderStatus::accepted(String::new()));
        }

        let status = guarded("messaging backend", || {
            self.messaging.lock().send_message(phone, text)
        })
        .map_err(|e| SigningError::SmsSend(e.to_string()))?;
        let status = ensure_accepted(status)?;
        self.audit(
            Severity::Success,
            format!("Message to {phone} accepted, id {}", status.message_id),
        );
        Ok(status)
    }

    /// Raw provider status of a sent message
    pub fn check_message_status(&self, token: &str, message_id: &str) -> SigningResult<String> {
        self.authorize(token)?;
        guarded("messaging backend", || {
            self.messaging.lock().check_status(message_id)
        })
        .map_err(|e| SigningError::SmsSend(e.to_string()))
    }

    /// Re-derive the composite hash of a signed document and compare it
    /// with the hash recorded in its stamp
    pub fn verify_signed_document(&self, signed_pdf: &Path) -> SigningResult<bool> {
        verify_stamped_document(&self.stamper, signed_pdf)
    }

    pub fn render_stats(&self) -> RenderStats {
        self.renderer.stats()
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> ServiceConfig {
        self.config.read().clone()
    }

    /// Stop the render worker and flush the audit log
    pub fn shutdown(&self) {
        self.renderer.shutdown(true);
        self.log.shutdown();
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn authorize(&self, token: &str) -> SigningResult<()> {
        let ok = {
            let config = self.config.read();
            !config.auth_token.is_empty()
                && constant_time_eq(token.as_bytes(), config.auth_token.as_bytes())
        };
        if ok {
            Ok(())
        } else {
            self.audit(Severity::Error, "Rejected call with invalid auth token");
            Err(SigningError::InvalidAuthToken)
        }
    }

    fn apply_logging(&self, enabled: bool) {
        if enabled {
            self.log.enable();
            self.audit(Severity::Info, "Logging enabled");
        } else {
            self.audit(Severity::Info, "Logging disabled");
            self.log.disable();
        }
        tracing::info!(enabled, "Audit logging toggled");
    }

    fn audit(&self, severity: Severity, message: impl Into<String>) {
        self.log.log(severity, message);
    }
}

// ============================================================================
// Default wiring
// ============================================================================

/// Pipeline over the production backends
pub type DefaultSigningPipeline =
    SigningPipeline<IqSmsClient, IncrementalStamper, FileTemplatePopulator>;

impl DefaultSigningPipeline {
    /// Build every backend from `config` and start the render worker
    ///
    /// Must not be called from inside an async runtime.
    pub fn from_config(config: ServiceConfig) -> SigningResult<Self> {
        let log = LogSink::new(config.log_file_path.clone())
            .map_err(|e| SigningError::InvalidConfig(e.to_string()))?;

        let messaging = IqSmsClient::new(
            config.credentials_path.clone(),
            config.message_template_path.clone(),
            config.sms_timeout(),
        )
        .map_err(|e| SigningError::InvalidConfig(format!("messaging client: {e}")))?;

        let cache = Arc::new(TemplateCache::new(config.template_cache_capacity));
        let binary = config.renderer_binary.clone();
        let renderer = Arc::new(RenderWorker::new(move || {
            WkHtmlToPdfRenderer::new(binary.clone(), RenderOptions::default())
        }));
        renderer.initialize().map_err(render_error)?;

        tracing::info!(
            temp_dir = %config.temp_dir.display(),
            output_dir = %config.output_dir.display(),
            "Signing pipeline ready"
        );
        Ok(Self::new(
            config,
            messaging,
            IncrementalStamper::new(),
            FileTemplatePopulator::new(cache),
            renderer,
            Arc::new(log),
        ))
    }
}

// ============================================================================
// Free helpers
// ============================================================================

/// Check a stamped document against the hash recorded in its own stamp
///
/// Needs no configuration, so it also serves callers that hold only a
/// stamper.
pub fn verify_stamped_document<S: StampBackend>(
    stamper: &S,
    signed_pdf: &Path,
) -> SigningResult<bool> {
    let (original, payload) = guarded("stamp backend", || stamper.read_stamp(signed_pdf))
        .map_err(|e| SigningError::StampApplication(e.to_string()))?;

    let mut document: &[u8] = &original;
    let matches = HashBinder::verify(
        &mut document,
        &BindingFields {
            name: &payload.full_name,
            phone: &payload.phone,
            code: &payload.confirmation_code,
            signing_time: &payload.signed_at,
        },
        &payload.document_hash,
    )?;

    tracing::info!(path = %signed_pdf.display(), matches, "Signed document verified");
    Ok(matches)
}

/// Run a backend call, turning a panic into a backend failure
fn guarded<T>(
    backend: &str,
    call: impl FnOnce() -> Result<T, BackendError>,
) -> Result<T, BackendError> {
    catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(BackendError::failed(format!(
            "{backend} panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn ensure_accepted(status: ProviderStatus) -> SigningResult<ProviderStatus> {
    if status.is_accepted() {
        return Ok(status);
    }
    Err(SigningError::SmsSend(match &status.description {
        Some(description) => format!("provider status {}: {description}", status.status),
        None => format!("provider status {}", status.status),
    }))
}

fn render_error(err: RenderError) -> SigningError {
    match err {
        RenderError::NotInitialized | RenderError::ShutDown => {
            SigningError::ServiceShutdown(err.to_string())
        }
        RenderError::StartupFailed(_) | RenderError::Failed(_) => {
            SigningError::PdfGeneration(err.to_string())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_status_maps_to_sms_error() {
        let err = ensure_accepted(ProviderStatus::rejected("error", "invalid phone")).unwrap_err();
        assert_eq!(err.code(), "SMS_SEND_ERROR");
        assert!(err.to_string().contains("invalid phone"));
        assert!(ensure_accepted(ProviderStatus::accepted("42")).is_ok());
    }

    #[test]
    fn test_render_error_mapping() {
        assert_eq!(render_error(RenderError::NotInitialized).code(), "SERVICE_SHUTDOWN");
        assert_eq!(render_error(RenderError::ShutDown).code(), "SERVICE_SHUTDOWN");
        assert_eq!(
            render_error(RenderError::Failed("boom".into())).code(),
            "PDF_GENERATION_ERROR"
        );
    }

    #[test]
    fn test_guarded_catches_panics() {
        let result: Result<(), BackendError> = guarded("stamp backend", || panic!("bad page"));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("stamp backend panicked"));
        assert!(message.contains("bad page"));
    }
}
