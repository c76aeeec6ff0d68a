//! Domain Entities

use std::path::PathBuf;

use kernel::id::SigningRequestId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SigningError, SigningResult};

// ============================================================================
// Identity
// ============================================================================

/// How strictly an [`Identity`] is checked before signing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Full name and phone number
    #[default]
    Minimal,
    /// Every identity field, including passport data and email
    AllFields,
}

/// Signer identity as supplied in the user data file
///
/// Missing keys deserialize to empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub passport_number: String,
    pub passport_series: String,
    pub passport_unite_code: String,
    pub passport_issued_by: String,
    pub passport_issued_date: String,
    pub passport_birthday_date: String,
    pub passport_birthday_place: String,
    pub passport_registration_address: String,
    pub passport_registration_date: String,
}

impl Identity {
    /// Parse a user data JSON object
    ///
    /// Non-string values (numeric passport numbers, for instance) are kept in
    /// their JSON text form; `null` becomes an empty string.
    pub fn from_json_str(json: &str) -> SigningResult<Self> {
        let object: Map<String, Value> = serde_json::from_str(json)?;
        let normalized = object
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key, Value::String(text))
            })
            .collect();
        Ok(serde_json::from_value(Value::Object(normalized))?)
    }

    /// `first middle last`
    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.first_name, self.middle_name, self.last_name
        )
    }

    /// Every field as `(key, value)`, keyed by its user data name
    pub fn fields(&self) -> [(&'static str, &str); 14] {
        [
            ("first_name", &self.first_name),
            ("middle_name", &self.middle_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("phone_number", &self.phone_number),
            ("passport_number", &self.passport_number),
            ("passport_series", &self.passport_series),
            ("passport_unite_code", &self.passport_unite_code),
            ("passport_issued_by", &self.passport_issued_by),
            ("passport_issued_date", &self.passport_issued_date),
            ("passport_birthday_date", &self.passport_birthday_date),
            ("passport_birthday_place", &self.passport_birthday_place),
            (
                "passport_registration_address",
                &self.passport_registration_address,
            ),
            ("passport_registration_date", &self.passport_registration_date),
        ]
    }

    /// Reject the identity if any field required by `mode` is blank
    pub fn validate(&self, mode: ValidationMode) -> SigningResult<()> {
        const MINIMAL: [&str; 4] = ["first_name", "middle_name", "last_name", "phone_number"];

        let missing: Vec<&str> = self
            .fields()
            .into_iter()
            .filter(|(key, _)| mode == ValidationMode::AllFields || MINIMAL.contains(key))
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| key)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SigningError::InvalidUserData(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

// ============================================================================
// Pipeline artifacts
// ============================================================================

/// Facts the composite hash binds the document to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationContext {
    pub phone: String,
    pub code: String,
    /// `YYYY-MM-DDTHH:MM:SS+03:00`
    pub signed_at: String,
}

/// Scratch files of one signing call
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub html_path: PathBuf,
    pub pdf_path: PathBuf,
}

/// Result of a fully completed signing call
#[derive(Debug, Clone, Serialize)]
pub struct SigningOutcome {
    pub request_id: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub confirmation_code: String,
    pub signed_at: String,
    pub document_hash: String,
    pub signed_pdf_path: PathBuf,
    /// Provider message id; `None` in test mode
    pub message_id: Option<String>,
}

impl SigningOutcome {
    pub(crate) fn new(
        request_id: SigningRequestId,
        identity: &Identity,
        confirmation: ConfirmationContext,
        document_hash: String,
        signed_pdf_path: PathBuf,
        message_id: Option<String>,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            first_name: identity.first_name.clone(),
            middle_name: identity.middle_name.clone(),
            last_name: identity.last_name.clone(),
            phone_number: confirmation.phone,
            confirmation_code: confirmation.code,
            signed_at: confirmation.signed_at,
            document_hash,
            signed_pdf_path,
            message_id,
        }
    }
}

// ============================================================================
// Stamp
// ============================================================================

/// Everything drawn into the signature stamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampPayload {
    pub full_name: String,
    pub passport_series: String,
    pub passport_number: String,
    pub passport_issued_by: String,
    pub passport_issued_date: String,
    pub passport_unit_code: String,
    pub phone: String,
    pub email: String,
    pub signed_at: String,
    pub confirmation_code: String,
    pub document_hash: String,
    pub hash_algorithm: String,
}

impl StampPayload {
    pub fn new(
        identity: &Identity,
        confirmation: &ConfirmationContext,
        document_hash: String,
        hash_algorithm: &str,
    ) -> Self {
        Self {
            full_name: identity.full_name(),
            passport_series: identity.passport_series.clone(),
            passport_number: identity.passport_number.clone(),
            passport_issued_by: identity.passport_issued_by.clone(),
            passport_issued_date: identity.passport_issued_date.clone(),
            passport_unit_code: identity.passport_unite_code.clone(),
            phone: confirmation.phone.clone(),
            email: identity.email.clone(),
            signed_at: confirmation.signed_at.clone(),
            confirmation_code: confirmation.code.clone(),
            document_hash,
            hash_algorithm: hash_algorithm.to_string(),
        }
    }

    /// Visible stamp text, top to bottom
    ///
    /// Passport, issuer, issue date and email lines appear only when the
    /// corresponding fields are present.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            "Подписано простой электронной подписью".to_string(),
            self.full_name.clone(),
        ];
        if !self.passport_series.is_empty() && !self.passport_number.is_empty() {
            lines.push(format!(
                "Паспортные данные: серия {} номер {}",
                self.passport_series, self.passport_number
            ));
        }
        if !self.passport_issued_by.is_empty() {
            lines.push(format!("Выдан: {}", self.passport_issued_by));
        }
        if !self.passport_issued_date.is_empty() && !self.passport_unit_code.is_empty() {
            lines.push(format!(
                "{}, код подразделения {}",
                self.passport_issued_date, self.passport_unit_code
            ));
        }
        lines.push(format!("Номер телефона: {}", self.phone));
        if !self.email.is_empty() {
            lines.push(format!("Эл. почта: {}", self.email));
        }
        lines.push(format!(
            "Дата и время подписания по МСК: {}",
            self.signed_at
        ));
        lines.push(format!(
            "СМС-код {} и хэш-код по документу ({})",
            self.confirmation_code, self.hash_algorithm
        ));
        lines.push(self.document_hash.clone());
        lines
    }
}
