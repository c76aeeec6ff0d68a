//! Application Configuration
//!
//! Configuration for the signing pipeline, read from an INI-style
//! `key=value` file or a JSON object with the same keys.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SigningError, SigningResult};

/// Signing service configuration
///
/// The pipeline holds one snapshot and replaces it wholesale on
/// `update_config`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTML document template with textual placeholders
    pub html_template_path: PathBuf,
    /// SMS text template containing `{code}`
    pub message_template_path: PathBuf,
    /// `KEY=value` file with provider credentials
    #[serde(alias = "env_file_path")]
    pub credentials_path: PathBuf,
    /// Audit log file
    pub log_file_path: PathBuf,
    /// Scratch directory for per-call temp files
    pub temp_dir: PathBuf,
    /// Directory receiving signed documents
    #[serde(alias = "output_pdf_dir")]
    pub output_dir: PathBuf,
    /// Shared secret every caller must present
    pub auth_token: String,
    /// Maximum number of cached templates
    pub template_cache_capacity: usize,
    /// SMS provider request timeout in seconds
    pub sms_timeout_secs: u64,
    /// Whether the audit log starts enabled
    pub logging_enabled: bool,
    /// Let `LOG_ON` / `LOG_OFF` in place of a code toggle logging
    pub control_codes_enabled: bool,
    /// HTML to PDF executable; read once at startup
    pub renderer_binary: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            html_template_path: PathBuf::new(),
            message_template_path: PathBuf::new(),
            credentials_path: PathBuf::new(),
            log_file_path: PathBuf::new(),
            temp_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            auth_token: String::new(),
            template_cache_capacity: platform::template_cache::DEFAULT_CAPACITY,
            sms_timeout_secs: 10,
            logging_enabled: true,
            control_codes_enabled: false,
            renderer_binary: PathBuf::from("wkhtmltopdf"),
        }
    }
}

impl ServiceConfig {
    /// Read and validate a config file
    ///
    /// `.json` files are parsed as JSON, everything else as INI.
    pub fn load(path: &Path) -> SigningResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SigningError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str::<Self>(&text)
                .map_err(|e| SigningError::InvalidConfig(format!("{}: {e}", path.display())))?
        } else {
            Self::from_ini_str(&text)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse `key=value` lines
    ///
    /// Blank lines and lines starting with `#` or `;` are skipped. Unknown
    /// keys are ignored with a warning.
    pub fn from_ini_str(text: &str) -> SigningResult<Self> {
        let mut config = Self::default();

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!(line = number + 1, "Skipping config line without '='");
                continue;
            };
            config.apply(key.trim(), value.trim(), number + 1)?;
        }

        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str, line: usize) -> SigningResult<()> {
        match key {
            "html_template_path" => self.html_template_path = value.into(),
            "message_template_path" => self.message_template_path = value.into(),
            "credentials_path" | "env_file_path" => self.credentials_path = value.into(),
            "log_file_path" => self.log_file_path = value.into(),
            "temp_dir" => self.temp_dir = value.into(),
            "output_dir" | "output_pdf_dir" => self.output_dir = value.into(),
            "auth_token" => self.auth_token = value.to_string(),
            "template_cache_capacity" => {
                self.template_cache_capacity = parse_number(key, value, line)?
            }
            "sms_timeout_secs" => self.sms_timeout_secs = parse_number(key, value, line)?,
            "logging_enabled" => self.logging_enabled = parse_bool(key, value, line)?,
            "control_codes_enabled" => self.control_codes_enabled = parse_bool(key, value, line)?,
            "renderer_binary" => self.renderer_binary = value.into(),
            // Accepted for compatibility; fonts are resolved by the renderer
            "fonts_path" => {}
            _ => tracing::warn!(key = %key, line, "Ignoring unknown config key"),
        }
        Ok(())
    }

    /// Check that the settings every signing call needs are present
    pub fn validate(&self) -> SigningResult<()> {
        let required = [
            ("auth_token", self.auth_token.is_empty()),
            ("html_template_path", self.html_template_path.as_os_str().is_empty()),
            ("log_file_path", self.log_file_path.as_os_str().is_empty()),
            ("temp_dir", self.temp_dir.as_os_str().is_empty()),
            ("output_dir", self.output_dir.as_os_str().is_empty()),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, empty)| *empty)
            .map(|(key, _)| *key)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SigningError::InvalidConfig(format!(
                "missing required keys: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn sms_timeout(&self) -> Duration {
        Duration::from_secs(self.sms_timeout_secs)
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("html_template_path", &self.html_template_path)
            .field("message_template_path", &self.message_template_path)
            .field("credentials_path", &self.credentials_path)
            .field("log_file_path", &self.log_file_path)
            .field("temp_dir", &self.temp_dir)
            .field("output_dir", &self.output_dir)
            .field("auth_token", &"[REDACTED]")
            .field("template_cache_capacity", &self.template_cache_capacity)
            .field("sms_timeout_secs", &self.sms_timeout_secs)
            .field("logging_enabled", &self.logging_enabled)
            .field("control_codes_enabled", &self.control_codes_enabled)
            .field("renderer_binary", &self.renderer_binary)
            .finish()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str, line: usize) -> SigningResult<T> {
    value.parse().map_err(|_| {
        SigningError::InvalidConfig(format!("line {line}: `{key}` expects a number, got `{value}`"))
    })
}

fn parse_bool(key: &str, value: &str, line: usize) -> SigningResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(SigningError::InvalidConfig(format!(
            "line {line}: `{key}` expects true/false, got `{value}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INI: &str = "\
# signing service
html_template_path = templates/contract.html
message_template_path=templates/sms.txt
env_file_path=.env.iqsms
log_file_path=logs/service.log
temp_dir=/tmp/signer
output_pdf_dir=out
auth_token=secret-token
fonts_path=fonts
; tuning
template_cache_capacity=8
control_codes_enabled=yes
";

    #[test]
    fn test_parse_ini_with_legacy_keys() {
        let config = ServiceConfig::from_ini_str(INI).unwrap();
        assert_eq!(config.html_template_path, PathBuf::from("templates/contract.html"));
        assert_eq!(config.credentials_path, PathBuf::from(".env.iqsms"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.auth_token, "secret-token");
        assert_eq!(config.template_cache_capacity, 8);
        assert!(config.control_codes_enabled);
        assert!(config.logging_enabled);
        assert_eq!(config.sms_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_lists_missing_keys() {
        let config = ServiceConfig::from_ini_str("auth_token=x\n").unwrap();
        let err = config.validate().unwrap_err();
        let SigningError::InvalidConfig(message) = err else {
            panic!("unexpected error");
        };
        assert!(message.contains("html_template_path"));
        assert!(message.contains("temp_dir"));
        assert!(!message.contains("auth_token"));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(ServiceConfig::from_ini_str("sms_timeout_secs=soon").is_err());
        assert!(ServiceConfig::from_ini_str("logging_enabled=maybe").is_err());
        // Lines without '=' are skipped
        assert!(ServiceConfig::from_ini_str("just text").is_ok());
    }

    #[test]
    fn test_load_ini_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let ini = dir.path().join("service.ini");
        std::fs::write(&ini, INI).unwrap();
        assert_eq!(ServiceConfig::load(&ini).unwrap().auth_token, "secret-token");

        let json = dir.path().join("service.json");
        std::fs::write(
            &json,
            r#"{"html_template_path":"t.html","log_file_path":"s.log","temp_dir":"tmp",
                "output_pdf_dir":"out","auth_token":"json-token"}"#,
        )
        .unwrap();
        let config = ServiceConfig::load(&json).unwrap();
        assert_eq!(config.auth_token, "json-token");
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.template_cache_capacity, 100);

        assert!(matches!(
            ServiceConfig::load(&dir.path().join("absent.ini")),
            Err(SigningError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ServiceConfig::from_ini_str(INI).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
