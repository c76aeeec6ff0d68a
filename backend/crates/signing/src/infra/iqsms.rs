//! IQSMS provider client
//!
//! Plain HTTP API: every call is a `POST` with query parameters, answered
//! with `status;id` for sends and a raw status string for lookups.
//! Credentials come from a `KEY=value` file, the message text from a
//! template containing `{code}`. Both are cached and re-read every
//! [`RELOAD_INTERVAL`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::backend::MessagingBackend;
use crate::domain::value_objects::ProviderStatus;
use crate::error::BackendError;

// ============================================================================
// Constants
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "https://api.iqsms.ru/messages/v2/";

/// How long cached credentials and template stay fresh
pub const RELOAD_INTERVAL: Duration = Duration::from_secs(300);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = "MessageService/1.0";
const LOGIN_KEY: &str = "IQSMS_LOGIN=";
const PASSWORD_KEY: &str = "IQSMS_PASSWORD=";
const CODE_PLACEHOLDER: &str = "{code}";

// ============================================================================
// Credentials (Zeroized on drop)
// ============================================================================

/// Provider login and password
///
/// Debug output is redacted and both fields are wiped on drop.
#[derive(Default, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    /// Pick `IQSMS_LOGIN=` / `IQSMS_PASSWORD=` lines out of a `KEY=value` file
    pub fn parse(text: &str) -> Self {
        let mut credentials = Self::default();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if let Some(login) = line.strip_prefix(LOGIN_KEY) {
                credentials.login = login.to_string();
            } else if let Some(password) = line.strip_prefix(PASSWORD_KEY) {
                credentials.password = password.to_string();
            }
        }
        credentials
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn is_complete(&self) -> bool {
        !self.login.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Replace the credential lines of `existing`, keeping every other line
///
/// Missing keys are appended.
pub fn rewrite_credentials(existing: &str, login: &str, password: &str) -> String {
    let mut saw_login = false;
    let mut saw_password = false;
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            if line.starts_with(LOGIN_KEY) {
                saw_login = true;
                format!("{LOGIN_KEY}{login}")
            } else if line.starts_with(PASSWORD_KEY) {
                saw_password = true;
                format!("{PASSWORD_KEY}{password}")
            } else {
                line.to_string()
            }
        })
        .collect();
    if !saw_login {
        lines.push(format!("{LOGIN_KEY}{login}"));
    }
    if !saw_password {
        lines.push(format!("{PASSWORD_KEY}{password}"));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Split a `status;id` send response
pub fn parse_send_response(body: &str) -> ProviderStatus {
    match body.trim().split_once(';') {
        Some((status, id)) => ProviderStatus {
            status: status.trim().to_string(),
            message_id: id.trim().to_string(),
            description: None,
        },
        None => ProviderStatus::rejected("error", format!("unexpected response: {}", body.trim())),
    }
}

// ============================================================================
// Client
// ============================================================================

struct Cached {
    credentials: Credentials,
    template: String,
    loaded_at: Instant,
}

pub struct IqSmsClient {
    http: reqwest::blocking::Client,
    base_url: String,
    credentials_path: PathBuf,
    template_path: PathBuf,
    cached: Option<Cached>,
}

impl IqSmsClient {
    /// Build the client; files are read lazily on first use
    ///
    /// Must not be called from inside an async runtime.
    pub fn new(
        credentials_path: impl Into<PathBuf>,
        template_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials_path: credentials_path.into(),
            template_path: template_path.into(),
            cached: None,
        })
    }

    /// Point the client at another API root (must end with `/`)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Confirmation text for `code`; only the first `{code}` is replaced
    pub fn render_message(&mut self, code: &str) -> Result<String, BackendError> {
        let cached = self.refresh()?;
        Ok(cached.template.replacen(CODE_PLACEHOLDER, code, 1))
    }

    fn refresh(&mut self) -> Result<&Cached, BackendError> {
        let stale = self
            .cached
            .as_ref()
            .is_none_or(|c| c.loaded_at.elapsed() >= RELOAD_INTERVAL);
        if stale {
            let loaded = Self::load(&self.credentials_path, &self.template_path)?;
            tracing::debug!(login = %loaded.credentials.login(), "Messaging config reloaded");
            self.cached = Some(loaded);
        }
        self.cached
            .as_ref()
            .ok_or_else(|| BackendError::failed("messaging config unavailable"))
    }

    fn load(credentials_path: &Path, template_path: &Path) -> Result<Cached, BackendError> {
        let text = std::fs::read_to_string(credentials_path).map_err(|e| {
            BackendError::failed(format!("cannot read {}: {e}", credentials_path.display()))
        })?;
        let credentials = Credentials::parse(&text);
        if !credentials.is_complete() {
            return Err(BackendError::failed(format!(
                "{} lacks IQSMS_LOGIN or IQSMS_PASSWORD",
                credentials_path.display()
            )));
        }
        let template = std::fs::read_to_string(template_path).map_err(|e| {
            BackendError::failed(format!("cannot read {}: {e}", template_path.display()))
        })?;
        Ok(Cached {
            credentials,
            template,
            loaded_at: Instant::now(),
        })
    }

    fn post(&mut self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, BackendError> {
        let url = format!("{}{endpoint}", self.base_url);
        self.refresh()?;
        let cached = self
            .cached
            .as_ref()
            .ok_or_else(|| BackendError::failed("messaging config unavailable"))?;
        let mut query: Vec<(&str, &str)> = vec![
            ("login", cached.credentials.login.as_str()),
            ("password", cached.credentials.password.as_str()),
        ];
        query.extend_from_slice(params);

        let response = self.http.post(&url).query(&query).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(BackendError::failed(format!(
                "provider returned HTTP {status}: {}",
                body.trim()
            )));
        }
        Ok(body)
    }
}

impl MessagingBackend for IqSmsClient {
    fn send_confirmation(
        &mut self,
        phone: &str,
        code: &str,
    ) -> Result<ProviderStatus, BackendError> {
        let text = self.render_message(code)?;
        self.send_message(phone, &text)
    }

    fn send_message(&mut self, phone: &str, text: &str) -> Result<ProviderStatus, BackendError> {
        let body = self.post("send/", &[("phone", phone), ("text", text)])?;
        let status = parse_send_response(&body);
        tracing::info!(
            status = %status.status,
            message_id = %status.message_id,
            "SMS submitted"
        );
        Ok(status)
    }

    fn check_status(&mut self, message_id: &str) -> Result<String, BackendError> {
        let body = self.post("status/", &[("id", message_id)])?;
        Ok(body.trim().to_string())
    }

    fn set_credentials(&mut self, login: &str, password: &str) -> Result<(), BackendError> {
        let existing = match std::fs::read_to_string(&self.credentials_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let mut updated = rewrite_credentials(&existing, login, password);

        let staging = self.credentials_path.with_extension("tmp");
        let written = std::fs::write(&staging, updated.as_bytes())
            .and_then(|()| platform::fs::move_file(&staging, &self.credentials_path));
        updated.zeroize();
        if let Err(e) = written {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }

        self.cached = None;
        self.refresh()?;
        tracing::info!(login = %login, "Messaging credentials updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Answers one HTTP request with `body` and reports the request line
    fn one_shot_server(body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/messages/v2/", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                if header == "\r\n" || header.is_empty() {
                    break;
                }
            }
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
            tx.send(request_line).unwrap();
        });
        (base_url, rx)
    }

    fn write_config(dir: &Path) -> (PathBuf, PathBuf) {
        let credentials = dir.join(".env");
        let template = dir.join("sms.txt");
        std::fs::write(
            &credentials,
            "# provider\nIQSMS_LOGIN=acme\nIQSMS_PASSWORD=s3cret\nOTHER=1\n",
        )
        .unwrap();
        std::fs::write(&template, "Ваш код: {code}. {code} не сообщайте никому").unwrap();
        (credentials, template)
    }

    #[test]
    fn test_parse_credentials() {
        let credentials = Credentials::parse("IQSMS_LOGIN=acme\r\nX=1\nIQSMS_PASSWORD=p=w\n");
        assert_eq!(credentials.login(), "acme");
        assert!(credentials.is_complete());
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("p=w"));
    }

    #[test]
    fn test_rewrite_credentials_keeps_other_lines() {
        let out = rewrite_credentials("A=1\nIQSMS_LOGIN=old\nB=2\n", "new", "pw");
        assert_eq!(out, "A=1\nIQSMS_LOGIN=new\nB=2\nIQSMS_PASSWORD=pw\n");
    }

    #[test]
    fn test_parse_send_response() {
        let accepted = parse_send_response("accepted;A132571BC\n");
        assert!(accepted.is_accepted());
        assert_eq!(accepted.message_id, "A132571BC");

        let refused = parse_send_response("invalid mobile phone;");
        assert!(!refused.is_accepted());
        assert_eq!(refused.status, "invalid mobile phone");

        let garbage = parse_send_response("<html>");
        assert_eq!(garbage.status, "error");
        assert!(garbage.description.unwrap().contains("<html>"));
    }

    #[test]
    fn test_message_template_replaces_first_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let (credentials, template) = write_config(dir.path());
        let mut client =
            IqSmsClient::new(&credentials, &template, Duration::from_secs(10)).unwrap();

        let text = client.render_message("4821").unwrap();
        assert_eq!(text, "Ваш код: 4821. {code} не сообщайте никому");
    }

    #[test]
    fn test_send_confirmation_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let (credentials, template) = write_config(dir.path());
        let (base_url, requests) = one_shot_server("accepted;777");
        let mut client = IqSmsClient::new(&credentials, &template, Duration::from_secs(5))
            .unwrap()
            .with_base_url(base_url);
        // Local server; ignore any proxy configured in the environment
        client.http = reqwest::blocking::Client::builder()
            .no_proxy()
            .build()
            .unwrap();

        let status = client.send_confirmation("+79161234567", "1234").unwrap();
        assert!(status.is_accepted());
        assert_eq!(status.message_id, "777");

        let request_line = requests.recv().unwrap();
        assert!(request_line.starts_with("POST /messages/v2/send/?"));
        assert!(request_line.contains("login=acme"));
        assert!(request_line.contains("phone=%2B79161234567"));
    }

    #[test]
    fn test_set_credentials_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let (credentials, template) = write_config(dir.path());
        let mut client =
            IqSmsClient::new(&credentials, &template, Duration::from_secs(10)).unwrap();

        client.set_credentials("newlogin", "newpass").unwrap();

        let text = std::fs::read_to_string(&credentials).unwrap();
        assert!(text.contains("IQSMS_LOGIN=newlogin\n"));
        assert!(text.contains("IQSMS_PASSWORD=newpass\n"));
        assert!(text.contains("OTHER=1"));
        assert!(!dir.path().join(".env.tmp").exists());
        assert_eq!(
            client.cached.as_ref().unwrap().credentials.login(),
            "newlogin"
        );
    }

    #[test]
    fn test_incomplete_credentials_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (credentials, template) = write_config(dir.path());
        std::fs::write(&credentials, "IQSMS_LOGIN=acme\n").unwrap();
        let mut client =
            IqSmsClient::new(&credentials, &template, Duration::from_secs(10)).unwrap();

        let err = client.render_message("1").unwrap_err();
        assert!(err.to_string().contains("IQSMS_PASSWORD"));
    }
}
