//! wkhtmltopdf renderer
//!
//! Drives the `wkhtmltopdf` executable, one process per document. Meant to
//! be owned by the render worker, which guarantees one conversion at a time.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::domain::backend::RenderBackend;
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "Portrait",
            Orientation::Landscape => "Landscape",
        }
    }
}

/// Page layout and rendering switches
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub page_size: String,
    pub orientation: Orientation,
    pub dpi: u32,
    /// Margins in millimetres
    pub margin_top: u32,
    pub margin_bottom: u32,
    pub margin_left: u32,
    pub margin_right: u32,
    pub zoom: f64,
    pub minimum_font_size: u32,
    pub disable_smart_shrinking: bool,
    pub enable_local_file_access: bool,
    pub grayscale: bool,
    pub low_quality: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_size: "A4".to_string(),
            orientation: Orientation::Portrait,
            dpi: 96,
            margin_top: 10,
            // Room for the signature stamp
            margin_bottom: 45,
            margin_left: 5,
            margin_right: 5,
            zoom: 1.2,
            minimum_font_size: 11,
            disable_smart_shrinking: true,
            enable_local_file_access: true,
            grayscale: false,
            low_quality: false,
        }
    }
}

impl RenderOptions {
    /// Command-line switches, excluding input and output paths
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--quiet".to_string(),
            "--encoding".to_string(),
            "utf-8".to_string(),
            "--page-size".to_string(),
            self.page_size.clone(),
            "--orientation".to_string(),
            self.orientation.as_str().to_string(),
            "--dpi".to_string(),
            self.dpi.to_string(),
            "--margin-top".to_string(),
            format!("{}mm", self.margin_top),
            "--margin-bottom".to_string(),
            format!("{}mm", self.margin_bottom),
            "--margin-left".to_string(),
            format!("{}mm", self.margin_left),
            "--margin-right".to_string(),
            format!("{}mm", self.margin_right),
            "--zoom".to_string(),
            self.zoom.to_string(),
            "--minimum-font-size".to_string(),
            self.minimum_font_size.to_string(),
        ];
        if self.disable_smart_shrinking {
            args.push("--disable-smart-shrinking".to_string());
        }
        if self.enable_local_file_access {
            args.push("--enable-local-file-access".to_string());
        }
        if self.grayscale {
            args.push("--grayscale".to_string());
        }
        if self.low_quality {
            args.push("--lowquality".to_string());
        }
        args
    }
}

pub struct WkHtmlToPdfRenderer {
    binary: PathBuf,
    options: RenderOptions,
}

impl WkHtmlToPdfRenderer {
    pub fn new(binary: impl Into<PathBuf>, options: RenderOptions) -> Self {
        Self {
            binary: binary.into(),
            options,
        }
    }
}

impl RenderBackend for WkHtmlToPdfRenderer {
    /// Fails early if the executable is missing or broken
    fn startup(&mut self) -> Result<(), BackendError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                BackendError::failed(format!("cannot run {}: {e}", self.binary.display()))
            })?;
        if !output.status.success() {
            return Err(BackendError::failed(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }
        tracing::info!(
            binary = %self.binary.display(),
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "HTML renderer ready"
        );
        Ok(())
    }

    fn render(&mut self, html_path: &Path, pdf_path: &Path) -> Result<(), BackendError> {
        let output = Command::new(&self.binary)
            .args(self.options.to_args())
            .arg(html_path)
            .arg(pdf_path)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(BackendError::failed(format!(
                "wkhtmltopdf exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        match std::fs::metadata(pdf_path) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(BackendError::failed("renderer produced no output")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = RenderOptions::default().to_args();
        let joined = args.join(" ");
        assert!(joined.contains("--page-size A4"));
        assert!(joined.contains("--orientation Portrait"));
        assert!(joined.contains("--margin-bottom 45mm"));
        assert!(joined.contains("--zoom 1.2"));
        assert!(joined.contains("--minimum-font-size 11"));
        assert!(args.contains(&"--disable-smart-shrinking".to_string()));
        assert!(args.contains(&"--enable-local-file-access".to_string()));
        assert!(!args.contains(&"--grayscale".to_string()));
    }

    #[test]
    fn test_optional_switches() {
        let options = RenderOptions {
            orientation: Orientation::Landscape,
            grayscale: true,
            low_quality: true,
            disable_smart_shrinking: false,
            ..Default::default()
        };
        let args = options.to_args();
        assert!(args.contains(&"Landscape".to_string()));
        assert!(args.contains(&"--grayscale".to_string()));
        assert!(args.contains(&"--lowquality".to_string()));
        assert!(!args.contains(&"--disable-smart-shrinking".to_string()));
    }

    #[test]
    fn test_missing_binary_fails_startup() {
        let mut renderer =
            WkHtmlToPdfRenderer::new("/nonexistent/wkhtmltopdf", RenderOptions::default());
        let err = renderer.startup().unwrap_err();
        assert!(err.to_string().contains("cannot run"));
    }
}
