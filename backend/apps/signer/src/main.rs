//! Signer CLI Entry Point
//!
//! Signs a document for the identity in a user data file, or checks a
//! signed document against its own stamp. Uses `anyhow` for startup errors;
//! pipeline failures keep their `SigningError` so the exit code reflects
//! the error kind.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use signing::application::pipeline::verify_stamped_document;
use signing::infra::stamper::IncrementalStamper;
use signing::{
    AppError, DEFAULT_CODE_LENGTH, DefaultSigningPipeline, ErrorKind, Identity, ResultExt,
    ServiceConfig, SigningError, ValidationMode,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the auth token
const AUTH_TOKEN_ENV: &str = "SIGNER_AUTH_TOKEN";

#[derive(Debug, Parser)]
#[command(name = "signer", about = "Sign documents confirmed by an SMS code.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render, confirm and stamp a document for one signer
    Sign {
        /// Service configuration (`key=value` or `.json`)
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
        /// JSON object with the signer's identity fields
        #[arg(value_name = "USER_DATA")]
        user_data: PathBuf,
        /// Actually send the confirmation SMS
        #[arg(long)]
        live: bool,
        /// Require passport data and email as well
        #[arg(long)]
        all_fields: bool,
        /// Confirmation code; generated when omitted
        #[arg(long, value_name = "CODE")]
        code: Option<String>,
        /// Overrides SIGNER_AUTH_TOKEN and the configured token
        #[arg(long, value_name = "TOKEN")]
        auth_token: Option<String>,
    },
    /// Check a signed document against the hash in its stamp
    Verify {
        #[arg(value_name = "SIGNED_PDF")]
        signed_pdf: PathBuf,
    },
}

fn main() -> ExitCode {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signer=info,signing=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "Starting signer");
    let result = match cli.command {
        Command::Sign {
            config,
            user_data,
            live,
            all_fields,
            code,
            auth_token,
        } => sign(&config, &user_data, live, all_fields, code, auth_token),
        Command::Verify { signed_pdf } => verify(&signed_pdf),
    };

    match result {
        Ok(code) => code,
        Err(err) => report_error(&err),
    }
}

fn sign(
    config_path: &Path,
    user_data: &Path,
    live: bool,
    all_fields: bool,
    code: Option<String>,
    auth_token: Option<String>,
) -> anyhow::Result<ExitCode> {
    let config = ServiceConfig::load(config_path)?;
    println!("Configuration loaded: {}", config_path.display());

    let token = auth_token
        .or_else(|| env::var(AUTH_TOKEN_ENV).ok())
        .unwrap_or_else(|| config.auth_token.clone());

    let json = std::fs::read_to_string(user_data).map_app_err(
        ErrorKind::Io,
        format!("cannot read user data {}", user_data.display()),
    )?;
    let identity = Identity::from_json_str(&json)?;
    println!("Signer: {}", identity.full_name());

    let pipeline = DefaultSigningPipeline::from_config(config)?;
    println!("Render worker started");

    let code = match code {
        Some(code) => code,
        None => pipeline.generate_confirmation_code(&token, DEFAULT_CODE_LENGTH)?,
    };
    let mode = if all_fields {
        ValidationMode::AllFields
    } else {
        ValidationMode::Minimal
    };
    if !live {
        println!("Test mode: the confirmation SMS will not be sent");
    }

    let result = pipeline.sign_document(&token, !live, mode, &identity, &code);
    pipeline.shutdown();
    let outcome = result?;

    println!("Document signed");
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(ExitCode::SUCCESS)
}

fn verify(signed_pdf: &Path) -> anyhow::Result<ExitCode> {
    let matches = verify_stamped_document(&IncrementalStamper::new(), signed_pdf)?;
    if matches {
        println!("{}: hash matches the stamp", signed_pdf.display());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}: hash does NOT match the stamp", signed_pdf.display());
        Ok(ExitCode::FAILURE)
    }
}

/// Print the error kind and message; the exit code follows the kind
fn report_error(err: &anyhow::Error) -> ExitCode {
    if let Some(signing_err) = err.downcast_ref::<SigningError>() {
        let kind = signing_err.kind();
        eprintln!("Error [{}] {}: {signing_err}", signing_err.code(), kind.as_str());
        return ExitCode::from(kind.exit_code());
    }
    if let Some(app_err) = err.downcast_ref::<AppError>() {
        eprintln!("Error [{}]: {app_err}", app_err.kind().as_str());
        return ExitCode::from(app_err.exit_code());
    }
    eprintln!("Error: {err:#}");
    ExitCode::FAILURE
}
