//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256 streaming, hex, constant-time compare)
//! - Filesystem helpers (unique names, scope-bound temp files)
//! - Fixed-offset timestamps
//! - Asynchronous audit log sink
//! - Bounded template cache

pub mod crypto;
pub mod fs;
pub mod log_sink;
pub mod template_cache;
pub mod time;
