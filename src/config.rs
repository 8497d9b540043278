//! Configuration management for fleeting.
//!
//! Options come from command-line arguments via clap, fall back to
//! environment variables with the `FLEETING_` prefix, and otherwise use the
//! defaults below.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use fleeting::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `FLEETING_HOST` - Server bind address (default: 0.0.0.0)
//! - `FLEETING_PORT` - Server port (default: 3000)
//! - `FLEETING_WORK_DIR` - Directory holding artifacts (default: temp)
//! - `FLEETING_RETENTION_SECS` - Seconds an artifact lives (default: 60)
//! - `FLEETING_MAX_UPLOAD_BYTES` - Request body limit (default: 20 MiB)
//! - `FLEETING_JPEG_QUALITY` - Default JPEG quality (default: 80)
//! - `FLEETING_CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::server::DEFAULT_MAX_UPLOAD_BYTES;
use crate::transform::{DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default working directory for artifacts.
pub const DEFAULT_WORK_DIR: &str = "temp";

/// Default artifact lifetime in seconds.
pub const DEFAULT_RETENTION_SECS: u64 = 60;

/// Longest accepted artifact lifetime (one day).
pub const MAX_RETENTION_SECS: u64 = 24 * 60 * 60;

// =============================================================================
// CLI Arguments
// =============================================================================

/// fleeting - ephemeral image processing server.
///
/// Accepts an image upload, runs one transform on it, and serves the result
/// for a short retention window before deleting both files.
#[derive(Parser, Debug, Clone)]
#[command(name = "fleeting")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "FLEETING_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "FLEETING_PORT")]
    pub port: u16,

    /// Largest accepted upload in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "FLEETING_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding input and output artifacts.
    ///
    /// Created on startup if missing.
    #[arg(long, default_value = DEFAULT_WORK_DIR, env = "FLEETING_WORK_DIR")]
    pub work_dir: PathBuf,

    /// Seconds an artifact is kept before it is deleted.
    #[arg(long, default_value_t = DEFAULT_RETENTION_SECS, env = "FLEETING_RETENTION_SECS")]
    pub retention_secs: u64,

    // =========================================================================
    // Transform Configuration
    // =========================================================================
    /// Default JPEG quality for encoded outputs (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "FLEETING_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "FLEETING_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(
                "Working directory is required. Set --work-dir or FLEETING_WORK_DIR".to_string(),
            );
        }

        if self.retention_secs == 0 {
            return Err("retention_secs must be greater than 0".to_string());
        }
        if self.retention_secs > MAX_RETENTION_SECS {
            return Err(format!(
                "retention_secs must be at most {} (one day)",
                MAX_RETENTION_SECS
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Artifact lifetime.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
