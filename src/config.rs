//! Configuration management for the tile server.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `TILER_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use raster_tiler::config::Config;
//!
//! let config = Config::parse();
//! println!("Listening on {}", config.bind_address());
//! println!("Serving tiles from {}", config.data_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! - `TILER_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILER_PORT` - Server port (default: 8000)
//! - `TILER_DATA_DIR` - Root of the tile tree (required)
//! - `TILER_DISABLE_CACHE` - Render every request without a cache
//! - `TILER_CACHE_CAPACITY` - Rendered-tile cache size in bytes (default: 100MB)
//! - `TILER_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `TILER_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;

use clap::Parser;

use crate::server::DEFAULT_CACHE_MAX_AGE;
use crate::tile::DEFAULT_CACHE_CAPACITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// raster-tiler - A map tile server for raster datasets.
///
/// Serves XYZ tiles from a local directory of raw tile dumps, rescaled,
/// color-corrected and encoded on the fly.
#[derive(Parser, Debug, Clone)]
#[command(name = "raster-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILER_PORT")]
    pub port: u16,

    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Directory holding tiles as `{identifier}/{z}/{x}/{y}.npy`.
    #[arg(long, env = "TILER_DATA_DIR")]
    pub data_dir: PathBuf,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Disable the rendered-tile cache.
    #[arg(long, default_value_t = false, env = "TILER_DISABLE_CACHE")]
    pub disable_cache: bool,

    /// Maximum size of the rendered-tile cache in bytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, env = "TILER_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "TILER_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TILER_CORS_ORIGINS", value_delimiter = ',')]
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
        if self.data_dir.as_os_str().is_empty() {
            return Err("Data directory is required. Set --data-dir or TILER_DATA_DIR".to_string());
        }
        if !self.data_dir.is_dir() {
            return Err(format!(
                "Data directory '{}' does not exist or is not a directory",
                self.data_dir.display()
            ));
        }

        if !self.disable_cache && self.cache_capacity == 0 {
            return Err(
                "cache_capacity must be greater than 0 (use --disable-cache to turn caching off)"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_enabled(&self) -> bool {
        !self.disable_cache
    }
}

// =============================================================================
// Tests
// =============================================================================
