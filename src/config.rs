//! Configuration management.
//!
//! Settings come from command-line arguments or environment variables with
//! the `NEURO_` prefix; the engine itself never reads them directly.
//!
//! # Environment Variables
//!
//! - `NEURO_DATA_ROOT` - Filesystem root for specimen data (default: data)
//! - `NEURO_HOST` - Server bind address (default: 0.0.0.0)
//! - `NEURO_PORT` - Server port (default: 8000)
//! - `NEURO_CACHE_CAPACITY` - Result cache size in bytes; unset disables
//!   the cache entirely (pass-through mode)
//! - `NEURO_CACHE_TTL` - Result cache entry TTL in seconds (default: 3600)
//! - `NEURO_CACHE_MAX_AGE` - HTTP Cache-Control max-age (default: 3600)
//! - `NEURO_CORS_ORIGINS` - Comma-separated allowed CORS origins

use std::path::PathBuf;

use clap::Parser;

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default result cache entry TTL in seconds (1 hour).
pub const DEFAULT_CACHE_TTL: u64 = 3600;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// neuro-streamer - a tile server for brain specimen imaging datasets.
///
/// Serves image tiles, region-mask tiles and surface meshes resolved from
/// composite data identifiers against a local specimen data tree.
#[derive(Parser, Debug, Clone)]
#[command(name = "neuro-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "NEURO_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "NEURO_PORT")]
    pub port: u16,

    // =========================================================================
    // Data Configuration
    // =========================================================================
    /// Filesystem root holding the specimen data tree (with its `specimens`
    /// metadata document).
    #[arg(long, default_value = "data", env = "NEURO_DATA_ROOT")]
    pub data_root: PathBuf,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Result cache capacity in bytes. When not set, the cache is disabled
    /// and every request re-reads the backing store.
    #[arg(long, env = "NEURO_CACHE_CAPACITY")]
    pub cache_capacity: Option<usize>,

    /// Result cache entry TTL in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL, env = "NEURO_CACHE_TTL")]
    pub cache_ttl: u64,

    /// HTTP Cache-Control max-age in seconds for data responses.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "NEURO_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated). Unset allows any origin.
    #[arg(long, env = "NEURO_CORS_ORIGINS", value_delimiter = ',')]
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
        if self.data_root.as_os_str().is_empty() {
            return Err("data_root must not be empty. Set --data-root or NEURO_DATA_ROOT".into());
        }

        if self.cache_capacity == Some(0) {
            return Err(
                "cache_capacity must be greater than 0; leave it unset to disable the cache"
                    .into(),
            );
        }

        if self.cache_ttl == 0 {
            return Err("cache_ttl must be greater than 0".into());
        }

        Ok(())
    }

    /// The server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
