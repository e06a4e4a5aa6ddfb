//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use lodestone_core::{Error, Result};

/// Maximum presigned URL validity window (7 days, the S3 signing ceiling).
const MAX_URL_EXPIRY_SECS: u64 = 7 * 24 * 3600;

/// Default presigned URL validity window.
const DEFAULT_URL_EXPIRY_SECS: u64 = 3600;

/// Configuration for the Lodestone API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Enable debug mode.
    ///
    /// When enabled, the server may fall back to in-memory storage when no
    /// bucket is configured. Production deployments must set a bucket and
    /// leave debug off.
    pub debug: bool,

    /// Validity window for presigned transfer URLs, in seconds.
    #[serde(default = "default_url_expiry_secs")]
    pub url_expiry_secs: u64,

    /// Storage configuration (bucket/backend selection).
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_url_expiry_secs() -> u64 {
    DEFAULT_URL_EXPIRY_SECS
}

/// Storage configuration for the API server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Object storage bucket name (e.g., `my-bucket`, `s3://my-bucket`).
    #[serde(default)]
    pub bucket: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: false,
            url_expiry_secs: DEFAULT_URL_EXPIRY_SECS,
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `LODESTONE_HTTP_PORT`
    /// - `LODESTONE_DEBUG`
    /// - `LODESTONE_URL_EXPIRY_SECS` (1 to 604800)
    /// - `LODESTONE_STORAGE_BUCKET`
    ///
    /// Object-store credentials and endpoint come from the standard `AWS_*`
    /// environment variables (see `lodestone_core::s3`).
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable is present but cannot be
    /// parsed, or holds an out-of-range value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("LODESTONE_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env_bool("LODESTONE_DEBUG")? {
            config.debug = debug;
        }
        if let Some(secs) = env_u64("LODESTONE_URL_EXPIRY_SECS")? {
            if secs == 0 {
                return Err(Error::InvalidInput(
                    "LODESTONE_URL_EXPIRY_SECS must be greater than 0".to_string(),
                ));
            }
            if secs > MAX_URL_EXPIRY_SECS {
                return Err(Error::InvalidInput(format!(
                    "LODESTONE_URL_EXPIRY_SECS must be at most {MAX_URL_EXPIRY_SECS}"
                )));
            }
            config.url_expiry_secs = secs;
        }
        if let Some(bucket) = env_string("LODESTONE_STORAGE_BUCKET") {
            config.storage.bucket = Some(bucket);
        }

        Ok(config)
    }

    /// Returns the presigned URL validity window as a `Duration`.
    #[must_use]
    pub fn url_expiry(&self) -> Duration {
        Duration::from_secs(self.url_expiry_secs)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_window() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert!(!config.debug);
        assert_eq!(config.url_expiry_secs, 3600);
        assert_eq!(config.url_expiry(), Duration::from_secs(3600));
        assert!(config.storage.bucket.is_none());
    }

    #[test]
    fn parse_bool_accepts_common_forms() {
        assert!(parse_bool("TEST", "true").unwrap());
        assert!(parse_bool("TEST", "1").unwrap());
        assert!(parse_bool("TEST", "YES").unwrap());
        assert!(!parse_bool("TEST", "false").unwrap());
        assert!(!parse_bool("TEST", "0").unwrap());
        assert!(!parse_bool("TEST", "no").unwrap());
    }

    #[test]
    fn parse_bool_rejects_invalid_values() {
        assert!(parse_bool("TEST", "maybe").is_err());
        assert!(parse_bool("TEST", "").is_err());
    }
}
