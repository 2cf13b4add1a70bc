//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::CacheConfig;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Validity window in milliseconds of values stored without explicit expiry
    pub cache_expiry_ms: u64,
    /// Maximum number of concurrently running cache sweeps
    pub max_sweep_jobs: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Simulated latency of the upstream source in milliseconds
    pub upstream_latency_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_EXPIRY_MS` - Cache validity window (default: 3000)
    /// - `MAX_SWEEP_JOBS` - Concurrent sweep limit (default: 1)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `UPSTREAM_LATENCY_MS` - Simulated upstream latency (default: 200)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_expiry_ms: env_or("CACHE_EXPIRY_MS", defaults.cache_expiry_ms),
            max_sweep_jobs: env_or("MAX_SWEEP_JOBS", defaults.max_sweep_jobs),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            upstream_latency_ms: env_or("UPSTREAM_LATENCY_MS", defaults.upstream_latency_ms),
        }
    }

    /// Cache settings derived from this configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            expiry: Duration::from_millis(self.cache_expiry_ms),
        }
    }

    /// Simulated upstream latency as a `Duration`.
    pub fn upstream_latency(&self) -> Duration {
        Duration::from_millis(self.upstream_latency_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_expiry_ms: 3000,
            max_sweep_jobs: 1,
            server_port: 3000,
            upstream_latency_ms: 200,
        }
    }
}

/// Parses `key` from the environment, falling back on absence or parse failure.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
