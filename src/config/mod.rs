//! Configuration module for the repair tally backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default lifetime of cached report listings.
pub const DEFAULT_REPORT_CACHE_TTL_SECS: u64 = 120;

/// Default idle time after which a login session is dropped.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 12 * 60 * 60;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared admin password; admin login is disabled when unset
    pub admin_password: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Time-to-live for cached report listings; `None` disables the cache
    pub report_cache_ttl: Option<Duration>,
    /// Sessions unused for this long are logged out
    pub session_idle_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let admin_password = env::var("REPAIR_ADMIN_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty());

        let db_path = env::var("REPAIR_DB_PATH")
            .unwrap_or_else(|_| "./data/repair.sqlite".to_string())
            .into();

        let bind_addr = env::var("REPAIR_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid REPAIR_BIND_ADDR format");

        let log_level = env::var("REPAIR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let ttl_secs = env::var("REPAIR_REPORT_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REPORT_CACHE_TTL_SECS);
        let report_cache_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let idle_secs = env::var("REPAIR_SESSION_IDLE_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_SESSION_IDLE_SECS);
        let session_idle_timeout = Duration::from_secs(idle_secs);

        Self {
            admin_password,
            db_path,
            bind_addr,
            log_level,
            report_cache_ttl,
            session_idle_timeout,
        }
    }
}
