//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! waiting-room service, including environment variable and TOML file
//! loading and validation.

use crate::config::queue::{QueueDefaults, ScheduleBinding};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub http: HttpSettings,
    pub admission: AdmissionSettings,
    pub queue_defaults: QueueDefaults,
    pub schedules: Vec<ScheduleBinding>,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
    /// Bearer token required on admin routes; admin routes are open when unset
    pub admin_token: Option<String>,
}

/// Admission-control settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionSettings {
    /// How often the TTL sweeper runs
    pub sweep_interval_seconds: u64,
    /// Poll interval clients are expected to follow
    pub poll_interval_seconds: u64,
    /// Waiting entries missing this many polls are reclaimed; 0 disables
    pub abandon_after_missed_polls: u32,
    /// How long Expired/Completed outcomes remain visible to polling clients
    pub outcome_retention_seconds: u64,
    /// Create a booking queue on first start-booking for a known schedule
    pub auto_create_on_start_booking: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "waiting-room".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            admin_token: None,
        }
    }
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 5,
            poll_interval_seconds: 3,
            abandon_after_missed_polls: 10, // 30 seconds at the default poll rate
            outcome_retention_seconds: 600,
            auto_create_on_start_booking: true,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still win
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(timeout) = parse_env("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // HTTP settings
        if let Ok(host) = env::var("HTTP_HOST") {
            self.http.host = host;
        }
        if let Some(port) = parse_env("HTTP_PORT")? {
            self.http.port = port;
        }
        if let Ok(token) = env::var("ADMIN_TOKEN") {
            self.http.admin_token = Some(token).filter(|t| !t.is_empty());
        }

        // Admission settings
        if let Some(interval) = parse_env("SWEEP_INTERVAL_SECONDS")? {
            self.admission.sweep_interval_seconds = interval;
        }
        if let Some(interval) = parse_env("POLL_INTERVAL_SECONDS")? {
            self.admission.poll_interval_seconds = interval;
        }
        if let Some(missed) = parse_env("ABANDON_AFTER_MISSED_POLLS")? {
            self.admission.abandon_after_missed_polls = missed;
        }
        if let Some(retention) = parse_env("OUTCOME_RETENTION_SECONDS")? {
            self.admission.outcome_retention_seconds = retention;
        }
        if let Some(auto_create) = parse_env("AUTO_CREATE_ON_START_BOOKING")? {
            self.admission.auto_create_on_start_booking = auto_create;
        }

        // Queue defaults
        if let Some(max_active) = parse_env("DEFAULT_MAX_ACTIVE_USERS")? {
            self.queue_defaults.max_active_users = max_active;
        }
        if let Some(ttl) = parse_env("DEFAULT_ENTRY_TTL_MINUTES")? {
            self.queue_defaults.entry_ttl_minutes = ttl;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.admission.sweep_interval_seconds)
    }

    /// Idle time after which a waiting entry counts as abandoned
    pub fn abandon_after(&self) -> Option<chrono::Duration> {
        match self.admission.abandon_after_missed_polls {
            0 => None,
            missed => Some(chrono::Duration::seconds(
                self.admission.poll_interval_seconds as i64 * missed as i64,
            )),
        }
    }

    /// Retention of terminal outcomes as a chrono duration
    pub fn outcome_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.admission.outcome_retention_seconds as i64)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports and timeouts
    if config.http.port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate admission settings
    if config.admission.sweep_interval_seconds == 0 {
        return Err(anyhow!("Sweep interval must be greater than 0"));
    }
    if config.admission.poll_interval_seconds == 0 {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }

    // Validate queue defaults
    if config.queue_defaults.max_active_users == 0 {
        return Err(anyhow!("Default max active users must be at least 1"));
    }
    if config.queue_defaults.entry_ttl_minutes == 0 {
        return Err(anyhow!("Default entry TTL must be at least 1 minute"));
    }

    for binding in &config.schedules {
        if binding.schedule_id.is_empty() || binding.performance_id.is_empty() {
            return Err(anyhow!(
                "Schedule bindings need both schedule_id and performance_id"
            ));
        }
    }

    Ok(())
}
